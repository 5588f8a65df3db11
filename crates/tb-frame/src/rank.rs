use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tb_types::{NullKind, Scalar, compare_values};

/// Tie policy for ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMethod {
    /// Mean of the ranks the tie group occupies.
    #[default]
    Average,
    Min,
    Max,
    /// Input order among ties.
    First,
    /// Like `Min`, but groups get consecutive ranks.
    Dense,
}

/// Where missing values land in a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NaOption {
    /// Missing values get a missing rank.
    #[default]
    Keep,
    Top,
    Bottom,
}

/// Rank `values` in place order, returning one `Float64` (or missing) rank
/// per input position. Text ranks lexicographically.
#[must_use]
pub fn rank_values(
    values: &[Scalar],
    method: RankMethod,
    ascending: bool,
    na_option: NaOption,
) -> Vec<Scalar> {
    let mut present = Vec::with_capacity(values.len());
    let mut missing = Vec::new();
    for (position, value) in values.iter().enumerate() {
        if value.is_missing() {
            missing.push(position);
        } else {
            present.push(position);
        }
    }

    let order = |a: &usize, b: &usize| -> Ordering {
        let cmp = compare_values(&values[*a], &values[*b]);
        if ascending { cmp } else { cmp.reverse() }
    };
    // Stable: ties keep input order, which `First` relies on.
    present.sort_by(order);

    // Missing values form one tie group at the front or back.
    let missing_at_top = na_option == NaOption::Top && !missing.is_empty();
    let offset = match method {
        _ if !missing_at_top => 0,
        RankMethod::Dense => 1,
        _ => missing.len(),
    };

    let mut ranks = vec![f64::NAN; values.len()];
    let mut start = 0;
    let mut dense = 0_usize;
    while start < present.len() {
        let mut end = start + 1;
        while end < present.len() && order(&present[start], &present[end]) == Ordering::Equal {
            end += 1;
        }
        dense += 1;
        for (k, &position) in present[start..end].iter().enumerate() {
            ranks[position] = group_rank(method, start + offset, end + offset, k, dense + offset);
        }
        start = end;
    }

    let missing_span = match na_option {
        NaOption::Keep => None,
        NaOption::Top => Some((0, missing.len(), 1)),
        NaOption::Bottom => Some((present.len(), present.len() + missing.len(), dense + 1)),
    };
    if let Some((before, through, dense_rank)) = missing_span {
        for (k, &position) in missing.iter().enumerate() {
            ranks[position] = group_rank(method, before, through, k, dense_rank);
        }
    }

    ranks
        .into_iter()
        .map(|rank| {
            if rank.is_nan() {
                Scalar::Null(NullKind::NaN)
            } else {
                Scalar::Float64(rank)
            }
        })
        .collect()
}

/// Rank of the `k`-th member of a tie group occupying sorted slots
/// `before + 1 ..= through`.
fn group_rank(method: RankMethod, before: usize, through: usize, k: usize, dense: usize) -> f64 {
    let (lowest, highest) = ((before + 1) as f64, through as f64);
    match method {
        RankMethod::Average => (lowest + highest) / 2.0,
        RankMethod::Min => lowest,
        RankMethod::Max => highest,
        RankMethod::First => lowest + k as f64,
        RankMethod::Dense => dense as f64,
    }
}
