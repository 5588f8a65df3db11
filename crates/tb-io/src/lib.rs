#![forbid(unsafe_code)]

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use csv::{ReaderBuilder, WriterBuilder};
use tb_columnar::{Column, ColumnError};
use tb_frame::{DataFrame, FrameError, SetIndexOptions};
use tb_index::{Index, IndexLabel};
use tb_types::{DType, Scalar};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("csv input has no headers")]
    MissingHeaders,
    #[error("sheet {sheet:?} not found in workbook")]
    SheetNotFound { sheet: String },
    #[error("index column {column} out of range for {ncols} columns")]
    IndexColumnOutOfRange { column: usize, ncols: usize },
    #[error("record {record} has {found} fields, expected at most {expected}")]
    RaggedRecord {
        record: usize,
        expected: usize,
        found: usize,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Spreadsheet(#[from] calamine::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Options for [`read_csv_str`] and [`read_csv_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvReadOptions {
    pub delimiter: u8,
    /// The first non-skipped record holds column names. Without a header,
    /// columns are labeled `0..n`.
    pub has_header: bool,
    /// Column positions that become the row index, outermost level first.
    pub index_cols: Vec<usize>,
    /// Extra tokens read as missing, on top of empty fields.
    pub na_values: Vec<String>,
    /// Leading records to discard before the header.
    pub skip_rows: usize,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            index_cols: Vec::new(),
            na_values: Vec::new(),
            skip_rows: 0,
        }
    }
}

/// Options for [`write_csv_string`] and [`write_csv_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvWriteOptions {
    pub delimiter: u8,
    /// Text written for missing cells.
    pub na_rep: String,
    /// Write the index levels as leading columns.
    pub include_index: bool,
    pub include_header: bool,
}

impl Default for CsvWriteOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            na_rep: String::new(),
            include_index: true,
            include_header: true,
        }
    }
}

/// Options for [`read_excel_sheet`]. Same layout rules as CSV import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcelReadOptions {
    pub has_header: bool,
    pub index_cols: Vec<usize>,
    pub na_values: Vec<String>,
    pub skip_rows: usize,
}

impl Default for ExcelReadOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            index_cols: Vec::new(),
            na_values: Vec::new(),
            skip_rows: 0,
        }
    }
}

/// Layout shared by the text and spreadsheet readers.
struct Layout<'a> {
    has_header: bool,
    index_cols: &'a [usize],
    na_values: &'a [String],
    skip_rows: usize,
}

impl<'a> From<&'a CsvReadOptions> for Layout<'a> {
    fn from(options: &'a CsvReadOptions) -> Self {
        Self {
            has_header: options.has_header,
            index_cols: &options.index_cols,
            na_values: &options.na_values,
            skip_rows: options.skip_rows,
        }
    }
}

impl<'a> From<&'a ExcelReadOptions> for Layout<'a> {
    fn from(options: &'a ExcelReadOptions) -> Self {
        Self {
            has_header: options.has_header,
            index_cols: &options.index_cols,
            na_values: &options.na_values,
            skip_rows: options.skip_rows,
        }
    }
}

pub fn read_csv_str(input: &str, options: &CsvReadOptions) -> Result<DataFrame, IoError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(options.delimiter)
        .from_reader(input.as_bytes());

    let mut records = Vec::new();
    for row in reader.records() {
        let record = row?;
        records.push(
            record
                .iter()
                .map(|field| Some(field.to_owned()))
                .collect::<Vec<_>>(),
        );
    }

    let frame = assemble_frame(records, &Layout::from(options))?;
    log::debug!(
        "read_csv: {} rows, {} columns",
        frame.len(),
        frame.num_columns()
    );
    Ok(frame)
}

pub fn read_csv_path(path: impl AsRef<Path>, options: &CsvReadOptions) -> Result<DataFrame, IoError> {
    let input = std::fs::read_to_string(path)?;
    read_csv_str(&input, options)
}

pub fn write_csv_string(frame: &DataFrame, options: &CsvWriteOptions) -> Result<String, IoError> {
    let mut writer = WriterBuilder::new()
        .delimiter(options.delimiter)
        .from_writer(Vec::new());

    let index = frame.index();
    let nlevels = index.nlevels();

    if options.include_header {
        let mut header = Vec::with_capacity(nlevels + frame.num_columns());
        if options.include_index {
            for level in 0..nlevels {
                header.push(
                    index.names()[level]
                        .clone()
                        .unwrap_or_else(|| default_level_name(level, nlevels)),
                );
            }
        }
        header.extend(frame.column_labels().labels().iter().map(header_text));
        writer.write_record(&header)?;
    }

    for row_idx in 0..frame.len() {
        let mut row = Vec::with_capacity(nlevels + frame.num_columns());
        if options.include_index {
            let parts = index.labels()[row_idx].parts();
            row.extend((0..nlevels).map(|level| {
                parts
                    .get(level)
                    .map_or_else(|| options.na_rep.clone(), ToString::to_string)
            }));
        }
        row.extend(frame.columns().iter().map(|column| {
            column
                .value(row_idx)
                .map_or_else(|| options.na_rep.clone(), |v| scalar_to_csv(v, &options.na_rep))
        }));
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    log::debug!("write_csv: {} rows", frame.len());
    Ok(String::from_utf8(bytes)?)
}

pub fn write_csv_path(
    frame: &DataFrame,
    path: impl AsRef<Path>,
    options: &CsvWriteOptions,
) -> Result<(), IoError> {
    let text = write_csv_string(frame, options)?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Read one named sheet of an xlsx/xls/ods workbook.
pub fn read_excel_sheet(
    path: impl AsRef<Path>,
    sheet: &str,
    options: &ExcelReadOptions,
) -> Result<DataFrame, IoError> {
    let mut workbook = open_workbook_auto(path)?;
    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(IoError::SheetNotFound {
            sheet: sheet.to_owned(),
        });
    }
    let range = workbook.worksheet_range(sheet)?;

    let records = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    let frame = assemble_frame(records, &Layout::from(options))?;
    log::debug!(
        "read_excel_sheet {sheet:?}: {} rows, {} columns",
        frame.len(),
        frame.num_columns()
    );
    Ok(frame)
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(dt.as_f64().to_string()),
    }
}

fn assemble_frame(
    records: Vec<Vec<Option<String>>>,
    layout: &Layout<'_>,
) -> Result<DataFrame, IoError> {
    let mut records = records.into_iter().skip(layout.skip_rows);

    let (labels, rows) = if layout.has_header {
        let header = records.next().ok_or(IoError::MissingHeaders)?;
        if header.is_empty() {
            return Err(IoError::MissingHeaders);
        }
        let labels = header
            .into_iter()
            .enumerate()
            .map(|(idx, name)| match name {
                Some(name) if !name.is_empty() => IndexLabel::from(name),
                _ => IndexLabel::from(format!("unnamed_{idx}")),
            })
            .collect::<Vec<_>>();
        (labels, records.collect::<Vec<_>>())
    } else {
        let rows = records.collect::<Vec<_>>();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let labels = (0..width as i64).map(IndexLabel::from).collect();
        (labels, rows)
    };

    let ncols = labels.len();
    for &column in layout.index_cols {
        if column >= ncols {
            return Err(IoError::IndexColumnOutOfRange { column, ncols });
        }
    }

    // Vec-per-column accumulation; short records are padded with missing.
    let mut fields: Vec<Vec<Option<String>>> = (0..ncols)
        .map(|_| Vec::with_capacity(rows.len()))
        .collect();
    for (record_idx, record) in rows.into_iter().enumerate() {
        if record.len() > ncols {
            return Err(IoError::RaggedRecord {
                record: record_idx,
                expected: ncols,
                found: record.len(),
            });
        }
        let mut record = record.into_iter();
        for column in &mut fields {
            column.push(record.next().flatten());
        }
    }

    let nrows = fields.first().map_or(0, Vec::len);
    let columns = fields
        .into_iter()
        .map(|column| infer_column(column, layout.na_values))
        .collect::<Result<Vec<_>, _>>()?;

    let frame = DataFrame::new(Index::range(nrows), Index::new(labels.clone()), columns)?;
    if layout.index_cols.is_empty() {
        return Ok(frame);
    }

    let keys = layout
        .index_cols
        .iter()
        .map(|&column| labels[column].clone())
        .collect::<Vec<_>>();
    Ok(frame.set_index(&keys, SetIndexOptions::default())?)
}

fn is_na(field: &str, na_values: &[String]) -> bool {
    let trimmed = field.trim();
    trimmed.is_empty() || na_values.iter().any(|token| token == trimmed)
}

fn parse_bool(field: &str) -> Option<bool> {
    if field.eq_ignore_ascii_case("true") {
        Some(true)
    } else if field.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Pick one kind for the whole column: integer, then float, then boolean,
/// then text. A column with no present fields is an untyped missing column.
fn infer_column(fields: Vec<Option<String>>, na_values: &[String]) -> Result<Column, IoError> {
    let fields = fields
        .into_iter()
        .map(|field| field.filter(|text| !is_na(text, na_values)))
        .collect::<Vec<_>>();
    let present = || fields.iter().flatten().map(|text| text.trim());

    let len = fields.len();
    if present().next().is_none() {
        return Ok(Column::all_missing(DType::Null, len));
    }

    let convert = |dtype: DType, parse: &dyn Fn(&str) -> Option<Scalar>| {
        let values = fields
            .iter()
            .map(|field| {
                field
                    .as_deref()
                    .and_then(|text| parse(text.trim()))
                    .unwrap_or_else(|| Scalar::missing_for_dtype(dtype))
            })
            .collect::<Vec<_>>();
        Column::new(dtype, values)
    };

    let column = if present().all(|text| text.parse::<i64>().is_ok()) {
        convert(DType::Int64, &|text: &str| text.parse::<i64>().ok().map(Scalar::Int64))?
    } else if present().all(|text| text.parse::<f64>().is_ok()) {
        convert(DType::Float64, &|text: &str| text.parse::<f64>().ok().map(Scalar::Float64))?
    } else if present().all(|text| parse_bool(text).is_some()) {
        convert(DType::Bool, &|text: &str| parse_bool(text).map(Scalar::Bool))?
    } else {
        let values = fields
            .into_iter()
            .map(|field| field.map_or_else(Scalar::missing, Scalar::Utf8))
            .collect::<Vec<_>>();
        Column::new(DType::Utf8, values)?
    };
    Ok(column)
}

fn default_level_name(level: usize, nlevels: usize) -> String {
    if nlevels == 1 {
        "index".to_owned()
    } else {
        format!("level_{level}")
    }
}

/// Composite column labels are joined with `|`.
fn header_text(label: &IndexLabel) -> String {
    match label {
        IndexLabel::Composite(parts) => parts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("|"),
        flat => flat.to_string(),
    }
}

fn scalar_to_csv(scalar: &Scalar, na_rep: &str) -> String {
    match scalar {
        Scalar::Null(_) => na_rep.to_owned(),
        Scalar::Bool(v) => v.to_string(),
        Scalar::Int64(v) => v.to_string(),
        Scalar::Float64(v) => {
            if v.is_nan() {
                na_rep.to_owned()
            } else {
                v.to_string()
            }
        }
        Scalar::Utf8(v) => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use tb_columnar::Column;
    use tb_frame::DataFrame;
    use tb_index::{Index, IndexLabel};
    use tb_types::{DType, Scalar};

    use super::{
        CsvReadOptions, CsvWriteOptions, ExcelReadOptions, IoError, read_csv_path, read_csv_str,
        read_excel_sheet, write_csv_path, write_csv_string,
    };

    fn read(input: &str) -> DataFrame {
        read_csv_str(input, &CsvReadOptions::default()).expect("read")
    }

    fn col<'a>(frame: &'a DataFrame, name: &str) -> &'a Column {
        frame.column(&IndexLabel::from(name)).expect("column")
    }

    fn values_only() -> CsvWriteOptions {
        CsvWriteOptions {
            include_index: false,
            ..CsvWriteOptions::default()
        }
    }

    #[test]
    fn csv_round_trip_preserves_null_and_numeric_shape() {
        let input = "id,value\n1,10\n2,\n3,3.5\n";
        let frame = read(input);
        let value_col = col(&frame, "value");

        assert_eq!(value_col.dtype(), DType::Float64);
        assert!(value_col.values()[1].is_missing());

        let out = write_csv_string(&frame, &values_only()).expect("write");
        assert!(out.contains("id,value"));
        assert!(out.contains("3,3.5"));
    }

    #[test]
    fn header_order_is_preserved() {
        let frame = read("charlie,alpha,bravo\n1,2,3\n4,5,6\n");
        let keys = frame
            .column_labels()
            .labels()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        assert_eq!(keys, ["charlie", "alpha", "bravo"]);
        assert_eq!(col(&frame, "alpha").values()[0], Scalar::Int64(2));
        assert_eq!(col(&frame, "charlie").values()[1], Scalar::Int64(4));
        assert_eq!(frame.index(), &Index::range(2));
    }

    #[test]
    fn header_without_rows_gives_empty_columns() {
        let frame = read("x,y,z\n");
        assert_eq!(frame.shape(), (0, 3));
        assert!(frame.columns().iter().all(Column::is_empty));
    }

    #[test]
    fn empty_input_has_no_headers() {
        let err = read_csv_str("", &CsvReadOptions::default()).expect_err("no header");
        assert!(matches!(err, IoError::MissingHeaders));
    }

    #[test]
    fn kinds_are_inferred_from_the_whole_column() {
        let input = "ints,floats,strings,bools,nulls,mixed\n\
                     1,1.5,hello,true,,1\n\
                     2,2,world,False,,x\n\
                     3,,foo,TRUE,,2.5\n";
        let frame = read(input);

        assert_eq!(col(&frame, "ints").dtype(), DType::Int64);
        assert_eq!(col(&frame, "ints").values()[2], Scalar::Int64(3));

        let floats = col(&frame, "floats");
        assert_eq!(floats.dtype(), DType::Float64);
        assert_eq!(floats.values()[1], Scalar::Float64(2.0));
        assert!(floats.values()[2].is_missing());

        assert_eq!(
            col(&frame, "strings").values()[2],
            Scalar::Utf8("foo".to_owned())
        );

        let bools = col(&frame, "bools");
        assert_eq!(bools.dtype(), DType::Bool);
        assert_eq!(bools.values()[1], Scalar::Bool(false));
        assert_eq!(bools.values()[2], Scalar::Bool(true));

        assert!(col(&frame, "nulls").values().iter().all(Scalar::is_missing));

        let mixed = col(&frame, "mixed");
        assert_eq!(mixed.dtype(), DType::Utf8);
        assert_eq!(mixed.values()[0], Scalar::Utf8("1".to_owned()));
    }

    #[test]
    fn na_values_become_missing() {
        let options = CsvReadOptions {
            na_values: vec!["NA".to_owned(), "-".to_owned()],
            ..CsvReadOptions::default()
        };
        let frame = read_csv_str("a,b\n1,NA\n-,2\n3,4\n", &options).expect("read");
        let a = col(&frame, "a");
        assert_eq!(a.dtype(), DType::Int64);
        assert!(a.values()[1].is_missing());
        assert!(col(&frame, "b").values()[0].is_missing());
        assert_eq!(col(&frame, "b").values()[2], Scalar::Int64(4));
    }

    #[test]
    fn no_header_labels_columns_by_position() {
        let options = CsvReadOptions {
            has_header: false,
            ..CsvReadOptions::default()
        };
        let frame = read_csv_str("1,a\n2,b\n", &options).expect("read");
        assert_eq!(frame.shape(), (2, 2));
        assert_eq!(
            frame.column(&IndexLabel::Int64(1)).expect("col 1").values()[1],
            Scalar::Utf8("b".to_owned())
        );
    }

    #[test]
    fn skip_rows_and_custom_delimiter() {
        let options = CsvReadOptions {
            delimiter: b';',
            skip_rows: 1,
            ..CsvReadOptions::default()
        };
        let frame = read_csv_str("generated file\nk;v\nx;1\ny;2\n", &options).expect("read");
        assert_eq!(frame.shape(), (2, 2));
        assert_eq!(col(&frame, "v").values()[1], Scalar::Int64(2));
    }

    #[test]
    fn short_records_are_padded_and_long_records_rejected() {
        let frame = read("a,b,c\n1,2\n");
        assert!(col(&frame, "c").values()[0].is_missing());

        let err = read_csv_str("a,b\n1,2,3\n", &CsvReadOptions::default()).expect_err("ragged");
        assert!(matches!(
            err,
            IoError::RaggedRecord {
                expected: 2,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn index_cols_build_a_composite_index() {
        let options = CsvReadOptions {
            index_cols: vec![0, 1],
            ..CsvReadOptions::default()
        };
        let input = "state,year,pop\nOhio,2000,1.5\nOhio,2001,1.7\nNevada,2001,2.4\n";
        let frame = read_csv_str(input, &options).expect("read");

        assert_eq!(frame.num_columns(), 1);
        assert_eq!(frame.index().nlevels(), 2);
        assert_eq!(
            frame.index().names(),
            &[Some("state".to_owned()), Some("year".to_owned())]
        );
        let row = frame
            .loc_unique(&IndexLabel::from(vec![
                IndexLabel::from("Nevada"),
                IndexLabel::from(2001),
            ]))
            .expect("row");
        assert_eq!(col(&row, "pop").values()[0], Scalar::Float64(2.4));
    }

    #[test]
    fn index_col_out_of_range_is_rejected() {
        let options = CsvReadOptions {
            index_cols: vec![5],
            ..CsvReadOptions::default()
        };
        let err = read_csv_str("a,b\n1,2\n", &options).expect_err("out of range");
        assert!(matches!(
            err,
            IoError::IndexColumnOutOfRange { column: 5, ncols: 2 }
        ));
    }

    #[test]
    fn quoted_fields_keep_delimiters_and_newlines() {
        let input = "name,address\n\"Smith, John\",\"123 Main St\nApt 4\"\nJane,\"456 Oak, Suite 1\"\n";
        let frame = read(input);
        assert_eq!(frame.len(), 2);
        assert_eq!(
            col(&frame, "name").values()[0],
            Scalar::Utf8("Smith, John".to_owned())
        );
        match &col(&frame, "address").values()[0] {
            Scalar::Utf8(s) => assert!(s.contains('\n'), "should contain embedded newline"),
            other => panic!("expected Utf8, got {other:?}"),
        }
    }

    #[test]
    fn golden_output_with_index_and_na_rep() {
        let frame = read("a,b,c\n1,hello,3.25\n2,,true\n");
        let options = CsvWriteOptions {
            na_rep: "NA".to_owned(),
            ..CsvWriteOptions::default()
        };
        let output = write_csv_string(&frame, &options).expect("write");
        assert_eq!(output, "index,a,b,c\n0,1,hello,3.25\n1,2,NA,true\n");
    }

    #[test]
    fn composite_labels_are_written_per_level_and_joined_in_header() {
        let index = Index::from_tuples(vec![
            vec![IndexLabel::from("a"), IndexLabel::from(1)],
            vec![IndexLabel::from("b"), IndexLabel::from(2)],
        ])
        .expect("index")
        .with_names(vec![Some("key".to_owned()), None])
        .expect("names");
        let frame = DataFrame::from_columns(
            index,
            vec![(
                IndexLabel::from(vec![IndexLabel::from("x"), IndexLabel::from("lo")]),
                Column::from_values(vec![Scalar::Int64(7), Scalar::Int64(8)]).expect("col"),
            )],
        )
        .expect("frame");

        let output = write_csv_string(&frame, &CsvWriteOptions::default()).expect("write");
        assert_eq!(output, "key,level_1,x|lo\na,1,7\nb,2,8\n");

        let headerless = CsvWriteOptions {
            include_header: false,
            ..CsvWriteOptions::default()
        };
        let output = write_csv_string(&frame, &headerless).expect("write");
        assert_eq!(output, "a,1,7\nb,2,8\n");
    }

    #[test]
    fn unnamed_index_and_composite_labels_read_back_flattened() {
        let frame = DataFrame::from_columns(
            Index::range(2),
            vec![(
                IndexLabel::from(vec![IndexLabel::from("x"), IndexLabel::from("lo")]),
                Column::from_values(vec![Scalar::Int64(7), Scalar::Int64(8)]).expect("col"),
            )],
        )
        .expect("frame");
        assert_eq!(frame.index().name(), None);

        let output = write_csv_string(&frame, &CsvWriteOptions::default()).expect("write");
        let read_options = CsvReadOptions {
            index_cols: vec![0],
            ..CsvReadOptions::default()
        };
        let back = read_csv_str(&output, &read_options).expect("re-read");

        assert_eq!(back.index().name(), Some("index"));
        assert_eq!(back.index().labels(), frame.index().labels());
        assert_eq!(back.column_labels().labels(), &[IndexLabel::from("x|lo")]);
        assert_eq!(col(&back, "x|lo").values(), &[Scalar::Int64(7), Scalar::Int64(8)]);
    }

    #[test]
    fn round_trip_through_a_file_restores_values_and_labels() {
        let input = "key,name,score\nk1,Alice,95.5\nk2,Bob,\nk3,,100\n";
        let read_options = CsvReadOptions {
            index_cols: vec![0],
            na_values: vec!["NA".to_owned()],
            ..CsvReadOptions::default()
        };
        let frame = read_csv_str(input, &read_options).expect("read");

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("frame.csv");
        let write_options = CsvWriteOptions {
            na_rep: "NA".to_owned(),
            ..CsvWriteOptions::default()
        };
        write_csv_path(&frame, &path, &write_options).expect("write");
        let back = read_csv_path(&path, &read_options).expect("re-read");

        assert_eq!(back.index(), frame.index());
        assert_eq!(back.index().name(), Some("key"));
        assert_eq!(back.column_labels(), frame.column_labels());
        for (left, right) in frame.columns().iter().zip(back.columns()) {
            assert!(left.semantic_eq(right), "{left:?} != {right:?}");
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = read_csv_path(dir.path().join("absent.csv"), &CsvReadOptions::default())
            .expect_err("missing file");
        assert!(matches!(err, IoError::Io(_)));
    }

    #[test]
    fn unreadable_workbook_is_a_spreadsheet_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip archive").expect("write");
        let err = read_excel_sheet(&path, "Sheet1", &ExcelReadOptions::default())
            .expect_err("broken workbook");
        assert!(matches!(err, IoError::Spreadsheet(_)));
    }

    #[test]
    fn large_input_parses_every_row() {
        let row_count = 20_000;
        let mut csv = String::from("a,b,c\n");
        for i in 0..row_count {
            csv.push_str(&format!("{},{},{}\n", i, i * 2, i as f64 + 0.5));
        }
        let frame = read(&csv);
        assert_eq!(frame.shape(), (row_count, 3));
        assert_eq!(
            col(&frame, "b").values()[row_count - 1],
            Scalar::Int64(((row_count - 1) * 2) as i64)
        );
        assert_eq!(col(&frame, "c").dtype(), DType::Float64);
    }
}
