// Primitives for reading the tables of the session, from CSV or Excel files.

use std::io::Read;
use std::path::Path;

use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::committee::*;

/// A table of cells, all read as text.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h.trim() == name)
    }

    /// The cell of a row, empty when the row is too short.
    pub fn cell(row: &[String], idx: usize) -> &str {
        row.get(idx).map(|s| s.as_str()).unwrap_or("")
    }
}

/// Reads a table, as Excel for the .xlsx and .xlsm extensions and as CSV otherwise.
pub fn read_table(path: &str, worksheet: Option<&str>) -> VoteResult<Table> {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    let table = match extension.as_deref() {
        Some("xlsx") | Some("xlsm") => read_excel_table(path, worksheet)?,
        _ => {
            let file = std::fs::File::open(path).context(OpeningFileSnafu { path })?;
            parse_csv_table(file, path)?
        }
    };
    debug!(
        "read_table: {}: {} columns, {} rows",
        path,
        table.header.len(),
        table.rows.len()
    );
    Ok(table)
}

pub fn parse_csv_table<R: Read>(rdr: R, path: &str) -> VoteResult<Table> {
    // Form exports do not always pad the trailing empty cells.
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(rdr);
    let header: Vec<String> = rdr
        .headers()
        .context(CsvLineParseSnafu { path, lineno: 1usize })?
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record.context(CsvLineParseSnafu {
            path,
            lineno: idx + 2,
        })?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }
    Ok(Table { header, rows })
}

fn read_excel_table(path: &str, worksheet: Option<&str>) -> VoteResult<Table> {
    debug!("read_excel_table: path: {:?} worksheet: {:?}", path, worksheet);
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    let wrange = match worksheet {
        Some(sheet) => workbook
            .worksheet_range(sheet)
            .context(MissingWorksheetSnafu { path, sheet })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?,
    }
    .context(OpeningExcelSnafu { path })?;

    let mut iter = wrange.rows();
    let header: Vec<String> = iter
        .next()
        .context(EmptyExcelSnafu { path })?
        .iter()
        .map(read_cell)
        .collect();
    let rows = iter.map(|row| row.iter().map(read_cell).collect()).collect();
    Ok(Table { header, rows })
}

fn read_cell(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        DataType::Int(i) => i.to_string(),
        // Preferences are typed as numbers in spreadsheets.
        DataType::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        DataType::Float(f) => f.to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::Empty => String::new(),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_csv() {
        let content = "a,b,c\n1,2,3\n4,5\n";
        let table = parse_csv_table(content.as_bytes(), "test.csv").unwrap();
        assert_eq!(table.header, vec!["a", "b", "c"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(Table::cell(&table.rows[1], 2), "");
        assert_eq!(table.column_index("c"), Some(2));
        assert_eq!(table.column_index("d"), None);
    }

    #[test]
    fn quoted_cells() {
        let content = "\"President Candidates [Smith, Jo]\",x\n\"1;2\",y\n";
        let table = parse_csv_table(content.as_bytes(), "test.csv").unwrap();
        assert_eq!(table.header[0], "President Candidates [Smith, Jo]");
        assert_eq!(table.rows[0][0], "1;2");
    }

    #[test]
    fn cells_as_text() {
        assert_eq!(read_cell(&DataType::Float(2.0)), "2");
        assert_eq!(read_cell(&DataType::Float(2.5)), "2.5");
        assert_eq!(read_cell(&DataType::Int(3)), "3");
        assert_eq!(read_cell(&DataType::Empty), "");
        assert_eq!(read_cell(&DataType::String("abc12".to_string())), "abc12");
    }

    #[test]
    fn missing_file() {
        let res = read_table("/nonexistent/votes.csv", None);
        assert!(matches!(res, Err(VoteError::OpeningFile { .. })));
    }
}
