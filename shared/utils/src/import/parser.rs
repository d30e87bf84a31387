//! Source File Parser
//!
//! Multi-format reader for parts lists: delimited text, spreadsheets and
//! plain text tables. Every format needs a header row.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use bomwright_models::ImportCandidate;

use super::mapper::{collect_raw, map_raw, ColumnMapping, PartField};
use super::validator::CandidateValidator;
use crate::error::{BomwrightError, BomwrightResult};

/// Supported source formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// CSV and similar delimited text
    Delimited,
    /// XLSX or XLS workbook, first sheet
    Spreadsheet,
    /// Columns separated by a tab or two or more spaces
    PlainText,
}

impl SourceFormat {
    /// Detect format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" | "tsv" => Some(Self::Delimited),
            "xlsx" | "xls" => Some(Self::Spreadsheet),
            "txt" => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Detect format from content type header
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            "text/csv" | "application/csv" | "text/tab-separated-values" => Some(Self::Delimited),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Some(Self::Spreadsheet),
            "application/vnd.ms-excel" => Some(Self::Spreadsheet),
            "text/plain" => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Parse an explicit format hint such as `csv`, `spreadsheet` or `text`.
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint.trim().to_lowercase().as_str() {
            "csv" | "tsv" | "delimited" => Some(Self::Delimited),
            "xlsx" | "xls" | "excel" | "spreadsheet" => Some(Self::Spreadsheet),
            "txt" | "text" | "plain" | "plain_text" => Some(Self::PlainText),
            _ => None,
        }
    }
}

/// One data row of a source table.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    /// 1-based row or line number; the header is row 1 for most sources.
    pub row_number: usize,
    pub cells: Vec<String>,
}

/// Header plus data rows read from a source, before mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTable {
    pub format: SourceFormat,
    pub headers: Vec<String>,
    pub rows: Vec<SourceRow>,
    /// Rows the reader could not decode, with the reason.
    pub unreadable: Vec<(usize, String)>,
}

/// Main candidate parser
#[derive(Debug, Clone)]
pub struct CandidateParser {
    mapping: ColumnMapping,
    delimiter: u8,
    validator: CandidateValidator,
}

impl Default for CandidateParser {
    fn default() -> Self {
        Self {
            mapping: ColumnMapping::new(),
            delimiter: b',',
            validator: CandidateValidator::new(),
        }
    }
}

impl CandidateParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field delimiter for delimited text. Non-ASCII delimiters are ignored.
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        if delimiter.is_ascii() {
            self.delimiter = delimiter as u8;
        }
        self
    }

    /// Maps `field` to the column titled `header`, ahead of name matching.
    pub fn with_column(mut self, field: PartField, header: impl Into<String>) -> Self {
        self.mapping.pin(field, header);
        self
    }

    /// Parses a source into validated candidates.
    ///
    /// The same bytes and format always give the same candidates. Fails with
    /// a parse error when the source cannot be read at all or has no header.
    pub fn parse(&self, data: &[u8], format: SourceFormat) -> BomwrightResult<Vec<ImportCandidate>> {
        let table = self.read_table(data, format)?;
        let columns = self.mapping.resolve(&table.headers);

        tracing::debug!(
            format = ?format,
            headers = table.headers.len(),
            mapped_columns = columns.len(),
            rows = table.rows.len(),
            "Source table read"
        );

        let mut entries: Vec<(usize, ImportCandidate)> = Vec::with_capacity(table.rows.len());

        for row in &table.rows {
            let raw = collect_raw(&row.cells, &columns);
            let mapped = map_raw(&raw);
            let status = self.validator.status(&mapped);
            entries.push((
                row.row_number,
                ImportCandidate {
                    index: 0,
                    source_row: row.row_number,
                    fields: mapped.fields,
                    raw,
                    validation_status: status,
                    override_warning: false,
                },
            ));
        }

        for (row_number, reason) in &table.unreadable {
            let mapped = map_raw(&Default::default());
            entries.push((
                *row_number,
                ImportCandidate {
                    index: 0,
                    source_row: *row_number,
                    fields: mapped.fields,
                    raw: Default::default(),
                    validation_status: bomwright_models::ValidationStatus::Error(format!(
                        "unreadable row: {}",
                        reason
                    )),
                    override_warning: false,
                },
            ));
        }

        entries.sort_by_key(|(row_number, _)| *row_number);

        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(index, (_, mut candidate))| {
                candidate.index = index;
                candidate
            })
            .collect())
    }

    /// Reads the header and data rows of a source without mapping them.
    pub fn read_table(&self, data: &[u8], format: SourceFormat) -> BomwrightResult<SourceTable> {
        let table = match format {
            SourceFormat::Delimited => self.read_delimited(data)?,
            SourceFormat::Spreadsheet => self.read_spreadsheet(data)?,
            SourceFormat::PlainText => self.read_plain_text(data)?,
        };

        if table.headers.iter().all(|h| h.trim().is_empty()) {
            return Err(BomwrightError::parse("source has no header row"));
        }

        Ok(table)
    }

    /// Parse delimited text
    fn read_delimited(&self, data: &[u8]) -> BomwrightResult<SourceTable> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(data);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| BomwrightError::parse(format!("Failed to read CSV headers: {}", e)))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        let mut unreadable = Vec::new();

        for (idx, result) in reader.records().enumerate() {
            match result {
                Ok(record) => {
                    let row_number = record
                        .position()
                        .map(|p| p.line() as usize)
                        .unwrap_or(idx + 2);
                    let cells: Vec<String> = record.iter().map(str::to_string).collect();
                    if cells.iter().any(|c| !c.trim().is_empty()) {
                        rows.push(SourceRow { row_number, cells });
                    }
                }
                Err(e) => {
                    let row_number = e
                        .position()
                        .map(|p| p.line() as usize)
                        .unwrap_or(idx + 2);
                    unreadable.push((row_number, e.to_string()));
                }
            }
        }

        Ok(SourceTable {
            format: SourceFormat::Delimited,
            headers,
            rows,
            unreadable,
        })
    }

    /// Parse the first worksheet of an XLSX or XLS workbook
    fn read_spreadsheet(&self, data: &[u8]) -> BomwrightResult<SourceTable> {
        use calamine::{open_workbook_auto_from_rs, DataType, Reader};

        let cursor = std::io::Cursor::new(data);
        let mut workbook = open_workbook_auto_from_rs(cursor)
            .map_err(|e| BomwrightError::parse(format!("Failed to open workbook: {}", e)))?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| BomwrightError::parse("No sheets found in workbook"))?;

        let range = workbook
            .worksheet_range(&sheet_name)
            .ok_or_else(|| BomwrightError::parse(format!("Worksheet '{}' is missing", sheet_name)))?
            .map_err(|e| BomwrightError::parse(format!("Failed to read worksheet: {}", e)))?;

        // Row numbers follow the sheet, even when the used range starts lower.
        let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
        let mut rows_iter = range.rows();

        let headers: Vec<String> = rows_iter
            .next()
            .ok_or_else(|| BomwrightError::parse("Empty worksheet"))?
            .iter()
            .map(|cell: &DataType| cell.to_string().trim().to_string())
            .collect();

        let rows = rows_iter
            .enumerate()
            .map(|(idx, row)| SourceRow {
                row_number: first_row + idx + 2,
                cells: row.iter().map(|cell: &DataType| cell.to_string()).collect(),
            })
            .filter(|row| row.cells.iter().any(|c| !c.trim().is_empty()))
            .collect();

        Ok(SourceTable {
            format: SourceFormat::Spreadsheet,
            headers,
            rows,
            unreadable: Vec::new(),
        })
    }

    /// Parse a plain text table: the first non-empty line is the header.
    fn read_plain_text(&self, data: &[u8]) -> BomwrightResult<SourceTable> {
        let text = std::str::from_utf8(data)
            .map_err(|e| BomwrightError::parse(format!("Text source is not valid UTF-8: {}", e)))?;
        let text = text.trim_start_matches('\u{feff}');

        let mut lines = text
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        let headers = match lines.next() {
            Some((_, line)) => split_plain_line(line),
            None => Vec::new(),
        };

        let rows = lines
            .map(|(row_number, line)| SourceRow {
                row_number,
                cells: split_plain_line(line),
            })
            .collect();

        Ok(SourceTable {
            format: SourceFormat::PlainText,
            headers,
            rows,
            unreadable: Vec::new(),
        })
    }
}

fn plain_separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"\t+|\s{2,}").expect("separator pattern is valid"))
}

fn split_plain_line(line: &str) -> Vec<String> {
    plain_separator()
        .split(line)
        .map(|cell| cell.trim().to_string())
        .collect()
}
