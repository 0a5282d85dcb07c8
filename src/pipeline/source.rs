use std::fs::File;

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info};

use crate::error::{EtlError, Result};
use crate::schema::{self, HeaderMap, SourceSchema};
use crate::types::RawSale;

/// Everything read from one source file, before any row-level checks.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub rows: Vec<RawSale>,
    /// Cells that held text a numeric column could not parse. Each one was
    /// replaced with a null rather than failing the run.
    pub malformed_cells: u64,
}

/// Reads sale records out of a headered CSV file.
pub struct CsvRecordSource {
    schema: SourceSchema,
}

impl CsvRecordSource {
    pub fn new() -> Self {
        Self {
            schema: schema::sale_schema(),
        }
    }

    /// Open the file and check its header against the declared schema
    /// without materializing any rows.
    pub fn probe(&self, path: &str) -> Result<()> {
        let file = self.open(path)?;
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);
        self.header_map(&mut reader)?;
        Ok(())
    }

    /// Read the whole file into memory. Header problems and unreadable files
    /// fail the run; a cell a numeric column cannot parse becomes a null and
    /// is counted in the batch.
    pub fn read(&self, path: &str) -> Result<SourceBatch> {
        let file = self.open(path)?;
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);
        let header = self.header_map(&mut reader)?;

        let mut rows = Vec::new();
        let mut malformed_cells = 0u64;
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            // Line 1 is the header, so the first data row is line 2.
            let line = index + 2;
            rows.push(self.parse_row(&record, &header, line, &mut malformed_cells));
        }

        info!(
            path = %path,
            rows = rows.len(),
            malformed_cells,
            "Read source file"
        );
        Ok(SourceBatch {
            rows,
            malformed_cells,
        })
    }

    fn open(&self, path: &str) -> Result<File> {
        File::open(path).map_err(|e| EtlError::SourceUnavailable {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    fn header_map(&self, reader: &mut csv::Reader<File>) -> Result<HeaderMap> {
        let headers = reader.headers()?.clone();
        let cells: Vec<&str> = headers.iter().collect();
        self.schema.validate_header(&cells)
    }

    fn parse_row(
        &self,
        record: &StringRecord,
        header: &HeaderMap,
        line: usize,
        malformed: &mut u64,
    ) -> RawSale {
        RawSale {
            town: self.text_cell(record, header, schema::COL_TOWN),
            property_type: self.text_cell(record, header, schema::COL_PROPERTY_TYPE),
            sale_amount: self.double_cell(record, header, schema::COL_SALE_AMOUNT, line, malformed),
            assessed_value: self.double_cell(
                record,
                header,
                schema::COL_ASSESSED_VALUE,
                line,
                malformed,
            ),
            sale_date: self.text_cell(record, header, schema::COL_SALE_DATE),
            year: self.integer_cell(record, header, schema::COL_YEAR, line, malformed),
        }
    }

    /// A missing position (short row) and an empty cell both read as null.
    fn cell<'r>(&self, record: &'r StringRecord, header: &HeaderMap, name: &str) -> Option<&'r str> {
        let cell = header.position(name).and_then(|index| record.get(index))?;
        if cell.is_empty() {
            None
        } else {
            Some(cell)
        }
    }

    fn text_cell(&self, record: &StringRecord, header: &HeaderMap, name: &str) -> Option<String> {
        self.cell(record, header, name).map(|s| s.to_string())
    }

    fn double_cell(
        &self,
        record: &StringRecord,
        header: &HeaderMap,
        name: &str,
        line: usize,
        malformed: &mut u64,
    ) -> Option<f64> {
        let cell = self.cell(record, header, name)?;
        match cell.trim().parse::<f64>() {
            Ok(value) => Some(value),
            Err(_) => {
                *malformed += 1;
                debug!(line, column = name, value = cell, "Unparseable number treated as null");
                None
            }
        }
    }

    fn integer_cell(
        &self,
        record: &StringRecord,
        header: &HeaderMap,
        name: &str,
        line: usize,
        malformed: &mut u64,
    ) -> Option<i32> {
        let cell = self.cell(record, header, name)?;
        match cell.trim().parse::<i32>() {
            Ok(value) => Some(value),
            Err(_) => {
                *malformed += 1;
                debug!(line, column = name, value = cell, "Unparseable integer treated as null");
                None
            }
        }
    }
}

impl Default for CsvRecordSource {
    fn default() -> Self {
        Self::new()
    }
}
