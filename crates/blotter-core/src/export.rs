use crate::Result;
use crate::record::BookingRecord;
use crate::result::SearchResult;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Persists a run's ordered results as JSON so `stats` and `export` can work
/// from a finished run without re-scraping.
pub struct ResultsFile;

impl ResultsFile {
    /// Write results to a file.
    pub fn save(results: &[SearchResult], path: &Path) -> Result<()> {
        tracing::debug!("Writing results file to: {}", path.display());

        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, results)?;

        tracing::info!(
            "Successfully wrote {} results to {}",
            results.len(),
            path.display()
        );

        Ok(())
    }

    /// Read results back from a file.
    pub fn load(path: &Path) -> Result<Vec<SearchResult>> {
        tracing::debug!("Reading results file from: {}", path.display());

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let results = serde_json::from_reader(reader)?;

        Ok(results)
    }
}

/// Writes booking records as CSV: one column per field name seen anywhere in
/// the record set, in sorted order. The raw entry text never exports.
pub struct CsvExporter;

impl CsvExporter {
    /// Write records to a CSV file.
    pub fn to_file(records: &[BookingRecord], path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let writer = csv::Writer::from_writer(BufWriter::new(file));
        Self::write(records, writer)?;

        tracing::info!(
            "Exported {} records to CSV: {}",
            records.len(),
            path.display()
        );

        Ok(())
    }

    /// Render records as a CSV string.
    pub fn to_string(records: &[BookingRecord]) -> Result<String> {
        let mut buffer = Vec::new();
        Self::write(records, csv::Writer::from_writer(&mut buffer))?;
        String::from_utf8(buffer).map_err(|e| crate::Error::Export(e.to_string()))
    }

    fn write<W: std::io::Write>(
        records: &[BookingRecord],
        mut writer: csv::Writer<W>,
    ) -> Result<()> {
        let columns = Self::columns(records);
        if columns.is_empty() {
            writer.flush()?;
            return Ok(());
        }
        writer.write_record(&columns)?;

        for record in records {
            let row: Vec<&str> = columns
                .iter()
                .map(|column| record.get(column).unwrap_or(""))
                .collect();
            writer.write_record(&row)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Sorted union of field names across the record set.
    fn columns(records: &[BookingRecord]) -> Vec<String> {
        let mut columns: Vec<String> = records
            .iter()
            .flat_map(|record| record.field_names())
            .map(String::from)
            .collect();
        columns.sort();
        columns.dedup();
        columns
    }
}
