use anyhow::Result;
use blotter_core::export::{CsvExporter, ResultsFile};
use blotter_core::filter::{RecordFilter, sort_records};
use blotter_core::record::BookingRecord;
use std::path::Path;

pub fn execute(
    file: &Path,
    output: &Path,
    status: Option<String>,
    contains: Option<String>,
    field: Option<String>,
    sort: Option<String>,
    descending: bool,
) -> Result<()> {
    tracing::info!("Exporting {} to {}", file.display(), output.display());

    let results = ResultsFile::load(file)?;
    let records: Vec<BookingRecord> = results
        .iter()
        .flat_map(|result| result.records.iter().cloned())
        .collect();

    let mut filter = RecordFilter::new();
    if let Some(status) = status {
        filter = filter.with_status(status);
    }
    if let Some(contains) = contains {
        filter = filter.with_text(contains);
    }
    if let Some(field) = field {
        filter = filter.with_field(field);
    }

    let mut filtered = filter.apply(&records);
    if filtered.is_empty() {
        anyhow::bail!("No records matched the filter criteria");
    }

    if let Some(sort_field) = sort {
        sort_records(&mut filtered, &sort_field, !descending);
    }

    CsvExporter::to_file(&filtered, output)?;
    println!(
        "✅ Exported {} of {} records to {}",
        filtered.len(),
        records.len(),
        output.display()
    );

    Ok(())
}
