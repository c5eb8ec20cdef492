use crate::OutputFormat;
use anyhow::Result;
use blotter_core::SearchStatus;
use blotter_core::export::ResultsFile;
use blotter_core::record::BookingRecord;
use blotter_core::report::RunReport;
use console::style;
use std::path::Path;

/// Load a results file and compute its report.
pub fn load_report(file: &Path) -> Result<RunReport> {
    let results = ResultsFile::load(file)?;
    let records: Vec<BookingRecord> = results
        .iter()
        .flat_map(|result| result.records.iter().cloned())
        .collect();
    Ok(RunReport::from_records(&records))
}

pub fn execute(file: &Path, format: OutputFormat) -> Result<()> {
    tracing::info!("Computing statistics for {}", file.display());

    let results = ResultsFile::load(file)?;
    let records: Vec<BookingRecord> = results
        .iter()
        .flat_map(|result| result.records.iter().cloned())
        .collect();
    let report = RunReport::from_records(&records);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Pretty => {
            let found = results
                .iter()
                .filter(|r| r.status == SearchStatus::Success)
                .count();
            let failed = results.iter().filter(|r| r.status.is_failed()).count();

            println!("{}", style("Run summary").bold());
            println!("  Queries:       {}", results.len());
            println!("  With results:  {}", found);
            println!("  Failed:        {}", failed);
            println!();
            println!("{}", style("Booking records").bold());
            println!("  Total:         {}", report.total_records);
            println!("  Unique names:  {}", report.unique_names);
            println!("  In custody:    {}", report.in_custody);
            println!("  Released:      {}", report.released);
            println!(
                "  Time served:   avg {:.1} / min {} / max {} days",
                report.avg_days_served, report.min_days_served, report.max_days_served
            );
        }
    }

    Ok(())
}
