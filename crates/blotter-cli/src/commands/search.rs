use anyhow::{Context, Result};
use blotter_browser::{ChromeFinder, PortalSessionFactory};
use blotter_core::export::{CsvExporter, ResultsFile};
use blotter_core::record::BookingRecord;
use blotter_core::report::RunReport;
use blotter_core::{
    Batch, Credentials, PortalConfig, ScrapeConfig, SearchResult, parse_name_lines,
};
use blotter_scraper::{CancelToken, Coordinator, SessionFactory, progress_channel};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything the search subcommand accepts. Flags override the defaults in
/// [`ScrapeConfig`]; unset flags leave them alone.
pub struct SearchOptions {
    pub names_file: PathBuf,
    pub results_file: Option<PathBuf>,
    pub csv_output: Option<PathBuf>,
    pub username: String,
    pub password: String,
    pub workers: Option<usize>,
    pub min_delay: Option<u64>,
    pub max_delay: Option<u64>,
    pub timeout: Option<u64>,
    pub window_days: Option<u64>,
    pub chrome_path: Option<PathBuf>,
    pub url: Option<String>,
    pub headful: bool,
}

pub fn execute(options: SearchOptions) -> Result<()> {
    let input = fs::read_to_string(&options.names_file).with_context(|| {
        format!("could not read names file {}", options.names_file.display())
    })?;
    let batch = parse_name_lines(&input)?;

    if batch.is_empty() {
        println!("No names to search in {}", options.names_file.display());
        return Ok(());
    }
    println!("📋 Loaded {} names", batch.len());

    let mut config = ScrapeConfig::default();
    if let Some(workers) = options.workers {
        config.max_workers = workers;
    }
    if let Some(min_delay) = options.min_delay {
        config.min_delay_secs = min_delay;
    }
    if let Some(max_delay) = options.max_delay {
        config.max_delay_secs = max_delay;
    }
    if let Some(timeout) = options.timeout {
        config.query_timeout_secs = timeout;
    }
    if let Some(window_days) = options.window_days {
        config.window_days = window_days;
    }

    let mut portal = PortalConfig::default();
    if let Some(portal_url) = options.url {
        url::Url::parse(&portal_url)
            .with_context(|| format!("invalid portal URL: {portal_url}"))?;
        portal.search_url = portal_url;
    }

    println!("🔍 Locating Chrome...");
    let chrome = ChromeFinder::new(options.chrome_path).find()?;
    println!("✅ Found Chrome at: {}", chrome.display());

    let credentials = Credentials::new(options.username, options.password);
    let factory = Arc::new(
        PortalSessionFactory::new(chrome, credentials, portal, &config)
            .with_headful(options.headful),
    );

    // Create tokio runtime for the scrape itself
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let results = runtime.block_on(run_batch(factory, batch, &config))?;

    let results_path = match options.results_file {
        Some(path) => path,
        None => default_results_path()?,
    };
    if let Some(parent) = results_path.parent() {
        fs::create_dir_all(parent)?;
    }
    ResultsFile::save(&results, &results_path)?;
    println!("💾 Results saved to {}", results_path.display());

    let records = flatten_records(&results);
    if let Some(csv_path) = &options.csv_output {
        CsvExporter::to_file(&records, csv_path)?;
        println!("📄 Exported {} records to {}", records.len(), csv_path.display());
    }

    print_summary(&results, &records);
    Ok(())
}

async fn run_batch(
    factory: Arc<dyn SessionFactory>,
    batch: Batch,
    config: &ScrapeConfig,
) -> Result<Vec<SearchResult>> {
    let coordinator = Coordinator::new(config);
    let cancel = CancelToken::new();
    let (sender, mut receiver) = progress_channel();

    // Ctrl+C cancels cooperatively: running searches finish, nothing new
    // starts
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!();
            println!("🛑 Cancelling: running searches will finish, no new ones start...");
            cancel_on_signal.cancel();
        }
    });

    let bar = ProgressBar::new(batch.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos}/{len} {msg}",
    )?);

    let bar_feed = bar.clone();
    let drain = tokio::spawn(async move {
        while let Some(update) = receiver.recv().await {
            bar_feed.set_message(format!("{} — {}", update.query, update.status.label()));
            bar_feed.inc(1);
        }
    });

    let results = coordinator.run(factory, batch, Some(sender), cancel).await?;
    let _ = drain.await;
    bar.finish_and_clear();

    Ok(results)
}

fn flatten_records(results: &[SearchResult]) -> Vec<BookingRecord> {
    results
        .iter()
        .flat_map(|result| result.records.iter().cloned())
        .collect()
}

fn default_results_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(home.join(".blotter").join("results.json"))
}

fn print_summary(results: &[SearchResult], records: &[BookingRecord]) {
    use blotter_core::SearchStatus;

    let found = results
        .iter()
        .filter(|r| r.status == SearchStatus::Success)
        .count();
    let no_match = results
        .iter()
        .filter(|r| r.status == SearchStatus::NoMatch)
        .count();
    let failed: Vec<&SearchResult> = results.iter().filter(|r| r.status.is_failed()).collect();

    println!();
    println!("{}", style("Search complete").bold());
    println!("  Found:    {}", style(found).green());
    println!("  No match: {}", no_match);
    println!("  Failed:   {}", style(failed.len()).red());

    for result in &failed {
        println!(
            "    {} — {}",
            result.query,
            style(result.status.label()).red()
        );
    }

    if !records.is_empty() {
        let report = RunReport::from_records(records);
        println!();
        println!("{}", style("Booking records").bold());
        println!("  Total:      {}", report.total_records);
        println!("  In custody: {}", report.in_custody);
        println!("  Released:   {}", report.released);
        if report.max_days_served > 0 {
            println!(
                "  Time served (days): avg {:.1}, min {}, max {}",
                report.avg_days_served, report.min_days_served, report.max_days_served
            );
        }
    }
}
