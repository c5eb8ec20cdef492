use anyhow::Result;
use blotter_cli::OutputFormat;
use blotter_cli::commands;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "blotter")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Batch search a booking-records portal and export the results",
    long_about = "Blotter logs into a booking-records portal with an automated browser, \
                  searches a list of names under a bounded pool of concurrent sessions, \
                  and exports the scraped booking records to CSV and JSON."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the portal for every name in a file
    Search {
        /// File with one "Lastname, Firstname" per line
        #[arg(value_name = "NAMES_FILE")]
        names_file: PathBuf,

        /// Portal username
        #[arg(short, long, env = "BLOTTER_USERNAME")]
        username: String,

        /// Portal password
        #[arg(short, long, env = "BLOTTER_PASSWORD")]
        password: String,

        /// Where to save the run's results as JSON (default ~/.blotter/results.json)
        #[arg(long)]
        results: Option<PathBuf>,

        /// Also export scraped records to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Max concurrent portal sessions
        #[arg(short, long)]
        workers: Option<usize>,

        /// Minimum delay before each search, in seconds
        #[arg(long)]
        min_delay: Option<u64>,

        /// Maximum delay before each search, in seconds
        #[arg(long)]
        max_delay: Option<u64>,

        /// Per-query timeout, in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// How many days back the search window opens
        #[arg(long)]
        window_days: Option<u64>,

        /// Path to the Chrome binary
        #[arg(long)]
        chrome_path: Option<PathBuf>,

        /// Portal search URL
        #[arg(long)]
        url: Option<String>,

        /// Show the browser windows instead of running headless
        #[arg(long)]
        headful: bool,
    },

    /// Summarize a saved results file
    Stats {
        /// Path to a results JSON file
        #[arg(value_name = "RESULTS_FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },

    /// Export records from a saved results file to CSV
    Export {
        /// Path to a results JSON file
        #[arg(value_name = "RESULTS_FILE")]
        file: PathBuf,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,

        /// Keep only records with this custody status (e.g. "Released")
        #[arg(long)]
        status: Option<String>,

        /// Keep only records containing this text
        #[arg(long)]
        contains: Option<String>,

        /// Restrict the text match to one field
        #[arg(long, requires = "contains")]
        field: Option<String>,

        /// Sort by this field
        #[arg(long)]
        sort: Option<String>,

        /// Sort descending instead of ascending
        #[arg(long, requires = "sort")]
        desc: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Execute the command
    match cli.command {
        Commands::Search {
            names_file,
            username,
            password,
            results,
            output,
            workers,
            min_delay,
            max_delay,
            timeout,
            window_days,
            chrome_path,
            url,
            headful,
        } => commands::search::execute(commands::search::SearchOptions {
            names_file,
            results_file: results,
            csv_output: output,
            username,
            password,
            workers,
            min_delay,
            max_delay,
            timeout,
            window_days,
            chrome_path,
            url,
            headful,
        }),
        Commands::Stats { file, format } => commands::stats::execute(&file, format),
        Commands::Export {
            file,
            output,
            status,
            contains,
            field,
            sort,
            desc,
        } => commands::export::execute(&file, &output, status, contains, field, sort, desc),
        Commands::Completion { shell } => {
            commands::completion::execute(shell, &mut Cli::command())
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new(
            "blotter=debug,blotter_cli=debug,blotter_core=debug,blotter_scraper=debug,blotter_browser=debug",
        )
    } else {
        EnvFilter::new("blotter=info,blotter_cli=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}
