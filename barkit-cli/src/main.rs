//! barkit CLI: fetch, validate and transform OHLCV datasets.
//!
//! Commands:
//! - `fetch`: pull bars from a provider into CSV or Parquet
//! - `validate`: report every issue in a CSV or Parquet table
//! - `fill`: fill gaps per symbol
//! - `split`: apply a split adjustment
//! - `convert-tz`: re-express timestamps in another zone
//! - `run`: execute a TOML pipeline config
//!
//! Output goes to `--output` (`.csv` or `.parquet`) or to stdout as CSV.

use anyhow::{bail, Context, Result};
use barkit_core::config::PipelineConfig;
use barkit_core::data::alphavantage::DEFAULT_KEY_ENV;
use barkit_core::data::{
    fetch_dataset, read_parquet, write_csv, write_csv_path, write_parquet, AlphaVantageProvider,
    CsvOptions, CsvProvider, CsvReader, DataProvider, FetchRequest, ParquetProvider,
    YahooProvider,
};
use barkit_core::domain::{parse_timezone, Dataset, Field, Frequency, Metadata};
use barkit_core::transform::{adjust_for_split, convert_timezone, fill, FillMethod};
use barkit_core::validate::Validator;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "barkit", about = "barkit: OHLCV data fetching, validation and cleanup")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    Yahoo,
    AlphaVantage,
    Csv,
    Parquet,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch bars for one or more symbols.
    Fetch {
        /// Symbols to fetch (e.g., SPY QQQ AAPL).
        #[arg(required = true)]
        symbols: Vec<String>,

        #[arg(long, value_enum, default_value = "yahoo")]
        source: Source,

        /// File to read for the csv and parquet sources.
        #[arg(long)]
        path: Option<PathBuf>,

        /// Alpha Vantage API key. Defaults to $ALPHAVANTAGE_API_KEY.
        #[arg(long)]
        api_key: Option<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: NaiveDate,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<NaiveDate>,

        /// daily, weekly, monthly, or an intraday interval such as 5m.
        #[arg(long, default_value = "daily")]
        frequency: Frequency,

        /// IANA zone for the resulting timestamps.
        #[arg(long, default_value = "UTC")]
        timezone: String,

        #[arg(long, default_value = "equity")]
        asset_class: String,

        /// Warn about validation issues instead of failing.
        #[arg(long, default_value_t = false)]
        lenient: bool,

        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a CSV or Parquet table and list every issue found.
    Validate {
        input: PathBuf,

        /// Exit successfully even when issues are found.
        #[arg(long, default_value_t = false)]
        lenient: bool,
    },
    /// Fill missing values per symbol.
    Fill {
        input: PathBuf,

        /// forward, backward, linear or spline.
        #[arg(long, default_value = "forward")]
        method: String,

        /// Columns to fill (default: all numeric columns).
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        #[command(flatten)]
        io: DatasetIo,
    },
    /// Rescale bars before a split date.
    Split {
        input: PathBuf,

        /// New shares per old share (2 for a 2-for-1 split).
        #[arg(long)]
        ratio: f64,

        /// First trading date at post-split prices (YYYY-MM-DD).
        #[arg(long)]
        date: NaiveDate,

        #[command(flatten)]
        io: DatasetIo,
    },
    /// Re-express timestamps in another IANA zone.
    ConvertTz {
        input: PathBuf,

        /// Target zone, e.g. America/New_York.
        #[arg(long)]
        to: String,

        #[command(flatten)]
        io: DatasetIo,
    },
    /// Execute a pipeline from a TOML config file.
    Run {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Options shared by commands that read and write a dataset.
#[derive(clap::Args)]
struct DatasetIo {
    /// Zone the input's timestamps are expressed in.
    #[arg(long, default_value = "UTC")]
    timezone: String,

    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Fetch {
            symbols,
            source,
            path,
            api_key,
            start,
            end,
            frequency,
            timezone,
            asset_class,
            lenient,
            output,
        } => {
            let provider = build_provider(source, path, api_key)?;
            let end = end.unwrap_or_else(|| chrono::Local::now().date_naive());
            let request = FetchRequest::new(symbols, start, end).with_frequency(frequency);
            let meta = Metadata::default()
                .with_timezone(parse_timezone(&timezone)?)
                .with_asset_class(asset_class);
            let dataset = fetch_dataset(provider.as_ref(), &request, meta, !lenient)?;
            write_output(&dataset, output.as_deref())
        }
        Commands::Validate { input, lenient } => run_validate(&input, lenient),
        Commands::Fill {
            input,
            method,
            columns,
            io,
        } => {
            let method: FillMethod = method.parse()?;
            let columns = columns
                .iter()
                .map(|c| c.parse::<Field>())
                .collect::<Result<Vec<_>, _>>()?;
            let dataset = load_dataset(&input, &io.timezone)?;
            let columns = (!columns.is_empty()).then_some(columns.as_slice());
            let dataset = fill(dataset, method, columns)?;
            write_output(&dataset, io.output.as_deref())
        }
        Commands::Split {
            input,
            ratio,
            date,
            io,
        } => {
            let dataset = load_dataset(&input, &io.timezone)?;
            let dataset = adjust_for_split(dataset, ratio, date)?;
            write_output(&dataset, io.output.as_deref())
        }
        Commands::ConvertTz { input, to, io } => {
            let dataset = load_dataset(&input, &io.timezone)?;
            let dataset = convert_timezone(dataset, &to)?;
            write_output(&dataset, io.output.as_deref())
        }
        Commands::Run { config, output } => {
            let config = PipelineConfig::from_file(&config)
                .with_context(|| format!("loading config {}", config.display()))?;
            let pipeline = config.pipeline()?;
            let provider = config.provider()?;
            let dataset = pipeline.run(provider.as_ref(), &config.request())?;
            write_output(&dataset, output.as_deref())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "barkit=debug" } else { "barkit=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_provider(
    source: Source,
    path: Option<PathBuf>,
    api_key: Option<String>,
) -> Result<Box<dyn DataProvider>> {
    let provider: Box<dyn DataProvider> = match source {
        Source::Yahoo => Box::new(YahooProvider::new()?),
        Source::AlphaVantage => match api_key {
            Some(key) => Box::new(AlphaVantageProvider::new(key)?),
            None => Box::new(AlphaVantageProvider::from_env(DEFAULT_KEY_ENV)?),
        },
        Source::Csv => {
            let Some(path) = path else {
                bail!("--path is required with --source csv");
            };
            Box::new(CsvProvider::new(path, CsvOptions::default()))
        }
        Source::Parquet => {
            let Some(path) = path else {
                bail!("--path is required with --source parquet");
            };
            Box::new(ParquetProvider::new(path))
        }
    };
    Ok(provider)
}

fn is_parquet(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"))
}

fn read_table(input: &Path) -> Result<DataFrame> {
    let df = if is_parquet(input) {
        read_parquet(input)?
    } else {
        CsvReader::default().read_path(input)?
    };
    Ok(df)
}

fn load_dataset(input: &Path, timezone: &str) -> Result<Dataset> {
    let df = read_table(input).with_context(|| format!("reading {}", input.display()))?;
    let df = Validator::validate_frame(df, false)?;
    let meta =
        Metadata::new(input.display().to_string()).with_timezone(parse_timezone(timezone)?);
    Ok(Dataset::from_frame(&df, meta)?)
}

fn run_validate(input: &Path, lenient: bool) -> Result<()> {
    let df = read_table(input).with_context(|| format!("reading {}", input.display()))?;
    let report = Validator::inspect_frame(&df)?;

    println!("{}: {} rows, {} columns", input.display(), df.height(), df.width());
    if report.is_clean() {
        println!("No issues found.");
        return Ok(());
    }
    for issue in &report.issues {
        println!("  - {issue}");
    }
    if !lenient {
        bail!("{} validation issue(s) in {}", report.issues.len(), input.display());
    }
    Ok(())
}

fn write_output(dataset: &Dataset, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) if is_parquet(path) => write_parquet(dataset, path)?,
        Some(path) => write_csv_path(dataset, path)?,
        None => write_csv(dataset, std::io::stdout().lock())?,
    }
    if let Some(path) = output {
        tracing::info!(rows = dataset.len(), path = %path.display(), "wrote dataset");
    }
    Ok(())
}
