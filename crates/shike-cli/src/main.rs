//! Command-line front end: parse a Chinese temporal expression and print the result as JSON.

use anyhow::{Context, Result};
use chrono_tz::Tz;
use clap::Parser;
use shike_engine::{Kind, ParseOptions, ResultFormat, TimeBaseInput, TimeParser};
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Parse a Chinese temporal expression into normalized date-times
#[derive(Parser, Debug)]
#[command(name = "shike")]
#[command(version, about, long_about = None)]
struct Cli {
    /// The expression, e.g. "去年中秋节前后"
    text: String,

    /// Time base: unix seconds, "YYYY-MM-DD HH:MM:SS", or JSON
    /// (an object of fields or an array of up to six integers).
    /// Defaults to the current time in --tz.
    #[arg(short, long)]
    base: Option<String>,

    /// Force the expression kind (point, span, delta, period)
    #[arg(long, value_parser = parse_kind)]
    hint: Option<Kind>,

    /// Move base-dependent expressions that fall in the past forward
    #[arg(short, long)]
    future: bool,

    /// Print boundaries as unix seconds instead of date-time strings
    #[arg(long)]
    epoch: bool,

    /// Number of occurrences to compute for a recurrence
    #[arg(short = 'n', long)]
    count: Option<usize>,

    /// Report lunar dates as raw lunar fields
    #[arg(long)]
    raw_lunar: bool,

    /// IANA timezone for epoch bases and epoch output
    #[arg(long, default_value = "Asia/Shanghai", value_parser = parse_tz)]
    tz: Tz,
}

fn parse_kind(s: &str) -> Result<Kind, String> {
    s.parse::<Kind>().map_err(|e| e.to_string())
}

fn parse_tz(s: &str) -> Result<Tz, String> {
    s.parse::<Tz>()
        .map_err(|_| format!("unknown timezone '{s}'"))
}

/// JSON shapes first, the fixed text format otherwise.
fn parse_base(raw: &str) -> Result<TimeBaseInput> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => TimeBaseInput::from_json(&value)
            .with_context(|| format!("unusable time base '{raw}'")),
        Err(_) => Ok(TimeBaseInput::Text(raw.to_string())),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let base = match cli.base.as_deref() {
        Some(raw) => parse_base(raw)?,
        None => TimeBaseInput::now(cli.tz),
    };
    let options = ParseOptions {
        type_hint: cli.hint,
        future_leaning: cli.future,
        result_format: if cli.epoch {
            ResultFormat::Epoch
        } else {
            ResultFormat::String
        },
        occurrence_count: cli.count,
        resolve_lunar: !cli.raw_lunar,
        timezone: cli.tz,
    };
    debug!(?base, ?options, "cli request");

    let result = TimeParser::new()
        .parse(&cli.text, &base, &options)
        .with_context(|| format!("cannot parse '{}'", cli.text))?;
    let json = serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
    println!("{json}");
    Ok(())
}
