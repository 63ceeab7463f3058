//! Log output for the player binary
//!
//! Lines are short: seconds since startup, level, the emitting Spark crate
//! without its `spark_` prefix, then the message. Dependencies (ureq and its
//! TLS stack) are held at `warn` unless a filter says otherwise.

use log::Record;
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Used when neither the config nor `RUST_LOG` names a filter
pub const DEFAULT_FILTER: &str =
    "warn,spark_core=info,spark_runtime=info,spark_asset=info,spark_player=info";

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// `env_logger` filter from `PlayerConfig::log_filter`
    pub filter: Option<String>,
    /// The terminal is in raw mode, so lines need an explicit carriage return.
    pub raw_terminal: bool,
}

/// Config beats `RUST_LOG`, which beats [`DEFAULT_FILTER`]. Blank filters
/// count as unset.
pub fn resolve_filter<'a>(configured: Option<&'a str>, rust_log: Option<&'a str>) -> &'a str {
    [configured, rust_log]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|filter| !filter.is_empty())
        .unwrap_or(DEFAULT_FILTER)
}

/// `spark_runtime::host` -> `runtime`, anything else is left whole.
pub fn short_target(target: &str) -> &str {
    let krate = target.split("::").next().unwrap_or(target);
    krate.strip_prefix("spark_").unwrap_or(target)
}

fn write_line(
    out: &mut dyn Write,
    elapsed: Duration,
    record: &Record<'_>,
    line_end: &str,
) -> io::Result<()> {
    write!(
        out,
        "{:>8.3}s {:<5} {}: {}{line_end}",
        elapsed.as_secs_f64(),
        record.level(),
        short_target(record.target()),
        record.args()
    )
}

/// Install the global logger. Returns false if one was already installed,
/// in which case that logger stays in place.
pub fn init_logging(options: LogOptions) -> bool {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = resolve_filter(options.filter.as_deref(), rust_log.as_deref());
    let line_end = if options.raw_terminal { "\r\n" } else { "\n" };
    let started = Instant::now();

    let installed = env_logger::Builder::new()
        .parse_filters(filter)
        .format(move |buf, record| write_line(buf, started.elapsed(), record, line_end))
        .try_init()
        .is_ok();
    if installed {
        log::debug!("log filter: {filter}");
    }
    installed
}
