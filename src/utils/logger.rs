use colored::*;
use env_logger::{Builder, Env};
use std::io::Write;

/// Initializes the logger with coloured `LEVEL [target] message` lines.
///
/// `RUST_LOG` takes precedence over `default_level`.
pub fn init(default_level: &str) {
    Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            let level = match record.level() {
                log::Level::Error => "ERROR".red(),
                log::Level::Warn => "WARN".yellow(),
                log::Level::Info => "INFO".green(),
                log::Level::Debug => "DEBUG".blue(),
                log::Level::Trace => "TRACE".purple(),
            };

            writeln!(
                buf,
                "{:>5} [{}] {}",
                level,
                record.target().blue(),
                record.args()
            )
        })
        .init();
}

/// Default filter for the `-v` count and `--quiet` flag
pub fn level_for(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}
