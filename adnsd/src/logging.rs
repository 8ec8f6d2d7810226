//! Logging setup: `tracing` events rendered by `tracing-subscriber`,
//! format controlled by the `RUST_LOG_FORMAT` environment variable
//! (`json`, `pretty`, `compact`, combined with `no-ansi`/`no-time`),
//! level controlled by the config file / `verbose` flag unless
//! `RUST_LOG` is set explicitly, destination controlled by
//! `log_file` (stderr if unset).

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io;
use std::env;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

pub fn begin_logging(settings: &Settings) -> io::Result<()> {
    let log_format: HashSet<String> = env::var("RUST_LOG_FORMAT")
        .map(|var| var.split(',').map(str::to_string).collect())
        .unwrap_or_default();

    let default_level = if settings.verbose {
        "debug"
    } else {
        settings.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let writer = match &settings.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(io::stderr),
    };

    let logger = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(!log_format.contains("no-ansi") && settings.log_file.is_none());

    if log_format.contains("json") {
        if log_format.contains("no-time") {
            logger.json().without_time().init();
        } else {
            logger.json().init();
        }
    } else if log_format.contains("pretty") {
        if log_format.contains("no-time") {
            logger.pretty().without_time().init();
        } else {
            logger.pretty().init();
        }
    } else if log_format.contains("compact") {
        if log_format.contains("no-time") {
            logger.compact().without_time().init();
        } else {
            logger.compact().init();
        }
    } else if log_format.contains("no-time") {
        logger.without_time().init();
    } else {
        logger.init();
    }

    Ok(())
}
