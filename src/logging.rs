//! Logging setup (ambient stack), grounded on
//! `PocketRelay-Server/src/utils/logging.rs`: a console appender plus a
//! rolling-free file appender, both through `log4rs`, with level parsed from
//! [`crate::config::Config`].

use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l})} [{T}] {t} - {m}{n}";

/// Initializes the global logger. Safe to call once at process startup; a
/// second call returns an error from `log4rs` that callers should treat as
/// non-fatal (tests may initialize more than once across modules).
pub fn setup(config: &crate::config::Config) {
    let level = config
        .log_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::Info);

    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    let mut builder =
        LogConfig::builder().appender(Appender::builder().build("console", Box::new(console)));
    let mut root = Root::builder().appender("console");

    if let Some(path) = &config.log_file {
        match FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build(path)
        {
            Ok(file) => {
                builder = builder.appender(Appender::builder().build("file", Box::new(file)));
                root = root.appender("file");
            }
            Err(error) => {
                eprintln!("failed to open log file {path}: {error}");
            }
        }
    }

    let log_config = match builder.build(root.build(level)) {
        Ok(log_config) => log_config,
        Err(error) => {
            eprintln!("invalid logging configuration: {error}");
            return;
        }
    };

    if log4rs::init_config(log_config).is_err() {
        eprintln!("logger already initialized");
    }

    log_panics::init();
}
