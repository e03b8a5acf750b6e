// Decides what the terminal shows besides the report itself.

use s3audit_rs::config::Config;

/// Whether to show the live progress line.
///
/// Hidden in quiet mode, above Warn verbosity (log lines take over the
/// terminal) and with JSON logs.
pub fn is_progress_indicator_needed(config: &Config) -> bool {
    if config.show_no_progress {
        return false;
    }

    match &config.tracing_config {
        None => true,
        Some(tracing_config) => {
            tracing_config.tracing_level <= log::Level::Warn && !tracing_config.json_tracing
        }
    }
}

/// Whether to show the final statistics line.
pub fn is_show_result_needed(config: &Config) -> bool {
    if config.show_no_progress {
        return false;
    }

    config
        .tracing_config
        .as_ref()
        .is_none_or(|tracing_config| !tracing_config.json_tracing)
}
