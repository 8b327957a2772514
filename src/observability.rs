//! This module provides observability and diagnostics for the encoder's decisions.
//!
//! The encoder picks between several candidate layouts for almost every stream
//! (plain vs. delta vs. RLE, plain vs. dictionary strings, plain vs. Morton
//! vertices). `log_metric!` makes those choices visible as structured key/value
//! lines on the `log` facade. The macro body is wrapped in
//! `#[cfg(debug_assertions)]`, so release builds compile it out entirely.

use log::LevelFilter;
use std::fs::OpenOptions;
use std::sync::Once;

use crate::error::VtileError;

/// Logs a structured key-value metric line at debug level, only in debug builds.
///
/// # Example
/// ```
/// use vtile::log_metric;
/// let runs = 4;
/// log_metric!("event"="encode_int_stream", "technique"="rle", "runs"=&runs);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        #[cfg(debug_assertions)]
        {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            log::debug!("VTILE_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

static INIT_LOGGER: Once = Once::new();

/// Installs an `env_logger` backend at `Debug` level.
///
/// Output goes to stderr, or is appended to `log_file` when given. Only the
/// first call has an effect; later calls return `Ok(())`.
pub fn enable_verbose_logging(log_file: Option<&str>) -> Result<(), VtileError> {
    let target = match log_file {
        Some(path) => Some(OpenOptions::new().append(true).create(true).open(path)?),
        None => None,
    };

    INIT_LOGGER.call_once(move || {
        let mut builder = env_logger::Builder::new();
        builder.is_test(false);
        builder.filter_level(LevelFilter::Debug);

        // Just the level and the message.
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())
        });

        if let Some(file) = target {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        let _ = builder.try_init();
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_verbose_logging_is_idempotent() {
        assert!(enable_verbose_logging(None).is_ok());
        assert!(enable_verbose_logging(None).is_ok());
        log_metric!("event" = "test", "value" = 1);
    }
}
