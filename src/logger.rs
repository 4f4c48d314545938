//! Tracing setup shared by the command-line tools.
//!
//! Records go to stderr as `<time> <LEVEL> <target>: <message>`. What each level shows:
//! - `INFO`: files loaded, configuration, per-emitter overlay progress, final cost
//! - `DEBUG`: objective construction and one cost line per evaluation
//! - `TRACE`: every sample that falls off a detector image
//!
//! `RUST_LOG` always wins over the level chosen in code, so a single module can be
//! opened up without flooding the rest:
//! ```bash
//! RUST_LOG=tomo_register::registration=trace evaluate_pose geo.txt points.csv vessOverlay_*.png
//! ```

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::SystemTime;

/// Install the subscriber at `INFO`.
///
/// # Example
/// ```no_run
/// use tomo_register::init_logger;
///
/// init_logger();
/// tracing::info!("Registration started");
/// ```
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Install the subscriber with `default_level` for targets `RUST_LOG` does not mention.
///
/// Only the first call in a process installs anything; later calls are ignored.
///
/// # Example
/// ```no_run
/// use tomo_register::init_logger_with_level;
/// use tracing::Level;
///
/// init_logger_with_level(Level::DEBUG);
/// tracing::debug!("Per-evaluation costs will be logged");
/// ```
pub fn init_logger_with_level(default_level: Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    // A second install fails when a test binary or bench has already set one
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(SystemTime)
        .with_target(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
}

/// Default level for a `-v` count: none is `INFO`, one is `DEBUG`, more is `TRACE`.
pub fn level_for_verbosity(verbose: u8) -> Level {
    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the subscriber at the level a `-v` count asks for.
pub fn init_logger_for_verbosity(verbose: u8) {
    init_logger_with_level(level_for_verbosity(verbose))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for_verbosity(0), Level::INFO);
        assert_eq!(level_for_verbosity(1), Level::DEBUG);
        assert_eq!(level_for_verbosity(2), Level::TRACE);
        assert_eq!(level_for_verbosity(7), Level::TRACE);
    }

    #[test]
    fn test_repeated_install_is_harmless() {
        init_logger_for_verbosity(1);
        init_logger();
        tracing::debug!("logger installed twice");
    }
}
