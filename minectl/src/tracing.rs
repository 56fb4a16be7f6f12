//! Provide tracing, tailored to this program.
//!
//! The binary calls [`init_stderr`] once at startup to install a tracing
//! subscriber. Logs go to stderr so that command output on stdout stays
//! clean enough to pipe.
//!
//! The rest of the crate can `use crate::tracing::prelude::*` for convenient
//! access to the `trace!()`, `debug!()`, `info!()`, `warn!()`, and `error!()`
//! macros.

use std::{fmt, io};
use time::OffsetDateTime;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{format::Writer, time::FormatTime},
    prelude::*,
};

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

/// Map a `-v` count to the default level filter.
///
/// Warnings are always shown; each `-v` opens up one more level.
pub fn level_for_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Initialize logging to stderr.
///
/// RUST_LOG, when set, overrides the default level derived from
/// `verbosity`.
pub fn init_stderr(verbosity: u8) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level_for_verbosity(verbosity).into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_timer(LocalTimer)
                .with_target(true),
        )
        .init();
}

// Format timestamps in local time to the nearest second. The default timer
// is UTC with a long, ugly format.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let now = OffsetDateTime::now_local().unwrap_or(OffsetDateTime::now_utc());
        let formatted = now
            .format(time::macros::format_description!("[hour]:[minute]:[second]"))
            .map_err(|_| fmt::Error)?;
        write!(w, "{}", formatted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, LevelFilter::WARN; "quiet")]
    #[test_case(1, LevelFilter::INFO; "verbose")]
    #[test_case(2, LevelFilter::DEBUG; "debug")]
    #[test_case(3, LevelFilter::TRACE; "trace")]
    #[test_case(9, LevelFilter::TRACE; "saturates")]
    fn verbosity_levels(verbosity: u8, expected: LevelFilter) {
        assert_eq!(level_for_verbosity(verbosity), expected);
    }
}
