//! Log subscriber setup.
//!
//! Logs go to stderr so stdout only ever carries command results.

use tracing_subscriber::EnvFilter;

/// Default filter directive for the given flags.
///
/// `-q` shows errors only, no flag shows warnings, `-v` adds info and
/// `-vv` (or more) adds debug.
pub fn default_directive(quiet: bool, verbosity: u8) -> &'static str {
    if quiet {
        return "voxloop=error";
    }
    match verbosity {
        0 => "voxloop=warn",
        1 => "voxloop=info",
        _ => "voxloop=debug",
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the flags.
///
/// Calling this twice is harmless; the second call is ignored.
pub fn init(quiet: bool, verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(quiet, verbosity)));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity >= 2)
        .try_init();
    if let Err(e) = installed {
        tracing::debug!("Log subscriber already installed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_verbosity() {
        assert_eq!(default_directive(true, 2), "voxloop=error");
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(default_directive(false, 0), "voxloop=warn");
        assert_eq!(default_directive(false, 1), "voxloop=info");
        assert_eq!(default_directive(false, 5), "voxloop=debug");
    }

    #[test]
    fn init_twice_does_not_panic() {
        init(false, 0);
        init(true, 0);
    }
}
