//! Log output setup
//!
//! Logs go to stderr so a worker process keeps stdout for its reply.
//! `RUST_LOG` selects the filter; `RENDER_GRADER_LOG_FORMAT=json` switches to
//! one JSON object per line.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "info";

/// Environment variable selecting the output format
pub const ENV_LOG_FORMAT: &str = "RENDER_GRADER_LOG_FORMAT";

/// Install the global subscriber. Later calls are ignored.
pub fn init() {
    let json = std::env::var(ENV_LOG_FORMAT).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    init_with(json);
}

fn init_with(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
