//! Diagnostics: logging bootstrap plus the message helpers used by every
//! fallible path in the crate.
//!
//! Engine code never prints. Tolerated anomalies go through [`warn`], fatal
//! ones carry a hint line via [`with_hint`] and are returned.

use tracing_subscriber::EnvFilter;

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "GSN_LOG";

const DEFAULT_FILTER: &str = "warn";
const VERBOSE_FILTER: &str = "gsn_engine=debug,warn";

/// Install the stderr subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Append a user-facing hint on its own line.
pub fn with_hint(msg: impl Into<String>, hint: &str) -> String {
    let msg = msg.into();
    if hint.trim().is_empty() {
        msg
    } else {
        format!("{}\nHint: {}", msg, hint.trim())
    }
}

/// Report a tolerated anomaly.
pub fn warn(msg: impl AsRef<str>) {
    tracing::warn!("{}", msg.as_ref());
}

/// Shorten free text for log lines and change messages.
pub fn truncate(text: &str, max_chars: usize) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut out: String = flat.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
