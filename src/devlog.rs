// src/devlog.rs
//! Dev-only diagnostics. Raw titles never reach the log: records are identified
//! by a short SHA-256 prefix.

use tracing::info;

pub const ENV_DEV_LOG: &str = "DIGEST_DEV_LOG";

/// True when running in a dev environment: debug build, or SHUTTLE_ENV in
/// {local, development, dev}.
pub(crate) fn is_dev_env() -> bool {
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("SHUTTLE_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

// Dev logging gate: DIGEST_DEV_LOG=1 AND dev env
pub(crate) fn dev_logging_enabled() -> bool {
    let on = std::env::var(ENV_DEV_LOG).ok().as_deref() == Some("1");
    on && is_dev_env()
}

pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Per-record selection event (admitted / rejected with a reason). Callers
/// check [`dev_logging_enabled`] first.
pub(crate) fn dev_log_admission(event: &str, title: &str, category: &str, score: u8, why: &str) {
    let id = anon_hash(title);
    info!(target: "selector", %id, event, category, score, why);
}
