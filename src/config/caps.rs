// src/config/caps.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::record::Category;

pub const ENV_SELECT_CONFIG_PATH: &str = "SELECT_CONFIG_PATH";
pub const ENV_CAP_TOTAL: &str = "SELECT_CAP_TOTAL";
pub const ENV_CAP_PER_DAY: &str = "SELECT_CAP_PER_DAY";
pub const ENV_YIELDS_CAP: &str = "SELECT_YIELDS_CAP";

/// Selector caps and quotas. Stable for the duration of one selection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapConfig {
    /// Overall bound for the capped tier.
    pub cap_total: usize,
    /// Bound per `day_bucket`.
    pub cap_per_day: usize,
    /// Per-category quota; a category missing here is bounded by `cap_total` only.
    pub quotas: BTreeMap<Category, usize>,
    /// Bond/rate commentary allowed across the whole selection.
    pub yields_cap: usize,
    /// Extra days looked at by the first fill-up phase.
    pub expand1_days: u32,
}

impl Default for CapConfig {
    fn default() -> Self {
        let quotas = [
            (Category::Growth, 4),
            (Category::Inflation, 4),
            (Category::Labor, 3),
            (Category::Pmi, 3),
            (Category::Confidence, 2),
            (Category::Housing, 2),
            (Category::Yields, 1),
            (Category::Other, 2),
        ]
        .into_iter()
        .collect();
        Self {
            cap_total: 12,
            cap_per_day: 4,
            quotas,
            yields_cap: 1,
            expand1_days: 10,
        }
    }
}

impl CapConfig {
    pub fn quota_for(&self, cat: Category) -> usize {
        self.quotas.get(&cat).copied().unwrap_or(self.cap_total)
    }

    /// Apply SELECT_CAP_TOTAL / SELECT_CAP_PER_DAY / SELECT_YIELDS_CAP when they parse.
    pub fn apply_env_overrides(mut self) -> Self {
        fn read(name: &str) -> Option<usize> {
            let raw = std::env::var(name).ok()?;
            match raw.trim().parse::<usize>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(target: "config", var = name, value = %raw, "ignoring invalid override");
                    None
                }
            }
        }
        if let Some(v) = read(ENV_CAP_TOTAL) {
            self.cap_total = v;
        }
        if let Some(v) = read(ENV_CAP_PER_DAY) {
            self.cap_per_day = v;
        }
        if let Some(v) = read(ENV_YIELDS_CAP) {
            self.yields_cap = v;
        }
        self
    }
}

/// Load caps from an explicit path. Supports TOML or JSON formats.
pub fn load_caps_from(path: &Path) -> Result<CapConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading select config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_caps(&content, ext.as_str())
}

/// Load caps using env var + fallbacks, then env overrides:
/// 1) $SELECT_CONFIG_PATH
/// 2) config/select.toml
/// 3) config/select.json
/// 4) built-in defaults
pub fn load_caps_default() -> Result<CapConfig> {
    let base = if let Ok(p) = std::env::var(ENV_SELECT_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("SELECT_CONFIG_PATH points to non-existent path"));
        }
        load_caps_from(&pb)?
    } else {
        let toml_p = PathBuf::from("config/select.toml");
        let json_p = PathBuf::from("config/select.json");
        if toml_p.exists() {
            load_caps_from(&toml_p)?
        } else if json_p.exists() {
            load_caps_from(&json_p)?
        } else {
            CapConfig::default()
        }
    };
    Ok(base.apply_env_overrides())
}

fn parse_caps(s: &str, hint_ext: &str) -> Result<CapConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing select config JSON");
    }
    #[derive(Deserialize)]
    struct TomlRoot {
        caps: CapConfig,
    }
    // Accept both a `[caps]` table and a bare document.
    if let Ok(root) = toml::from_str::<TomlRoot>(s) {
        return Ok(root.caps);
    }
    if let Ok(c) = toml::from_str::<CapConfig>(s) {
        return Ok(c);
    }
    serde_json::from_str(s).map_err(|_| anyhow!("unsupported select config format"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_caps_table_merges_with_defaults() {
        let c = parse_caps(
            r#"
[caps]
cap_total = 8
[caps.quotas]
housing = 1
"#,
            "toml",
        )
        .unwrap();
        assert_eq!(c.cap_total, 8);
        assert_eq!(c.cap_per_day, 4);
        assert_eq!(c.quota_for(Category::Housing), 1);
        // quotas table replaced wholesale: missing categories fall back to cap_total
        assert_eq!(c.quota_for(Category::Growth), 8);
    }

    #[test]
    fn json_caps() {
        let c = parse_caps(r#"{"yields_cap": 2, "expand1_days": 5}"#, "json").unwrap();
        assert_eq!(c.yields_cap, 2);
        assert_eq!(c.expand1_days, 5);
        assert_eq!(c.quota_for(Category::Inflation), 4);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_caps("[[[", "txt").is_err());
    }
}
