// src/taxonomy.rs
//! Taxonomy primitives: config schema (TOML), regex compilation, ordered
//! first-match category rules and a snapshotting handle with dev hot reload.

use anyhow::Context;
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::devlog::is_dev_env;
use crate::record::Category;

// --- env defaults & names ---
pub const DEFAULT_TAXONOMY_CONFIG_PATH: &str = "config/taxonomy.toml";
pub const ENV_TAXONOMY_CONFIG_PATH: &str = "TAXONOMY_CONFIG_PATH";
pub const ENV_TAXONOMY_HOT_RELOAD: &str = "TAXONOMY_HOT_RELOAD";

/// Embedded copy of the default taxonomy.
const BUILTIN_TAXONOMY: &str = include_str!("../config/taxonomy.toml");

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct TaxonomyRoot {
    pub classifier: ClassifierSection,
    #[serde(default)]
    pub categories: Vec<CategoryRuleCfg>,
    pub markers: MarkersCfg,
    #[serde(default)]
    pub price_indices: Vec<PriceIndexCfg>,
    pub scoring: ScoringCfg,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierSection {
    #[serde(default = "default_signature_tokens")]
    pub signature_tokens: usize,
    #[serde(default)]
    pub stopwords: Vec<String>,
}

fn default_signature_tokens() -> usize {
    6
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRuleCfg {
    pub id: String,
    pub label: String, // one of Category labels
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkersCfg {
    pub preview: String,
    pub numeric: String,
    pub period: String,
    pub release_en: String,
    pub release_it: String,
    pub regional_pmi: String,
    pub core_variant: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceIndexCfg {
    pub id: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringCfg {
    #[serde(default = "default_boost")]
    pub boost: f64,
    pub base_weights: HashMap<String, f64>,
}

fn default_boost() -> f64 {
    0.05
}

/* ----------------------------
Compiled rules
---------------------------- */

/// One predicate→label rule; matches when any of its patterns hits.
#[derive(Debug)]
pub struct CategoryRule {
    pub id: String,
    pub label: Category,
    res: Vec<Regex>,
}

impl CategoryRule {
    pub fn matches(&self, text: &str) -> bool {
        self.res.iter().any(|re| re.is_match(text))
    }
}

/// How a text qualifies as an already-released data point.
#[derive(Debug)]
pub enum ResultMarker {
    /// Numeric content co-occurring with a period qualifier (YoY, MoM, bps, %).
    NumericWithPeriod(Regex),
    /// Past-tense release language.
    Phrase(Regex),
}

#[derive(Debug)]
pub struct ResultRule {
    pub id: &'static str,
    pub marker: ResultMarker,
}

#[derive(Debug)]
pub struct PriceIndexRule {
    pub id: String,
    re: Regex,
}

impl PriceIndexRule {
    pub fn matches(&self, text: &str) -> bool {
        self.re.is_match(text)
    }
}

/// Immutable taxonomy: built once, shared read-only by classifier, scorer and
/// selector for the duration of a run.
#[derive(Debug)]
pub struct Taxonomy {
    pub cfg: TaxonomyRoot,
    category_rules: Vec<CategoryRule>,
    preview: Regex,
    numeric: Regex,
    result_rules: Vec<ResultRule>,
    regional_pmi: Regex,
    core_variant: Regex,
    price_indices: Vec<PriceIndexRule>,
    stopwords: HashSet<String>,
    base_weights: HashMap<Category, f64>,
}

fn compile(id: &str, pattern: &str) -> anyhow::Result<Regex> {
    Regex::new(pattern).with_context(|| format!("taxonomy rule `{}` regex error", id))
}

impl Taxonomy {
    /// Load from a TOML file. Uses TAXONOMY_CONFIG_PATH or defaults to "config/taxonomy.toml".
    pub fn from_toml() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_TAXONOMY_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_TAXONOMY_CONFIG_PATH));

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read taxonomy config at {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// The taxonomy shipped with the crate.
    pub fn builtin() -> Self {
        Self::from_toml_str(BUILTIN_TAXONOMY).expect("embedded taxonomy must compile")
    }

    /// File if present, embedded defaults otherwise.
    pub fn load_or_builtin() -> Self {
        match Self::from_toml() {
            Ok(t) => t,
            Err(e) => {
                warn!(target: "taxonomy", error = %e, "falling back to embedded taxonomy");
                Self::builtin()
            }
        }
    }

    /// Load from a TOML string
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let cfg: TaxonomyRoot = toml::from_str(toml_str).context("parsing taxonomy TOML")?;

        let category_rules = cfg
            .categories
            .iter()
            .map(|c| {
                let label = Category::parse(&c.label).ok_or_else(|| {
                    anyhow::anyhow!("category rule `{}` has unknown label `{}`", c.id, c.label)
                })?;
                let res = c
                    .patterns
                    .iter()
                    .map(|p| compile(&c.id, p))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                Ok(CategoryRule {
                    id: c.id.clone(),
                    label,
                    res,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let m = &cfg.markers;
        let result_rules = vec![
            ResultRule {
                id: "numeric_with_period",
                marker: ResultMarker::NumericWithPeriod(compile("period", &m.period)?),
            },
            ResultRule {
                id: "release_en",
                marker: ResultMarker::Phrase(compile("release_en", &m.release_en)?),
            },
            ResultRule {
                id: "release_it",
                marker: ResultMarker::Phrase(compile("release_it", &m.release_it)?),
            },
        ];

        let price_indices = cfg
            .price_indices
            .iter()
            .map(|p| {
                Ok(PriceIndexRule {
                    id: p.id.clone(),
                    re: compile(&p.id, &p.pattern)?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut base_weights = HashMap::new();
        for (label, w) in &cfg.scoring.base_weights {
            let cat = Category::parse(label)
                .ok_or_else(|| anyhow::anyhow!("base weight for unknown category `{}`", label))?;
            base_weights.insert(cat, *w);
        }

        let stopwords = cfg
            .classifier
            .stopwords
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            preview: compile("preview", &m.preview)?,
            numeric: compile("numeric", &m.numeric)?,
            regional_pmi: compile("regional_pmi", &m.regional_pmi)?,
            core_variant: compile("core_variant", &m.core_variant)?,
            category_rules,
            result_rules,
            price_indices,
            stopwords,
            base_weights,
            cfg,
        })
    }

    pub fn category_rules(&self) -> &[CategoryRule] {
        &self.category_rules
    }

    pub fn result_rules(&self) -> &[ResultRule] {
        &self.result_rules
    }

    pub fn price_indices(&self) -> &[PriceIndexRule] {
        &self.price_indices
    }

    /// The first rule whose label is `cat`, if any.
    pub fn rule_for(&self, cat: Category) -> Option<&CategoryRule> {
        self.category_rules.iter().find(|r| r.label == cat)
    }

    pub fn is_preview(&self, text: &str) -> bool {
        self.preview.is_match(text)
    }

    pub fn has_numbers(&self, text: &str) -> bool {
        self.numeric.is_match(text)
    }

    pub fn is_regional_pmi(&self, text: &str) -> bool {
        self.regional_pmi.is_match(text)
    }

    pub fn is_core_variant(&self, text: &str) -> bool {
        self.core_variant.is_match(text)
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    pub fn stopword_count(&self) -> usize {
        self.stopwords.len()
    }

    pub fn signature_tokens(&self) -> usize {
        self.cfg.classifier.signature_tokens.max(1)
    }

    pub fn base_weight(&self, cat: Category) -> f64 {
        self.base_weights.get(&cat).copied().unwrap_or(0.0)
    }

    pub fn boost(&self) -> f64 {
        self.cfg.scoring.boost
    }
}

/* ----------------------------
Thread-safe handle + hot reload
---------------------------- */

/// Shared handle over the current taxonomy. Callers take an `Arc` snapshot per
/// run, so a reload never changes the tables mid-selection.
#[derive(Clone)]
pub struct TaxonomyHandle {
    inner: Arc<RwLock<Arc<Taxonomy>>>,
}

impl TaxonomyHandle {
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(taxonomy))),
        }
    }

    pub fn snapshot(&self) -> Arc<Taxonomy> {
        match self.inner.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, taxonomy: Taxonomy) {
        match self.inner.write() {
            Ok(mut g) => *g = Arc::new(taxonomy),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(taxonomy),
        }
    }
}

/// Returns true if we should enable hot reload (dev/local only).
fn hot_reload_enabled() -> bool {
    let want = std::env::var(ENV_TAXONOMY_HOT_RELOAD)
        .ok()
        .map(|v| v == "1")
        .unwrap_or(false);
    want && is_dev_env()
}

/// Start a simple polling watcher on `path` to hot-reload into `handle`.
/// Polls mtime every 2s.
pub fn start_hot_reload_thread(handle: TaxonomyHandle, path: PathBuf) {
    if !hot_reload_enabled() {
        return;
    }

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            if let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) {
                let changed = match last_mtime {
                    None => {
                        last_mtime = Some(mtime);
                        false
                    }
                    Some(prev) => mtime > prev,
                };
                if changed {
                    match fs::read_to_string(&path)
                        .map_err(anyhow::Error::from)
                        .and_then(|c| Taxonomy::from_toml_str(&c))
                    {
                        Ok(t) => {
                            handle.replace(t);
                            info!(target: "taxonomy", path = %path.display(), "taxonomy reloaded");
                        }
                        Err(e) => {
                            warn!(target: "taxonomy", error = %e, "taxonomy reload rejected");
                        }
                    }
                    last_mtime = Some(mtime);
                }
            }
            thread::sleep(poll);
        }
    });
}

/* ----------------------------
Tests
---------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    const MINI_TOML: &str = r#"
[classifier]
stopwords = ["the", "of"]

[[categories]]
id = "bonds"
label = "yields"
patterns = ['(?i)\bbonds?\b']

[[categories]]
id = "gdp"
label = "growth"
patterns = ['(?i)\bgdp\b']

[markers]
preview = '(?i)\bahead\s+of\b'
numeric = '\d'
period = '(?i)(\b(yoy|mom)\b|%)'
release_en = '(?i)\b(rose|fell)\b'
release_it = '(?i)\b(salito)\b'
regional_pmi = '(?i)\bdallas\b'
core_variant = '(?i)\bcore\b'

[scoring.base_weights]
growth = 0.5
yields = 0.2
"#;

    #[test]
    fn builtin_compiles_and_orders_yields_first() {
        let t = Taxonomy::builtin();
        assert_eq!(t.category_rules()[0].label, Category::Yields);
        assert_eq!(t.signature_tokens(), 6);
        assert!(t.base_weight(Category::Growth) > t.base_weight(Category::Other));
        assert!(t.base_weight(Category::Inflation) > t.base_weight(Category::Housing));
    }

    #[test]
    fn mini_config_defaults_apply() {
        let t = Taxonomy::from_toml_str(MINI_TOML).expect("mini taxonomy");
        assert_eq!(t.signature_tokens(), 6);
        assert!((t.boost() - 0.05).abs() < 1e-9);
        assert_eq!(t.base_weight(Category::Labor), 0.0);
        assert!(t.is_stopword("the"));
        assert!(t.price_indices().is_empty());
    }

    #[test]
    fn unknown_label_is_rejected() {
        let bad = MINI_TOML.replace("label = \"growth\"", "label = \"gossip\"");
        let err = Taxonomy::from_toml_str(&bad).unwrap_err();
        assert!(format!("{err:#}").contains("gossip"));
    }

    #[test]
    fn bad_regex_names_the_rule() {
        let bad = MINI_TOML.replace(r"(?i)\bgdp\b", "(unclosed");
        let err = Taxonomy::from_toml_str(&bad).unwrap_err();
        assert!(format!("{err:#}").contains("`gdp`"));
    }

    #[test]
    fn handle_snapshot_survives_replace() {
        let h = TaxonomyHandle::new(Taxonomy::builtin());
        let before = h.snapshot();
        h.replace(Taxonomy::from_toml_str(MINI_TOML).unwrap());
        let after = h.snapshot();
        assert_eq!(before.category_rules().len(), 7);
        assert_eq!(after.category_rules().len(), 2);
    }
}
