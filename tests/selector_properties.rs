//! Seeded synthetic pools checked against the selector's guarantees:
//! determinism, yields cap, breaking news, monotonic widening, coverage.

use macro_digest::analyze::annotate;
use macro_digest::config::CapConfig;
use macro_digest::record::{AnnotatedRecord, Category, RawRecord};
use macro_digest::select::{Admission, Phase, Selector};
use macro_digest::taxonomy::Taxonomy;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

const TEMPLATES: &[&str] = &[
    "{c} GDP Growth Rate {v}% QoQ",
    "{c} Retail Sales Rise {v}% MoM",
    "{c} Inflation Rate Eases to {v}%",
    "{c} Core Inflation Rate at {v}%",
    "{c} Producer Prices Fall {v}% YoY",
    "{c} Unemployment Rate Rises to {v}%",
    "{c} Manufacturing PMI Falls to {v}",
    "Richmond Fed Manufacturing Index at {v}",
    "{c} Consumer Confidence Improves",
    "{c} Housing Starts Jump {v}%",
    "{c} 10-Year Bond Yield Climbs to {v}%",
    "Week ahead: {c} inflation data expected to cool",
    "{c} officials discuss tourism plans",
];

const COUNTRIES: &[&str] = &["United States", "Germany", "Japan", "Italy", "France"];

fn gen_pool(rng: &mut StdRng, n: usize) -> Vec<RawRecord> {
    (0..n)
        .map(|_| {
            let tpl = TEMPLATES[rng.random_range(0..TEMPLATES.len())];
            let c = COUNTRIES[rng.random_range(0..COUNTRIES.len())];
            let v = format!("{:.1}", rng.random_range(0.1..9.9));
            let title = tpl.replace("{c}", c).replace("{v}", &v);
            let age = rng.random_range(0.0..30.0);
            let importance = rng.random_range(0..4u8);
            RawRecord::new(c, &title, "", age).with_importance(importance)
        })
        .collect()
}

fn all_fingerprints(out: &[AnnotatedRecord]) -> HashSet<String> {
    out.iter()
        .flat_map(|r| r.fingerprints().into_iter().map(str::to_string))
        .collect()
}

struct Case {
    pool: Vec<RawRecord>,
    window: u32,
    target: usize,
}

fn cases(seed: u64, count: usize) -> Vec<Case> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let n = rng.random_range(5..60);
            let pool = gen_pool(&mut rng, n);
            let window = [1, 3, 7, 14][rng.random_range(0..4)];
            let target = [0, 5, 12, 30][rng.random_range(0..4)];
            Case {
                pool,
                window,
                target,
            }
        })
        .collect()
}

#[test]
fn same_input_same_output_regardless_of_order() {
    let t = Taxonomy::builtin();
    let caps = CapConfig::default();
    let sel = Selector::new(&t, &caps);
    let mut rng = StdRng::seed_from_u64(99);
    for case in cases(1, 40) {
        let a = sel.run(&case.pool, case.window, case.target);
        let b = sel.run(&case.pool, case.window, case.target);
        assert_eq!(a.records, b.records);

        let mut shuffled = case.pool.clone();
        shuffled.shuffle(&mut rng);
        let c = sel.run(&shuffled, case.window, case.target);
        assert_eq!(a.records, c.records);
        assert_eq!(
            serde_json::to_string(&a.records).unwrap(),
            serde_json::to_string(&c.records).unwrap()
        );
    }
}

#[test]
fn yields_never_exceed_cap() {
    let t = Taxonomy::builtin();
    for yields_cap in [0, 1, 2] {
        let caps = CapConfig {
            yields_cap,
            ..CapConfig::default()
        };
        let sel = Selector::new(&t, &caps);
        for case in cases(2 + yields_cap as u64, 40) {
            let out = sel.run(&case.pool, case.window, case.target).records;
            let n = out
                .iter()
                .filter(|r| r.topic_signature == "yields")
                .count();
            assert!(n <= yields_cap, "yields {n} > cap {yields_cap}");
        }
    }
}

#[test]
fn fresh_breaking_records_always_surface() {
    let t = Taxonomy::builtin();
    let caps = CapConfig::default();
    let sel = Selector::new(&t, &caps);
    for case in cases(3, 60) {
        let annotated: Vec<AnnotatedRecord> = case
            .pool
            .iter()
            .filter_map(|r| annotate(&t, r))
            .collect();
        let mut fp_counts: HashMap<&str, usize> = HashMap::new();
        for a in &annotated {
            *fp_counts.entry(a.fingerprint.as_str()).or_default() += 1;
        }

        let out = sel.run(&case.pool, case.window, case.target).records;
        let seen = all_fingerprints(&out);
        for a in annotated.iter().filter(|a| {
            a.is_breaking() && a.category != Category::Yields && fp_counts[a.fingerprint.as_str()] == 1
        }) {
            assert!(seen.contains(&a.fingerprint), "missing breaking: {}", a.title);
        }
    }
}

#[test]
fn widening_never_removes_primary_picks() {
    let t = Taxonomy::builtin();
    let caps = CapConfig::default();
    let sel = Selector::new(&t, &caps);
    for case in cases(4, 40) {
        let narrow = sel.run(&case.pool, case.window, 0);
        let wide = sel.run(&case.pool, case.window, 50);
        let wide_fps = all_fingerprints(&wide.records);
        for (r, tr) in narrow.records.iter().zip(&narrow.trace) {
            if tr.phase == Phase::Primary {
                assert!(wide_fps.contains(&r.fingerprint), "dropped on widening: {}", r.title);
            }
        }
        assert!(wide.len() >= narrow.len());
    }
}

#[test]
fn core_results_within_horizon_are_covered() {
    let t = Taxonomy::builtin();
    let caps = CapConfig::default();
    let sel = Selector::new(&t, &caps);
    for case in cases(5, 60) {
        let annotated: Vec<AnnotatedRecord> = case
            .pool
            .iter()
            .filter_map(|r| annotate(&t, r))
            .collect();
        let out = sel.run(&case.pool, case.window, case.target).records;
        for cat in Category::CORE {
            if annotated.iter().any(|a| a.category == cat && a.is_result) {
                assert!(
                    out.iter().any(|r| r.category == cat),
                    "no {cat} in output"
                );
            }
        }
    }
}

#[test]
fn capped_tier_respects_total_and_per_day() {
    let t = Taxonomy::builtin();
    let caps = CapConfig {
        cap_total: 6,
        cap_per_day: 2,
        ..CapConfig::default()
    };
    let sel = Selector::new(&t, &caps);
    for case in cases(6, 40) {
        let res = sel.run(&case.pool, case.window, case.target);
        let capped: Vec<&AnnotatedRecord> = res
            .records
            .iter()
            .zip(&res.trace)
            .filter(|(_, tr)| tr.admission == Admission::Capped)
            .map(|(r, _)| r)
            .collect();
        assert!(capped.len() <= caps.cap_total);

        let mut per_day: HashMap<u32, usize> = HashMap::new();
        for r in capped {
            *per_day.entry(r.day_bucket).or_default() += 1;
        }
        assert!(per_day.values().all(|n| *n <= caps.cap_per_day));
    }
}
