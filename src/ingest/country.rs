// src/ingest/country.rs
//! Country/area names as scraped (English or Italian pages) to canonical names.

/// (synonym, canonical). Matching is case-insensitive on the trimmed name.
const SYNONYMS: &[(&str, &str)] = &[
    ("united states", "United States"),
    ("us", "United States"),
    ("usa", "United States"),
    ("u.s.", "United States"),
    ("stati uniti", "United States"),
    ("euro area", "Euro Area"),
    ("eurozone", "Euro Area"),
    ("european union", "Euro Area"),
    ("area euro", "Euro Area"),
    ("eurozona", "Euro Area"),
    ("ue", "Euro Area"),
    ("unione europea", "Euro Area"),
    ("germany", "Germany"),
    ("germania", "Germany"),
    ("united kingdom", "United Kingdom"),
    ("uk", "United Kingdom"),
    ("regno unito", "United Kingdom"),
    ("italy", "Italy"),
    ("italia", "Italy"),
    ("france", "France"),
    ("francia", "France"),
    ("china", "China"),
    ("cina", "China"),
    ("japan", "Japan"),
    ("giappone", "Japan"),
    ("spain", "Spain"),
    ("spagna", "Spain"),
    ("netherlands", "Netherlands"),
    ("paesi bassi", "Netherlands"),
];

/// Canonical name for `name`; unknown names are returned trimmed.
pub fn normalize_country(name: &str) -> String {
    let trimmed = name.trim();
    let key = trimmed.to_lowercase();
    SYNONYMS
        .iter()
        .find(|(syn, _)| *syn == key)
        .map(|(_, canon)| canon.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// True when `country` is one of `wanted` (canonicalized). Empty `wanted` accepts all.
pub fn country_wanted(country: &str, wanted: &[String]) -> bool {
    if wanted.is_empty() {
        return true;
    }
    let c = normalize_country(country);
    wanted
        .iter()
        .any(|w| normalize_country(w).eq_ignore_ascii_case(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn italian_and_short_names_map_to_canonical() {
        assert_eq!(normalize_country("Stati Uniti"), "United States");
        assert_eq!(normalize_country(" U.S. "), "United States");
        assert_eq!(normalize_country("European Union"), "Euro Area");
        assert_eq!(normalize_country("Giappone"), "Japan");
        assert_eq!(normalize_country("UE"), "Euro Area");
    }

    #[test]
    fn unknown_names_are_trimmed_only() {
        assert_eq!(normalize_country("  Brazil "), "Brazil");
    }

    #[test]
    fn wanted_list_uses_canonical_names() {
        let wanted = vec!["Eurozona".to_string(), "Germany".to_string()];
        assert!(country_wanted("Euro Area", &wanted));
        assert!(country_wanted("germania", &wanted));
        assert!(!country_wanted("Italy", &wanted));
        assert!(country_wanted("Italy", &[]));
    }
}
