//! Country name resolution and fuzzy matching.
//!
//! User-supplied country filters are resolved to the canonical key a snapshot
//! stores its buckets under. Resolution is case-insensitive and accepts the
//! key itself, the bucket's display name, or an ISO-style code or name known
//! to a [`CountryLookup`].
//!
//! When nothing matches, [`closest_match`] picks the known country name with
//! the smallest Levenshtein distance so the error can say "did you mean".
//! That scan is only paid on the error path.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, QueryError};
use crate::series::CountryBucket;

/// Bidirectional country name ↔ code lookup, plus population figures.
///
/// This is the seam to the lookup-table collaborator. Lookups are
/// case-insensitive.
pub trait CountryLookup: Send + Sync {
    /// Returns the country name for an ISO-style code.
    fn name_for_code(&self, code: &str) -> Option<&str>;

    /// Returns the ISO-style code for a country name.
    fn code_for_name(&self, name: &str) -> Option<&str>;

    /// Returns the population of a country (`region == ""`) or one of its
    /// sub-regions. `country` may be a code or a name.
    fn population(&self, country: &str, region: &str) -> Option<u64>;
}

/// One entry of a [`CountryDirectory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryEntry {
    /// ISO-style code, e.g. `"sg"`.
    pub code: String,
    /// Display name, e.g. `"Singapore"`.
    pub name: String,
    /// Whole-country population, when known.
    #[serde(default)]
    pub population: Option<u64>,
    /// Sub-region populations keyed by sub-region name.
    #[serde(default)]
    pub regions: HashMap<String, u64>,
}

impl CountryEntry {
    /// Creates an entry without population figures.
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            population: None,
            regions: HashMap::new(),
        }
    }
}

/// Codes and names of the countries the built-in directory knows.
const BUILTIN_COUNTRIES: &[(&str, &str)] = &[
    ("ae", "United Arab Emirates"),
    ("ar", "Argentina"),
    ("at", "Austria"),
    ("au", "Australia"),
    ("be", "Belgium"),
    ("bg", "Bulgaria"),
    ("br", "Brazil"),
    ("ca", "Canada"),
    ("ch", "Switzerland"),
    ("cn", "China"),
    ("co", "Colombia"),
    ("cu", "Cuba"),
    ("cz", "Czechia"),
    ("de", "Germany"),
    ("eg", "Egypt"),
    ("fr", "France"),
    ("gb", "United Kingdom"),
    ("gr", "Greece"),
    ("hk", "Hong Kong"),
    ("hu", "Hungary"),
    ("id", "Indonesia"),
    ("ie", "Ireland"),
    ("il", "Israel"),
    ("in", "India"),
    ("it", "Italy"),
    ("jp", "Japan"),
    ("kr", "Korea, South"),
    ("lt", "Lithuania"),
    ("lv", "Latvia"),
    ("ma", "Morocco"),
    ("mx", "Mexico"),
    ("my", "Malaysia"),
    ("ng", "Nigeria"),
    ("nl", "Netherlands"),
    ("no", "Norway"),
    ("nz", "New Zealand"),
    ("ph", "Philippines"),
    ("pl", "Poland"),
    ("pt", "Portugal"),
    ("ro", "Romania"),
    ("rs", "Serbia"),
    ("ru", "Russia"),
    ("sa", "Saudi Arabia"),
    ("se", "Sweden"),
    ("sg", "Singapore"),
    ("si", "Slovenia"),
    ("sk", "Slovakia"),
    ("th", "Thailand"),
    ("tr", "Turkey"),
    ("tw", "Taiwan"),
    ("ua", "Ukraine"),
    ("us", "US"),
    ("ve", "Venezuela"),
    ("za", "South Africa"),
];

/// In-memory [`CountryLookup`] backed by a list of [`CountryEntry`].
#[derive(Debug, Clone, Default)]
pub struct CountryDirectory {
    entries: Vec<CountryEntry>,
    by_code: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl CountryDirectory {
    /// Builds a directory from entries. Later entries win on duplicate codes
    /// or names.
    pub fn new(entries: impl IntoIterator<Item = CountryEntry>) -> Self {
        let mut directory = Self::default();
        directory.extend(entries);
        directory
    }

    /// The built-in code table.
    pub fn builtin() -> Self {
        Self::new(
            BUILTIN_COUNTRIES
                .iter()
                .map(|&(code, name)| CountryEntry::new(code, name)),
        )
    }

    /// Loads entries from a JSON array file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] if the file
    /// cannot be read or is not a JSON array of entries.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<CountryEntry>, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Adds or replaces entries.
    pub fn extend(&mut self, entries: impl IntoIterator<Item = CountryEntry>) {
        for entry in entries {
            let code = entry.code.to_lowercase();
            let name = entry.name.to_lowercase();
            let index = match self.by_code.get(&code).or_else(|| self.by_name.get(&name)) {
                Some(&existing) => {
                    self.entries[existing] = entry;
                    existing
                }
                None => {
                    self.entries.push(entry);
                    self.entries.len() - 1
                }
            };
            self.by_code.insert(code, index);
            self.by_name.insert(name, index);
        }
    }

    /// Number of known countries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, code_or_name: &str) -> Option<&CountryEntry> {
        let key = code_or_name.to_lowercase();
        self.by_code
            .get(&key)
            .or_else(|| self.by_name.get(&key))
            .map(|&index| &self.entries[index])
    }
}

impl CountryLookup for CountryDirectory {
    fn name_for_code(&self, code: &str) -> Option<&str> {
        self.by_code
            .get(&code.to_lowercase())
            .map(|&index| self.entries[index].name.as_str())
    }

    fn code_for_name(&self, name: &str) -> Option<&str> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|&index| self.entries[index].code.as_str())
    }

    fn population(&self, country: &str, region: &str) -> Option<u64> {
        let entry = self.entry(country)?;
        if region.is_empty() {
            entry.population
        } else {
            entry.regions.get(region).copied()
        }
    }
}

/// Resolves country filters against a snapshot's buckets.
pub struct NameResolver<'a> {
    buckets: &'a HashMap<String, CountryBucket>,
    lookup: &'a dyn CountryLookup,
}

impl<'a> NameResolver<'a> {
    /// Creates a resolver over `buckets`.
    pub fn new(buckets: &'a HashMap<String, CountryBucket>, lookup: &'a dyn CountryLookup) -> Self {
        Self { buckets, lookup }
    }

    /// Resolves `query` to a canonical bucket key.
    ///
    /// Tries, case-insensitively: the key, the bucket's display name, then
    /// the lookup's code ↔ name translation of `query`.
    pub fn resolve(&self, query: &str) -> Option<&'a str> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        self.find(query)
            .or_else(|| {
                self.lookup
                    .code_for_name(query)
                    .and_then(|code| self.find(code))
            })
            .or_else(|| {
                self.lookup
                    .name_for_code(query)
                    .and_then(|name| self.find(name))
            })
    }

    /// Resolves `query`, or reports the closest known country name.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::CountryNotFound`] if `query` resolves to nothing.
    pub fn resolve_or_suggest(&self, query: &str) -> Result<&'a str, QueryError> {
        self.resolve(query).ok_or_else(|| {
            let suggestion = closest_match(query, self.buckets.values().map(|b| b.name.as_str()))
                .map(str::to_string);
            tracing::debug!(country = query, ?suggestion, "country filter matched nothing");
            QueryError::CountryNotFound {
                country: query.to_string(),
                suggestion,
            }
        })
    }

    fn find(&self, candidate: &str) -> Option<&'a str> {
        if let Some((key, _)) = self.buckets.get_key_value(candidate) {
            return Some(key.as_str());
        }
        // Keys win over display names; ties go to the smallest key.
        let by_key = self
            .buckets
            .keys()
            .filter(|key| key.eq_ignore_ascii_case(candidate))
            .min();
        by_key
            .or_else(|| {
                self.buckets
                    .iter()
                    .filter(|(_, bucket)| bucket.name.eq_ignore_ascii_case(candidate))
                    .map(|(key, _)| key)
                    .min()
            })
            .map(String::as_str)
    }
}

/// Returns the candidate with the smallest edit distance to `query`.
///
/// Comparison is case-insensitive. Candidates are compared in sorted order,
/// so among equally distant names the alphabetically first one wins.
pub fn closest_match<'c>(query: &str, candidates: impl IntoIterator<Item = &'c str>) -> Option<&'c str> {
    let query = query.to_lowercase();
    let mut candidates: Vec<&str> = candidates.into_iter().collect();
    candidates.sort_unstable();
    candidates.dedup();
    candidates
        .into_iter()
        .min_by_key(|candidate| strsim::levenshtein(&query, &candidate.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{RegionSeries, WHOLE_COUNTRY};

    fn buckets() -> HashMap<String, CountryBucket> {
        let empty = || RegionSeries::new(None, 0, vec![]);
        [
            ("cn", "China"),
            ("sg", "Singapore"),
            ("gb", "United Kingdom"),
            ("Atlantis", "Atlantis"),
        ]
        .into_iter()
        .map(|(key, name)| {
            (
                key.to_string(),
                CountryBucket::new(name).with_region(WHOLE_COUNTRY, empty()),
            )
        })
        .collect()
    }

    #[test]
    fn test_levenshtein_matches_reference_distances() {
        for (a, b, expected) in [
            ("test", "tst", 1),
            ("test", "tast", 1),
            ("testt", "test", 1),
            ("test", "test", 0),
            ("testt", "tst", 2),
            ("abcd", "bcde", 2),
            ("", "", 0),
        ] {
            assert_eq!(strsim::levenshtein(a, b), expected, "{a} vs {b}");
        }
    }

    #[test]
    fn test_closest_match() {
        let names = ["China", "Singapore", "United Kingdom"];
        assert_eq!(closest_match("Sngapore", names), Some("Singapore"));
        assert_eq!(closest_match("Siingapore", names), Some("Singapore"));
        assert_eq!(closest_match("chain", names), Some("China"));
        assert_eq!(closest_match("UnitedKingdom", names), Some("United Kingdom"));
        assert_eq!(closest_match("anything", Vec::<&str>::new()), None);
    }

    #[test]
    fn test_closest_match_tie_is_alphabetical() {
        assert_eq!(closest_match("ab", ["ac", "aa"]), Some("aa"));
    }

    #[test]
    fn test_resolve_prefers_key_over_display_name() {
        let mut buckets = HashMap::new();
        buckets.insert("us".to_string(), CountryBucket::new("United States"));
        buckets.insert("usa".to_string(), CountryBucket::new("US"));
        let directory = CountryDirectory::builtin();
        let resolver = NameResolver::new(&buckets, &directory);

        assert_eq!(resolver.resolve("US"), Some("us"));
        assert_eq!(resolver.resolve("united states"), Some("us"));
        assert_eq!(resolver.resolve("USA"), Some("usa"));
    }

    #[test]
    fn test_resolve_by_key_and_name_case_insensitive() {
        let buckets = buckets();
        let directory = CountryDirectory::builtin();
        let resolver = NameResolver::new(&buckets, &directory);

        assert_eq!(resolver.resolve("cn"), Some("cn"));
        assert_eq!(resolver.resolve("CN"), Some("cn"));
        assert_eq!(resolver.resolve("china"), Some("cn"));
        assert_eq!(resolver.resolve("cHiNa"), Some("cn"));
        assert_eq!(resolver.resolve("united kingdom"), Some("gb"));
        assert_eq!(resolver.resolve("atlantis"), Some("Atlantis"));
        assert_eq!(resolver.resolve(""), None);
    }

    #[test]
    fn test_resolve_through_lookup() {
        let mut buckets = HashMap::new();
        buckets.insert(
            "Singapore".to_string(),
            CountryBucket::new("Singapore")
                .with_region(WHOLE_COUNTRY, RegionSeries::new(None, 0, vec![])),
        );
        let directory = CountryDirectory::builtin();
        let resolver = NameResolver::new(&buckets, &directory);

        // code -> name -> bucket keyed by name
        assert_eq!(resolver.resolve("SG"), Some("Singapore"));
    }

    #[test]
    fn test_resolve_or_suggest() {
        let buckets = buckets();
        let directory = CountryDirectory::builtin();
        let resolver = NameResolver::new(&buckets, &directory);

        let err = resolver.resolve_or_suggest("Sngapore").unwrap_err();
        assert!(err.to_string().contains("Singapore"));
        assert_eq!(
            err,
            QueryError::CountryNotFound {
                country: "Sngapore".to_string(),
                suggestion: Some("Singapore".to_string()),
            }
        );
    }

    #[test]
    fn test_suggestion_absent_without_buckets() {
        let buckets = HashMap::new();
        let directory = CountryDirectory::builtin();
        let resolver = NameResolver::new(&buckets, &directory);
        assert_eq!(
            resolver.resolve_or_suggest("China"),
            Err(QueryError::CountryNotFound {
                country: "China".to_string(),
                suggestion: None,
            })
        );
    }

    #[test]
    fn test_directory_lookup_and_extend() {
        let mut directory = CountryDirectory::builtin();
        assert_eq!(directory.name_for_code("SG"), Some("Singapore"));
        assert_eq!(directory.code_for_name("united kingdom"), Some("gb"));
        assert_eq!(directory.population("sg", ""), None);

        let mut entry = CountryEntry::new("sg", "Singapore");
        entry.population = Some(5_700_000);
        let before = directory.len();
        directory.extend([entry, CountryEntry::new("xx", "Atlantis")]);

        assert_eq!(directory.len(), before + 1);
        assert_eq!(directory.population("Singapore", ""), Some(5_700_000));
        assert_eq!(directory.code_for_name("Atlantis"), Some("xx"));
    }

    #[test]
    fn test_directory_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("countries.json");
        std::fs::write(
            &path,
            r#"[{"code": "cn", "name": "China", "population": 1400000000,
                 "regions": {"Hubei": 58500000}}]"#,
        )
        .unwrap();

        let directory = CountryDirectory::new(CountryDirectory::load(&path).unwrap());
        assert_eq!(directory.population("cn", "Hubei"), Some(58_500_000));
        assert_eq!(directory.population("China", ""), Some(1_400_000_000));
        assert_eq!(directory.population("China", "Beijing"), None);

        assert!(matches!(
            CountryDirectory::load(dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
    }
}
