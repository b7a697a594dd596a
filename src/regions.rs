/// Region registry for the air-quality alert service.
///
/// AirKorea pivot tables key their columns by short romanized province codes
/// (`seoul`, `gyeonggi`, ...), while flat endpoints already carry display
/// names (`서울`, `경기`). This module is the single source of truth for the
/// code → display-name mapping; all other modules translate through a
/// `RegionTable` rather than hardcoding names.

use std::collections::HashMap;

/// Metadata for a single province-level region.
pub struct Region {
    /// Column key used by AirKorea pivot responses.
    pub code: &'static str,
    /// Korean display name, as used in `sidoName` query parameters.
    pub name: &'static str,
}

/// All 17 provinces / metropolitan cities reported by AirKorea, in the
/// column order of the pivot endpoint.
pub static REGION_REGISTRY: &[Region] = &[
    Region { code: "seoul", name: "서울" },
    Region { code: "busan", name: "부산" },
    Region { code: "daegu", name: "대구" },
    Region { code: "incheon", name: "인천" },
    Region { code: "gwangju", name: "광주" },
    Region { code: "daejeon", name: "대전" },
    Region { code: "ulsan", name: "울산" },
    Region { code: "gyeonggi", name: "경기" },
    Region { code: "gangwon", name: "강원" },
    Region { code: "chungbuk", name: "충북" },
    Region { code: "chungnam", name: "충남" },
    Region { code: "jeonbuk", name: "전북" },
    Region { code: "jeonnam", name: "전남" },
    Region { code: "gyeongbuk", name: "경북" },
    Region { code: "gyeongnam", name: "경남" },
    Region { code: "jeju", name: "제주" },
    Region { code: "sejong", name: "세종" },
];

/// `sidoName` value that selects every province at once.
pub const NATIONWIDE: &str = "전국";

/// Returns true if `name` is a valid `sidoName` query value.
pub fn is_known_sido(name: &str) -> bool {
    name == NATIONWIDE || REGION_REGISTRY.iter().any(|r| r.name == name)
}

// ---------------------------------------------------------------------------
// Translation table
// ---------------------------------------------------------------------------

/// Immutable code → display-name table, built once at start-up from the
/// registry plus any overrides from the config file.
#[derive(Debug, Clone)]
pub struct RegionTable {
    names: HashMap<String, String>,
}

impl RegionTable {
    pub fn new(overrides: &HashMap<String, String>) -> Self {
        let mut names: HashMap<String, String> = REGION_REGISTRY
            .iter()
            .map(|r| (r.code.to_string(), r.name.to_string()))
            .collect();
        for (code, name) in overrides {
            names.insert(code.to_ascii_lowercase(), name.clone());
        }
        Self { names }
    }

    /// Display name for a raw region key. Unknown codes pass through
    /// unchanged so a newly added column still shows up, just untranslated.
    pub fn display_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.names
            .get(&code.to_ascii_lowercase())
            .map(String::as_str)
            .unwrap_or(code)
    }
}

impl Default for RegionTable {
    fn default() -> Self {
        Self::new(&HashMap::new())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_region_codes_are_lowercase_ascii() {
        // Pivot column keys are lowercase ASCII; anything else will never
        // match a response key and silently stay untranslated.
        for region in REGION_REGISTRY {
            assert!(
                region.code.chars().all(|c| c.is_ascii_lowercase()),
                "region code for '{}' should be lowercase ascii, got '{}'",
                region.name,
                region.code
            );
        }
    }

    #[test]
    fn test_no_duplicate_codes_or_names() {
        let mut codes = std::collections::HashSet::new();
        let mut names = std::collections::HashSet::new();
        for region in REGION_REGISTRY {
            assert!(codes.insert(region.code), "duplicate code '{}'", region.code);
            assert!(names.insert(region.name), "duplicate name '{}'", region.name);
        }
        assert_eq!(REGION_REGISTRY.len(), 17);
    }

    #[test]
    fn test_known_sido_accepts_nationwide_and_provinces() {
        assert!(is_known_sido("전국"));
        assert!(is_known_sido("제주"));
        assert!(!is_known_sido("seoul"));
    }

    #[test]
    fn test_unknown_codes_pass_through_unchanged() {
        let table = RegionTable::default();
        assert_eq!(table.display_name("seoul"), "서울");
        assert_eq!(table.display_name("SEOUL"), "서울");
        assert_eq!(table.display_name("dokdo"), "dokdo");
    }

    #[test]
    fn test_overrides_replace_and_extend_registry() {
        let mut overrides = HashMap::new();
        overrides.insert("seoul".to_string(), "서울특별시".to_string());
        overrides.insert("dokdo".to_string(), "독도".to_string());
        let table = RegionTable::new(&overrides);
        assert_eq!(table.display_name("seoul"), "서울특별시");
        assert_eq!(table.display_name("dokdo"), "독도");
        assert_eq!(table.display_name("busan"), "부산");
    }
}
