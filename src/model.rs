/// Core data types for the air-quality alert service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O, only types and the small amount of parsing needed to
/// map API codes onto them.

use std::fmt;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Raw records
// ---------------------------------------------------------------------------

/// One item from a data.go.kr response, exactly as the API returned it.
///
/// Field names vary between endpoints (`sidoName` vs `cityName`, flat
/// objects vs pivot tables keyed by region code), so records stay untyped
/// until the normalizer applies a `SourceFormat` to them.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Pollutants
// ---------------------------------------------------------------------------

/// Measurement categories handled by the pipeline, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pollutant {
    Pm10,
    Pm25,
    /// Watch / warning advisories. Carries a status, not a concentration.
    AlertLevel,
}

impl Pollutant {
    /// Numeric pollutants, in the order their sections are rendered.
    pub const NUMERIC: [Pollutant; 2] = [Pollutant::Pm10, Pollutant::Pm25];

    /// All categories, in the order their sections are rendered.
    pub const ALL: [Pollutant; 3] = [Pollutant::Pm10, Pollutant::Pm25, Pollutant::AlertLevel];

    /// AirKorea `itemCode` value for this pollutant.
    pub fn item_code(self) -> &'static str {
        match self {
            Pollutant::Pm10 => "PM10",
            Pollutant::Pm25 => "PM25",
            Pollutant::AlertLevel => "ALERT",
        }
    }

    /// Parses an AirKorea `itemCode`. Accepts `PM2.5` as an alias of `PM25`.
    pub fn from_item_code(code: &str) -> Option<Pollutant> {
        match code.trim().to_ascii_uppercase().as_str() {
            "PM10" => Some(Pollutant::Pm10),
            "PM25" | "PM2.5" => Some(Pollutant::Pm25),
            _ => None,
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pollutant::Pm10 => write!(f, "PM10"),
            Pollutant::Pm25 => write!(f, "PM2.5"),
            Pollutant::AlertLevel => write!(f, "ALERT_LEVEL"),
        }
    }
}

// ---------------------------------------------------------------------------
// Grades
// ---------------------------------------------------------------------------

/// Severity band for a numeric concentration, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Band {
    Good,
    Moderate,
    Bad,
    VeryBad,
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::Good => write!(f, "😊 좋음"),
            Band::Moderate => write!(f, "😐 보통"),
            Band::Bad => write!(f, "😷 나쁨"),
            Band::VeryBad => write!(f, "💀 매우나쁨"),
        }
    }
}

/// Status of a particulate-matter advisory.
///
/// `Unknown` holds any phrase the status table does not recognize; such
/// records are still reported rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertStatus {
    Lifted,
    Watch,
    Warning,
    Unknown,
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertStatus::Lifted => write!(f, "✅ 해제"),
            AlertStatus::Watch => write!(f, "⚠️ 주의보"),
            AlertStatus::Warning => write!(f, "🚨 경보"),
            AlertStatus::Unknown => write!(f, "❔ 알 수 없음"),
        }
    }
}

/// Grade derived by the classifier for a single reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    Numeric(Band),
    Alert(AlertStatus),
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::Numeric(band) => band.fmt(f),
            Grade::Alert(status) => status.fmt(f),
        }
    }
}

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// The measured quantity of a reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadingValue {
    /// Concentration in ㎍/㎥, always finite and non-negative.
    Concentration(f64),
    /// Advisory status. `subject` is the pollutant the advisory was issued
    /// for, when the record says so.
    Status {
        status: AlertStatus,
        subject: Option<Pollutant>,
    },
}

/// One normalized measurement.
///
/// Produced by `normalize::normalize` from raw API records. `region` is
/// already translated to its display name when the raw key was a short code.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub region: String,
    pub pollutant: Pollutant,
    pub value: ReadingValue,
    /// Data time as published, e.g. "2024-05-01 13:00". Rendered as the
    /// message's data time; never used to order or deduplicate readings.
    pub timestamp: Option<String>,
    /// Free text attached to advisories, e.g. "PM10 2024-05-01 13:00 발령".
    pub issue: Option<String>,
}

impl Reading {
    pub fn concentration(&self) -> Option<f64> {
        match self.value {
            ReadingValue::Concentration(v) => Some(v),
            ReadingValue::Status { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Threshold types
// ---------------------------------------------------------------------------

/// Alert thresholds in ㎍/㎥. A reading at or above its threshold is
/// reported.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub pm10: f64,
    pub pm25: f64,
}

impl Default for Thresholds {
    /// The "나쁨" entry points used by the nationwide job.
    fn default() -> Self {
        Self { pm10: 81.0, pm25: 36.0 }
    }
}

impl Thresholds {
    /// Threshold for a numeric pollutant. `None` for advisories, which are
    /// never thresholded.
    pub fn for_pollutant(&self, pollutant: Pollutant) -> Option<f64> {
        match pollutant {
            Pollutant::Pm10 => Some(self.pm10),
            Pollutant::Pm25 => Some(self.pm25),
            Pollutant::AlertLevel => None,
        }
    }
}

/// Upper bounds (inclusive) of the first three severity bands.
///
/// Bands in ascending order:
///   value <= good < value <= moderate < value <= bad < value
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Breakpoints {
    pub good: f64,
    pub moderate: f64,
    pub bad: f64,
}

impl Breakpoints {
    pub const PM10: Breakpoints = Breakpoints { good: 30.0, moderate: 80.0, bad: 150.0 };
    pub const PM25: Breakpoints = Breakpoints { good: 15.0, moderate: 35.0, bad: 75.0 };

    pub fn is_ascending(&self) -> bool {
        self.good < self.moderate && self.moderate < self.bad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_code_parsing_accepts_both_pm25_spellings() {
        assert_eq!(Pollutant::from_item_code("PM25"), Some(Pollutant::Pm25));
        assert_eq!(Pollutant::from_item_code("pm2.5"), Some(Pollutant::Pm25));
        assert_eq!(Pollutant::from_item_code(" PM10 "), Some(Pollutant::Pm10));
        assert_eq!(Pollutant::from_item_code("O3"), None);
    }

    #[test]
    fn test_pollutant_display_matches_category_names() {
        assert_eq!(Pollutant::Pm10.to_string(), "PM10");
        assert_eq!(Pollutant::Pm25.to_string(), "PM2.5");
        assert_eq!(Pollutant::AlertLevel.to_string(), "ALERT_LEVEL");
    }

    #[test]
    fn test_band_ordering_is_ascending_severity() {
        assert!(Band::Good < Band::Moderate);
        assert!(Band::Moderate < Band::Bad);
        assert!(Band::Bad < Band::VeryBad);
    }

    #[test]
    fn test_advisories_have_no_threshold() {
        let t = Thresholds::default();
        assert_eq!(t.for_pollutant(Pollutant::Pm10), Some(81.0));
        assert_eq!(t.for_pollutant(Pollutant::Pm25), Some(36.0));
        assert_eq!(t.for_pollutant(Pollutant::AlertLevel), None);
    }

    #[test]
    fn test_default_breakpoints_are_ascending() {
        assert!(Breakpoints::PM10.is_ascending());
        assert!(Breakpoints::PM25.is_ascending());
        assert!(!Breakpoints { good: 50.0, moderate: 40.0, bad: 100.0 }.is_ascending());
    }
}
