//! Severity classification.
//!
//! Numeric readings are banded with per-pollutant breakpoint tables; advisory
//! records are mapped through a fixed status-phrase table. Banding is for
//! display only: whether a reading is reported at all is decided by the
//! aggregator's threshold comparison.

use crate::model::{AlertStatus, Band, Breakpoints, Grade, Pollutant, Reading, ReadingValue};

/// Status phrases used by AirKorea advisory records, plus English aliases.
const STATUS_TABLE: &[(&str, AlertStatus)] = &[
    ("주의보", AlertStatus::Watch),
    ("경보", AlertStatus::Warning),
    ("해제", AlertStatus::Lifted),
    ("watch", AlertStatus::Watch),
    ("warning", AlertStatus::Warning),
    ("lifted", AlertStatus::Lifted),
];

/// Maps an advisory status phrase to its status. Unrecognized phrases map
/// to `AlertStatus::Unknown` instead of failing.
pub fn classify_status(phrase: &str) -> AlertStatus {
    let phrase = phrase.trim();
    STATUS_TABLE
        .iter()
        .find(|(p, _)| p.eq_ignore_ascii_case(phrase))
        .map(|(_, status)| *status)
        .unwrap_or(AlertStatus::Unknown)
}

/// Bands a value against one breakpoint table. Upper bounds are inclusive:
/// a value equal to a breakpoint stays in the lower band.
pub fn band(value: f64, breakpoints: &Breakpoints) -> Band {
    if value <= breakpoints.good {
        Band::Good
    } else if value <= breakpoints.moderate {
        Band::Moderate
    } else if value <= breakpoints.bad {
        Band::Bad
    } else {
        Band::VeryBad
    }
}

/// Breakpoint tables for every numeric pollutant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classifier {
    pub pm10: Breakpoints,
    pub pm25: Breakpoints,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            pm10: Breakpoints::PM10,
            pm25: Breakpoints::PM25,
        }
    }
}

impl Classifier {
    /// Bands a numeric value. Advisories have no breakpoints and are
    /// banded as PM10, which never happens through `grade`.
    pub fn classify(&self, value: f64, pollutant: Pollutant) -> Band {
        match pollutant {
            Pollutant::Pm25 => band(value, &self.pm25),
            Pollutant::Pm10 | Pollutant::AlertLevel => band(value, &self.pm10),
        }
    }

    /// Grade of a normalized reading.
    pub fn grade(&self, reading: &Reading) -> Grade {
        match reading.value {
            ReadingValue::Concentration(v) => Grade::Numeric(self.classify(v, reading.pollutant)),
            ReadingValue::Status { status, .. } => Grade::Alert(status),
        }
    }
}
