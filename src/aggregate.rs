//! Deduplication, threshold filtering and grouping.
//!
//! `aggregate` is a pure function of its inputs: readings are deduplicated
//! by `AggregationKey` (last write wins, first position kept), numeric
//! readings below their threshold and lifted advisories are dropped, and
//! the survivors are grouped per category.

use std::collections::HashMap;

use crate::classify::Classifier;
use crate::model::{AlertStatus, Grade, Pollutant, Reading, ReadingValue, Thresholds};

/// Identity of a reading for deduplication.
///
/// Advisories are keyed by the pollutant they were issued for as well, so a
/// PM10 and a PM2.5 advisory for the same zone are separate entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregationKey {
    pub region: String,
    pub pollutant: Pollutant,
    pub subject: Option<Pollutant>,
}

impl AggregationKey {
    pub fn of(reading: &Reading) -> Self {
        let subject = match reading.value {
            ReadingValue::Status { subject, .. } => subject,
            ReadingValue::Concentration(_) => None,
        };
        Self {
            region: reading.region.clone(),
            pollutant: reading.pollutant,
            subject,
        }
    }
}

/// A reading that made it into the batch, with its grade.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEntry {
    pub region: String,
    pub value: ReadingValue,
    pub grade: Grade,
    pub issue: Option<String>,
}

impl AlertEntry {
    /// Display line, e.g. `• 서울: 90㎍/㎥ (😷 나쁨)`. Not escaped.
    pub fn line(&self) -> String {
        match self.value {
            ReadingValue::Concentration(v) => {
                format!("• {}: {}㎍/㎥ ({})", self.region, v, self.grade)
            }
            ReadingValue::Status { subject, .. } => {
                let mut line = format!("• {}: ", self.region);
                if let Some(subject) = subject {
                    line.push_str(&format!("{} ", subject));
                }
                line.push_str(&self.grade.to_string());
                if let Some(issue) = &self.issue {
                    line.push_str(&format!(" ({})", issue));
                }
                line
            }
        }
    }
}

/// Entries of one category, in first-insertion order of their keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub category: Pollutant,
    pub entries: Vec<AlertEntry>,
}

/// Everything worth reporting from one run. Sections are in
/// `Pollutant::ALL` order and never empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlertBatch {
    pub sections: Vec<Section>,
    /// Newest data time among the reported readings, if any carried one.
    pub as_of: Option<String>,
}

impl AlertBatch {
    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.entries.is_empty())
    }

    /// Total number of entries across all sections.
    pub fn len(&self) -> usize {
        self.sections.iter().map(|s| s.entries.len()).sum()
    }

    pub fn section(&self, category: Pollutant) -> Option<&Section> {
        self.sections.iter().find(|s| s.category == category)
    }
}

/// Keeps the last reading per key, at the position the key first appeared.
pub fn dedup_last_write_wins(readings: &[Reading]) -> Vec<&Reading> {
    let mut positions: HashMap<AggregationKey, usize> = HashMap::new();
    let mut kept: Vec<&Reading> = Vec::new();
    for reading in readings {
        let key = AggregationKey::of(reading);
        match positions.get(&key) {
            Some(&i) => kept[i] = reading,
            None => {
                positions.insert(key, kept.len());
                kept.push(reading);
            }
        }
    }
    kept
}

/// Whether a deduplicated reading belongs in the batch.
///
/// Numeric readings need `value >= threshold`; advisories bypass the
/// thresholds and survive unless lifted.
pub fn qualifies(reading: &Reading, thresholds: &Thresholds) -> bool {
    match reading.value {
        ReadingValue::Concentration(v) => thresholds
            .for_pollutant(reading.pollutant)
            .is_some_and(|t| v >= t),
        ReadingValue::Status { status, .. } => status != AlertStatus::Lifted,
    }
}

pub fn aggregate(readings: &[Reading], thresholds: &Thresholds, classifier: &Classifier) -> AlertBatch {
    let survivors: Vec<&Reading> = dedup_last_write_wins(readings)
        .into_iter()
        .filter(|r| qualifies(r, thresholds))
        .collect();

    let sections = Pollutant::ALL
        .iter()
        .filter_map(|&category| {
            let entries: Vec<AlertEntry> = survivors
                .iter()
                .filter(|r| r.pollutant == category)
                .map(|r| AlertEntry {
                    region: r.region.clone(),
                    value: r.value,
                    grade: classifier.grade(r),
                    issue: r.issue.clone(),
                })
                .collect();
            (!entries.is_empty()).then_some(Section { category, entries })
        })
        .collect();

    // data.go.kr times ("2024-05-01 13:00", "2024-05-01") sort as text.
    let as_of = survivors.iter().filter_map(|r| r.timestamp.clone()).max();

    AlertBatch { sections, as_of }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Band;

    fn pm(region: &str, pollutant: Pollutant, value: f64) -> Reading {
        Reading {
            region: region.to_string(),
            pollutant,
            value: ReadingValue::Concentration(value),
            timestamp: None,
            issue: None,
        }
    }

    fn pm_at(region: &str, pollutant: Pollutant, value: f64, time: &str) -> Reading {
        Reading {
            timestamp: Some(time.to_string()),
            ..pm(region, pollutant, value)
        }
    }

    fn advisory(region: &str, status: AlertStatus, subject: Option<Pollutant>) -> Reading {
        Reading {
            region: region.to_string(),
            pollutant: Pollutant::AlertLevel,
            value: ReadingValue::Status { status, subject },
            timestamp: None,
            issue: None,
        }
    }

    #[test]
    fn test_last_write_wins_for_same_key() {
        let readings = vec![pm("서울", Pollutant::Pm10, 85.0), pm("서울", Pollutant::Pm10, 90.0)];
        let batch = aggregate(&readings, &Thresholds { pm10: 81.0, pm25: 36.0 }, &Classifier::default());

        let section = batch.section(Pollutant::Pm10).expect("PM10 section should exist");
        assert_eq!(section.entries.len(), 1, "서울/PM10 must appear exactly once");
        assert_eq!(section.entries[0].value, ReadingValue::Concentration(90.0));
        assert_eq!(section.entries[0].grade, Grade::Numeric(Band::Bad));
        assert_eq!(section.entries[0].line(), "• 서울: 90㎍/㎥ (😷 나쁨)");
    }

    #[test]
    fn test_later_low_value_overrides_earlier_high_value() {
        // Dedup happens before filtering: the latest reading decides.
        let readings = vec![pm("서울", Pollutant::Pm10, 120.0), pm("서울", Pollutant::Pm10, 40.0)];
        let batch = aggregate(&readings, &Thresholds::default(), &Classifier::default());
        assert!(batch.is_empty());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let thresholds = Thresholds { pm10: 81.0, pm25: 36.0 };
        let at = vec![pm("부산", Pollutant::Pm10, 81.0), pm("대구", Pollutant::Pm25, 36.0)];
        let below = vec![pm("부산", Pollutant::Pm10, 80.0), pm("대구", Pollutant::Pm25, 35.0)];

        assert_eq!(aggregate(&at, &thresholds, &Classifier::default()).len(), 2);
        assert!(aggregate(&below, &thresholds, &Classifier::default()).is_empty());
    }

    #[test]
    fn test_entries_keep_first_insertion_order() {
        let readings = vec![
            pm("인천", Pollutant::Pm10, 100.0),
            pm("경기", Pollutant::Pm10, 200.0),
            pm("인천", Pollutant::Pm10, 95.0),
            pm("강원", Pollutant::Pm10, 90.0),
        ];
        let batch = aggregate(&readings, &Thresholds::default(), &Classifier::default());
        let regions: Vec<_> = batch.sections[0].entries.iter().map(|e| e.region.as_str()).collect();
        assert_eq!(regions, vec!["인천", "경기", "강원"], "order is by first key insertion, not by value");
    }

    #[test]
    fn test_sections_follow_category_order_and_skip_empty() {
        let readings = vec![
            advisory("서울", AlertStatus::Warning, Some(Pollutant::Pm10)),
            pm("서울", Pollutant::Pm25, 50.0),
        ];
        let batch = aggregate(&readings, &Thresholds::default(), &Classifier::default());
        let categories: Vec<_> = batch.sections.iter().map(|s| s.category).collect();
        assert_eq!(categories, vec![Pollutant::Pm25, Pollutant::AlertLevel]);
    }

    #[test]
    fn test_advisories_bypass_thresholds_unless_lifted() {
        let readings = vec![
            advisory("서울 동남권", AlertStatus::Watch, Some(Pollutant::Pm10)),
            advisory("경기 북부권", AlertStatus::Lifted, Some(Pollutant::Pm10)),
            advisory("제주", AlertStatus::Unknown, None),
        ];
        let thresholds = Thresholds { pm10: 1000.0, pm25: 1000.0 };
        let batch = aggregate(&readings, &thresholds, &Classifier::default());
        let section = batch.section(Pollutant::AlertLevel).expect("advisory section should exist");
        let regions: Vec<_> = section.entries.iter().map(|e| e.region.as_str()).collect();
        assert_eq!(regions, vec!["서울 동남권", "제주"]);
    }

    #[test]
    fn test_advisory_lifted_later_disappears() {
        let readings = vec![
            advisory("서울 동남권", AlertStatus::Warning, Some(Pollutant::Pm25)),
            advisory("서울 동남권", AlertStatus::Lifted, Some(Pollutant::Pm25)),
        ];
        let batch = aggregate(&readings, &Thresholds::default(), &Classifier::default());
        assert!(batch.is_empty());
    }

    #[test]
    fn test_advisories_for_different_subjects_are_separate_keys() {
        let readings = vec![
            advisory("서울 동남권", AlertStatus::Watch, Some(Pollutant::Pm10)),
            advisory("서울 동남권", AlertStatus::Watch, Some(Pollutant::Pm25)),
        ];
        let batch = aggregate(&readings, &Thresholds::default(), &Classifier::default());
        assert_eq!(batch.len(), 2);
        assert_eq!(
            batch.sections[0].entries[1].line(),
            "• 서울 동남권: PM2.5 ⚠️ 주의보"
        );
    }

    #[test]
    fn test_as_of_is_newest_time_among_reported_readings() {
        let readings = vec![
            pm_at("서울", Pollutant::Pm10, 90.0, "2024-05-01 12:00"),
            pm_at("부산", Pollutant::Pm25, 40.0, "2024-05-01 13:00"),
            pm_at("대구", Pollutant::Pm10, 20.0, "2024-05-01 14:00"),
        ];
        let batch = aggregate(&readings, &Thresholds::default(), &Classifier::default());
        assert_eq!(
            batch.as_of.as_deref(),
            Some("2024-05-01 13:00"),
            "대구 is below threshold, so its time is not the batch time"
        );
    }

    #[test]
    fn test_as_of_is_none_without_timestamps() {
        let readings = vec![pm("서울", Pollutant::Pm10, 90.0)];
        let batch = aggregate(&readings, &Thresholds::default(), &Classifier::default());
        assert_eq!(batch.as_of, None);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let readings = vec![
            pm("서울", Pollutant::Pm10, 85.0),
            pm("부산", Pollutant::Pm25, 40.0),
            pm("서울", Pollutant::Pm10, 90.0),
            advisory("대구", AlertStatus::Watch, None),
        ];
        let first = aggregate(&readings, &Thresholds::default(), &Classifier::default());
        let second = aggregate(&readings, &Thresholds::default(), &Classifier::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_input_gives_empty_batch() {
        let batch = aggregate(&[], &Thresholds::default(), &Classifier::default());
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
        assert!(batch.sections.is_empty());
    }
}
