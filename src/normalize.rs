//! Raw record normalization.
//!
//! data.go.kr endpoints disagree on record shape. `SourceFormat` names the
//! shape of one endpoint and `normalize` turns its records into uniform
//! `Reading`s. Records with a missing or non-numeric value are dropped with
//! a diagnostic; they never default to zero.

use serde_json::Value;

use crate::classify::classify_status;
use crate::logging::{self, DataSource};
use crate::model::{Pollutant, RawRecord, Reading, ReadingValue};
use crate::regions::RegionTable;

/// Pivot-table keys that describe the row rather than name a region.
pub const PIVOT_METADATA_KEYS: &[&str] = &["dataTime", "itemCode", "dataGubun", "searchCondition"];

/// Shape of the records returned by one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceFormat {
    /// One object per region; each declared field holds one pollutant.
    Flat {
        region_field: String,
        fields: Vec<(Pollutant, String)>,
        timestamp_field: Option<String>,
    },
    /// One object per pollutant; every non-metadata key is a region code
    /// whose value is that region's concentration.
    Pivot {
        pollutant_field: String,
        /// Used when a row carries no recognizable `pollutant_field`.
        default_pollutant: Option<Pollutant>,
        metadata_keys: Vec<String>,
        timestamp_field: Option<String>,
    },
    /// One advisory per object, carrying a status phrase.
    Alert {
        /// Tried in order; the first non-empty one names the region.
        region_fields: Vec<String>,
        status_field: String,
        subject_field: Option<String>,
        /// A non-empty value here means the advisory has been lifted,
        /// whatever the status phrase says.
        cleared_field: Option<String>,
        /// Joined with spaces into `Reading::issue`.
        issue_fields: Vec<String>,
        timestamp_field: Option<String>,
    },
}

impl SourceFormat {
    /// AirKorea real-time measurements per station (`getCtprvnRltmMesureDnsty`).
    pub fn realtime(region_field: &str) -> Self {
        SourceFormat::Flat {
            region_field: region_field.to_string(),
            fields: vec![
                (Pollutant::Pm10, "pm10Value".to_string()),
                (Pollutant::Pm25, "pm25Value".to_string()),
            ],
            timestamp_field: Some("dataTime".to_string()),
        }
    }

    /// AirKorea daily statistics per city (`ArpltnStatsSvc/getCtprvnMesureLIst`).
    pub fn daily_stats() -> Self {
        SourceFormat::Flat {
            region_field: "cityName".to_string(),
            fields: vec![
                (Pollutant::Pm10, "pm10Value".to_string()),
                (Pollutant::Pm25, "pm25Value".to_string()),
            ],
            timestamp_field: Some("dataTime".to_string()),
        }
    }

    /// AirKorea per-province averages, one row per pollutant
    /// (`getCtprvnMesureLIst`).
    pub fn hourly_pivot(pollutant: Pollutant) -> Self {
        SourceFormat::Pivot {
            pollutant_field: "itemCode".to_string(),
            default_pollutant: Some(pollutant),
            metadata_keys: PIVOT_METADATA_KEYS.iter().map(|k| k.to_string()).collect(),
            timestamp_field: Some("dataTime".to_string()),
        }
    }

    /// AirKorea particulate-matter advisories (`getUlfptcaAlarmInfo`).
    pub fn advisory() -> Self {
        SourceFormat::Alert {
            region_fields: vec!["moveName".to_string(), "districtName".to_string()],
            status_field: "issueGbn".to_string(),
            subject_field: Some("itemCode".to_string()),
            cleared_field: Some("clearDate".to_string()),
            issue_fields: vec!["issueDate".to_string(), "issueTime".to_string()],
            timestamp_field: Some("dataDate".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Coerces a raw value to a concentration.
///
/// AirKorea sends numbers as strings and uses "-" or "" for missing data.
/// Returns `None` for anything that is not a finite, non-negative number.
pub fn parse_concentration(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (number.is_finite() && number >= 0.0).then_some(number)
}

/// Reads a field as trimmed, non-empty text. Numbers are stringified.
fn text_field(record: &RawRecord, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn optional_text(record: &RawRecord, field: Option<&String>) -> Option<String> {
    field.and_then(|f| text_field(record, f))
}

fn drop_record(region: Option<&str>, reason: &str) {
    logging::warn(DataSource::AirKorea, region, &format!("dropping record: {}", reason));
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Converts raw records into readings, in input order.
pub fn normalize(records: &[RawRecord], format: &SourceFormat, regions: &RegionTable) -> Vec<Reading> {
    let mut readings = Vec::new();
    for record in records {
        match format {
            SourceFormat::Flat { region_field, fields, timestamp_field } => {
                normalize_flat(record, region_field, fields, timestamp_field.as_ref(), regions, &mut readings)
            }
            SourceFormat::Pivot { pollutant_field, default_pollutant, metadata_keys, timestamp_field } => {
                normalize_pivot(
                    record,
                    pollutant_field,
                    *default_pollutant,
                    metadata_keys,
                    timestamp_field.as_ref(),
                    regions,
                    &mut readings,
                )
            }
            SourceFormat::Alert {
                region_fields,
                status_field,
                subject_field,
                cleared_field,
                issue_fields,
                timestamp_field,
            } => {
                let Some(region) = region_fields.iter().find_map(|f| text_field(record, f)) else {
                    drop_record(None, &format!("advisory without any of {:?}", region_fields));
                    continue;
                };
                let region = regions.display_name(&region).to_string();

                let cleared = optional_text(record, cleared_field.as_ref()).is_some();
                let status = if cleared {
                    classify_status("해제")
                } else {
                    match text_field(record, status_field) {
                        Some(phrase) => classify_status(&phrase),
                        None => {
                            drop_record(Some(&region), &format!("missing status field '{}'", status_field));
                            continue;
                        }
                    }
                };

                let subject = optional_text(record, subject_field.as_ref())
                    .and_then(|code| Pollutant::from_item_code(&code));
                let issue: Vec<String> = issue_fields.iter().filter_map(|f| text_field(record, f)).collect();

                readings.push(Reading {
                    region,
                    pollutant: Pollutant::AlertLevel,
                    value: ReadingValue::Status { status, subject },
                    timestamp: optional_text(record, timestamp_field.as_ref()),
                    issue: (!issue.is_empty()).then(|| issue.join(" ")),
                });
            }
        }
    }
    readings
}

fn normalize_flat(
    record: &RawRecord,
    region_field: &str,
    fields: &[(Pollutant, String)],
    timestamp_field: Option<&String>,
    regions: &RegionTable,
    readings: &mut Vec<Reading>,
) {
    let Some(region) = text_field(record, region_field) else {
        drop_record(None, &format!("missing region field '{}'", region_field));
        return;
    };
    let region = regions.display_name(&region).to_string();
    let timestamp = optional_text(record, timestamp_field);

    for (pollutant, field) in fields {
        match record.get(field).and_then(parse_concentration) {
            Some(value) => readings.push(Reading {
                region: region.clone(),
                pollutant: *pollutant,
                value: ReadingValue::Concentration(value),
                timestamp: timestamp.clone(),
                issue: None,
            }),
            None => drop_record(
                Some(&region),
                &format!("{} field '{}' is missing or not a number: {:?}", pollutant, field, record.get(field)),
            ),
        }
    }
}

fn normalize_pivot(
    record: &RawRecord,
    pollutant_field: &str,
    default_pollutant: Option<Pollutant>,
    metadata_keys: &[String],
    timestamp_field: Option<&String>,
    regions: &RegionTable,
    readings: &mut Vec<Reading>,
) {
    let pollutant = text_field(record, pollutant_field)
        .and_then(|code| Pollutant::from_item_code(&code))
        .or(default_pollutant);
    let Some(pollutant) = pollutant else {
        drop_record(None, &format!("pivot row without a usable '{}'", pollutant_field));
        return;
    };
    let timestamp = optional_text(record, timestamp_field);

    for (key, value) in record {
        if metadata_keys.iter().any(|m| m == key) {
            continue;
        }
        let region = regions.display_name(key);
        match parse_concentration(value) {
            Some(v) => readings.push(Reading {
                region: region.to_string(),
                pollutant,
                value: ReadingValue::Concentration(v),
                timestamp: timestamp.clone(),
                issue: None,
            }),
            None => drop_record(Some(region), &format!("{} value is not a number: {}", pollutant, value)),
        }
    }
}
