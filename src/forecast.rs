//! Ultra-short-range forecast digest.
//!
//! KMA returns one record per (forecast time, category). Records are grouped
//! into slots by forecast date and time, in first-seen order, and each slot
//! renders as a sky line plus temperature, humidity and wind.

use serde_json::Value;

use crate::format::RenderMode;
use crate::model::RawRecord;

/// All forecast values for one forecast time, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSlot {
    pub date: String,
    /// "HHMM", as KMA sends it.
    pub time: String,
    pub values: Vec<(String, String)>,
}

impl ForecastSlot {
    pub fn value(&self, category: &str) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(c, _)| c == category)
            .map(|(_, v)| v.as_str())
    }

    /// "HH:MM"
    pub fn display_time(&self) -> String {
        clock(&self.time)
    }

    /// Precipitation type when it is raining or snowing, sky state otherwise.
    pub fn sky_text(&self) -> &'static str {
        match self.value("PTY") {
            Some(pty) if pty != "0" => precipitation_text(pty),
            _ => sky_state_text(self.value("SKY").unwrap_or("1")),
        }
    }
}

fn text(record: &RawRecord, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// "HHMM" → "HH:MM". Anything shorter is returned unchanged.
fn clock(hhmm: &str) -> String {
    match (hhmm.get(0..2), hhmm.get(2..4)) {
        (Some(h), Some(m)) => format!("{}:{}", h, m),
        _ => hhmm.to_string(),
    }
}

/// "YYYYMMDD" → "YYYY-MM-DD". Anything else is returned unchanged.
pub fn display_date(yyyymmdd: &str) -> String {
    match (yyyymmdd.get(0..4), yyyymmdd.get(4..6), yyyymmdd.get(6..8)) {
        (Some(y), Some(m), Some(d)) if yyyymmdd.len() == 8 => format!("{}-{}-{}", y, m, d),
        _ => yyyymmdd.to_string(),
    }
}

/// Precipitation type (`PTY`) code to text.
pub fn precipitation_text(code: &str) -> &'static str {
    match code {
        "1" => "🌧️ 비",
        "2" => "🌧️ 비/눈",
        "3" => "🌨️ 눈",
        "4" => "🌧️ 소나기",
        "5" => "🌦️ 빗방울",
        "6" => "🌨️ 빗방울눈날림",
        "7" => "🌨️ 눈날림",
        _ => "☀️ 맑음",
    }
}

/// Sky state (`SKY`) code to text.
pub fn sky_state_text(code: &str) -> &'static str {
    match code {
        "3" => "⛅ 구름많음",
        "4" => "☁️ 흐림",
        _ => "☀️ 맑음",
    }
}

/// Groups forecast records into slots. Records missing a category, time or
/// value are skipped.
pub fn group_by_time(records: &[RawRecord]) -> Vec<ForecastSlot> {
    let mut slots: Vec<ForecastSlot> = Vec::new();
    for record in records {
        let (Some(time), Some(category), Some(value)) = (
            text(record, "fcstTime"),
            text(record, "category"),
            text(record, "fcstValue"),
        ) else {
            continue;
        };
        let date = text(record, "fcstDate").unwrap_or_default();

        match slots.iter_mut().find(|s| s.date == date && s.time == time) {
            Some(slot) => slot.values.push((category, value)),
            None => slots.push(ForecastSlot {
                date,
                time,
                values: vec![(category, value)],
            }),
        }
    }
    slots
}

/// Renders the digest. `location` is a display name for the grid point.
pub fn format_forecast(
    slots: &[ForecastSlot],
    location: &str,
    base_date: &str,
    base_time: &str,
    mode: RenderMode,
) -> String {
    let title = format!(
        "🌤️ {} 날씨 예보 ({} {} 기준)",
        location,
        display_date(base_date),
        clock(base_time)
    );
    let mut blocks = vec![mode.bold(&title)];

    for slot in slots {
        let mut lines = vec![mode.bold(&slot.display_time())];
        lines.push(mode.text(&format!("• {}", slot.sky_text())));

        // T1H is the ultra-short category, TMP the short-range one.
        if let Some(t) = slot.value("T1H").or_else(|| slot.value("TMP")) {
            lines.push(mode.text(&format!("• 기온: {}°C", t)));
        }
        if let Some(h) = slot.value("REH") {
            lines.push(mode.text(&format!("• 습도: {}%", h)));
        }
        if let Some(w) = slot.value("WSD") {
            lines.push(mode.text(&format!("• 풍속: {}m/s", w)));
        }
        blocks.push(lines.join("\n"));
    }

    blocks.join("\n\n")
}
