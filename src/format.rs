//! Message rendering.
//!
//! Turns an `AlertBatch` (or a report) into the text body handed to the
//! notifier. In `MarkdownV2` mode every piece of text that is not markup is
//! escaped; Telegram rejects the whole message if a single reserved
//! character slips through unescaped.

use serde::Deserialize;

use crate::aggregate::{dedup_last_write_wins, AlertBatch};
use crate::classify::Classifier;
use crate::model::{Pollutant, Reading};

/// Characters Telegram MarkdownV2 treats as markup.
pub const RESERVED: [char; 19] = [
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

/// How the body is marked up, and therefore how the transport must send it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// No markup at all.
    Plain,
    /// Telegram legacy Markdown: `*bold*`, no escaping.
    #[default]
    Markdown,
    /// Telegram MarkdownV2: `*bold*`, reserved characters escaped.
    MarkdownV2,
}

impl RenderMode {
    /// Value of Telegram's `parse_mode` field, if any.
    pub fn parse_mode(self) -> Option<&'static str> {
        match self {
            RenderMode::Plain => None,
            RenderMode::Markdown => Some("Markdown"),
            RenderMode::MarkdownV2 => Some("MarkdownV2"),
        }
    }

    pub fn is_escaped(self) -> bool {
        self == RenderMode::MarkdownV2
    }

    /// Escapes free text for this mode.
    pub fn text(self, text: &str) -> String {
        if self.is_escaped() {
            escape_markdown(text)
        } else {
            text.to_string()
        }
    }

    /// Renders `text` bold, or as-is in plain mode.
    pub fn bold(self, text: &str) -> String {
        match self {
            RenderMode::Plain => text.to_string(),
            RenderMode::Markdown | RenderMode::MarkdownV2 => format!("*{}*", self.text(text)),
        }
    }
}

/// Whether an all-clear result is still delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyPolicy {
    #[default]
    Deliver,
    Skip,
}

/// Fixed texts used by the formatter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub pm10_label: String,
    pub pm25_label: String,
    pub advisory_label: String,
    /// Prefix of the data-time line closing an alert message.
    pub as_of_label: String,
    pub all_clear: String,
    pub no_data: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            pm10_label: "미세먼지(PM10):".to_string(),
            pm25_label: "초미세먼지(PM2.5):".to_string(),
            advisory_label: "🚨 미세먼지 경보 발령 현황:".to_string(),
            as_of_label: "🕐 기준 시각:".to_string(),
            all_clear: "✅ 모든 지역의 미세먼지가 기준 이하입니다.".to_string(),
            no_data: "❌ 데이터를 가져올 수 없습니다.".to_string(),
        }
    }
}

impl Messages {
    pub fn label(&self, category: Pollutant) -> &str {
        match category {
            Pollutant::Pm10 => &self.pm10_label,
            Pollutant::Pm25 => &self.pm25_label,
            Pollutant::AlertLevel => &self.advisory_label,
        }
    }
}

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

/// Prefixes every reserved character with a backslash.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if RESERVED.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Inverse of `escape_markdown`: drops one backslash before each reserved
/// character.
pub fn unescape_markdown(text: &str) -> String {
    let mut unescaped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if RESERVED.contains(&next) {
                    unescaped.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        unescaped.push(c);
    }
    unescaped
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Renders a batch. Never returns an empty string: an empty batch renders
/// as the all-clear message.
///
/// A batch with a data time ends with an `as_of_label` line.
pub fn format(batch: &AlertBatch, mode: RenderMode, messages: &Messages) -> String {
    if batch.is_empty() {
        return mode.text(&messages.all_clear);
    }

    let mut blocks: Vec<String> = batch
        .sections
        .iter()
        .filter(|s| !s.entries.is_empty())
        .map(|section| {
            let mut lines = vec![mode.bold(messages.label(section.category))];
            lines.extend(section.entries.iter().map(|e| mode.text(&e.line())));
            lines.join("\n")
        })
        .collect();

    if let Some(as_of) = &batch.as_of {
        blocks.push(mode.text(&format!("{} {}", messages.as_of_label, as_of)));
    }
    blocks.join("\n\n")
}

/// Renders the daily statistics report: every city with both grades, in
/// first-seen order. Readings for the same city and pollutant are
/// deduplicated, last one wins.
pub fn format_daily_report(
    readings: &[Reading],
    date: &str,
    mode: RenderMode,
    classifier: &Classifier,
    messages: &Messages,
) -> String {
    if readings.is_empty() {
        return mode.text(&messages.no_data);
    }

    let readings = dedup_last_write_wins(readings);
    let mut regions: Vec<&str> = Vec::new();
    for reading in &readings {
        if !regions.contains(&reading.region.as_str()) {
            regions.push(&reading.region);
        }
    }

    let mut blocks = vec![mode.bold(&format!("📊 전국 미세먼지 일간 통계 ({})", date))];
    for region in regions {
        let mut lines = vec![mode.bold(region)];
        for pollutant in Pollutant::NUMERIC {
            let value = readings
                .iter()
                .find(|r| r.region == region && r.pollutant == pollutant)
                .and_then(|r| r.concentration());
            if let Some(v) = value {
                let grade = classifier.classify(v, pollutant);
                lines.push(mode.text(&format!("• {}: {}㎍/㎥ ({})", pollutant, v, grade)));
            }
        }
        blocks.push(lines.join("\n"));
    }
    blocks.join("\n\n")
}
