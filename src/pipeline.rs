/// Job orchestration.
///
/// Every job has a fetch step (network) and a run step. The run steps take
/// already-fetched results, so a whole job can be replayed offline from
/// fixture bodies with a recording notifier.
///
/// # Clock injection
/// `run_job` takes `now` rather than reading the clock, so the default
/// search date, the advisory year and the forecast base time are
/// deterministic under test.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use reqwest::blocking::Client;

use crate::aggregate::aggregate;
use crate::config::{Config, Credentials};
use crate::error::{ConfigError, FetchError, NotifyError, RunError};
use crate::forecast::{format_forecast, group_by_time};
use crate::format::{self, format_daily_report, EmptyPolicy};
use crate::ingest::airkorea::{self, AirKorea};
use crate::ingest::kma;
use crate::logging::{self, DataSource};
use crate::model::{RawRecord, Reading};
use crate::normalize::{normalize, SourceFormat};
use crate::notify::{Notifier, Payload};
use crate::regions::{self, RegionTable};

pub const USAGE: &str =
    "usage: dustmon [--dry-run] [hourly | realtime [SIDO] | advisory | daily [YYYYMMDD] | forecast]";

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Per-province hourly averages, PM10 and PM2.5 fetched concurrently.
    Hourly,
    /// Station measurements for one province, or every province.
    Realtime { sido: Option<String> },
    Advisory,
    /// Per-city daily statistics. `None` means yesterday.
    Daily { date: Option<NaiveDate> },
    Forecast,
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::Hourly => "hourly",
            Job::Realtime { .. } => "realtime",
            Job::Advisory => "advisory",
            Job::Daily { .. } => "daily",
            Job::Forecast => "forecast",
        }
    }
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub job: Job,
    /// Print the message instead of sending it.
    pub dry_run: bool,
}

/// Parses the arguments after the program name.
pub fn parse_args<I, S>(args: I) -> Result<Invocation, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let usage = |problem: String| ConfigError::Invalid(format!("{}\n{}", problem, USAGE));

    let mut dry_run = false;
    let mut words: Vec<String> = Vec::new();
    for arg in args {
        match arg.as_ref() {
            "--dry-run" => dry_run = true,
            flag if flag.starts_with('-') => return Err(usage(format!("unknown option '{}'", flag))),
            word => words.push(word.to_string()),
        }
    }

    if words.len() > 2 {
        return Err(usage(format!("unexpected argument '{}'", words[2])));
    }
    let argument = words.get(1).cloned();

    let job = match words.first().map(String::as_str) {
        None | Some("hourly") => Job::Hourly,
        Some("advisory") => Job::Advisory,
        Some("forecast") => Job::Forecast,
        Some("realtime") => {
            if let Some(sido) = &argument {
                if !regions::is_known_sido(sido) {
                    return Err(usage(format!("'{}' is not a province name", sido)));
                }
            }
            Job::Realtime { sido: argument.clone() }
        }
        Some("daily") => Job::Daily {
            date: argument.as_deref().map(parse_search_date).transpose()?,
        },
        Some(other) => return Err(usage(format!("unknown job '{}'", other))),
    };

    let takes_argument = matches!(job, Job::Realtime { .. } | Job::Daily { .. });
    if let (Some(extra), false) = (&argument, takes_argument) {
        return Err(usage(format!("job '{}' takes no argument, got '{}'", job.name(), extra)));
    }

    Ok(Invocation { job, dry_run })
}

/// Parses a `YYYYMMDD` search date.
pub fn parse_search_date(text: &str) -> Result<NaiveDate, ConfigError> {
    let well_formed = text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit());
    NaiveDate::parse_from_str(text, "%Y%m%d")
        .ok()
        .filter(|_| well_formed)
        .ok_or_else(|| ConfigError::Invalid(format!("'{}' is not a YYYYMMDD date", text)))
}

/// The day before `now`, in `now`'s offset.
pub fn default_search_date(now: DateTime<FixedOffset>) -> NaiveDate {
    let today = now.date_naive();
    today.pred_opt().unwrap_or(today)
}

// ---------------------------------------------------------------------------
// Fetch step
// ---------------------------------------------------------------------------

/// One API response, paired with the shape its records have.
#[derive(Debug)]
pub struct Fetched {
    /// Names the request in logs, e.g. "PM10 hourly".
    pub query: String,
    pub format: SourceFormat,
    pub result: Result<Vec<RawRecord>, FetchError>,
}

/// A forecast response with the base time it was requested for.
#[derive(Debug)]
pub struct ForecastFetch {
    pub base_date: String,
    pub base_time: String,
    pub result: Result<Vec<RawRecord>, FetchError>,
}

pub fn fetch_hourly(api: &AirKorea<'_>) -> Vec<Fetched> {
    airkorea::fetch_hourly_pair(api)
        .into_iter()
        .map(|(pollutant, result)| Fetched {
            query: format!("{} hourly", pollutant),
            format: SourceFormat::hourly_pivot(pollutant),
            result,
        })
        .collect()
}

/// Nationwide queries are reported per province, single-province queries
/// per station.
pub fn fetch_realtime(api: &AirKorea<'_>, sido: &str, rows: u32) -> Fetched {
    let region_field = if sido == regions::NATIONWIDE { "sidoName" } else { "stationName" };
    Fetched {
        query: format!("realtime {}", sido),
        format: SourceFormat::realtime(region_field),
        result: airkorea::fetch_realtime(api, sido, rows),
    }
}

pub fn fetch_advisory(api: &AirKorea<'_>, year: i32, rows: u32) -> Fetched {
    advisory_source(year, airkorea::fetch_advisories(api, year, rows))
}

/// Wraps an advisory response, newest first as AirKorea returns it, in
/// oldest-first order.
///
/// Aggregation keeps the last record per zone and pollutant, so the most
/// recent issue or clearance for a zone must come last.
pub fn advisory_source(year: i32, result: Result<Vec<RawRecord>, FetchError>) -> Fetched {
    Fetched {
        query: format!("advisories {}", year),
        format: SourceFormat::advisory(),
        result: result.map(|mut records| {
            records.reverse();
            records
        }),
    }
}

pub fn fetch_daily(api: &AirKorea<'_>, date: NaiveDate, rows: u32) -> Fetched {
    let search_date = date.format("%Y%m%d").to_string();
    Fetched {
        query: format!("daily stats {}", search_date),
        format: SourceFormat::daily_stats(),
        result: airkorea::fetch_daily_stats(api, &search_date, rows),
    }
}

pub fn fetch_forecast(
    client: &Client,
    config: &Config,
    service_key: &str,
    now: DateTime<FixedOffset>,
) -> ForecastFetch {
    let (base_date, base_time) = kma::base_datetime_at(now);
    let result = kma::fetch_ultra_short_forecast(
        client,
        &config.kma_base_url,
        service_key,
        config.grid,
        &base_date,
        &base_time,
    );
    ForecastFetch {
        base_date,
        base_time,
        result,
    }
}

// ---------------------------------------------------------------------------
// Run step
// ---------------------------------------------------------------------------

/// Counts for one finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub fetched: usize,
    pub readings: usize,
    pub reported: usize,
    /// False when the empty policy suppressed delivery.
    pub delivered: bool,
}

/// Normalizes every successful response and logs every failed one.
/// Returns the raw record count alongside the readings.
fn collect_readings(fetched: &[Fetched], regions: &RegionTable) -> (usize, Vec<Reading>) {
    let mut record_count = 0;
    let mut readings = Vec::new();
    for f in fetched {
        match &f.result {
            Ok(records) => {
                record_count += records.len();
                readings.extend(normalize(records, &f.format, regions));
            }
            Err(e) => logging::log_fetch_failure(DataSource::AirKorea, &f.query, e),
        }
    }
    (record_count, readings)
}

/// Hands `text` to the notifier unless it is empty and the policy says skip.
fn deliver(text: String, empty: bool, config: &Config, notifier: &dyn Notifier) -> Result<bool, NotifyError> {
    if empty && config.empty_policy == EmptyPolicy::Skip {
        logging::info(DataSource::System, None, "nothing to report, delivery skipped");
        return Ok(false);
    }

    let payload = Payload::new(text, config.render_mode);
    match notifier.send(&payload) {
        Ok(()) => {
            logging::info(DataSource::Telegram, None, &format!("delivered via {}", notifier.name()));
            Ok(true)
        }
        Err(e) => {
            logging::error(
                DataSource::Telegram,
                None,
                &format!("delivery via {} failed: {}", notifier.name(), e),
            );
            Err(e)
        }
    }
}

/// Threshold alert: normalize, aggregate, format, deliver.
pub fn run_alert(
    job: &str,
    fetched: &[Fetched],
    config: &Config,
    notifier: &dyn Notifier,
) -> Result<RunReport, NotifyError> {
    let (record_count, readings) = collect_readings(fetched, &config.regions);
    let batch = aggregate(&readings, &config.thresholds, &config.classifier);
    let text = format::format(&batch, config.render_mode, &config.messages);

    logging::log_run_summary(job, record_count, readings.len(), batch.len());
    let delivered = deliver(text, batch.is_empty(), config, notifier)?;

    Ok(RunReport {
        fetched: record_count,
        readings: readings.len(),
        reported: batch.len(),
        delivered,
    })
}

/// Daily statistics report. Every city is reported, no threshold applies.
pub fn run_daily(
    fetched: &Fetched,
    date: NaiveDate,
    config: &Config,
    notifier: &dyn Notifier,
) -> Result<RunReport, NotifyError> {
    let (record_count, readings) = collect_readings(std::slice::from_ref(fetched), &config.regions);
    let text = format_daily_report(
        &readings,
        &date.format("%Y-%m-%d").to_string(),
        config.render_mode,
        &config.classifier,
        &config.messages,
    );
    let cities = readings.iter().map(|r| r.region.as_str()).collect::<HashSet<_>>().len();

    logging::log_run_summary("daily", record_count, readings.len(), cities);
    let delivered = deliver(text, readings.is_empty(), config, notifier)?;

    Ok(RunReport {
        fetched: record_count,
        readings: readings.len(),
        reported: cities,
        delivered,
    })
}

/// Forecast digest for the configured grid point.
pub fn run_forecast(
    fetched: &ForecastFetch,
    config: &Config,
    notifier: &dyn Notifier,
) -> Result<RunReport, NotifyError> {
    let records: &[RawRecord] = match &fetched.result {
        Ok(records) => records.as_slice(),
        Err(e) => {
            let query = format!("forecast {} {}", fetched.base_date, fetched.base_time);
            logging::log_fetch_failure(DataSource::Kma, &query, e);
            &[]
        }
    };

    let slots = group_by_time(records);
    let text = if slots.is_empty() {
        config.render_mode.text(&config.messages.no_data)
    } else {
        format_forecast(
            &slots,
            &config.forecast_location,
            &fetched.base_date,
            &fetched.base_time,
            config.render_mode,
        )
    };

    logging::log_run_summary("forecast", records.len(), records.len(), slots.len());
    let delivered = deliver(text, slots.is_empty(), config, notifier)?;

    Ok(RunReport {
        fetched: records.len(),
        readings: records.len(),
        reported: slots.len(),
        delivered,
    })
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn airkorea_api<'a>(
    client: &'a Client,
    config: &'a Config,
    credentials: &'a Credentials,
) -> Result<AirKorea<'a>, ConfigError> {
    Ok(AirKorea {
        client,
        base_url: &config.airkorea_base_url,
        service_key: credentials.dust_api_key()?,
    })
}

/// Fetches, processes and delivers one job.
pub fn run_job(
    job: &Job,
    config: &Config,
    credentials: &Credentials,
    client: &Client,
    notifier: &dyn Notifier,
    now: DateTime<FixedOffset>,
) -> Result<RunReport, RunError> {
    logging::info(DataSource::System, None, &format!("starting {} job", job.name()));

    let report = match job {
        Job::Hourly => {
            let api = airkorea_api(client, config, credentials)?;
            run_alert(job.name(), &fetch_hourly(&api), config, notifier)?
        }
        Job::Realtime { sido } => {
            let api = airkorea_api(client, config, credentials)?;
            let sido = sido.as_deref().unwrap_or(&config.sido);
            let fetched = fetch_realtime(&api, sido, config.rows);
            run_alert(job.name(), std::slice::from_ref(&fetched), config, notifier)?
        }
        Job::Advisory => {
            let api = airkorea_api(client, config, credentials)?;
            let fetched = fetch_advisory(&api, now.year(), config.advisory_rows);
            run_alert(job.name(), std::slice::from_ref(&fetched), config, notifier)?
        }
        Job::Daily { date } => {
            let api = airkorea_api(client, config, credentials)?;
            let date = date.unwrap_or_else(|| default_search_date(now));
            run_daily(&fetch_daily(&api, date, config.rows), date, config, notifier)?
        }
        Job::Forecast => {
            let key = credentials.weather_api_key()?;
            run_forecast(&fetch_forecast(client, config, key, now), config, notifier)?
        }
    };

    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::RenderMode;
    use crate::notify::RecordingNotifier;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(value: serde_json::Value) -> RawRecord {
        value.as_object().cloned().expect("fixture must be an object")
    }

    fn pivot(item_code: &str, seoul: &str, busan: &str) -> Fetched {
        Fetched {
            query: format!("{} hourly", item_code),
            format: SourceFormat::hourly_pivot(crate::model::Pollutant::Pm10),
            result: Ok(vec![record(json!({
                "dataTime": "2024-05-01 13:00",
                "itemCode": item_code,
                "dataGubun": "HOUR",
                "seoul": seoul,
                "busan": busan
            }))]),
        }
    }

    #[test]
    fn test_parse_args_defaults_to_hourly() {
        let invocation = parse_args(Vec::<String>::new()).unwrap();
        assert_eq!(invocation, Invocation { job: Job::Hourly, dry_run: false });
    }

    #[test]
    fn test_parse_args_reads_job_argument_and_flag() {
        let invocation = parse_args(["--dry-run", "realtime", "서울"]).unwrap();
        assert!(invocation.dry_run);
        assert_eq!(invocation.job, Job::Realtime { sido: Some("서울".to_string()) });

        let daily = parse_args(["daily", "20240501"]).unwrap();
        assert_eq!(daily.job, Job::Daily { date: NaiveDate::from_ymd_opt(2024, 5, 1) });
    }

    #[test]
    fn test_parse_args_rejects_bad_input() {
        assert!(parse_args(["weekly"]).is_err(), "unknown job");
        assert!(parse_args(["daily", "2024-05-01"]).is_err(), "date must be YYYYMMDD");
        assert!(parse_args(["daily", "20241301"]).is_err(), "month 13");
        assert!(parse_args(["realtime", "seoul"]).is_err(), "sido is a display name");
        assert!(parse_args(["advisory", "extra"]).is_err(), "advisory takes no argument");
        assert!(parse_args(["--verbose"]).is_err(), "unknown flag");
    }

    #[test]
    fn test_default_search_date_is_yesterday() {
        let now = crate::ingest::kst().with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        assert_eq!(default_search_date(now), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_one_failed_pollutant_does_not_abort_the_run() {
        let fetched = vec![
            Fetched {
                query: "PM10 hourly".to_string(),
                format: SourceFormat::hourly_pivot(crate::model::Pollutant::Pm10),
                result: Err(FetchError::HttpStatus(500)),
            },
            pivot("PM25", "40", "10"),
        ];
        let recorder = RecordingNotifier::new();
        let report = run_alert("hourly", &fetched, &Config::default(), &recorder).unwrap();

        assert_eq!(report.reported, 1, "Seoul PM2.5 40 >= 36 is the only alert");
        let sent = recorder.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("• 서울: 40㎍/㎥ (😷 나쁨)"));
    }

    #[test]
    fn test_skip_policy_suppresses_all_clear() {
        let config = Config {
            empty_policy: EmptyPolicy::Skip,
            ..Config::default()
        };
        let recorder = RecordingNotifier::new();
        let report = run_alert("hourly", &[pivot("PM10", "20", "30")], &config, &recorder).unwrap();
        assert!(!report.delivered);
        assert!(recorder.sent().is_empty());
    }

    #[test]
    fn test_deliver_policy_sends_all_clear() {
        let recorder = RecordingNotifier::new();
        let report = run_alert("hourly", &[pivot("PM10", "20", "30")], &Config::default(), &recorder).unwrap();
        assert!(report.delivered);
        assert_eq!(recorder.sent()[0].text, Config::default().messages.all_clear);
    }

    #[test]
    fn test_forecast_failure_reports_no_data() {
        let config = Config {
            render_mode: RenderMode::Plain,
            ..Config::default()
        };
        let fetched = ForecastFetch {
            base_date: "20240501".to_string(),
            base_time: "1330".to_string(),
            result: Err(FetchError::NoData("forecast".to_string())),
        };
        let recorder = RecordingNotifier::new();
        run_forecast(&fetched, &config, &recorder).unwrap();
        assert_eq!(recorder.sent()[0].text, config.messages.no_data);
    }
}
