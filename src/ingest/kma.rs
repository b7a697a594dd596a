/// KMA (기상청) Village Forecast API Client
///
/// Retrieves ultra-short-range forecasts (초단기예보) for one forecast grid
/// cell. Forecasts are issued every hour at HH:30 and become available
/// around HH:45, so the base time has to be derived from the clock.
///
/// # Clock injection
/// `base_datetime_at` accepts `now` rather than calling the clock itself,
/// which keeps base-time selection deterministic in tests.
///
/// API Documentation: https://www.data.go.kr/data/15084084/openapi.do

use chrono::{DateTime, Duration, FixedOffset, Timelike};
use reqwest::blocking::Client;

use super::{build_request, fetch_records};
use crate::error::FetchError;
use crate::logging::DataSource;
use crate::model::RawRecord;

pub const KMA_BASE_URL: &str = "http://apis.data.go.kr/1360000";

const ULTRA_SHORT_FORECAST_PATH: &str = "VilageFcstInfoService_2.0/getUltraSrtFcst";

/// Minute after which the current hour's forecast is published.
const PUBLISH_MINUTE: u32 = 45;

/// KMA forecast grid coordinates (not latitude / longitude).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPoint {
    pub nx: u32,
    pub ny: u32,
}

/// Returns `(base_date, base_time)` of the newest published forecast, as
/// `("YYYYMMDD", "HH30")` in the offset of `now`.
///
/// Before HH:45 the current hour's forecast is not out yet, so the previous
/// hour's is used; at 00:10 that is 23:30 of the previous day.
pub fn base_datetime_at(now: DateTime<FixedOffset>) -> (String, String) {
    let issued = if now.minute() < PUBLISH_MINUTE {
        now - Duration::hours(1)
    } else {
        now
    };
    (issued.format("%Y%m%d").to_string(), issued.format("%H30").to_string())
}

/// Fetch the ultra-short-range forecast for one grid point.
pub fn fetch_ultra_short_forecast(
    client: &Client,
    base_url: &str,
    service_key: &str,
    grid: GridPoint,
    base_date: &str,
    base_time: &str,
) -> Result<Vec<RawRecord>, FetchError> {
    let params = vec![
        ("dataType", "JSON".to_string()),
        ("numOfRows", "100".to_string()),
        ("pageNo", "1".to_string()),
        ("base_date", base_date.to_string()),
        ("base_time", base_time.to_string()),
        ("nx", grid.nx.to_string()),
        ("ny", grid.ny.to_string()),
    ];

    let request = build_request(client, base_url, ULTRA_SHORT_FORECAST_PATH, service_key, &params);
    fetch_records(request, DataSource::Kma, &format!("forecast {} {} ({},{})", base_date, base_time, grid.nx, grid.ny))
}

// ============================================================================
// Tests
// ============================================================================
