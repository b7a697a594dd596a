/// AirKorea (한국환경공단) Open API Client
///
/// Retrieves particulate-matter data published by Korea Environment
/// Corporation through data.go.kr:
///
/// - real-time station measurements per province
/// - hourly per-province averages (pivot table, one row per pollutant)
/// - daily per-city statistics
/// - PM10 / PM2.5 advisories (주의보 / 경보)
///
/// API Documentation: https://www.data.go.kr/data/15073861/openapi.do

use reqwest::blocking::Client;

use super::{build_request, fetch_page, fetch_records};
use crate::error::FetchError;
use crate::logging::DataSource;
use crate::model::{Pollutant, RawRecord};

pub const AIRKOREA_BASE_URL: &str = "http://apis.data.go.kr/B552584";

const REALTIME_PATH: &str = "ArpltnInforInqireSvc/getCtprvnRltmMesureDnsty";
/// Serves both the hourly pivot averages and the daily statistics,
/// selected by `dataGubun`.
const STATS_PATH: &str = "ArpltnStatsSvc/getCtprvnMesureLIst";
const ADVISORY_PATH: &str = "UlfptcaAlarmInqireSvc/getUlfptcaAlarmInfo";

/// Connection details shared by every AirKorea call.
#[derive(Debug, Clone, Copy)]
pub struct AirKorea<'a> {
    pub client: &'a Client,
    pub base_url: &'a str,
    pub service_key: &'a str,
}

fn common_params(rows: u32) -> Vec<(&'static str, String)> {
    vec![
        ("returnType", "json".to_string()),
        ("numOfRows", rows.to_string()),
        ("pageNo", "1".to_string()),
    ]
}

// ============================================================================
// API Client Functions
// ============================================================================

/// Fetch real-time measurements for every station in a province.
///
/// # Parameters
/// - `sido`: province display name (`서울`), or `전국` for all provinces
/// - `rows`: page size; `전국` needs several hundred rows to cover every station
pub fn fetch_realtime(api: &AirKorea<'_>, sido: &str, rows: u32) -> Result<Vec<RawRecord>, FetchError> {
    let mut params = common_params(rows);
    params.push(("sidoName", sido.to_string()));
    params.push(("ver", "1.0".to_string()));

    let request = build_request(api.client, api.base_url, REALTIME_PATH, api.service_key, &params);
    fetch_records(request, DataSource::AirKorea, &format!("realtime {}", sido))
}

/// Fetch the latest hourly per-province average for one pollutant.
///
/// Only the newest row is requested, so every region appears once.
pub fn fetch_hourly_average(api: &AirKorea<'_>, pollutant: Pollutant) -> Result<Vec<RawRecord>, FetchError> {
    let mut params = common_params(1);
    params.push(("itemCode", pollutant.item_code().to_string()));
    params.push(("dataGubun", "HOUR".to_string()));
    params.push(("searchCondition", "WEEK".to_string()));

    let request = build_request(api.client, api.base_url, STATS_PATH, api.service_key, &params);
    fetch_page(request, &format!("{} hourly", pollutant)).map(|page| page.records)
}

/// Fetch daily per-city statistics for `search_date` (YYYYMMDD).
pub fn fetch_daily_stats(api: &AirKorea<'_>, search_date: &str, rows: u32) -> Result<Vec<RawRecord>, FetchError> {
    let mut params = common_params(rows);
    params.push(("searchCondition", "DAILY".to_string()));
    params.push(("dataGubun", "DAILY".to_string()));
    params.push(("searchDate", search_date.to_string()));

    let request = build_request(api.client, api.base_url, STATS_PATH, api.service_key, &params);
    fetch_records(request, DataSource::AirKorea, &format!("daily stats {}", search_date))
}

/// Fetch this year's particulate-matter advisories.
///
/// Records come back newest first; `pipeline::advisory_source` reverses them
/// before aggregation.
pub fn fetch_advisories(api: &AirKorea<'_>, year: i32, rows: u32) -> Result<Vec<RawRecord>, FetchError> {
    let mut params = common_params(rows);
    params.push(("year", year.to_string()));

    let request = build_request(api.client, api.base_url, ADVISORY_PATH, api.service_key, &params);
    fetch_records(request, DataSource::AirKorea, &format!("advisories {}", year))
}

/// Fetch PM10 and PM2.5 hourly averages concurrently.
///
/// The two requests are independent; each result is returned as-is so the
/// caller can keep whichever succeeded.
pub fn fetch_hourly_pair(
    api: &AirKorea<'_>,
) -> [(Pollutant, Result<Vec<RawRecord>, FetchError>); 2] {
    std::thread::scope(|scope| {
        let pm10 = scope.spawn(|| fetch_hourly_average(api, Pollutant::Pm10));
        let pm25 = fetch_hourly_average(api, Pollutant::Pm25);
        let pm10 = pm10
            .join()
            .unwrap_or_else(|_| Err(FetchError::WorkerPanicked(format!("{} hourly", Pollutant::Pm10))));
        [(Pollutant::Pm10, pm10), (Pollutant::Pm25, pm25)]
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn query_of(request: reqwest::blocking::Request) -> Vec<(String, String)> {
        request.url().query_pairs().into_owned().collect()
    }

    #[test]
    fn test_hourly_request_targets_latest_row_for_item_code() {
        let client = Client::new();
        let mut params = common_params(1);
        params.push(("itemCode", Pollutant::Pm25.item_code().to_string()));
        let request = build_request(&client, AIRKOREA_BASE_URL, STATS_PATH, "key", &params)
            .build()
            .expect("request should build");
        let query = query_of(request);
        assert!(query.contains(&("itemCode".to_string(), "PM25".to_string())));
        assert!(query.contains(&("numOfRows".to_string(), "1".to_string())));
        assert!(query.contains(&("returnType".to_string(), "json".to_string())));
    }

    #[test]
    fn test_unreachable_host_yields_transport_error_for_both_pollutants() {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        let api = AirKorea {
            client: &client,
            base_url: "http://127.0.0.1:9",
            service_key: "key",
        };
        let results = fetch_hourly_pair(&api);
        assert_eq!(results[0].0, Pollutant::Pm10);
        assert_eq!(results[1].0, Pollutant::Pm25);
        assert!(results.iter().all(|(_, r)| matches!(r, Err(FetchError::Transport(_)))));
    }
}
