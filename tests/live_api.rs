/// Live data.go.kr checks
///
/// These call the real AirKorea and KMA endpoints and are ignored by
/// default. They need DUST_API_KEY / WEATHER_API_KEY in the environment or
/// in `.env`, plus internet connectivity.
///
/// Run with: cargo test --test live_api -- --ignored --test-threads=1
///
/// Note: an empty page right after the hour is normal; AirKorea publishes
/// hourly averages some minutes late.

use dustmon_service::config::{Config, Credentials};
use dustmon_service::error::FetchError;
use dustmon_service::ingest::airkorea::{self, AirKorea};
use dustmon_service::ingest::{kma, now_kst};
use dustmon_service::model::Pollutant;
use dustmon_service::normalize::{normalize, SourceFormat};
use dustmon_service::regions::RegionTable;

use chrono::Datelike;
use reqwest::blocking::Client;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn credentials() -> Credentials {
    dotenv::dotenv().ok();
    Credentials::from_env()
}

fn client() -> Client {
    Client::builder()
        .timeout(Config::default().http_timeout)
        .build()
        .expect("HTTP client should build")
}

fn dust_key(creds: &Credentials) -> &str {
    creds
        .dust_api_key()
        .expect("DUST_API_KEY must be set to run live AirKorea tests")
}

// ---------------------------------------------------------------------------
// AirKorea
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_live_hourly_pivot_names_known_regions() {
    let creds = credentials();
    let client = client();
    let api = AirKorea {
        client: &client,
        base_url: airkorea::AIRKOREA_BASE_URL,
        service_key: dust_key(&creds),
    };

    for (pollutant, result) in airkorea::fetch_hourly_pair(&api) {
        match result {
            Ok(records) => {
                let readings = normalize(&records, &SourceFormat::hourly_pivot(pollutant), &RegionTable::default());
                assert!(!readings.is_empty(), "{} pivot should yield readings", pollutant);
                assert!(
                    readings.iter().any(|r| r.region == "서울"),
                    "{} pivot should carry a seoul column",
                    pollutant
                );
                assert!(readings.iter().all(|r| r.pollutant == pollutant));
            }
            Err(FetchError::NoData(_)) => eprintln!("{}: hour not published yet", pollutant),
            Err(e) => panic!("{} hourly fetch failed: {}", pollutant, e),
        }
    }
}

#[test]
#[ignore]
fn test_live_realtime_nationwide_has_sido_names() {
    let creds = credentials();
    let client = client();
    let api = AirKorea {
        client: &client,
        base_url: airkorea::AIRKOREA_BASE_URL,
        service_key: dust_key(&creds),
    };

    let records = airkorea::fetch_realtime(&api, "전국", 100).expect("realtime fetch should succeed");
    let readings = normalize(&records, &SourceFormat::realtime("sidoName"), &RegionTable::default());
    assert!(
        readings.iter().any(|r| r.pollutant == Pollutant::Pm10),
        "at least one station reports PM10"
    );
}

#[test]
#[ignore]
fn test_live_advisories_parse_for_current_year() {
    let creds = credentials();
    let client = client();
    let api = AirKorea {
        client: &client,
        base_url: airkorea::AIRKOREA_BASE_URL,
        service_key: dust_key(&creds),
    };

    match airkorea::fetch_advisories(&api, now_kst().year(), 100) {
        Ok(records) => {
            let readings = normalize(&records, &SourceFormat::advisory(), &RegionTable::default());
            assert_eq!(readings.len(), records.len(), "every advisory record should normalize");
        }
        Err(FetchError::NoData(_)) => eprintln!("no advisories issued this year"),
        Err(e) => panic!("advisory fetch failed: {}", e),
    }
}

// ---------------------------------------------------------------------------
// KMA
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_live_ultra_short_forecast_for_seoul_grid() {
    let creds = credentials();
    let key = creds
        .weather_api_key()
        .expect("WEATHER_API_KEY must be set to run live KMA tests");
    let config = Config::default();
    let (base_date, base_time) = kma::base_datetime_at(now_kst());

    let records = kma::fetch_ultra_short_forecast(&client(), kma::KMA_BASE_URL, key, config.grid, &base_date, &base_time)
        .expect("forecast fetch should succeed");
    assert!(
        records.iter().any(|r| r.get("category").and_then(|c| c.as_str()) == Some("T1H")),
        "forecast should include temperature"
    );
}
