use std::process::ExitCode;

use reqwest::blocking::Client;

use dustmon_service::config::{Config, Credentials};
use dustmon_service::error::{ConfigError, RunError};
use dustmon_service::ingest::now_kst;
use dustmon_service::logging::{self, DataSource, LogLevel};
use dustmon_service::notify::{Notifier, RecordingNotifier, TelegramNotifier};
use dustmon_service::pipeline::{self, Invocation};

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    logging::init_logger(LogLevel::Info, true);

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::error(DataSource::System, None, &e.to_string());
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run() -> Result<(), RunError> {
    let Invocation { job, dry_run } = pipeline::parse_args(std::env::args().skip(1))?;
    let config = Config::load_default()?;
    let credentials = Credentials::from_env();

    let client = Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(|e| ConfigError::Invalid(format!("could not build HTTP client: {}", e)))?;

    if dry_run {
        let recorder = RecordingNotifier::new();
        pipeline::run_job(&job, &config, &credentials, &client, &recorder, now_kst())?;
        for payload in recorder.sent() {
            println!("{}", payload.text);
        }
        return Ok(());
    }

    let (token, chat_id) = credentials.telegram()?;
    let telegram = TelegramNotifier::new(client.clone(), &config.telegram_base_url, token, chat_id);
    let notifier: &dyn Notifier = &telegram;
    let report = pipeline::run_job(&job, &config, &credentials, &client, notifier, now_kst())?;

    logging::info(
        DataSource::System,
        None,
        &format!(
            "{} job finished: {} reported, delivered={}",
            job.name(),
            report.reported,
            report.delivered
        ),
    );
    Ok(())
}
