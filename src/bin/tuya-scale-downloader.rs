//! Download new scale measurements into a local JSON file and attach
//! analysis reports to them.
//!
//! Configuration comes from the environment or a `.env` file; see
//! `tuya_scale::config::Config`.

use log::{error, info};
use std::process::ExitCode;
use tuya_scale::TuyaError;
use tuya_scale::config::Config;
use tuya_scale::store::HistoryFile;
use tuya_scale::sync::CloudClient;

const PAGE_SIZE: u32 = 100;

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .init();
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let level = if config.debug_logs { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), TuyaError> {
    let client = CloudClient::from_builder(config.client_builder())?;
    info!("Connecting to {}", client.as_async().base_url());
    client.get_access_token()?;

    let mut history = HistoryFile::open(&config.data_file)?;
    let start_time = history.resume_from();

    let new_records = client.fetch_all_records(&config.device_id, PAGE_SIZE, start_time)?;
    if new_records.is_empty() {
        info!("No new records retrieved.");
    } else {
        let added = history.append(new_records);
        info!("New records retrieved: {}", added);
    }

    let enriched =
        client.enrich_records(&config.device_id, history.records_mut(), &config.profile)?;

    if enriched > 0 || history.resume_from() != start_time {
        history.save()?;
    }
    Ok(())
}
