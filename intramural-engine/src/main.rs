use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use intramural_engine::config::Config;
use intramural_engine::dispatch::{Delivery, TimerDispatcher};
use intramural_engine::store::FileStore;
use intramural_engine::{logger, Tournaments};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML config file. Without a file the config is read from the environment.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match args.config {
        Some(path) => Config::from_file(path).await?.with_environment(),
        None => Config::default().with_environment(),
    };

    logger::init(config.loglevel)?;
    log::info!("Using config: {:?}", config);

    let store = FileStore::new(&config.data_dir)?;
    let (dispatcher, mut reader) = TimerDispatcher::spawn();

    let tournaments = Tournaments::new(
        Arc::new(store),
        Arc::new(dispatcher),
        config.reminders.offsets()?,
    );

    loop {
        tokio::select! {
            delivery = reader.recv() => match delivery {
                Some(delivery) => deliver(&tournaments, delivery),
                None => break,
            },
            res = tokio::signal::ctrl_c() => {
                res?;
                log::info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn deliver(tournaments: &Tournaments, delivery: Delivery) {
    let payload = delivery.payload;

    log::info!(
        "Reminder ({:?}): match {} of tournament {} starts at {}",
        payload.kind,
        payload.match_id,
        payload.tournament,
        payload.scheduled
    );

    let res = tournaments
        .get(payload.tournament)
        .and_then(|tournament| tournament.acknowledge_reminder(delivery.handle));

    match res {
        Ok(true) => (),
        Ok(false) => log::debug!("Reminder {} is no longer pending", delivery.handle),
        Err(err) => log::error!("Failed to acknowledge reminder {}: {}", delivery.handle, err),
    }
}
