//! Scheduled refresh: fetch, save and publish the dataset. Takes no
//! arguments; settings come from the environment and `crimebot.yml`.

use anyhow::Context;
use crimebot::prelude::*;
use crimebot::{logging, refresh};

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init();

    let mut builder = ConfigBuilder::new();
    if let Some(file) = FileConfig::discover(None).context("Failed to read config file")? {
        builder = builder.file(file);
    }
    let config = builder.env().build()?;

    let report = refresh::run(&config).context("Refresh failed")?;
    tracing::info!(
        records = report.records,
        pages = report.pages,
        path = %report.path.display(),
        "Refresh complete"
    );
    Ok(())
}
