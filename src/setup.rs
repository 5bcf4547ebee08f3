use std::process;

use dkelectricity::{Settings, DEFAULT_AREA};
use log::debug;
use tracing::error;

/// What the command needs before it can talk to the APIs.
pub(crate) struct Setup {
    pub(crate) settings: Settings,
    pub(crate) refresh_token: String,
    pub(crate) area: String,
}

/// Read the setup from the environment, `.env` included.
/// Requires `ELOVERBLIK_REFRESH_TOKEN`, the rest is optional.
pub(crate) fn setup_from_env() -> Setup {
    dotenv::dotenv().ok();

    let refresh_token = std::env::var("ELOVERBLIK_REFRESH_TOKEN").unwrap_or_else(|_| {
        error!("ELOVERBLIK_REFRESH_TOKEN is missing, you need to configure it");
        process::exit(1);
    });

    let area = std::env::var("PRICE_AREA").unwrap_or(DEFAULT_AREA.to_string());

    let mut settings = Settings::default();
    if let Ok(url) = std::env::var("ELOVERBLIK_URL") {
        debug!("using eloverblik at \"{}\"", url);
        settings = settings.with_eloverblik_url(url);
    }
    if let Ok(url) = std::env::var("ENERGIDATASERVICE_URL") {
        debug!("using energi data service at \"{}\"", url);
        settings = settings.with_energidataservice_url(url);
    }

    Setup {
        settings,
        refresh_token,
        area,
    }
}
