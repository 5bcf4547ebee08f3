use std::process;

use chrono::{Days, Utc};
use dkelectricity::{MeteringClient, Result};
use log::info;
use tracing::error;

use crate::setup::{setup_from_env, Setup};

mod setup;

const APP_NAME: &str = "dkelectricity";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    info!("Starting {}", APP_NAME);

    if let Err(e) = run(setup_from_env()).await {
        error!("{}", e);
        process::exit(1);
    }
}

/// Print today's prices including tariffs and the consumption of the past week.
async fn run(setup: Setup) -> Result<()> {
    let timezone = setup.settings.timezone;
    let client = MeteringClient::connect(setup.settings, &setup.refresh_token).await?;

    info!("Metering point {} at {}", client.metering_point(), client.address());

    let today = Utc::now().with_timezone(&timezone).date_naive();
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    let week_ago = today.checked_sub_days(Days::new(7)).unwrap_or(today);

    println!("hour\ttariff (DKK/kWh)");
    for (hour, tariff) in client.tariffs().iter() {
        println!("{hour:02}\t{tariff:.4}");
    }

    println!("\ntime\tprice (DKK/kWh)");
    for point in client.get_prices(today, tomorrow, &setup.area).await? {
        println!("{}\t{:.4}", point.moment, point.value);
    }

    println!("\ntime\tconsumption (kWh)");
    for point in client.get_consumption(week_ago, today).await? {
        println!("{}\t{:.3}", point.moment, point.value);
    }

    Ok(())
}
