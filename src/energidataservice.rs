//! Day-ahead spot prices from [Energi Data Service](https://www.energidataservice.dk/tso-electricity/Elspotprices).

use chrono::{NaiveDate, NaiveDateTime};
use log::{info, warn};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::{
    domain::{DkElectricityError, HourlySeries, Result, SeriesPoint},
    http::{decode, fetch_body, Rejection},
    series::normalize,
    settings::{endpoint, Settings},
};

pub const DEFAULT_AREA: &str = "DK1";

/// DKK/MWh to DKK/kWh with 25% VAT.
pub const PRICE_SCALE: f64 = 0.00125;

const HOUR_DK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Clone, Debug)]
pub struct SpotPrices {
    client: Client,
    settings: Settings,
}

impl SpotPrices {
    pub fn new(client: Client, settings: Settings) -> Self {
        Self { client, settings }
    }

    /// Hourly spot prices in DKK/kWh including VAT, in Danish local time.
    #[instrument(skip(self))]
    pub async fn get_prices(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        area: &str,
    ) -> Result<HourlySeries> {
        let url = endpoint(&self.settings.energidataservice_url, "Elspotprices")?;
        let filter = serde_json::json!({ "PriceArea": area }).to_string();

        let request = self
            .client
            .get(url.as_str())
            .timeout(self.settings.price_timeout)
            .query(&[
                ("start", from.format("%Y-%m-%d").to_string()),
                ("end", to.format("%Y-%m-%d").to_string()),
                ("filter", filter),
                ("columns", "HourDK,SpotPriceDKK".to_string()),
                ("sort", "HourDK".to_string()),
            ]);

        let body = fetch_body(request, url.path(), Rejection::Http).await?;
        let response: Response = decode(&body, url.path())?;

        info!("Fetched {} spot prices for {}", response.records.len(), area);

        let records = parse_records(response.records, url.path())?;
        let prices = normalize(records)
            .into_iter()
            .map(|point| SeriesPoint::new(point.moment, point.value * PRICE_SCALE))
            .collect();

        Ok(prices)
    }
}

/// One-off fetch without keeping a client around.
pub async fn get_prices(
    settings: &Settings,
    from: NaiveDate,
    to: NaiveDate,
    area: &str,
) -> Result<HourlySeries> {
    SpotPrices::new(Client::new(), settings.clone())
        .get_prices(from, to, area)
        .await
}

/// Records without a price are skipped, so that normalization interpolates them.
fn parse_records(records: Vec<Record>, endpoint: &str) -> Result<Vec<(NaiveDateTime, f64)>> {
    let mut parsed = Vec::with_capacity(records.len());

    for record in records {
        let moment = NaiveDateTime::parse_from_str(&record.hour_dk, HOUR_DK_FORMAT).map_err(|e| {
            DkElectricityError::parse(endpoint, format!("HourDK \"{}\": {}", record.hour_dk, e))
        })?;

        match record.spot_price_dkk {
            Some(price) => parsed.push((moment, price)),
            None => warn!("No spot price at {}", moment),
        }
    }

    Ok(parsed)
}

#[derive(Deserialize, Debug)]
struct Response {
    #[serde(default)]
    records: Vec<Record>,
}

#[derive(Deserialize, Debug)]
struct Record {
    #[serde(rename = "HourDK")]
    hour_dk: String,
    #[serde(rename = "SpotPriceDKK")]
    spot_price_dkk: Option<f64>,
}
