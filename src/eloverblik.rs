//! Metering data and grid tariffs from the [Eloverblik](https://eloverblik.dk) customer API.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    Client, RequestBuilder,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{
    domain::{DkElectricityError, HourlySeries, HourlyTariffs, Result},
    energidataservice::SpotPrices,
    http::{decode, fetch_body, Rejection},
    series::{add_tariffs, normalize},
    settings::{endpoint, Settings},
};

/// Danish VAT on grid tariffs.
const VAT: f64 = 1.25;

const HOURLY_RESOLUTION: &str = "PT1H";

/// An authenticated session bound to the first metering point of the account.
///
/// Everything is resolved by [`MeteringClient::connect`]; the access token is never refreshed,
/// so a client outliving the token fails with [`DkElectricityError::Auth`].
#[derive(Clone, Debug)]
pub struct MeteringClient {
    session: Session,
    address: String,
    tariffs: HourlyTariffs,
    spot_prices: SpotPrices,
}

impl MeteringClient {
    /// Exchange the refresh token, discover the metering point and fetch its tariffs.
    #[instrument(skip_all)]
    pub async fn connect(settings: Settings, refresh_token: &str) -> Result<Self> {
        let client = Client::new();

        let access_token = fetch_access_token(&client, &settings, refresh_token).await?;
        let (metering_point, address) =
            fetch_metering_point(&client, &settings, &access_token).await?;

        let session = Session {
            client: client.clone(),
            settings: settings.clone(),
            access_token,
            metering_point,
        };
        let tariffs = session.get_tariffs().await?;

        info!(metering_point = %session.metering_point, %address, "connected");

        Ok(Self {
            session,
            address,
            tariffs,
            spot_prices: SpotPrices::new(client, settings),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn metering_point(&self) -> &str {
        &self.session.metering_point
    }

    /// Tariffs fetched while connecting.
    pub fn tariffs(&self) -> &HourlyTariffs {
        &self.tariffs
    }

    /// Fetch the tariffs again.
    pub async fn get_tariffs(&self) -> Result<HourlyTariffs> {
        self.session.get_tariffs().await
    }

    /// Spot prices with the grid tariff of the hour added, in DKK/kWh including VAT.
    pub async fn get_prices(&self, from: NaiveDate, to: NaiveDate, area: &str) -> Result<HourlySeries> {
        let prices = self.spot_prices.get_prices(from, to, area).await?;
        add_tariffs(prices, &self.tariffs)
    }

    /// Hourly consumption in kWh, in local wall-clock time.
    pub async fn get_consumption(&self, from: NaiveDate, to: NaiveDate) -> Result<HourlySeries> {
        let today = Utc::now()
            .with_timezone(&self.session.settings.timezone)
            .date_naive();
        self.session
            .get_consumption(from, clamp_to_tomorrow(to, today))
            .await
    }
}

#[derive(Clone, Debug)]
struct Session {
    client: Client,
    settings: Settings,
    access_token: String,
    metering_point: String,
}

impl Session {
    fn post(&self, url: &str) -> RequestBuilder {
        let body = MeteringPointsRequest {
            metering_points: MeteringPoints {
                metering_point: vec![self.metering_point.as_str()],
            },
        };

        self.client
            .post(url)
            .bearer_auth(&self.access_token)
            .header(ACCEPT, "application/json")
            .timeout(self.settings.data_timeout)
            .json(&body)
    }

    #[instrument(skip(self), fields(metering_point = %self.metering_point))]
    async fn get_tariffs(&self) -> Result<HourlyTariffs> {
        let url = endpoint(&self.settings.eloverblik_url, "meteringpoints/meteringpoint/getcharges")?;
        let body = fetch_body(self.post(url.as_str()), url.path(), Rejection::AuthOnDenied).await?;

        let charges = first_item::<ChargesItem>(decode(&body, url.path())?, url.path())?
            .check(url.path())?
            .result
            .ok_or_else(|| DkElectricityError::parse(url.path(), "missing charges"))?;
        let tariffs = charges
            .tariffs
            .ok_or_else(|| DkElectricityError::parse(url.path(), "missing tariffs"))?;

        info!(n_tariffs = tariffs.len(), "fetched tariffs");
        sum_tariffs(tariffs, url.path())
    }

    #[instrument(skip(self), fields(metering_point = %self.metering_point))]
    async fn get_consumption(&self, from: NaiveDate, to: NaiveDate) -> Result<HourlySeries> {
        let path = format!(
            "meterdata/gettimeseries/{}/{}/Hour",
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d"),
        );
        let url = endpoint(&self.settings.eloverblik_url, &path)?;
        let body = fetch_body(self.post(url.as_str()), url.path(), Rejection::AuthOnDenied).await?;

        let document = first_item::<TimeSeriesItem>(decode(&body, url.path())?, url.path())?
            .check(url.path())?
            .document
            .ok_or_else(|| DkElectricityError::parse(url.path(), "missing MyEnergyData_MarketDocument"))?;

        let Some(time_series) = document.time_series.into_iter().next() else {
            warn!("no time series returned");
            return Ok(HourlySeries::new());
        };

        let records = local_records(time_series.periods, self.settings.timezone, url.path())?;
        info!(n_records = records.len(), "fetched consumption");

        Ok(normalize(records))
    }
}

#[instrument(skip_all)]
async fn fetch_access_token(client: &Client, settings: &Settings, refresh_token: &str) -> Result<String> {
    let url = endpoint(&settings.eloverblik_url, "Token")?;
    let request = client
        .get(url.as_str())
        .bearer_auth(refresh_token)
        .timeout(settings.token_timeout);

    let body = fetch_body(request, url.path(), Rejection::Auth).await?;
    let response: TokenResponse = decode(&body, url.path())?;

    Ok(response.result)
}

#[instrument(skip_all)]
async fn fetch_metering_point(
    client: &Client,
    settings: &Settings,
    access_token: &str,
) -> Result<(String, String)> {
    let url = endpoint(&settings.eloverblik_url, "meteringpoints/meteringpoints")?;
    let request = client
        .get(url.as_str())
        .bearer_auth(access_token)
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT, "application/json")
        .timeout(settings.data_timeout);

    let body = fetch_body(request, url.path(), Rejection::AuthOnDenied).await?;
    let response: MeteringPointsResponse = decode(&body, url.path())?;

    let metering_point = response
        .result
        .into_iter()
        .next()
        .ok_or_else(|| DkElectricityError::NotFound {
            endpoint: url.path().to_string(),
        })?;

    let address = [metering_point.street_name, metering_point.building_number]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<String>>()
        .join(" ");

    Ok((metering_point.metering_point_id, address))
}

/// Sum the tariff components hour by hour and add VAT.
fn sum_tariffs(tariffs: Vec<Tariff>, endpoint: &str) -> Result<HourlyTariffs> {
    let mut total = [0.0; HourlyTariffs::HOURS];

    for tariff in tariffs {
        let prices = hourly_prices(&tariff, endpoint)?;
        for (sum, price) in total.iter_mut().zip(prices) {
            *sum += price;
        }
    }

    for sum in &mut total {
        *sum *= VAT;
    }

    Ok(HourlyTariffs::new(total))
}

/// Prices of one tariff component indexed by hour of the day.
///
/// The API lists the prices hour by hour. When every entry carries a position, that is used instead.
fn hourly_prices(tariff: &Tariff, endpoint: &str) -> Result<[f64; HourlyTariffs::HOURS]> {
    let name = tariff.name.as_deref().unwrap_or("unnamed tariff");

    if tariff.prices.len() != HourlyTariffs::HOURS {
        return Err(DkElectricityError::parse(
            endpoint,
            format!("{name} has {} prices instead of 24", tariff.prices.len()),
        ));
    }

    let positions: Option<Vec<u32>> = tariff
        .prices
        .iter()
        .map(|price| price.position.as_ref().and_then(Position::value))
        .collect();

    let mut hourly = [0.0; HourlyTariffs::HOURS];
    let Some(positions) = positions else {
        for (slot, price) in hourly.iter_mut().zip(&tariff.prices) {
            *slot = price.price;
        }
        return Ok(hourly);
    };

    let mut is_filled = [false; HourlyTariffs::HOURS];
    for (position, price) in positions.into_iter().zip(&tariff.prices) {
        let index = usize::try_from(position)
            .ok()
            .and_then(|position| position.checked_sub(1))
            .filter(|index| *index < HourlyTariffs::HOURS && !is_filled[*index])
            .ok_or_else(|| {
                DkElectricityError::parse(endpoint, format!("{name} has an invalid or repeated position {position}"))
            })?;
        hourly[index] = price.price;
        is_filled[index] = true;
    }

    Ok(hourly)
}

/// Flatten the periods into local wall-clock `(moment, quantity)` records.
fn local_records(periods: Vec<Period>, timezone: Tz, endpoint: &str) -> Result<Vec<(NaiveDateTime, f64)>> {
    let mut records = Vec::new();

    for period in periods {
        if period.resolution != HOURLY_RESOLUTION {
            return Err(DkElectricityError::parse(
                endpoint,
                format!("resolution {} instead of {HOURLY_RESOLUTION}", period.resolution),
            ));
        }

        let start = DateTime::parse_from_rfc3339(&period.time_interval.start)
            .map_err(|e| {
                DkElectricityError::parse(endpoint, format!("timeInterval.start \"{}\": {}", period.time_interval.start, e))
            })?
            .with_timezone(&Utc);

        for (offset, point) in (0i64..).zip(period.points) {
            let quantity = point.quantity.trim().parse::<f64>().map_err(|e| {
                DkElectricityError::parse(endpoint, format!("out_Quantity.quantity \"{}\": {}", point.quantity, e))
            })?;
            let moment = (start + TimeDelta::hours(offset))
                .with_timezone(&timezone)
                .naive_local();
            records.push((moment, quantity));
        }
    }

    Ok(records)
}

/// The API refuses anything past tomorrow.
fn clamp_to_tomorrow(to: NaiveDate, today: NaiveDate) -> NaiveDate {
    today.succ_opt().map_or(to, |tomorrow| to.min(tomorrow))
}

fn first_item<T>(envelope: Envelope<T>, endpoint: &str) -> Result<T> {
    envelope
        .result
        .into_iter()
        .next()
        .ok_or_else(|| DkElectricityError::parse(endpoint, "empty result"))
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct MeteringPointsRequest<'a> {
    metering_points: MeteringPoints<'a>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct MeteringPoints<'a> {
    metering_point: Vec<&'a str>,
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    result: String,
}

#[derive(Deserialize, Debug)]
struct MeteringPointsResponse {
    #[serde(default)]
    result: Vec<MeteringPoint>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct MeteringPoint {
    metering_point_id: String,
    street_name: Option<String>,
    building_number: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Envelope<T> {
    #[serde(default = "Vec::new")]
    result: Vec<T>,
}

/// Per-item outcome reported inside an otherwise successful response.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ItemStatus {
    #[serde(default = "ItemStatus::default_success")]
    success: bool,
    error_text: Option<String>,
}

impl ItemStatus {
    const fn default_success() -> bool {
        true
    }

    fn check(&self, endpoint: &str) -> Result<()> {
        if self.success {
            return Ok(());
        }
        let reason = self.error_text.as_deref().unwrap_or("no error text");
        Err(DkElectricityError::parse(endpoint, format!("request was not successful: {reason}")))
    }
}

#[derive(Deserialize, Debug)]
struct ChargesItem {
    #[serde(flatten)]
    status: ItemStatus,
    result: Option<Charges>,
}

impl ChargesItem {
    fn check(self, endpoint: &str) -> Result<Self> {
        self.status.check(endpoint)?;
        Ok(self)
    }
}

#[derive(Deserialize, Debug)]
struct Charges {
    tariffs: Option<Vec<Tariff>>,
}

#[derive(Deserialize, Debug)]
struct Tariff {
    name: Option<String>,
    prices: Vec<TariffPrice>,
}

#[derive(Deserialize, Debug)]
struct TariffPrice {
    position: Option<Position>,
    price: f64,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Position {
    Number(u32),
    Text(String),
}

impl Position {
    fn value(&self) -> Option<u32> {
        match self {
            Self::Number(position) => Some(*position),
            Self::Text(position) => position.trim().parse().ok(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct TimeSeriesItem {
    #[serde(flatten)]
    status: ItemStatus,
    #[serde(rename = "MyEnergyData_MarketDocument")]
    document: Option<MarketDocument>,
}

impl TimeSeriesItem {
    fn check(self, endpoint: &str) -> Result<Self> {
        self.status.check(endpoint)?;
        Ok(self)
    }
}

#[derive(Deserialize, Debug)]
struct MarketDocument {
    #[serde(rename = "TimeSeries", default)]
    time_series: Vec<TimeSeries>,
}

#[derive(Deserialize, Debug)]
struct TimeSeries {
    #[serde(rename = "Period", default)]
    periods: Vec<Period>,
}

#[derive(Deserialize, Debug)]
struct Period {
    #[serde(rename = "timeInterval")]
    time_interval: TimeInterval,
    resolution: String,
    #[serde(rename = "Point", default)]
    points: Vec<Point>,
}

#[derive(Deserialize, Debug)]
struct TimeInterval {
    start: String,
}

#[derive(Deserialize, Debug)]
struct Point {
    #[serde(rename = "out_Quantity.quantity")]
    quantity: String,
}
