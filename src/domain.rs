use chrono::NaiveDateTime;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// A value valid for the hour starting at `moment`, in local wall-clock time.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub moment: NaiveDateTime,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(moment: NaiveDateTime, value: f64) -> Self {
        Self { moment, value }
    }
}

/// One point per hour, strictly ascending, without gaps.
pub type HourlySeries = Vec<SeriesPoint>;

/// Grid tariff per hour of the day, VAT included.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct HourlyTariffs([f64; 24]);

impl HourlyTariffs {
    pub const HOURS: usize = 24;

    pub fn new(tariffs: [f64; 24]) -> Self {
        Self(tariffs)
    }

    pub fn get(&self, hour: u32) -> Option<f64> {
        usize::try_from(hour)
            .ok()
            .and_then(|hour| self.0.get(hour))
            .copied()
    }

    /// `(hour, tariff)` pairs for hours 0 to 23.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        (0u32..).zip(self.0.iter().copied())
    }
}

#[derive(Debug, Error)]
pub enum DkElectricityError {
    #[error("{endpoint} responded with {status}: {body}")]
    Http {
        endpoint: String,
        status: StatusCode,
        body: String,
    },

    #[error("{endpoint} rejected the credentials with {status}: {body}")]
    Auth {
        endpoint: String,
        status: StatusCode,
        body: String,
    },

    #[error("{endpoint} returned no metering point for the account")]
    NotFound { endpoint: String },

    #[error("unexpected response from {endpoint}: {reason}")]
    Parse { endpoint: String, reason: String },

    #[error("no tariff for hour {hour}")]
    Lookup { hour: u32 },

    #[error("failed to call {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid base url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl DkElectricityError {
    pub(crate) fn parse(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = DkElectricityError> = std::result::Result<T, E>;
