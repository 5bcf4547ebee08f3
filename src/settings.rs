use std::time::Duration;

use chrono_tz::Tz;
use url::Url;

use crate::domain::Result;

pub const ENERGIDATASERVICE_URL: &str = "https://api.energidataservice.dk/dataset/";
pub const ELOVERBLIK_URL: &str = "https://api.eloverblik.dk/CustomerApi/api/";

/// Where the two APIs live and how long to wait for them.
#[derive(Clone, Debug)]
pub struct Settings {
    pub energidataservice_url: String,
    pub eloverblik_url: String,
    pub price_timeout: Duration,
    pub token_timeout: Duration,
    pub data_timeout: Duration,
    /// Zone used for local wall-clock time, both for consumption and for "tomorrow".
    pub timezone: Tz,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            energidataservice_url: ENERGIDATASERVICE_URL.to_string(),
            eloverblik_url: ELOVERBLIK_URL.to_string(),
            price_timeout: Duration::from_secs(30),
            token_timeout: Duration::from_secs(15),
            data_timeout: Duration::from_secs(60),
            timezone: chrono_tz::Europe::Copenhagen,
        }
    }
}

impl Settings {
    pub fn with_energidataservice_url(mut self, url: impl Into<String>) -> Self {
        self.energidataservice_url = url.into();
        self
    }

    pub fn with_eloverblik_url(mut self, url: impl Into<String>) -> Self {
        self.eloverblik_url = url.into();
        self
    }

    pub fn with_timeouts(mut self, price: Duration, token: Duration, data: Duration) -> Self {
        self.price_timeout = price;
        self.token_timeout = token;
        self.data_timeout = data;
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }
}

/// Resolve `path` against `base`, treating `base` as a directory even without a trailing slash.
pub(crate) fn endpoint(base: &str, path: &str) -> Result<Url> {
    let base = if base.ends_with('/') {
        Url::parse(base)?
    } else {
        Url::parse(&format!("{base}/"))?
    };

    Ok(base.join(path)?)
}
