//! Danish electricity spot prices, grid tariffs and metered consumption, on an hourly grid
//! in local wall-clock time.

pub mod domain;
pub mod eloverblik;
pub mod energidataservice;
mod http;
pub mod series;
pub mod settings;

pub use domain::{DkElectricityError, HourlySeries, HourlyTariffs, Result, SeriesPoint};
pub use eloverblik::MeteringClient;
pub use energidataservice::{get_prices, SpotPrices, DEFAULT_AREA};
pub use series::{add_tariffs, normalize};
pub use settings::Settings;
