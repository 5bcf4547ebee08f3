use std::collections::HashSet;

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use tracing::debug;

use crate::domain::{DkElectricityError, HourlySeries, HourlyTariffs, Result, SeriesPoint};

/// Put raw `(moment, value)` records onto a strict hourly grid.
///
/// Records repeating a moment are dropped, keeping the first one: the autumn
/// daylight-saving transition repeats a local hour. Hours missing between the
/// earliest and the latest moment are linearly interpolated from their neighbours:
/// the spring transition skips a local hour.
pub fn normalize<I>(records: I) -> HourlySeries
where
    I: IntoIterator<Item = (NaiveDateTime, f64)>,
{
    let mut seen = HashSet::new();
    let mut n_duplicates = 0usize;
    let mut known: Vec<SeriesPoint> = records
        .into_iter()
        .filter(|(moment, _)| {
            let is_new = seen.insert(*moment);
            if !is_new {
                n_duplicates += 1;
            }
            is_new
        })
        .map(|(moment, value)| SeriesPoint::new(moment, value))
        .collect();
    known.sort_by_key(|point| point.moment);

    let (Some(first), Some(last)) = (known.first().copied(), known.last().copied()) else {
        return HourlySeries::new();
    };

    let mut series = HourlySeries::new();
    let mut index = 0;
    let mut moment = first.moment;

    while moment <= last.moment {
        while known.get(index + 1).is_some_and(|next| next.moment <= moment) {
            index += 1;
        }

        let left = known[index];
        let value = match known.get(index + 1) {
            Some(right) if left.moment != moment => interpolate(left, *right, moment),
            _ => left.value,
        };

        series.push(SeriesPoint::new(moment, value));
        moment += TimeDelta::hours(1);
    }

    debug!(
        n_records = known.len() + n_duplicates,
        n_duplicates,
        n_interpolated = series.len().saturating_sub(known.len()),
        "normalized series"
    );

    series
}

fn interpolate(left: SeriesPoint, right: SeriesPoint, moment: NaiveDateTime) -> f64 {
    let span = (right.moment - left.moment).num_seconds() as f64;
    let offset = (moment - left.moment).num_seconds() as f64;

    left.value + (right.value - left.value) * offset / span
}

/// Add the tariff of each point's hour of the day to its value.
pub fn add_tariffs(series: HourlySeries, tariffs: &HourlyTariffs) -> Result<HourlySeries> {
    series
        .into_iter()
        .map(|point| {
            let hour = point.moment.hour();
            let tariff = tariffs
                .get(hour)
                .ok_or(DkElectricityError::Lookup { hour })?;
            Ok(SeriesPoint::new(point.moment, point.value + tariff))
        })
        .collect()
}
