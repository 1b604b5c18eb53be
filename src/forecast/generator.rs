//! Forecast generation.

use chrono::{Days, NaiveDate};
use rand::Rng;

use crate::forecast::types::{WeatherForecast, SUMMARIES};

/// Number of days returned per request.
pub const FORECAST_DAYS: u64 = 5;

/// Lowest temperature (inclusive) and highest (exclusive), in Celsius.
pub const TEMPERATURE_RANGE: std::ops::Range<i32> = -20..55;

/// Forecast for the days after `today`, one record per day starting tomorrow.
pub fn generate_forecast<R: Rng + ?Sized>(today: NaiveDate, rng: &mut R) -> Vec<WeatherForecast> {
    (1..=FORECAST_DAYS)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .map(|date| WeatherForecast {
            date,
            temperature_c: rng.gen_range(TEMPERATURE_RANGE),
            summary: SUMMARIES[rng.gen_range(0..SUMMARIES.len())].to_string(),
        })
        .collect()
}
