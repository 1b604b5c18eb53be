//! Forecast record types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Summaries a forecast record is drawn from.
pub const SUMMARIES: [&str; 10] = [
    "Freezing",
    "Bracing",
    "Chilly",
    "Cool",
    "Mild",
    "Warm",
    "Balmy",
    "Hot",
    "Sweltering",
    "Scorching",
];

/// One day of synthetic forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherForecast {
    /// Serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    pub temperature_c: i32,
    pub summary: String,
}
