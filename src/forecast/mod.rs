//! Synthetic weather forecast endpoint.

pub mod generator;
pub mod handler;
pub mod types;

pub use generator::generate_forecast;
pub use handler::get_weather_forecast;
pub use types::{WeatherForecast, SUMMARIES};
