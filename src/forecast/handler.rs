//! `GET /WeatherForecast`.

use axum::extract::State;
use axum::Json;

use crate::config::schema::keys;
use crate::forecast::generator::generate_forecast;
use crate::forecast::types::WeatherForecast;
use crate::http::server::AppState;

/// Environment name reported by the handler for a published `IsLocal` value.
/// Anything other than `true` is a deployed instance.
pub fn environment_label(state: &AppState) -> &'static str {
    match state.namespace.get_bool(keys::IS_LOCAL) {
        Ok(Some(true)) => "Local",
        _ => "Azure",
    }
}

pub async fn get_weather_forecast(State(state): State<AppState>) -> Json<Vec<WeatherForecast>> {
    tracing::info!(environment = environment_label(&state), "WeatherForecast requested");

    match std::env::current_dir() {
        Ok(dir) => tracing::info!(physical_path = %dir.display(), "WeatherForecast"),
        Err(e) => tracing::warn!(error = %e, "Working directory unavailable"),
    }
    tracing::info!(content_root_path = %state.content_root.display(), "WeatherForecast");

    let today = chrono::Local::now().date_naive();
    Json(generate_forecast(today, &mut rand::thread_rng()))
}
