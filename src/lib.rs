mod auth;
mod config;
mod database;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod service;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;

use crate::auth::SessionCookies;
use crate::db::{init_pool, stage_db};
use crate::middleware::RequestLogger;
use crate::middleware::access_gate::{AccessGate, GatePolicy, gate_redirect};
use crate::middleware::rate_limit::RateLimiter;
use crate::routes as app_routes;
use crate::service::AppServices;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket, http::Method};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};
use rocket_okapi::{get_openapi_route, okapi::merge::marge_spec_list};
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

const API_BASE_PATH: &str = "/api";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("ROCKET_SECRET_KEY is required for profile '{0}'. Generate one with: openssl rand -base64 32")]
    MissingSecretKey(String),
    #[error("Invalid CORS configuration: {0}")]
    InvalidCors(String),
    #[error("Failed to create CORS fairing: {0}")]
    Cors(#[from] rocket_cors::Error),
    #[error("Invalid database configuration: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("Could not merge OpenAPI spec: {0}")]
    OpenApi(String),
}

fn init_tracing(log_level: &str, json_format: bool) {
    // RUST_LOG overrides the configured level, e.g.
    //   RUST_LOG=genbase::middleware=debug,info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_line_number(true);

    if json_format {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn ensure_rocket_secret_key() -> Result<(), StartupError> {
    let profile = std::env::var("ROCKET_PROFILE").unwrap_or_else(|_| "debug".to_string());

    // Session cookies are encrypted with the secret key; debug builds get an ephemeral one.
    if profile != "debug" && std::env::var("ROCKET_SECRET_KEY").is_err() {
        return Err(StartupError::MissingSecretKey(profile));
    }
    Ok(())
}

fn build_cors(cors_config: &config::CorsConfig) -> Result<CorsOptions, StartupError> {
    let is_wildcard = cors_config.allowed_origins.len() == 1 && cors_config.allowed_origins[0] == "*";

    if is_wildcard && cors_config.allow_credentials {
        return Err(StartupError::InvalidCors(
            "cannot use wildcard origins (*) with credentials enabled".to_string(),
        ));
    }

    let allowed_origins = if cors_config.allowed_origins.is_empty() {
        AllowedOrigins::some_exact::<&str>(&[])
    } else if is_wildcard {
        AllowedOrigins::all()
    } else {
        AllowedOrigins::some_exact(&cors_config.allowed_origins.iter().map(String::as_str).collect::<Vec<_>>())
    };

    Ok(CorsOptions {
        allowed_origins,
        allowed_methods: vec![Method::Get, Method::Post, Method::Put, Method::Delete, Method::Options, Method::Head]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: rocket_cors::AllowedHeaders::some(&["Content-Type", "Accept"]),
        allow_credentials: cors_config.allow_credentials,
        ..Default::default()
    })
}

fn get_swagger_config(openapi_url: &str) -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: openapi_url.to_string(),
        ..Default::default()
    }
}

/// Mounts the JSON API under `/api`, with its OpenAPI document and Swagger UI when enabled.
fn mount_api_routes(mut rocket: Rocket<Build>, enable_swagger: bool) -> Result<Rocket<Build>, StartupError> {
    let route_specs = [("/health", app_routes::health::routes()), ("/twitch", app_routes::twitch::routes())];

    let mut openapi_list = Vec::new();
    for (path, (routes, openapi)) in route_specs {
        rocket = rocket.mount(format!("{}{}", API_BASE_PATH, path), routes);
        openapi_list.push((path, openapi));
    }

    if enable_swagger {
        let openapi_docs = marge_spec_list(&openapi_list).map_err(|e| StartupError::OpenApi(e.to_string()))?;
        let settings = rocket_okapi::settings::OpenApiSettings::default();
        rocket = rocket.mount(API_BASE_PATH, vec![get_openapi_route(openapi_docs, &settings)]);

        let openapi_url = format!("{}/openapi.json", API_BASE_PATH);
        rocket = rocket.mount(format!("{}/docs", API_BASE_PATH), make_swagger_ui(&get_swagger_config(&openapi_url)));
    }

    Ok(rocket)
}

fn stage_rate_limiter(rate_limit_config: config::RateLimitConfig) -> AdHoc {
    AdHoc::on_ignite("Rate Limiter", move |rocket| {
        let limiter = Arc::new(RateLimiter::new(rate_limit_config.clone()));
        limiter.clone().spawn_cleanup_task();

        Box::pin(async move { rocket.manage(limiter) })
    })
}

/// Production server: lazily connected Postgres pool and live upstream clients.
pub fn build_rocket(config: Config) -> Result<Rocket<Build>, StartupError> {
    init_tracing(&config.logging.level, config.logging.json_format);
    ensure_rocket_secret_key()?;

    let pool = init_pool(&config.database)?;
    let services = AppServices::connect(&config, pool.clone())?;

    Ok(build_rocket_with(config, services)?.attach(stage_db(pool)))
}

pub(crate) fn build_rocket_with(config: Config, services: AppServices) -> Result<Rocket<Build>, StartupError> {
    let cors = build_cors(&config.cors)?.to_cors()?;

    let figment = rocket::Config::figment()
        .merge(("port", config.server.port))
        .merge(("address", config.server.address.clone()));

    let policy = GatePolicy::new(&config.auth);
    let session_cookies = SessionCookies::new(&config.session);

    let rocket = rocket::custom(figment)
        .manage(services)
        .manage(session_cookies.clone())
        .attach(stage_rate_limiter(config.rate_limit.clone()))
        .attach(cors)
        .attach(RequestLogger)
        .attach(AccessGate::new(policy, session_cookies))
        .mount("/", app_routes::pages::routes())
        .mount("/", rocket::routes![gate_redirect])
        .mount("/admin", app_routes::admin::routes())
        .register("/", app_routes::error::catchers());

    let rocket = mount_api_routes(rocket, config.api.enable_swagger)?;

    Ok(rocket.manage(config))
}
