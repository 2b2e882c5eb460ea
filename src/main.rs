use genbase::{Config, build_rocket};

#[rocket::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let rocket = match build_rocket(config) {
        Ok(rocket) => rocket,
        Err(e) => {
            eprintln!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rocket.launch().await {
        tracing::error!(error = %e, "server terminated");
        std::process::exit(1);
    }
}
