//! # counsel-scheduler Binary
//!
//! The entry point that assembles the application based on compile-time features.

use actix_web::{web, App, HttpServer};
use cs_api::handlers::AppState;
use cs_api::middleware::{cors_policy, standard_middleware};
use cs_core::models::UserProfile;
use cs_core::traits::UserDirectory;
use std::sync::Arc;

// Feature-gated imports: the binary is compiled to order from adapters.
#[cfg(feature = "db-sqlite")]
use cs_db_sqlite::SqliteScheduleRepo;

#[cfg(feature = "directory-simple")]
use cs_directory_simple::SimpleUserDirectory;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // 1. Initialize the scheduling store
    #[cfg(feature = "db-sqlite")]
    let repo = Arc::new(
        SqliteScheduleRepo::new(
            &std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:counsel_scheduler.db".into()),
        )
        .await
        .expect("Failed to init SQLite schedule store"),
    );

    // 2. Initialize the user directory stand-in
    #[cfg(feature = "directory-simple")]
    let directory = Arc::new(SimpleUserDirectory::new());

    // The core never creates users, so the directory is populated from
    // outside: SEED_USERS may point at a JSON array of profiles.
    if let Ok(path) = std::env::var("SEED_USERS") {
        let raw = std::fs::read_to_string(&path).expect("Failed to read SEED_USERS file");
        let profiles: Vec<UserProfile> =
            serde_json::from_str(&raw).expect("Malformed SEED_USERS file");
        let count = profiles.len();
        for profile in profiles {
            directory
                .upsert_user(profile)
                .await
                .expect("Failed to seed user profile");
        }
        log::info!("seeded {count} user profiles from {path}");
    }

    // 3. Wrap in AppState (dynamic dispatch; one adapter serves three ports)
    let state = web::Data::new(AppState {
        availability: repo.clone(),
        requests: repo.clone(),
        appointments: repo,
        directory,
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".into());
    log::info!("🗓️  counsel-scheduler starting on http://{bind_addr}");

    HttpServer::new(move || {
        App::new()
            .wrap(standard_middleware())
            .wrap(cors_policy())
            .app_data(state.clone())
            .configure(cs_api::configure_routes)
    })
    .bind(bind_addr)?
    .run()
    .await
}
