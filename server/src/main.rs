#[macro_use]
extern crate rocket;

mod entrypoints;

use std::sync::Arc;
use std::time::Duration;

use rocket_db_pools::Database;
use rocket_prometheus::PrometheusMetrics;
use tracing::instrument;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use devlingo_server::db::{self, DB};

#[derive(Debug, serde::Deserialize)]
pub struct Env {
    session_max_age_hours: Option<u32>,
    sweep_interval_minutes: Option<u32>,
}

#[launch]
async fn rocket() -> _ {
    dotenv::dotenv().ok();

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().pretty());
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    let env = envy::from_env::<Env>().expect("Failed to load environment variables");
    // Abandoned OPEN sessions are swept after a day by default; they earn no
    // XP either way.
    let max_session_age =
        Duration::from_secs(env.session_max_age_hours.unwrap_or(24) as u64 * 3600);
    let sweep_interval =
        Duration::from_secs(env.sweep_interval_minutes.unwrap_or(30) as u64 * 60);
    let atomic_bool = Arc::new(std::sync::atomic::AtomicBool::new(true));
    let atomic_bool_clone = atomic_bool.clone();

    let prometheus = PrometheusMetrics::new();
    let cors = rocket_cors::CorsOptions::default()
        .to_cors()
        .expect("Failed to build CORS options");

    let span = tracing::info_span!("Starting Rocket");
    let _enter = span.enter();

    rocket::build()
        .attach(db::stage())
        .attach(prometheus.clone())
        .attach(cors)
        .attach(rocket::fairing::AdHoc::on_liftoff(
            "Sweep abandoned learning sessions",
            move |rocket| {
                Box::pin(async move {
                    let db = DB::fetch(rocket)
                        .expect("Failed to get DB connection")
                        .clone();

                    rocket::tokio::spawn(async move {
                        let mut interval = rocket::tokio::time::interval(sweep_interval);
                        while atomic_bool.load(std::sync::atomic::Ordering::Relaxed) {
                            interval.tick().await;

                            if let Err(e) = sweep_sessions(&db, max_session_age).await {
                                tracing::error!("Failed to sweep stale sessions: {:#?}", e);
                            }
                        }
                    });
                })
            },
        ))
        .attach(rocket::fairing::AdHoc::on_shutdown(
            "Stop sweeping learning sessions",
            |_| {
                Box::pin(async move {
                    atomic_bool_clone.store(false, std::sync::atomic::Ordering::Relaxed);
                })
            },
        ))
        .attach(entrypoints::stage())
        .mount("/metrics", prometheus)
}

#[instrument(skip(db))]
async fn sweep_sessions(db: &DB, max_age: Duration) -> anyhow::Result<()> {
    let swept = db.sweep_stale_sessions(max_age.as_secs()).await?;
    if swept > 0 {
        tracing::info!("closed {swept} abandoned sessions without credit");
    }

    Ok(())
}
