/**
 * VITALS KERNEL - Point d'entrée principal du serveur de supervision
 *
 * RÔLE : Orchestration des modules : config, stores, MQTT, HTTP, health.
 * Bootstrap du système complet avec gestion d'erreurs et logging.
 *
 * ARCHITECTURE : Ingestion HTTP + MQTT → stores JSON → API REST pollée par les postes.
 * UTILITÉ : Source de vérité unique des affectations, relevés et journaux d'audit.
 */

mod accounts;
mod audit;
mod config;
mod error;
mod health;
mod http;
mod ingest;
mod mqtt;
mod store;

use crate::accounts::PBKDF2_ITERATIONS;
use crate::config::{api_key_from_env, load_config};
use crate::health::HealthTracker;
use crate::http::AppState;
use crate::store::Stores;

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = load_config().await;

    let stores = Stores::open(&cfg.data_dir)
        .with_context(|| format!("failed to open data dir {}", cfg.data_dir.display()))?;
    info!(
        data_dir = %cfg.data_dir.display(),
        patients = stores.assignments.count(),
        readings = stores.vitals.count(),
        "stores loaded"
    );

    let health = HealthTracker::new();
    let policy = Arc::new(cfg.classifier.clone());

    // MQTT optionnel : les appareils peuvent aussi poster sur /data
    match cfg.mqtt.clone() {
        Some(mqtt_conf) => mqtt::spawn_mqtt_listener(
            mqtt_conf,
            stores.clone(),
            policy.clone(),
            cfg.status_window,
            health.clone(),
        ),
        None => info!("MQTT disabled, HTTP ingestion only"),
    }

    let api_key = api_key_from_env().map(Arc::<str>::from);
    if api_key.is_none() {
        warn!("VITALS_API_KEY not set: every route except /health will answer 401");
    }

    // fabrique l'état unique pour Axum
    let app_state = AppState {
        stores,
        policy,
        status_window: cfg.status_window,
        api_key,
        health,
        password_iterations: PBKDF2_ITERATIONS,
    };

    let app = http::build_router(app_state);

    let listener = TcpListener::bind(&cfg.bind)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind))?;
    info!("listening on http://{}", cfg.bind);
    axum::serve(listener, app).await?;
    Ok(())
}
