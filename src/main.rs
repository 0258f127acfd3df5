use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use therapy_onboarding::config::WizardConfig;
use therapy_onboarding::wizard::{
    FinalizationCommitter, HttpAccountService, JsonFileStore, PersistenceAdapter,
    WizardController, WizardRouteState, wizard_routes,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = WizardConfig::from_env().context("invalid onboarding configuration")?;

    eprintln!("Therapy onboarding v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Progress store: {}", config.store_path.display());
    eprintln!("   Account service: {}", config.account_service_url);
    eprintln!("   API: http://0.0.0.0:{}/api/onboarding/status", config.port);

    let store: Arc<dyn PersistenceAdapter> = Arc::new(JsonFileStore::with_key(
        config.store_path.clone(),
        config.store_key.clone(),
    ));
    let accounts = Arc::new(HttpAccountService::new(config.account_service_url.clone()));
    let committer =
        FinalizationCommitter::new(accounts, Arc::clone(&store), config.finalize_timeout);
    let controller = Arc::new(WizardController::new(store, committer));

    // An invalid saved category leaves the wizard waiting for a restart
    // request; the server still comes up.
    if let Err(e) = controller.mount().await {
        tracing::error!(error = %e, "Onboarding could not resume; restart required");
    }

    let app = wizard_routes(WizardRouteState { controller }).layer(CorsLayer::permissive());

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Onboarding API listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
