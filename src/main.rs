use anyhow::{Context, Result};
use axum::{
    extract::Query,
    middleware,
    response::{Html, Redirect},
    routing::get,
    Router,
};
use oauth_webflow::{
    load_config, memory_session_middleware, CredentialSlot, MemorySessionStore, WebFlow,
};
use serde::Deserialize;
use tracing::info;

/// Environment variable naming the configuration file
const CONFIG_ENV: &str = "OAUTH_WEBFLOW_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "oauth-webflow.toml";

#[derive(Deserialize)]
struct FailureQuery {
    message: Option<String>,
    state: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oauth_webflow=info".into()),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(&config_path)?;
    info!(config = %config_path, "OAuth web flow demo starting...");

    let webflow = WebFlow::from_config(&config).context("Invalid web flow configuration")?;
    let prefix = webflow.path_prefix().to_string();
    let secure_cookie = config
        .resolved_origin()
        .map(|origin| origin.starts_with("https://"))
        .unwrap_or(false);

    let app = Router::new()
        .route("/", get(home))
        .route("/logout", get(logout))
        .route(&format!("{}/failure", prefix), get(failure))
        .fallback(|| async { (axum::http::StatusCode::NOT_FOUND, "Not Found") });
    let app = webflow.attach(app).layer(middleware::from_fn_with_state(
        MemorySessionStore::new(secure_cookie),
        memory_session_middleware,
    ));

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!(address = %config.bind, login = %prefix, "Listening");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn home(credential: CredentialSlot) -> Html<String> {
    match credential.get() {
        Some(record) => Html(format!(
            "<p>Signed in as user {} of org {} via {}</p><p><a href=\"/logout\">Log out</a></p>",
            escape(record.user_id.as_deref().unwrap_or("?")),
            escape(record.org_id.as_deref().unwrap_or("?")),
            escape(record.tenant_id.as_str())
        )),
        None => Html("<p>Not signed in.</p>".to_string()),
    }
}

async fn logout(credential: CredentialSlot) -> Redirect {
    credential.logout();
    Redirect::to("/")
}

async fn failure(Query(query): Query<FailureQuery>) -> Html<String> {
    Html(format!(
        "<p>Login failed: {}</p><p>Requested: {}</p>",
        escape(query.message.as_deref().unwrap_or_default()),
        escape(query.state.as_deref().unwrap_or("/"))
    ))
}

fn escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
