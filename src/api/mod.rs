use crate::{
    accounts::{PgAccountDirectory, ROLE_ADMIN, ROLE_USER},
    api::handlers::{
        auth::{self, login, oauth, require_roles, session, AllowedRoles},
        health, me,
    },
    auth::{AccessTokens, CredentialHasher},
    db,
    oauth::{ExternalIdentityExchange, OAuthConfig, OidcProvider, PkceCache},
    session::{PgSessionStore, SessionService},
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Extension, Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;

pub use openapi::openapi;

/// Routes for the auth service, without transport layers or a database handle.
///
/// Member routes sit behind the bearer gate; `/me` additionally requires the
/// `user` or `admin` role.
#[must_use]
pub fn router(auth_state: Arc<auth::AuthState>) -> Router {
    let profile = Router::new()
        .route("/me", get(me::me))
        .route_layer(from_fn_with_state(
            AllowedRoles(&[ROLE_USER, ROLE_ADMIN]),
            require_roles,
        ));

    let sessions = Router::new()
        .route("/sessions", get(me::list_sessions))
        .route("/sessions/:id", delete(me::revoke_session))
        .route_layer(from_fn_with_state(AllowedRoles::ANY, require_roles));

    Router::new()
        .route("/health", get(health::health))
        .route("/auth/register", post(login::register))
        .route("/auth/login", post(login::login))
        .route("/auth/refresh", post(session::refresh))
        .route("/auth/logout", post(session::logout))
        .route("/auth/google/login", get(oauth::google_login))
        .route("/auth/google/callback", get(oauth::google_callback))
        .merge(profile)
        .merge(sessions)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(Extension(auth_state))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    auth_config: auth::AuthConfig,
    oauth_config: OAuthConfig,
    request_timeout: Duration,
) -> Result<()> {
    let pool = db::connect(&dsn).await?;
    db::apply_schema(&pool).await?;

    let accounts = Arc::new(PgAccountDirectory::new(pool.clone()));
    let sessions = Arc::new(PgSessionStore::new(pool.clone()));
    let tokens = Arc::new(AccessTokens::new(
        auth_config.access_token_secret(),
        auth_config.access_token_ttl(),
    ));
    let session_service = SessionService::new(
        accounts,
        sessions,
        tokens,
        CredentialHasher::default(),
        auth_config.refresh_token_ttl(),
    );

    let pkce = Arc::new(PkceCache::new(oauth_config.state_ttl()));
    let janitor = pkce.spawn_janitor(oauth_config.sweep_interval());
    let provider = Arc::new(OidcProvider::new(oauth_config.provider().clone())?);
    let exchange =
        ExternalIdentityExchange::new(pkce, provider, oauth_config.provider().timeout());

    let frontend_origin = frontend_origin(auth_config.frontend_base_url())?;
    let auth_state = Arc::new(auth::AuthState::new(auth_config, session_service, exchange));

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let app = router(auth_state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(TimeoutLayer::new(request_timeout))
                .layer(cors),
        )
        .layer(Extension(pool));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    janitor.shutdown().await;
    info!("Gracefully shutdown");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    HeaderValue::from_str(&format!("{}://{host}{port}", parsed.scheme()))
        .context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_drops_path_and_keeps_port() -> Result<()> {
        let origin = frontend_origin("http://localhost:3000/shop/cart")?;
        assert_eq!(origin, "http://localhost:3000");

        let origin = frontend_origin("https://shop.example")?;
        assert_eq!(origin, "https://shop.example");
        Ok(())
    }

    #[test]
    fn frontend_origin_requires_a_host() {
        assert!(frontend_origin("not a url").is_err());
        assert!(frontend_origin("data:text/plain,hi").is_err());
    }
}
