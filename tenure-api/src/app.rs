/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use tenure_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::from_config(pool, config)?;
/// let app = tenure_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tenure_shared::auth::{
    authorization::require_admin,
    middleware::{jwt_auth_middleware, AuthContext, AuthError},
};
use tenure_shared::kyc::{HttpKycProvider, SharedKycProvider};
use tenure_shared::rules::RulesConfig;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,

    /// Identity verification provider
    pub kyc: SharedKycProvider,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, kyc: SharedKycProvider) -> Self {
        Self {
            db,
            config: Arc::new(config),
            kyc,
        }
    }

    /// Builds state with the HTTP KYC provider described by `config`
    pub fn from_config(db: PgPool, config: Config) -> anyhow::Result<Self> {
        let provider = HttpKycProvider::new(
            &config.kyc.base_url,
            &config.kyc.api_key,
            Duration::from_secs(config.kyc.timeout_secs),
        )?;

        Ok(Self::new(db, config, Arc::new(provider)))
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.config.rules
    }
}

/// Builds the complete router
///
/// ```text
/// /health                                   public
/// /v1/auth/{register,login,refresh}         public
/// /v1/webhooks/{billing,kyc}                public, signed
/// /v1/...                                   member (JWT)
/// /v1/admin/...                             admin (JWT + role)
/// /v1/business-rules/payout-readiness       admin
/// ```
///
/// Layers, outermost first: security headers, CORS, tracing, then per-group
/// authentication.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let public_routes = Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh))
        .route("/webhooks/billing", post(routes::webhooks::billing))
        .route("/webhooks/kyc", post(routes::webhooks::kyc));

    let member_routes = Router::new()
        .route("/auth/me", get(routes::auth::me))
        .route("/members", post(routes::members::join))
        .route("/members/me", get(routes::members::me))
        .route("/payments", get(routes::payments::list_mine))
        .route("/subscriptions/me", get(routes::subscriptions::me))
        .route("/queue", get(routes::queue::list))
        .route("/queue/me", get(routes::queue::me))
        .route("/business-rules/config", get(routes::business_rules::config))
        .route("/business-rules/me", get(routes::business_rules::me))
        .route(
            "/business-rules/members/:id",
            get(routes::business_rules::member),
        )
        .route("/kyc/verifications", post(routes::kyc::start))
        .route("/kyc/verifications/me", get(routes::kyc::me))
        .route("/payouts/me", get(routes::payouts::mine))
        .route("/notifications", get(routes::notifications::list))
        .route(
            "/notifications/:id/read",
            post(routes::notifications::mark_read),
        )
        .layer(middleware::from_fn_with_state(state.clone(), jwt_auth_layer));

    let admin_routes = Router::new()
        .route("/admin/members", get(routes::admin::list_members))
        .route(
            "/admin/members/:id/status",
            patch(routes::admin::update_member_status),
        )
        .route(
            "/admin/members/:id/payments",
            get(routes::admin::member_payments),
        )
        .route("/admin/payments", post(routes::admin::record_payment))
        .route("/admin/queue/refresh", post(routes::queue::refresh))
        .route(
            "/business-rules/payout-readiness",
            get(routes::business_rules::payout_readiness),
        )
        .route("/admin/payouts", get(routes::payouts::list))
        .route("/admin/payouts/run", post(routes::payouts::run))
        .route("/admin/payouts/:id", patch(routes::payouts::update))
        .route("/admin/audit-logs", get(routes::admin::audit_logs))
        .layer(middleware::from_fn(admin_guard))
        .layer(middleware::from_fn_with_state(state.clone(), jwt_auth_layer));

    let v1_routes = Router::new()
        .merge(public_routes)
        .merge(member_routes)
        .merge(admin_routes);

    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(Duration::from_secs(3600))
    };

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Validates the bearer token with the configured secret
async fn jwt_auth_layer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    jwt_auth_middleware(state.jwt_secret().to_string(), req, next).await
}

/// Rejects non-admin callers; runs after [`jwt_auth_layer`]
async fn admin_guard(auth: AuthContext, req: Request, next: Next) -> Result<Response, ApiError> {
    require_admin(&auth)?;
    Ok(next.run(req).await)
}
