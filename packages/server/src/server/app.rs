//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use twilio::{TwilioOptions, TwilioService};

use crate::config::Config;
use crate::kernel::{
    AuthAdminClient, FixedWindowRateLimiter, ServerDeps, StripeClient, TwilioAdapter,
};
use crate::server::middleware::extract_client_ip;
use crate::server::routes::{
    billing_portal_handler, captcha_handler, create_signup_handler, email_refresh_handler,
    email_resend_handler, health_handler, otp_send_handler, otp_verify_handler,
    payment_webhook_handler, signup_status_handler, start_checkout_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub server_deps: Arc<ServerDeps>,
    pub stripe_webhook_secret: String,
}

/// Build the Axum application router.
///
/// Returns (Router, Arc<ServerDeps>) - deps are exposed for tests and any
/// out-of-band callers.
pub fn build_app(pool: PgPool, config: Config) -> (Router, Arc<ServerDeps>) {
    // Messaging (OTP dispatch)
    let twilio = Arc::new(TwilioService::new(TwilioOptions {
        account_sid: config.twilio_account_sid,
        auth_token: config.twilio_auth_token,
        from: config.twilio_from,
    }));

    // External auth provider (identity + email confirmation)
    let auth = Arc::new(AuthAdminClient::new(
        config.auth_base_url,
        config.auth_service_key,
    ));

    // Payment provider (checkout + billing portal)
    let payments = Arc::new(StripeClient::new(
        config.stripe_secret_key,
        config.checkout_success_url,
        config.checkout_cancel_url,
    ));

    let server_deps = Arc::new(ServerDeps::new(
        pool.clone(),
        Arc::new(TwilioAdapter::new(twilio)),
        auth,
        payments,
        Arc::new(FixedWindowRateLimiter::new()),
        config.encryption_key,
        config.hmac_secret.into_bytes(),
        config.otp,
        config.limits,
    ));

    let app_state = AppState {
        db_pool: pool,
        server_deps: server_deps.clone(),
        stripe_webhook_secret: config.stripe_webhook_secret,
    };

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    // Transport-level rate limit on the signup surface: 10/sec per IP with
    // burst of 20. The per-action fixed-window limits apply on top.
    let rate_limit_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .use_headers()
            .finish()
            .expect("Rate limiter configuration is valid and should never fail"),
    );
    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config,
    };

    let signup_routes = Router::new()
        .route("/v1/signup/captcha", get(captcha_handler))
        .route("/v1/signup", post(create_signup_handler))
        .route("/v1/signup/:id/otp/send", post(otp_send_handler))
        .route("/v1/signup/:id/otp/verify", post(otp_verify_handler))
        .route("/v1/signup/:id/email/resend", post(email_resend_handler))
        .route("/v1/signup/:id/email/refresh", post(email_refresh_handler))
        .route("/v1/signup/:id/checkout", post(start_checkout_handler))
        .route("/v1/signup/status", get(signup_status_handler))
        .route("/v1/billing/portal", post(billing_portal_handler))
        .layer(rate_limit_layer);

    let app = signup_routes
        // Webhooks carry their own authentication (signature); the governor
        // layer must not throttle provider retries.
        .route("/v1/webhooks/payments", post(payment_webhook_handler))
        // Health check (no rate limit)
        .route("/health", get(health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(extract_client_ip))
        .layer(Extension(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    (app, server_deps)
}
