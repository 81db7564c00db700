//! API Router configuration

use super::handlers;
use super::state::AppState;
use crate::config::ServerConfig;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let provider_routes = Router::new()
        .route("/registrations", post(handlers::register_provider))
        .route(
            "/registrations/:domain_id",
            get(handlers::get_provider)
                .put(handlers::update_provider)
                .delete(handlers::deregister_provider),
        );

    let publish_routes = Router::new()
        .route(
            "/:apf_id/service-apis",
            get(handlers::list_service_apis).post(handlers::publish_service_api),
        )
        .route(
            "/:apf_id/service-apis/:api_id",
            get(handlers::get_service_api)
                .patch(handlers::update_service_api)
                .delete(handlers::unpublish_service_api),
        );

    let invoker_routes = Router::new()
        .route("/onboardedInvokers", post(handlers::onboard_invoker))
        .route(
            "/onboardedInvokers/:onboarding_id",
            get(handlers::get_invoker)
                .patch(handlers::update_invoker)
                .delete(handlers::offboard_invoker),
        )
        .route(
            "/onboardedInvokers/:onboarding_id/grants",
            get(handlers::list_grants)
                .post(handlers::add_grant)
                .delete(handlers::remove_grant),
        );

    let security_routes = Router::new()
        .route(
            "/check-authentication",
            post(handlers::check_authentication),
        )
        .route(
            "/revoke-authorization",
            post(handlers::revoke_authorization),
        )
        .route(
            "/trustedInvokers/:api_invoker_id",
            get(handlers::get_security_context).put(handlers::create_security_context),
        )
        .route(
            "/trustedInvokers/:api_invoker_id/update",
            post(handlers::update_security_context),
        )
        .route(
            "/trustedInvokers/:api_invoker_id/delete",
            post(handlers::revoke_invoker_access),
        );

    let event_routes = Router::new()
        .route("/:subscriber_id/subscriptions", post(handlers::subscribe))
        .route(
            "/:subscriber_id/subscriptions/:subscription_id",
            delete(handlers::unsubscribe),
        );

    let mut router = Router::new()
        // Health and status
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::daemon_status))
        .nest("/api-provider-management/v1", provider_routes)
        .nest("/published-apis/v1", publish_routes)
        .nest("/api-invoker-management/v1", invoker_routes)
        .route(
            "/service-apis/v1/allServiceAPIs",
            get(handlers::discover_service_apis),
        )
        .nest("/capif-security/v1", security_routes)
        .nest("/capif-events/v1", event_routes)
        .layer(DefaultBodyLimit::max(server.max_body_size))
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(TraceLayer::new_for_http());

    if server.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.with_state(state)
}
