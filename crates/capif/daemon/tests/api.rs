//! HTTP surface exercised in-process against the router

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use capif_daemon::api::rest::handlers::{
    CheckAuthenticationResponse, DiscoveredApis, HealthCheckResponse,
};
use capif_daemon::api::rest::state::AppState;
use capif_daemon::api::create_router;
use capif_daemon::config::ServerConfig;
use capif_registry::CapifCore;
use capif_types::{
    AccessTuple, AefProfile, ApiVersion, CapifEventKind, DomainRegistration, EventSubscription,
    FunctionRegistration, FunctionRole, GrantedApi, InvokerEnrolment, OnboardedInvoker, ProviderDomain,
    PublishedApi, SecurityMethod, ServiceApiDescription, ServiceSecurity,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceExt;

fn test_router() -> Router {
    let core = Arc::new(CapifCore::default());
    create_router(AppState::new(core), &ServerConfig::default())
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> axum::response::Response {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => Body::empty(),
    };
    app.clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap()
}

async fn read<T: DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json<T: Serialize>(value: &T) -> Option<serde_json::Value> {
    Some(serde_json::to_value(value).unwrap())
}

struct Published {
    domain_id: String,
    apf: String,
    aef: String,
    api: PublishedApi,
}

async fn register_and_publish(app: &Router) -> Published {
    let registration = DomainRegistration::new("reg-sec")
        .with_function(FunctionRegistration::new(FunctionRole::Publisher, "apf-key"))
        .with_function(FunctionRegistration::new(FunctionRole::Exposer, "aef-key"));
    let response = send(
        app,
        Method::POST,
        "/api-provider-management/v1/registrations",
        json(&registration),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let domain: ProviderDomain = read(response).await;
    let apf = domain.functions_with_role(FunctionRole::Publisher)[0].to_string();
    let aef = domain.functions_with_role(FunctionRole::Exposer)[0].to_string();

    let description = ServiceApiDescription::new("weather")
        .with_profile(AefProfile::new(aef.as_str()))
        .with_version(ApiVersion::new("v1"));
    let response = send(
        app,
        Method::POST,
        &format!("/published-apis/v1/{}/service-apis", apf),
        json(&description),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    let api: PublishedApi = read(response).await;
    assert!(location.ends_with(api.api_id.as_str()));

    Published {
        domain_id: domain.domain_id.to_string(),
        apf,
        aef,
        api,
    }
}

async fn onboard(app: &Router, enrolment: InvokerEnrolment) -> OnboardedInvoker {
    let response = send(
        app,
        Method::POST,
        "/api-invoker-management/v1/onboardedInvokers",
        json(&enrolment),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    read(response).await
}

async fn check(app: &Router, tuple: &AccessTuple) -> CheckAuthenticationResponse {
    let response = send(
        app,
        Method::POST,
        "/capif-security/v1/check-authentication",
        json(tuple),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    read(response).await
}

#[tokio::test]
async fn health_returns_200() {
    let app = test_router();
    let response = send(&app, Method::GET, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let health: HealthCheckResponse = read(response).await;
    assert_eq!(health.status, "healthy");
}

#[tokio::test]
async fn onboarded_invoker_discovers_and_is_authorized_until_revoked() {
    let app = test_router();
    let published = register_and_publish(&app).await;

    let onboarded = onboard(
        &app,
        InvokerEnrolment::new("invoker-key").requesting(published.api.api_id.clone()),
    )
    .await;
    let invoker = onboarded.identity.api_invoker_id.clone();
    assert_eq!(onboarded.identity.granted_apis.len(), 1);
    assert_eq!(onboarded.client_credentials.client_id, invoker.as_str());

    let response = send(
        &app,
        Method::GET,
        &format!(
            "/service-apis/v1/allServiceAPIs?api-invoker-id={}&api-name=weather",
            invoker
        ),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let discovered: DiscoveredApis = read(response).await;
    assert_eq!(discovered.service_api_descriptions.len(), 1);
    assert_eq!(
        discovered.service_api_descriptions[0].api_id,
        published.api.api_id
    );

    let tuple = AccessTuple::new(invoker.clone(), published.aef.as_str(), "weather", "v1");
    assert!(check(&app, &tuple).await.allowed);

    let response = send(
        &app,
        Method::POST,
        "/capif-security/v1/revoke-authorization",
        json(&tuple),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let decision = check(&app, &tuple).await;
    assert!(!decision.allowed);
    assert_eq!(decision.reason.map(|r| r.code()), Some("revoked"));
}

#[tokio::test]
async fn discovery_requires_a_known_invoker() {
    let app = test_router();

    let response = send(&app, Method::GET, "/service-apis/v1/allServiceAPIs", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        Method::GET,
        "/service-apis/v1/allServiceAPIs?api-invoker-id=api_invoker_id_missing",
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let onboarded = onboard(&app, InvokerEnrolment::new("invoker-key")).await;
    let response = send(
        &app,
        Method::GET,
        &format!(
            "/service-apis/v1/allServiceAPIs?api-invoker-id={}&supported-features=zz",
            onboarded.identity.api_invoker_id
        ),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let app = test_router();
    let published = register_and_publish(&app).await;
    let uri = format!("/published-apis/v1/{}/service-apis", published.apf);

    let bad_features = serde_json::json!({
        "apiName": "maps",
        "aefProfiles": [{ "aefId": published.aef }],
        "versions": [{ "apiVersion": "v1" }],
        "supportedFeatures": "xyz",
    });
    let response = send(&app, Method::POST, &uri, Some(bad_features)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = read(response).await;
    assert_eq!(body["code"], "BAD_REQUEST");

    let missing_name = serde_json::json!({ "aefProfiles": [{ "aefId": published.aef }] });
    let response = send(&app, Method::POST, &uri, Some(missing_name)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let missing_onboarding = serde_json::json!({ "notificationDestination": "http://invoker" });
    let response = send(
        &app,
        Method::POST,
        "/api-invoker-management/v1/onboardedInvokers",
        Some(missing_onboarding),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let truncated = Request::builder()
        .method(Method::POST)
        .uri("/capif-security/v1/check-authentication")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"apiInvokerId\":"))
        .unwrap();
    let response = app.clone().oneshot(truncated).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn published_api_name_cannot_be_patched() {
    let app = test_router();
    let published = register_and_publish(&app).await;
    let uri = format!(
        "/published-apis/v1/{}/service-apis/{}",
        published.apf, published.api.api_id
    );

    let rename = serde_json::json!({ "apiName": "climate", "description": "forecasts" });
    let response = send(&app, Method::PATCH, &uri, Some(rename)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, Method::GET, &uri, None).await;
    let stored: PublishedApi = read(response).await;
    assert_eq!(stored.api_name(), "weather");
    assert_eq!(stored.description.description, None);

    let same_name = serde_json::json!({ "apiName": "weather", "description": "forecasts" });
    let response = send(&app, Method::PATCH, &uri, Some(same_name)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: PublishedApi = read(response).await;
    assert_eq!(updated.description.description.as_deref(), Some("forecasts"));
}

#[tokio::test]
async fn publication_is_scoped_to_its_publisher() {
    let app = test_router();
    let published = register_and_publish(&app).await;

    // Exposers cannot publish
    let description = ServiceApiDescription::new("maps")
        .with_profile(AefProfile::new(published.aef.as_str()))
        .with_version(ApiVersion::new("v1"));
    let response = send(
        &app,
        Method::POST,
        &format!("/published-apis/v1/{}/service-apis", published.aef),
        json(&description),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        Method::GET,
        &format!("/published-apis/v1/APF_unknown/service-apis/{}", published.api.api_id),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Same name from the same publisher conflicts
    let duplicate = ServiceApiDescription::new("weather")
        .with_profile(AefProfile::new(published.aef.as_str()))
        .with_version(ApiVersion::new("v2"));
    let response = send(
        &app,
        Method::POST,
        &format!("/published-apis/v1/{}/service-apis", published.apf),
        json(&duplicate),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(
        &app,
        Method::DELETE,
        &format!(
            "/published-apis/v1/{}/service-apis/{}",
            published.apf, published.api.api_id
        ),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(
        &app,
        Method::GET,
        &format!("/published-apis/v1/{}/service-apis", published.apf),
        None,
    )
    .await;
    let remaining: Vec<PublishedApi> = read(response).await;
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn provider_deregistration_withdraws_access() {
    let app = test_router();
    let published = register_and_publish(&app).await;
    let onboarded = onboard(
        &app,
        InvokerEnrolment::new("invoker-key").requesting(published.api.api_id.clone()),
    )
    .await;
    let invoker = onboarded.identity.api_invoker_id.clone();
    let tuple = AccessTuple::new(invoker.clone(), published.aef.as_str(), "weather", "v1");
    assert!(check(&app, &tuple).await.allowed);

    let response = send(
        &app,
        Method::DELETE,
        &format!(
            "/api-provider-management/v1/registrations/{}",
            published.domain_id
        ),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let decision = check(&app, &tuple).await;
    assert!(!decision.allowed);
    assert_eq!(decision.reason.map(|r| r.code()), Some("not_granted"));

    let response = send(
        &app,
        Method::GET,
        &format!("/service-apis/v1/allServiceAPIs?api-invoker-id={}", invoker),
        None,
    )
    .await;
    let discovered: DiscoveredApis = read(response).await;
    assert!(discovered.service_api_descriptions.is_empty());

    let response = send(
        &app,
        Method::GET,
        &format!("/published-apis/v1/{}/service-apis", published.apf),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        Method::GET,
        &format!(
            "/api-provider-management/v1/registrations/{}",
            published.domain_id
        ),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn grants_are_managed_per_invoker() {
    let app = test_router();
    let published = register_and_publish(&app).await;
    let onboarded = onboard(&app, InvokerEnrolment::new("invoker-key")).await;
    let grants_uri = format!(
        "/api-invoker-management/v1/onboardedInvokers/{}/grants",
        onboarded.identity.api_invoker_id
    );
    let grant = GrantedApi::new(
        published.api.api_id.clone(),
        published.aef.as_str(),
        "weather",
        "v1",
    );

    let response = send(&app, Method::POST, &grants_uri, json(&grant)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, Method::GET, &grants_uri, None).await;
    let grants: Vec<GrantedApi> = read(response).await;
    assert_eq!(grants, vec![grant.clone()]);

    let mismatched = GrantedApi::new(
        published.api.api_id.clone(),
        published.aef.as_str(),
        "weather",
        "v9",
    );
    let response = send(&app, Method::POST, &grants_uri, json(&mismatched)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, Method::DELETE, &grants_uri, json(&grant)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = send(&app, Method::DELETE, &grants_uri, json(&grant)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        Method::DELETE,
        &format!(
            "/api-invoker-management/v1/onboardedInvokers/{}",
            onboarded.identity.api_invoker_id
        ),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, Method::GET, &grants_uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn subscriptions_can_be_created_and_removed() {
    let app = test_router();
    let subscription = EventSubscription::new(
        vec![CapifEventKind::ServiceApiAvailable],
        "http://subscriber.example/notify",
    );

    let response = send(
        &app,
        Method::POST,
        "/capif-events/v1/subscriber-1/subscriptions",
        json(&subscription),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();

    let response = send(&app, Method::DELETE, &location, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, Method::DELETE, &location, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let invalid = EventSubscription::new(Vec::new(), "not a url");
    let response = send(
        &app,
        Method::POST,
        "/capif-events/v1/subscriber-1/subscriptions",
        json(&invalid),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn trusted_invoker_security_context_lifecycle() {
    let app = test_router();
    let published = register_and_publish(&app).await;
    let onboarded = onboard(
        &app,
        InvokerEnrolment::new("invoker-key").requesting(published.api.api_id.clone()),
    )
    .await;
    let uri = format!(
        "/capif-security/v1/trustedInvokers/{}",
        onboarded.identity.api_invoker_id
    );

    // The published profile offers no security method
    let by_api = serde_json::json!({
        "notificationDestination": "http://invoker.example/security",
        "securityInfo": [{ "apiId": published.api.api_id, "prefSecurityMethods": ["PSK"] }],
    });
    let response = send(&app, Method::PUT, &uri, Some(by_api)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let by_interface = serde_json::json!({
        "notificationDestination": "http://invoker.example/security",
        "securityInfo": [{
            "apiId": published.api.api_id,
            "aefId": published.aef,
            "interfaceDetails": { "ipv4Addr": "10.0.0.7", "port": 8443, "securityMethods": ["OAUTH"] },
            "prefSecurityMethods": ["PSK"],
            "authenticationInfo": "client-cert",
        }],
    });
    let response = send(&app, Method::PUT, &uri, Some(by_interface.clone())).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .ends_with(onboarded.identity.api_invoker_id.as_str()));
    let stored: ServiceSecurity = read(response).await;
    assert_eq!(
        stored.security_info[0].sel_security_method,
        Some(SecurityMethod::Oauth)
    );

    let response = send(&app, Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let redacted: ServiceSecurity = read(response).await;
    assert_eq!(redacted.security_info[0].authentication_info, None);

    let response = send(
        &app,
        Method::GET,
        &format!("{}?authenticationInfo=true", uri),
        None,
    )
    .await;
    let full: ServiceSecurity = read(response).await;
    assert_eq!(
        full.security_info[0].authentication_info.as_deref(),
        Some("client-cert")
    );

    let response = send(
        &app,
        Method::POST,
        &format!("{}/update", uri),
        Some(by_interface.clone()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        Method::POST,
        &format!("{}/delete", uri),
        Some(serde_json::json!({ "aefId": published.aef })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = send(&app, Method::POST, &format!("{}/update", uri), Some(by_interface)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let unknown = serde_json::json!({
        "notificationDestination": "http://invoker.example/security",
        "securityInfo": [{ "interfaceDetails": {}, "prefSecurityMethods": ["PSK"] }],
    });
    let response = send(
        &app,
        Method::PUT,
        "/capif-security/v1/trustedInvokers/api_invoker_id_unknown",
        Some(unknown),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
