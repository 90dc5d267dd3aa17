//! HTTP routing layer over the broker core.
//!
//! Handlers only shuttle parameters in and map error kinds to status codes;
//! all failure classification happens in the broker.

use crate::auth;
use crate::config::GatewayConfig;
use crate::qr;
use axum::{
    Json, Router, middleware,
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
};
use broker::synthesizer::build_source_url;
use broker::{BrokerError, ConfigSynthesizer};
use http::{HeaderMap, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

/// Scheme prefix that makes a descriptor URL openable by the Grayjay app.
const GRAYJAY_PLUGIN_PREFIX: &str = "grayjay://plugin/";

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct AppState {
    pub synthesizer: Arc<ConfigSynthesizer>,
}

#[derive(Deserialize, Debug)]
struct Params {
    #[serde(rename = "peerTubePlatformUrl", default)]
    peer_tube_platform_url: Option<String>,
}

impl Params {
    fn candidate(self) -> String {
        self.peer_tube_platform_url.unwrap_or_default()
    }
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error: String,
}

struct ApiError(BrokerError);

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        ApiError(err)
    }
}

fn status_for(err: &BrokerError) -> StatusCode {
    match err {
        BrokerError::MissingInput
        | BrokerError::MalformedUrl(_)
        | BrokerError::UnreachableInstance(_)
        | BrokerError::InvalidInstanceResponse(_) => StatusCode::BAD_REQUEST,
        BrokerError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        BrokerError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorResponse {
            error: self.0.to_string(),
        });
        (status_for(&self.0), body).into_response()
    }
}

/// Scheme and host this request arrived on, as far as the gateway can tell.
/// Proxies are expected to set `x-forwarded-proto`; explicit configuration
/// overrides both values inside the synthesizer.
fn request_origin(headers: &HeaderMap) -> (String, String) {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http")
        .to_string();
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost")
        .to_string();
    (scheme, host)
}

async fn plugin_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<Params>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (scheme, host) = request_origin(&headers);
    let ttl = state.synthesizer.default_ttl();
    let descriptor = state
        .synthesizer
        .synthesize(&params.candidate(), &scheme, &host, ttl)
        .await?;
    Ok(Json(descriptor))
}

#[derive(Serialize)]
struct ValidateResponse {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn validate_instance(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Response {
    match state.synthesizer.validate(&params.candidate()).await {
        Ok(_) => Json(ValidateResponse {
            valid: true,
            error: None,
        })
        .into_response(),
        Err(err) => (
            status_for(&err),
            Json(ValidateResponse {
                valid: false,
                error: Some(err.to_string()),
            }),
        )
            .into_response(),
    }
}

async fn qr_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<Params>,
) -> Result<Response, ApiError> {
    let (scheme, host) = request_origin(&headers);
    let identity = state.synthesizer.validate(&params.candidate()).await?;
    let host_url = state.synthesizer.host_url(&scheme, &host);
    let source_url = build_source_url(&identity.host, &host_url)?;

    match qr::render_png(&format!("{GRAYJAY_PLUGIN_PREFIX}{source_url}")) {
        Ok(png) => Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response()),
        Err(err) => {
            tracing::error!(error = %err, "failed to render QR code");
            Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

async fn health() -> &'static str {
    "ok\n"
}

pub fn router(state: AppState, config: &GatewayConfig) -> Router {
    let mut router = Router::new()
        .route("/api/v1/PluginConfig.json", get(plugin_config))
        .route("/api/v1/validatePeerTube", get(validate_instance))
        .route("/health", get(health));

    if config.qr_enabled {
        router = router.route("/api/v1/qr", get(qr_code));
    }

    let mut router = router
        .fallback_service(ServeDir::new(&config.public_dir))
        .with_state(state);

    if let Some(token) = &config.static_authorization {
        router = router.layer(middleware::from_fn_with_state(
            token.clone(),
            auth::static_auth,
        ));
    }

    router
}

pub async fn serve(
    config: GatewayConfig,
    synthesizer: Arc<ConfigSynthesizer>,
) -> Result<(), GatewayError> {
    let state = AppState { synthesizer };
    let addr = format!("{}:{}", config.listener.host, config.listener.port);
    let app = router(state, &config);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use broker::{BrokerConfig, UpstreamCache};
    use http::Request;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEMPLATE_PATH: &str = "/PeerTubeConfig.json";

    async fn mock_instance() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/config/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "instance": { "name": "Example", "shortDescription": "desc" }
            })))
            .mount(&server)
            .await;
        server
    }

    async fn mock_upstream(template: Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TEMPLATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(template))
            .mount(&server)
            .await;
        server
    }

    fn app(config: GatewayConfig, upstream: &MockServer) -> Router {
        let broker_config = BrokerConfig {
            upstream_template_url: format!("{}{TEMPLATE_PATH}", upstream.uri()),
            ..BrokerConfig::default()
        };
        let cache = Arc::new(UpstreamCache::new(Duration::from_secs(5)));
        let synthesizer = Arc::new(ConfigSynthesizer::try_new(broker_config, cache).unwrap());
        router(AppState { synthesizer }, &config)
    }

    fn descriptor_request(candidate: &str) -> Request<Body> {
        Request::builder()
            .uri(format!(
                "/api/v1/PluginConfig.json?peerTubePlatformUrl={candidate}"
            ))
            .header("host", "myservice.test")
            .header("x-forwarded-proto", "https")
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn plugin_config_endpoint_returns_descriptor() {
        let instance = mock_instance().await;
        let upstream = mock_upstream(json!({"scriptUrl": "script.js", "version": 7})).await;
        let app = app(GatewayConfig::default(), &upstream);

        let response = app.oneshot(descriptor_request(&instance.uri())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let descriptor = json_body(response).await;
        assert_eq!(descriptor["name"], "Example");
        assert_eq!(descriptor["version"], 7);
        assert_eq!(descriptor["platformUrl"], instance.uri().as_str());
        assert!(
            descriptor["sourceUrl"]
                .as_str()
                .unwrap()
                .starts_with("https://myservice.test/api/v1/PluginConfig.json")
        );
    }

    #[tokio::test]
    async fn missing_parameter_is_bad_request() {
        let upstream = mock_upstream(json!({"scriptUrl": "script.js"})).await;
        let app = app(GatewayConfig::default(), &upstream);

        let request = Request::builder()
            .uri("/api/v1/PluginConfig.json")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("mandatory"));
    }

    #[tokio::test]
    async fn upstream_failure_maps_to_bad_gateway() {
        let instance = mock_instance().await;
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TEMPLATE_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&upstream)
            .await;
        let app = app(GatewayConfig::default(), &upstream);

        let response = app.oneshot(descriptor_request(&instance.uri())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn validate_endpoint_reports_validity() {
        let instance = mock_instance().await;
        let upstream = mock_upstream(json!({"scriptUrl": "script.js"})).await;
        let app = app(GatewayConfig::default(), &upstream);

        let request = Request::builder()
            .uri(format!(
                "/api/v1/validatePeerTube?peerTubePlatformUrl={}",
                instance.uri()
            ))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"valid": true}));
    }

    #[tokio::test]
    async fn validate_endpoint_reports_invalidity() {
        let upstream = mock_upstream(json!({"scriptUrl": "script.js"})).await;
        let app = app(GatewayConfig::default(), &upstream);

        let request = Request::builder()
            .uri("/api/v1/validatePeerTube?peerTubePlatformUrl=not%20a%20url%20!!")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["valid"], false);
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn qr_endpoint_returns_png() {
        let instance = mock_instance().await;
        let upstream = mock_upstream(json!({"scriptUrl": "script.js"})).await;
        let app = app(GatewayConfig::default(), &upstream);

        let request = Request::builder()
            .uri(format!("/api/v1/qr?peerTubePlatformUrl={}", instance.uri()))
            .header("host", "myservice.test")
            .header("x-forwarded-proto", "https")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/png"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[tokio::test]
    async fn qr_route_is_absent_when_disabled() {
        let upstream = mock_upstream(json!({"scriptUrl": "script.js"})).await;
        let config = GatewayConfig {
            qr_enabled: false,
            ..GatewayConfig::default()
        };
        let app = app(config, &upstream);

        let request = Request::builder()
            .uri("/api/v1/qr?peerTubePlatformUrl=example.test")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_endpoint_answers() {
        let upstream = mock_upstream(json!({"scriptUrl": "script.js"})).await;
        let app = app(GatewayConfig::default(), &upstream);

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unclaimed_paths_fall_back_to_the_public_dir() {
        let upstream = mock_upstream(json!({"scriptUrl": "script.js"})).await;
        let public = tempfile::tempdir().unwrap();
        std::fs::write(public.path().join("index.html"), "<html>browse</html>").unwrap();

        let config = GatewayConfig {
            public_dir: public.path().to_str().unwrap().to_string(),
            ..GatewayConfig::default()
        };
        let app = app(config, &upstream);

        let request = Request::builder()
            .uri("/index.html")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<html>browse</html>");
    }

    #[tokio::test]
    async fn static_auth_hides_routes_without_the_token() {
        let upstream = mock_upstream(json!({"scriptUrl": "script.js"})).await;
        let config = GatewayConfig {
            static_authorization: Some("secret".into()),
            ..GatewayConfig::default()
        };
        let app = app(config, &upstream);

        let denied = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::NOT_FOUND);

        let allowed = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("authorization", "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
    }
}
