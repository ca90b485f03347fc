// CORS layer built from the configured origins

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// `*` in the list allows any origin; unparseable entries are skipped
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(origins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    async fn allowed_origin(origins: &[&str], origin: &str) -> Option<String> {
        let origins: Vec<String> = origins.iter().map(|o| o.to_string()).collect();
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(cors_layer(&origins));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, origin)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_wildcard_allows_any_origin() {
        assert_eq!(allowed_origin(&["*"], "https://anywhere.dev").await.as_deref(), Some("*"));
    }

    #[tokio::test]
    async fn test_invalid_origins_are_skipped() {
        let origins = ["bad\norigin", "https://app.example"];

        assert_eq!(
            allowed_origin(&origins, "https://app.example").await.as_deref(),
            Some("https://app.example")
        );
        assert_eq!(allowed_origin(&origins, "https://other.example").await, None);
    }
}
