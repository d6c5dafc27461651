#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{
        body::Body,
        extract::ConnectInfo,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::json;

    use crate::tests::support::{spawn_app, spawn_app_with, test_config};

    #[tokio::test]
    async fn test_unmatched_route_returns_404_envelope() {
        let app = spawn_app().await;

        let res = app.get("/api/v1/definitely-not-here").await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.body["success"], false);
        assert_eq!(res.body["message"], "Route not found");
        assert_eq!(res.body["error"]["code"], "NOT_FOUND");
        assert_eq!(res.body["statusCode"], 404);
        assert!(res.body["timestamp"].is_string());

        // Outside the API prefix as well
        let res = app.get("/nope").await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.body["message"], "Route not found");
    }

    #[tokio::test]
    async fn test_wrong_method_returns_405_envelope() {
        let app = spawn_app().await;

        let req = Request::builder().method(Method::DELETE).uri("/api/v1/categories").body(Body::empty()).unwrap();
        let res = app.send(req).await;
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.body["success"], false);
        assert_eq!(res.body["error"]["code"], "METHOD_NOT_ALLOWED");
    }

    #[tokio::test]
    async fn test_request_id_is_generated_and_echoed() {
        let app = spawn_app().await;

        let res = app.get("/api/v1/categories").await;
        let generated = res.headers.get("x-request-id").unwrap().to_str().unwrap();
        assert!(uuid::Uuid::parse_str(generated).is_ok());

        let req = Request::builder()
            .uri("/api/v1/categories")
            .header("x-request-id", "client-abc-123")
            .body(Body::empty())
            .unwrap();
        let res = app.send(req).await;
        assert_eq!(res.headers.get("x-request-id").unwrap(), "client-abc-123");
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let app = spawn_app().await;

        let res = app.get("/api/v1/health").await;
        let headers = &res.headers;
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert!(headers.contains_key("referrer-policy"));
        assert!(headers.contains_key("permissions-policy"));
        assert!(headers.contains_key("cross-origin-opener-policy"));
        assert!(headers.contains_key("cross-origin-resource-policy"));
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
        assert!(!headers.contains_key("strict-transport-security"));
    }

    #[tokio::test]
    async fn test_hsts_and_csp_from_config() {
        let mut cfg = test_config();
        cfg.security.enable_hsts = Some(true);
        cfg.security.hsts_max_age = Some(600);
        cfg.security.hsts_include_subdomains = Some(true);
        cfg.security.csp = Some("default-src 'none'".into());
        let app = spawn_app_with(cfg).await;

        let res = app.get("/api/v1/health").await;
        assert_eq!(res.headers.get("strict-transport-security").unwrap(), "max-age=600; includeSubDomains");
        assert_eq!(res.headers.get("content-security-policy").unwrap(), "default-src 'none'");
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin_only() {
        let app = spawn_app().await;

        let preflight = |origin: &'static str| {
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/v1/orders")
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap()
        };

        let res = app.send(preflight("http://localhost:3000")).await;
        assert_eq!(res.headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "http://localhost:3000");
        assert_eq!(res.headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");

        let res = app.send(preflight("https://evil.example")).await;
        assert!(!res.headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn test_rate_limit_returns_429_after_maximum() {
        let mut cfg = test_config();
        cfg.rate_limit.max_requests = 3;
        let app = spawn_app_with(cfg).await;

        for expected_remaining in ["2", "1", "0"] {
            let res = app.get("/api/v1/categories").await;
            assert_eq!(res.status, StatusCode::OK);
            assert_eq!(res.headers.get("ratelimit-limit").unwrap(), "3");
            assert_eq!(res.headers.get("ratelimit-remaining").unwrap(), expected_remaining);
        }

        let res = app.get("/api/v1/categories").await;
        assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.body["error"]["code"], "RATE_LIMITED");
        assert!(res.headers.contains_key(header::RETRY_AFTER));
        assert_eq!(app.state.metrics.get_snapshot().requests_rate_limited, 1);

        // Another client is unaffected
        assert_eq!(app.send(from_socket("/api/v1/categories", [203, 0, 113, 9], None)).await.status, StatusCode::OK);
    }

    fn from_socket(uri: &str, ip: [u8; 4], forwarded_for: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(xff) = forwarded_for {
            builder = builder.header("x-forwarded-for", xff);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        req.extensions_mut().insert(ConnectInfo(SocketAddr::from((ip, 40_000))));
        req
    }

    #[tokio::test]
    async fn test_rotating_forwarded_for_does_not_bypass_rate_limit() {
        let mut cfg = test_config();
        cfg.rate_limit.max_requests = 2;
        let app = spawn_app_with(cfg).await;

        let mut allowed = 0;
        for i in 0..20 {
            let xff = format!("10.0.0.{}", i);
            let res = app.send(from_socket("/api/v1/categories", [198, 51, 100, 4], Some(&xff))).await;
            if res.status == StatusCode::OK {
                allowed += 1;
            } else {
                assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
            }
        }
        assert_eq!(allowed, 2);
    }

    #[tokio::test]
    async fn test_trusted_proxy_keys_on_forwarded_for() {
        let mut cfg = test_config();
        cfg.rate_limit.max_requests = 1;
        cfg.rate_limit.trust_proxy = true;
        let app = spawn_app_with(cfg).await;
        let proxy = [10, 1, 1, 1];

        let res = app.send(from_socket("/api/v1/categories", proxy, Some("203.0.113.1"))).await;
        assert_eq!(res.status, StatusCode::OK);
        let res = app.send(from_socket("/api/v1/categories", proxy, Some("203.0.113.1"))).await;
        assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
        let res = app.send(from_socket("/api/v1/categories", proxy, Some("203.0.113.2, 10.1.1.1"))).await;
        assert_eq!(res.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_json_is_400_and_rule_violation_is_422() {
        let app = spawn_app().await;

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/orders")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let res = app.send(req).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.body["error"]["code"], "BAD_REQUEST");

        let res = app
            .post(
                "/api/v1/orders",
                &json!({
                    "customerName": "",
                    "customerEmail": "not-an-email",
                    "customerPhone": "123",
                    "shippingAddress": crate::tests::support::shipping_address(),
                    "items": [],
                }),
            )
            .await;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(res.body["error"]["code"], "VALIDATION_ERROR");
        let fields: Vec<&str> =
            res.body["error"]["details"].as_array().unwrap().iter().map(|d| d["field"].as_str().unwrap()).collect();
        assert!(fields.contains(&"customerName"));
        assert!(fields.contains(&"customerEmail"));
        assert!(fields.contains(&"customerPhone"));
        assert!(fields.contains(&"items"));
    }

    #[tokio::test]
    async fn test_declared_oversized_body_is_413() {
        let app = spawn_app().await;

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/orders")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, (20 * 1024 * 1024).to_string())
            .body(Body::empty())
            .unwrap();
        let res = app.send(req).await;
        assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(res.body["error"]["code"], "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_path_traversal_is_rejected() {
        let app = spawn_app().await;

        let res = app.get("/api/v1/products/%2e%2e/orders").await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dev_routes_only_in_development() {
        let app = spawn_app().await;
        let res = app.post("/api/v1/dev/email", &json!({ "email": "dev@example.com" })).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);

        let mut cfg = test_config();
        cfg.app.environment = crate::config::Environment::Development;
        let app = spawn_app_with(cfg).await;
        let res = app.post("/api/v1/dev/email", &json!({ "email": "dev@example.com" })).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["data"]["id"], "msg_1");

        let sent = app.mailer.sent.lock().unwrap();
        assert_eq!(sent[0].to, vec!["dev@example.com".to_string()]);
        assert_eq!(sent[0].subject, "Test Email from CrestSports Dev");
    }
}
