#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::gateway::error::{ApiError, ConnectionStatus};
    use crate::tests::common::{closed_port_url, hits, spawn_axum, test_gateway, token_router};

    fn bearer(headers: &HeaderMap) -> String {
        headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned()
    }

    /// `GET /v2/locations` answering `status` for every token listed in `rejected`.
    fn vendor_router(counter: Arc<AtomicUsize>, rejected: &'static [&'static str]) -> Router {
        Router::new().route(
            "/v2/locations",
            get(move |headers: HeaderMap| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let token = bearer(&headers);
                    if rejected.iter().any(|rejected| token == format!("Bearer {}", rejected)) {
                        (StatusCode::UNAUTHORIZED, String::new())
                    } else {
                        (StatusCode::OK, format!(r#"{{"seen":"{}"}}"#, token))
                    }
                }
            }),
        )
    }

    /// Raw TCP server answering the N-th connection with the status line `script[N - 1]`,
    /// or closing it unanswered on `None`. Returns the address and the accepted connection count.
    async fn scripted_server(script: &'static [Option<&'static str>]) -> (SocketAddr, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let mut request = vec![0u8; 8192];
                let _ = stream.read(&mut request).await;
                match script.get(n).copied().flatten() {
                    Some(status) => {
                        let body = r#"{"ok":true}"#;
                        let response = format!(
                            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                            status,
                            body.len(),
                            body
                        );
                        let _ = stream.write_all(response.as_bytes()).await;
                        let _ = stream.shutdown().await;
                    }
                    None => drop(stream),
                }
            }
        });
        (addr, accepted)
    }

    #[tokio::test]
    async fn first_call_exchanges_the_authorization_code() {
        let tokens = Arc::new(AtomicUsize::new(0));
        let vendor = Arc::new(AtomicUsize::new(0));
        let router = token_router(tokens.clone()).merge(vendor_router(vendor.clone(), &[]));
        let (_h, addr) = spawn_axum(router).await;
        let gateway = test_gateway(addr, "ABC", "");

        let body = gateway.get(&format!("http://{}/v2/locations", addr)).await.unwrap();

        assert_eq!(body, r#"{"seen":"Bearer access-1"}"#);
        assert_eq!(hits(&tokens), 1);
        assert!(gateway.is_authenticated().await);
        assert_eq!(gateway.authorization_code().await, "");
        assert_eq!(gateway.current_refresh_token().await, "refresh-1");
        assert_eq!(*gateway.watch_refresh_token().borrow(), "refresh-1");
    }

    #[tokio::test]
    async fn unauthorized_renews_token_and_retries_once() {
        let tokens = Arc::new(AtomicUsize::new(0));
        let vendor = Arc::new(AtomicUsize::new(0));
        let router = token_router(tokens.clone()).merge(vendor_router(vendor.clone(), &["access-1"]));
        let (_h, addr) = spawn_axum(router).await;
        let gateway = test_gateway(addr, "", "R1");

        let body = gateway.get(&format!("http://{}/v2/locations", addr)).await.unwrap();

        assert_eq!(body, r#"{"seen":"Bearer access-2"}"#);
        assert_eq!(hits(&vendor), 2);
        assert_eq!(hits(&tokens), 2);
    }

    #[tokio::test]
    async fn second_unauthorized_is_an_auth_failure() {
        let tokens = Arc::new(AtomicUsize::new(0));
        let vendor = Arc::new(AtomicUsize::new(0));
        let router = token_router(tokens.clone())
            .merge(vendor_router(vendor.clone(), &["access-1", "access-2"]));
        let (_h, addr) = spawn_axum(router).await;
        let gateway = test_gateway(addr, "", "R1");
        let url = format!("http://{}/v2/locations", addr);

        let err = gateway.get(&url).await.unwrap_err();

        assert_eq!(err, ApiError::AuthFailure { url });
        assert_eq!(err.status(), ConnectionStatus::OfflineConfigurationError);
        assert_eq!(hits(&vendor), 2);
        assert!(!gateway.is_authenticated().await);
    }

    #[tokio::test]
    async fn concurrent_unauthorized_calls_renew_once() {
        let tokens = Arc::new(AtomicUsize::new(0));
        let vendor = Arc::new(AtomicUsize::new(0));
        let router = token_router(tokens.clone()).merge(vendor_router(vendor.clone(), &["access-1"]));
        let (_h, addr) = spawn_axum(router).await;
        let gateway = test_gateway(addr, "", "R1");
        let url = format!("http://{}/v2/locations", addr);

        let (a, b) = tokio::join!(gateway.get(&url), gateway.get(&url));

        assert_eq!(a.unwrap(), r#"{"seen":"Bearer access-2"}"#);
        assert_eq!(b.unwrap(), r#"{"seen":"Bearer access-2"}"#);
        assert_eq!(hits(&tokens), 2);
    }

    #[tokio::test]
    async fn terminal_statuses_are_not_retried() {
        let tokens = Arc::new(AtomicUsize::new(0));
        let vendor = Arc::new(AtomicUsize::new(0));
        let (c429, c400, c500) = (vendor.clone(), vendor.clone(), vendor.clone());
        let router = token_router(tokens.clone())
            .route("/v2/limited", get(move || async move {
                c429.fetch_add(1, Ordering::SeqCst);
                StatusCode::TOO_MANY_REQUESTS
            }))
            .route("/v2/bad", get(move || async move {
                c400.fetch_add(1, Ordering::SeqCst);
                StatusCode::BAD_REQUEST
            }))
            .route("/v2/broken", get(move || async move {
                c500.fetch_add(1, Ordering::SeqCst);
                StatusCode::INTERNAL_SERVER_ERROR
            }));
        let (_h, addr) = spawn_axum(router).await;
        let gateway = test_gateway(addr, "", "R1");

        let limited = format!("http://{}/v2/limited", addr);
        let err = gateway.get(&limited).await.unwrap_err();
        assert_eq!(err, ApiError::RateLimited { url: limited });
        assert_eq!(err.status(), ConnectionStatus::OfflineCommunicationError);

        let bad = format!("http://{}/v2/bad", addr);
        let err = gateway.get(&bad).await.unwrap_err();
        assert_eq!(err, ApiError::BadRequest { url: bad });
        assert_eq!(err.status(), ConnectionStatus::OfflineConfigurationError);

        let broken = format!("http://{}/v2/broken", addr);
        let err = gateway.get(&broken).await.unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedStatus { code: 500, .. }), "{:?}", err);
        assert_eq!(err.status(), ConnectionStatus::OfflineCommunicationError);

        assert_eq!(hits(&vendor), 3);
        assert_eq!(hits(&tokens), 1);
    }

    #[tokio::test]
    async fn unreachable_host_fails_after_one_retry() {
        let tokens = Arc::new(AtomicUsize::new(0));
        let (_h, addr) = spawn_axum(token_router(tokens.clone())).await;
        let gateway = test_gateway(addr, "", "R1");
        let url = closed_port_url("/v2/locations").await;

        let err = gateway.get(&url).await.unwrap_err();

        assert!(matches!(&err, ApiError::ConnectionFailure { url: failed, .. } if *failed == url), "{:?}", err);
        assert_eq!(err.status(), ConnectionStatus::OfflineCommunicationError);
        // still authenticated, only the resource host is down
        assert!(gateway.is_authenticated().await);
    }

    #[tokio::test]
    async fn transport_failure_then_success_retries_once() {
        let tokens = Arc::new(AtomicUsize::new(0));
        let (_h, token_addr) = spawn_axum(token_router(tokens.clone())).await;
        let (vendor_addr, attempts) = scripted_server(&[None, Some("200 OK")]).await;
        let gateway = test_gateway(token_addr, "", "R1");

        let body = gateway.get(&format!("http://{}/v2/locations", vendor_addr)).await.unwrap();

        assert_eq!(body, r#"{"ok":true}"#);
        assert_eq!(hits(&attempts), 2);
        assert_eq!(hits(&tokens), 1);
    }

    #[tokio::test]
    async fn transport_failure_after_renewal_is_terminal() {
        let tokens = Arc::new(AtomicUsize::new(0));
        let (_h, token_addr) = spawn_axum(token_router(tokens.clone())).await;
        let (vendor_addr, attempts) =
            scripted_server(&[Some("401 Unauthorized"), None, Some("200 OK")]).await;
        let gateway = test_gateway(token_addr, "", "R1");
        let url = format!("http://{}/v2/locations", vendor_addr);

        let err = gateway.get(&url).await.unwrap_err();

        assert!(matches!(&err, ApiError::ConnectionFailure { url: failed, .. } if *failed == url), "{:?}", err);
        assert_eq!(hits(&attempts), 2);
        assert_eq!(hits(&tokens), 2);
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_request() {
        let vendor = Arc::new(AtomicUsize::new(0));
        let tokens = Arc::new(AtomicUsize::new(0));
        let router = token_router(tokens.clone()).merge(vendor_router(vendor.clone(), &[]));
        let (_h, addr) = spawn_axum(router).await;
        let gateway = test_gateway(addr, "", "");

        let err = gateway.get(&format!("http://{}/v2/locations", addr)).await.unwrap_err();

        assert!(matches!(err, ApiError::NoCredentialPath(_)));
        assert_eq!(err.status(), ConnectionStatus::OfflineConfigurationError);
        assert_eq!(hits(&vendor), 0);
        assert_eq!(hits(&tokens), 0);
    }

    #[tokio::test]
    async fn post_forwards_body_with_json_headers() {
        let tokens = Arc::new(AtomicUsize::new(0));
        let seen: Arc<Mutex<Option<(String, String, String)>>> = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        let router = token_router(tokens.clone()).route(
            "/v2/devices/thermostats/TCC-1",
            axum::routing::post(move |headers: HeaderMap, body: String| {
                let seen = seen_clone.clone();
                async move {
                    let content_type = headers
                        .get("content-type")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or_default()
                        .to_owned();
                    *seen.lock().unwrap() = Some((bearer(&headers), content_type, body));
                    (StatusCode::OK, r#"{"ok":true}"#)
                }
            }),
        );
        let (_h, addr) = spawn_axum(router).await;
        let gateway = test_gateway(addr, "", "R1");

        let response = gateway
            .post(&format!("http://{}/v2/devices/thermostats/TCC-1", addr), r#"{"mode":"Heat"}"#)
            .await
            .unwrap();

        assert_eq!(response, r#"{"ok":true}"#);
        let (auth, content_type, body) = seen.lock().unwrap().clone().expect("request seen");
        assert_eq!(auth, "Bearer access-1");
        assert_eq!(content_type, "application/json");
        assert_eq!(body, r#"{"mode":"Heat"}"#);
    }

    #[tokio::test]
    async fn reset_forces_a_new_exchange() {
        let tokens = Arc::new(AtomicUsize::new(0));
        let vendor = Arc::new(AtomicUsize::new(0));
        let router = token_router(tokens.clone()).merge(vendor_router(vendor.clone(), &[]));
        let (_h, addr) = spawn_axum(router).await;
        let gateway = test_gateway(addr, "", "R1");
        let url = format!("http://{}/v2/locations", addr);

        gateway.get(&url).await.unwrap();
        gateway.get(&url).await.unwrap();
        assert_eq!(hits(&tokens), 1);

        gateway.reset_access_token().await;
        assert!(gateway.needs_refresh().await);
        let body = gateway.get(&url).await.unwrap();
        assert_eq!(body, r#"{"seen":"Bearer access-2"}"#);
        assert_eq!(hits(&tokens), 2);
    }

    #[test]
    fn error_status_mapping() {
        let url = "http://vendor/v2/locations".to_owned();
        let configuration = [
            ApiError::AuthFailure { url: url.clone() },
            ApiError::BadRequest { url: url.clone() },
            ApiError::NoCredentialPath("none".to_owned()),
            ApiError::InvalidUrl { url: url.clone(), message: "bad".to_owned() },
        ];
        for err in configuration {
            assert_eq!(err.status(), ConnectionStatus::OfflineConfigurationError, "{:?}", err);
        }

        let communication = [
            ApiError::ConnectionFailure { url: url.clone(), message: "refused".to_owned() },
            ApiError::RateLimited { url: url.clone() },
            ApiError::UnexpectedStatus { url, code: 503, reason: "Service Unavailable".to_owned() },
        ];
        for err in communication {
            assert_eq!(err.status(), ConnectionStatus::OfflineCommunicationError, "{:?}", err);
        }
    }
}
