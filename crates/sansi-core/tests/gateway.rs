mod support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Duration as ChronoDuration, Utc};
use reqwest::header::{HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::json;

use sansi_core::api::Method;
use sansi_core::auth::MemoryStorage;
use sansi_core::{ApiClient, CredentialStore, ErrorKind, RequestOptions};
use support::{profile, unreachable_root, StubResponse, StubServer};

fn client_for(root: &str) -> ApiClient {
    let store = Arc::new(CredentialStore::new(MemoryStorage::new()));
    ApiClient::new(root, store).unwrap()
}

fn sign_in(api: &ApiClient, token: &str, expires_in: ChronoDuration) {
    api.store()
        .save_with_expiry(token, &profile(), Utc::now() + expires_in)
        .unwrap();
}

#[tokio::test]
async fn test_returns_body_and_sends_stored_bearer() {
    let server = StubServer::respond_with(StubResponse::json(200, json!({"ok": true, "data": 42}))).await;
    let api = client_for(&server.root());
    sign_in(&api, "abc", ChronoDuration::milliseconds(5000));

    let body = api.request("/ping", RequestOptions::new()).await.unwrap();
    assert_eq!(body, Some(json!({"ok": true, "data": 42})));

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/api/ping");
    assert_eq!(requests[0].header("authorization"), Some("Bearer abc"));
    assert_eq!(requests[0].header("content-type"), Some("application/json"));
}

#[tokio::test]
async fn test_unauthorized_clears_session_for_any_method() {
    let server = StubServer::respond_with(StubResponse::json(401, json!({"message": "Token inválido"}))).await;
    let api = client_for(&server.root());

    let calls = vec![
        (Method::GET, None),
        (Method::POST, Some(json!({"nombre": "Fase 1"}))),
        (Method::PUT, Some(json!({"nota": 71}))),
        (Method::DELETE, None),
    ];

    for (method, body) in calls {
        sign_in(&api, "abc", ChronoDuration::hours(1));

        let mut options = RequestOptions::new().method(method.clone());
        if let Some(body) = body {
            options = options.json(body);
        }
        let err = api.request("/fases", options).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SessionExpired, "{}", method);
        assert_eq!(err.to_string(), "Token inválido");
        assert!(api.store().token().is_none(), "{} left a token behind", method);
        assert!(!api.store().is_logged_in());
    }
    assert_eq!(server.requests().len(), 4);
}

#[tokio::test]
async fn test_expired_session_fails_without_network_call() {
    let server = StubServer::respond_with(StubResponse::json(200, json!({"ok": true}))).await;
    let api = client_for(&server.root());
    sign_in(&api, "stale", -ChronoDuration::hours(1));

    let err = api.get("/olimpistas").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SessionExpired);
    assert!(api.store().token().is_none());
    assert!(server.requests().is_empty());

    // Cleared store no longer blocks requests; they simply go out anonymously
    api.get("/olimpistas").await.unwrap();
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].header("authorization").is_none());
}

#[tokio::test]
async fn test_explicit_token_bypasses_expired_session() {
    let server = StubServer::respond_with(StubResponse::json(200, json!({"ok": true}))).await;
    let api = client_for(&server.root());
    sign_in(&api, "stale", -ChronoDuration::hours(1));

    api.request("/perfil", RequestOptions::new().bearer("X"))
        .await
        .unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].header("authorization"), Some("Bearer X"));
}

#[tokio::test]
async fn test_times_out_on_slow_backend() {
    let server = StubServer::respond_with(
        StubResponse::json(200, json!({"ok": true})).delayed(Duration::from_millis(20_000)),
    )
    .await;
    let api = client_for(&server.root());

    let started = Instant::now();
    let err = api
        .request("/reportes", RequestOptions::new().timeout(Duration::from_millis(100)))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
}

#[tokio::test]
async fn test_client_default_timeout_applies() {
    let server = StubServer::respond_with(
        StubResponse::json(200, json!({})).delayed(Duration::from_millis(20_000)),
    )
    .await;
    let api = client_for(&server.root()).with_timeout(Duration::from_millis(100));

    let err = api.get("/reportes").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn test_unreachable_backend() {
    let api = client_for(&unreachable_root().await);

    let err = api.get("/ping").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NetworkUnreachable);
    assert!(err.to_string().starts_with("Unable to reach the server"));
}

#[tokio::test]
async fn test_application_failures() {
    let server = StubServer::routes(vec![
        ("POST", "/api/importar", StubResponse::json(200, json!({"ok": false, "message": "Archivo vacío"}))),
        ("GET", "/api/areas", StubResponse::json(422, json!({"error": "Gestión inválida"}))),
        ("GET", "/api/caido", StubResponse::raw(503, "<html>down</html>")),
    ])
    .await;
    let api = client_for(&server.root());
    sign_in(&api, "abc", ChronoDuration::hours(1));

    let err = api.post("/importar", &json!({"filas": []})).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ApplicationError);
    assert_eq!(err.to_string(), "Archivo vacío");

    let err = api.get("/areas").await.unwrap_err();
    assert_eq!(err.status(), Some(422));
    assert_eq!(err.to_string(), "Gestión inválida");

    let err = api.get("/caido").await.unwrap_err();
    assert_eq!(err.to_string(), "Error 503 - Service Unavailable");

    // Application errors leave the session alone
    assert_eq!(api.store().token().as_deref(), Some("abc"));
}

#[tokio::test]
async fn test_empty_success_body_is_absent() {
    let server = StubServer::routes(vec![
        ("DELETE", "/api/evaluadores/3", StubResponse::raw(200, "")),
        ("GET", "/api/texto", StubResponse::raw(200, "hola")),
    ])
    .await;
    let api = client_for(&server.root());

    assert_eq!(api.delete("/evaluadores/3").await.unwrap(), None);
    assert_eq!(api.get("texto").await.unwrap(), None);
}

#[tokio::test]
async fn test_sends_json_body_and_call_headers_win() {
    let server = StubServer::respond_with(StubResponse::json(201, json!({"id": 9}))).await;
    let api = client_for(&server.root());
    sign_in(&api, "abc", ChronoDuration::hours(1));

    let options = RequestOptions::new()
        .method(Method::PATCH)
        .json(json!({"estado": "APROBADO"}))
        .bearer("explicit")
        .header(
            HeaderName::from_static("authorization"),
            HeaderValue::from_static("Bearer from-header"),
        )
        .header(
            HeaderName::from_static("x-gestion"),
            HeaderValue::from_static("2025"),
        );
    let body = api.request("/calificaciones/9", options).await.unwrap();
    assert_eq!(body, Some(json!({"id": 9})));

    let request = &server.requests()[0];
    assert_eq!(request.method, "PATCH");
    assert_eq!(request.json(), json!({"estado": "APROBADO"}));
    assert_eq!(request.header("authorization"), Some("Bearer from-header"));
    assert_eq!(request.header("x-gestion"), Some("2025"));
    assert_eq!(request.header("content-type"), Some("application/json"));
}

#[tokio::test]
async fn test_absolute_url_used_verbatim() {
    let server = StubServer::respond_with(StubResponse::json(200, json!({"ok": true}))).await;
    let api = client_for("https://nowhere.invalid");

    let url = format!("{}/certificados/12", server.root());
    api.get(&url).await.unwrap();

    assert_eq!(server.requests()[0].path, "/certificados/12");
}

#[tokio::test]
async fn test_typed_responses() {
    #[derive(Debug, Deserialize)]
    struct Fase {
        id: i64,
        nombre: String,
    }

    let server = StubServer::routes(vec![
        ("GET", "/api/fases/1", StubResponse::json(200, json!({"id": 1, "nombre": "Clasificatoria"}))),
        ("GET", "/api/fases/2", StubResponse::json(200, json!({"id": "dos"}))),
    ])
    .await;
    let api = client_for(&server.root());

    let fase: Fase = api
        .request_as("/fases/1", RequestOptions::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fase.id, 1);
    assert_eq!(fase.nombre, "Clasificatoria");

    let err = api
        .request_as::<Fase>("/fases/2", RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResponse);
}
