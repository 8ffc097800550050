//! Axum router construction.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};

use super::{handlers, middleware, state::AppState};

/// Build the application [`Router`] with all routes and middleware attached.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/v1/seal", post(handlers::seal))
        .route("/v1/open", post(handlers::open))
        .route("/v1/fingerprint", post(handlers::fingerprint))
        .route("/v1/identifiers", post(handlers::register_identifier))
        .route("/v1/identifiers/check", post(handlers::check_identifier))
        .route("/v1/identifiers/migrate", post(handlers::migrate_identifiers))
        .route("/v1/identifiers/:record_id", get(handlers::get_identifier))
        .route("/v1/records/open", post(handlers::open_record))
        .route("/v1/records/seal", post(handlers::seal_record))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(middleware::MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(middleware::REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use axum_test::TestServer;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use common::protocol::{
        CheckResponse, ErrorResponse, FingerprintResponse, HealthResponse, IdentifierResponse,
        MigrateResponse, OpenResponse, OpenStatus, RecordResponse, RegisterResponse,
        SealResponse,
    };
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::index::InMemoryIdentifierStore;

    fn server_with(store: InMemoryIdentifierStore) -> TestServer {
        let state = AppState::new(crate::codec::tests::test_codec(), Arc::new(store));
        TestServer::new(build(state)).unwrap()
    }

    fn server() -> TestServer {
        server_with(InMemoryIdentifierStore::new())
    }

    async fn seal(server: &TestServer, plaintext: &str) -> String {
        let resp = server
            .post("/v1/seal")
            .json(&json!({"plaintext": plaintext}))
            .await;
        resp.assert_status_ok();
        resp.json::<SealResponse>().sealed.unwrap()
    }

    async fn open(server: &TestServer, stored: &str) -> OpenResponse {
        let resp = server.post("/v1/open").json(&json!({"stored": stored})).await;
        resp.assert_status_ok();
        resp.json::<OpenResponse>()
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = build(AppState::for_tests());
        let req = Request::builder()
            .uri("/unknown")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn health_reports_mode_and_count() {
        let server = server();
        let resp = server.get("/health").await;
        resp.assert_status_ok();
        let body = resp.json::<HealthResponse>();
        assert_eq!(body.status, "ok");
        assert_eq!(body.fingerprint_mode, "sha256");
        assert_eq!(body.identifiers_stored, 0);
    }

    #[tokio::test]
    async fn seal_store_corrupt_and_reseal() {
        let server = server();
        let first = seal(&server, "900101-01-1234").await;

        let opened = open(&server, &first).await;
        assert_eq!(opened.plaintext.as_deref(), Some("900101-01-1234"));
        assert_eq!(opened.status, OpenStatus::Sealed);

        // Corrupt one byte of the payload segment, leaving the fingerprint intact.
        let (fp, payload) = first.split_once(':').unwrap();
        let mut framed = STANDARD.decode(payload).unwrap();
        let mid = framed.len() / 2;
        framed[mid] ^= 0x04;
        let corrupted = format!("{fp}:{}", STANDARD.encode(&framed));
        let opened = open(&server, &corrupted).await;
        assert_eq!(opened.plaintext, None);
        assert_eq!(opened.status, OpenStatus::Unrecoverable);

        let second = seal(&server, "900101-01-1234").await;
        assert_ne!(first, second);
        assert_eq!(second.split_once(':').unwrap().0, fp);
    }

    #[tokio::test]
    async fn null_and_legacy_values_pass_through() {
        let server = server();
        let resp = server.post("/v1/seal").json(&json!({"plaintext": null})).await;
        assert!(resp.json::<SealResponse>().sealed.is_none());

        let resp = server.post("/v1/open").json(&json!({"stored": null})).await;
        assert_eq!(resp.json::<OpenResponse>().status, OpenStatus::Absent);

        let opened = open(&server, "901010101234").await;
        assert_eq!(opened.plaintext.as_deref(), Some("901010101234"));
        assert_eq!(opened.status, OpenStatus::Legacy);
    }

    #[tokio::test]
    async fn fingerprint_matches_sealed_prefix() {
        let server = server();
        let sealed = seal(&server, "900101-01-1234").await;
        let resp = server
            .post("/v1/fingerprint")
            .json(&json!({"plaintext": "900101-01-1234"}))
            .await;
        let fp = resp.json::<FingerprintResponse>().fingerprint;
        assert!(sealed.starts_with(&format!("{fp}:")));
    }

    #[tokio::test]
    async fn register_check_and_read() {
        let server = server();
        let resp = server
            .post("/v1/identifiers")
            .json(&json!({"record_id": "user-1", "plaintext": "900101-01-1234"}))
            .await;
        resp.assert_status(axum::http::StatusCode::CREATED);
        let registered = resp.json::<RegisterResponse>();
        assert_eq!(registered.record_id, "user-1");
        assert!(!registered.stored.contains("900101-01-1234"));

        let dup = server
            .post("/v1/identifiers/check")
            .json(&json!({"candidate": "900101-01-1234"}))
            .await
            .json::<CheckResponse>();
        assert!(dup.duplicate);

        let other = server
            .post("/v1/identifiers/check")
            .json(&json!({"candidate": "900101-01-1235"}))
            .await
            .json::<CheckResponse>();
        assert!(!other.duplicate);

        let read = server
            .get("/v1/identifiers/user-1")
            .await
            .json::<IdentifierResponse>();
        assert_eq!(read.plaintext.as_deref(), Some("900101-01-1234"));
        assert_eq!(read.status, OpenStatus::Sealed);
    }

    #[tokio::test]
    async fn duplicate_registration_is_conflict() {
        let server = server();
        server
            .post("/v1/identifiers")
            .json(&json!({"record_id": "user-1", "plaintext": "900101-01-1234"}))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        let resp = server
            .post("/v1/identifiers")
            .json(&json!({"record_id": "user-2", "plaintext": "900101-01-1234"}))
            .await;
        resp.assert_status(axum::http::StatusCode::CONFLICT);
        assert_eq!(resp.json::<ErrorResponse>().code, "duplicate_identifier");
    }

    #[tokio::test]
    async fn register_assigns_record_id() {
        let server = server();
        let resp = server
            .post("/v1/identifiers")
            .json(&json!({"plaintext": "900101-01-1234"}))
            .await;
        resp.assert_status(axum::http::StatusCode::CREATED);
        assert!(uuid::Uuid::parse_str(&resp.json::<RegisterResponse>().record_id).is_ok());
    }

    #[tokio::test]
    async fn register_rejects_empty_identifier() {
        let server = server();
        server
            .post("/v1/identifiers")
            .json(&json!({"record_id": "user-1", "plaintext": ""}))
            .await
            .assert_status(axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_record_is_404() {
        let server = server();
        server
            .get("/v1/identifiers/nobody")
            .await
            .assert_status(axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn migrate_reseals_legacy_rows() {
        let store = InMemoryIdentifierStore::new();
        store.seed("legacy-1", "901010101234").await;
        let server = server_with(store);

        let report = server
            .post("/v1/identifiers/migrate")
            .await
            .json::<MigrateResponse>();
        assert_eq!(report.resealed, 1);
        assert_eq!(report.skipped, 0);

        let read = server
            .get("/v1/identifiers/legacy-1")
            .await
            .json::<IdentifierResponse>();
        assert_eq!(read.status, OpenStatus::Sealed);
        assert_eq!(read.plaintext.as_deref(), Some("901010101234"));
    }

    #[tokio::test]
    async fn record_seal_and_open_round_trip() {
        let server = server();
        let app = json!({
            "id": "app-1",
            "icNumber": "900101-01-1234",
            "user": {"id": "user-1", "icNumber": "900101-01-1234"}
        });
        let sealed = server
            .post("/v1/records/seal")
            .json(&json!({"shape": "application", "record": app}))
            .await
            .json::<RecordResponse>()
            .record;
        assert_ne!(sealed["icNumber"], app["icNumber"]);

        let opened = server
            .post("/v1/records/open")
            .json(&json!({"shape": "application", "record": sealed}))
            .await
            .json::<RecordResponse>()
            .record;
        assert_eq!(opened, app);
    }

    #[tokio::test]
    async fn unknown_shape_is_rejected() {
        let server = server();
        let resp = server
            .post("/v1/records/open")
            .json(&json!({"shape": "audit_log", "record": {}}))
            .await;
        resp.assert_status(axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(resp.json::<ErrorResponse>().code, "bad_request");
    }

    #[tokio::test]
    async fn malformed_body_gets_json_error() {
        let server = server();
        let resp = server
            .post("/v1/seal")
            .bytes("{\"plaintext\": ".into())
            .content_type("application/json")
            .await;
        resp.assert_status(axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(resp.json::<ErrorResponse>().code, "bad_request");

        let resp = server.post("/v1/identifiers/check").text("candidate=1").await;
        resp.assert_status(axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(resp.json::<ErrorResponse>().code, "bad_request");
    }

    #[tokio::test]
    async fn colon_in_identifier_is_sealed_not_stored_raw() {
        let server = server();
        let record = json!({"icNumber": "900101:01:1234"});
        let sealed = server
            .post("/v1/records/seal")
            .json(&json!({"shape": "user", "record": record}))
            .await
            .json::<RecordResponse>()
            .record;
        assert_ne!(sealed["icNumber"], record["icNumber"]);

        let opened = server
            .post("/v1/records/open")
            .json(&json!({"shape": "user", "record": sealed}))
            .await
            .json::<RecordResponse>()
            .record;
        assert_eq!(opened, record);
    }
}
