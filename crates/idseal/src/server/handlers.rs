//! Axum request handlers for all service endpoints.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::{
    CheckRequest, CheckResponse, ErrorResponse, FingerprintRequest, FingerprintResponse,
    HealthResponse, IdentifierResponse, MigrateResponse, OpenRequest, OpenResponse, OpenStatus,
    RecordRequest, RecordResponse, RegisterRequest, RegisterResponse, SealRequest, SealResponse,
};
use common::ServiceError;
use tracing::{error, warn};

use super::state::AppState;
use crate::codec::{CodecError, OpenError, Opened, ValueOrigin};
use crate::index::{IndexError, StoreError, Uniqueness};
use crate::redact;

/// Handler error: a [`ServiceError`] rendered as an [`ErrorResponse`] body.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(ServiceError::BadRequest(rejection.body_text()))
    }
}

/// `Json` extractor whose rejections are rendered as [`ErrorResponse`] bodies.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<CodecError> for ApiError {
    fn from(e: CodecError) -> Self {
        error!(error = %e, "sealing failed");
        ApiError(ServiceError::EncryptionFailure("sealing failed".into()))
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(_) => {
                ApiError(ServiceError::Conflict("identifier already registered".into()))
            }
            StoreError::Unavailable(msg) => {
                warn!(error = %msg, "identifier store unavailable");
                ApiError(ServiceError::Unavailable("identifier store unavailable".into()))
            }
        }
    }
}

impl From<IndexError> for ApiError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::Duplicate => {
                ApiError(ServiceError::Conflict("identifier already registered".into()))
            }
            IndexError::EmptyIdentifier => {
                ApiError(ServiceError::BadRequest("identifier must not be empty".into()))
            }
            IndexError::Codec(e) => e.into(),
            IndexError::Store(e) => e.into(),
        }
    }
}

/// Collapse an open result into the wire representation.
fn open_status(result: Result<Opened, OpenError>) -> (Option<String>, OpenStatus) {
    match result {
        Ok(Opened {
            plaintext,
            origin: ValueOrigin::Empty,
        }) => (Some(plaintext), OpenStatus::Absent),
        Ok(Opened {
            plaintext,
            origin: ValueOrigin::Legacy,
        }) => (Some(plaintext), OpenStatus::Legacy),
        Ok(Opened {
            plaintext,
            origin: ValueOrigin::Sealed,
        }) => (Some(plaintext), OpenStatus::Sealed),
        Err(_) => (None, OpenStatus::Unrecoverable),
    }
}

/// `POST /v1/seal` — seal one identifier for storage.
pub async fn seal(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SealRequest>,
) -> Result<Json<SealResponse>, ApiError> {
    let sealed = state.codec.seal(req.plaintext.as_deref())?;
    Ok(Json(SealResponse { sealed }))
}

/// `POST /v1/open` — open one stored value.
///
/// Unrecoverable values return `200` with `plaintext: null` and
/// `status: "unrecoverable"`, never an error status.
pub async fn open(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<OpenRequest>,
) -> Json<OpenResponse> {
    let (plaintext, status) = match req.stored.as_deref() {
        None => (None, OpenStatus::Absent),
        Some(stored) => open_status(state.codec.try_open(stored)),
    };
    Json(OpenResponse { plaintext, status })
}

/// `POST /v1/fingerprint` — fingerprint a candidate without sealing it.
pub async fn fingerprint(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<FingerprintRequest>,
) -> Json<FingerprintResponse> {
    Json(FingerprintResponse {
        fingerprint: state.codec.fingerprint(&req.plaintext),
    })
}

/// `POST /v1/identifiers/check` — is this identifier already registered?
pub async fn check_identifier(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CheckRequest>,
) -> Result<Json<CheckResponse>, ApiError> {
    let duplicate = matches!(
        state.index.check(&req.candidate).await?,
        Uniqueness::Duplicate { .. }
    );
    Ok(Json(CheckResponse { duplicate }))
}

/// `POST /v1/identifiers` — seal and store an identifier, rejecting duplicates.
pub async fn register_identifier(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let record_id = match req.record_id {
        Some(id) if !id.trim().is_empty() => id,
        Some(_) => {
            return Err(ApiError(ServiceError::BadRequest(
                "record_id must not be blank".into(),
            )))
        }
        None => uuid::Uuid::new_v4().to_string(),
    };
    let stored = state.index.register(&record_id, &req.plaintext).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { record_id, stored }),
    ))
}

/// `GET /v1/identifiers/:record_id` — authorized read of a stored identifier.
pub async fn get_identifier(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<Json<IdentifierResponse>, ApiError> {
    let Some(result) = state.index.read(&record_id).await? else {
        return Err(ApiError(ServiceError::NotFound(format!(
            "no identifier for record {record_id}"
        ))));
    };
    let (plaintext, status) = open_status(result);
    Ok(Json(IdentifierResponse {
        record_id,
        plaintext,
        status,
    }))
}

/// `POST /v1/identifiers/migrate` — reseal every legacy plaintext row.
pub async fn migrate_identifiers(
    State(state): State<AppState>,
) -> Result<Json<MigrateResponse>, ApiError> {
    let report = state.index.reseal_legacy().await?;
    Ok(Json(MigrateResponse {
        resealed: report.resealed,
        skipped: report.skipped,
    }))
}

/// `POST /v1/records/open` — open every protected field of a record.
pub async fn open_record(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RecordRequest>,
) -> Json<RecordResponse> {
    Json(RecordResponse {
        record: redact::open_record(&state.codec, req.shape, &req.record),
    })
}

/// `POST /v1/records/seal` — seal every protected field of a record.
pub async fn seal_record(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RecordRequest>,
) -> Result<Json<RecordResponse>, ApiError> {
    let record = redact::seal_record(&state.codec, req.shape, &req.record)?;
    Ok(Json(RecordResponse { record }))
}

/// `GET /health` — liveness and readiness check.
///
/// Returns `503 Service Unavailable` when the identifier store cannot be read.
pub async fn health(State(state): State<AppState>) -> Response {
    let fingerprint_mode = state.codec.fingerprint_mode().to_owned();
    let (status_code, status_str, identifiers_stored) = match state.index.count().await {
        Ok(n) => (StatusCode::OK, "ok", n),
        Err(e) => {
            warn!(error = %e, "health check could not reach identifier store");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", 0)
        }
    };
    let body = HealthResponse {
        status: status_str.into(),
        fingerprint_mode,
        identifiers_stored,
    };
    (status_code, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}
