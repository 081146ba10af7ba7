use crate::infra::AppState;
use axum::extract::{Path, Query};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use blue_admin::auth::{authenticate, Credentials, Session};
use blue_admin::email::derive_email;
use blue_admin::error::AppError;
use blue_admin::records::{
    export_csv, EntityConfig, NewRequest, Reply, RequestRecord, RequestStatistics, ResponseTime,
};
use blue_admin::storage::{RequestDesk, UserDirectory, REQUESTS};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

pub(crate) fn router() -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route(
            "/api/v1/collections/:key",
            get(read_collection).put(write_collection),
        )
        .route("/api/v1/collections/:key/items", post(append_item))
        .route("/api/v1/email", get(email_endpoint))
        .route("/api/v1/auth/login", post(login_endpoint))
        .route("/api/v1/requests", post(submit_request))
        .route("/api/v1/requests/stats", get(stats_endpoint))
        .route("/api/v1/requests/export", get(export_endpoint))
        .route("/api/v1/requests/:id_number/open", post(open_request))
        .route("/api/v1/requests/:id_number/replies", post(reply_to_request))
        .route("/api/v1/requests/:id_number/close", post(close_request))
        .route("/api/v1/users/:id_number", delete(delete_user))
}

pub(crate) async fn healthcheck() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn read_collection(
    Extension(state): Extension<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Vec<Value>>, AppError> {
    Ok(Json(state.collections.read_all(&key)?))
}

pub(crate) async fn write_collection(
    Extension(state): Extension<AppState>,
    Path(key): Path<String>,
    Json(records): Json<Vec<Value>>,
) -> Result<StatusCode, AppError> {
    state.collections.write_all(&key, &records)?;
    info!(collection = %key, count = records.len(), "collection replaced");
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn append_item(
    Extension(state): Extension<AppState>,
    Path(key): Path<String>,
    Json(record): Json<Value>,
) -> Result<StatusCode, AppError> {
    state.collections.append(&key, record)?;
    Ok(StatusCode::CREATED)
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmailQuery {
    #[serde(default)]
    pub(crate) name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmailResponse {
    pub(crate) name: String,
    pub(crate) email: String,
}

pub(crate) async fn email_endpoint(Query(query): Query<EmailQuery>) -> Json<EmailResponse> {
    let email = derive_email(&query.name);
    Json(EmailResponse {
        name: query.name,
        email,
    })
}

pub(crate) async fn login_endpoint(
    Extension(state): Extension<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<Session>, AppError> {
    let users = UserDirectory::new(&state.collections);
    let session = authenticate(&credentials, &users)?;
    info!(id_number = %session.id_number, role = ?session.role, "login succeeded");
    Ok(Json(session))
}

pub(crate) async fn submit_request(
    Extension(state): Extension<AppState>,
    Json(request): Json<NewRequest>,
) -> Result<(StatusCode, Json<RequestRecord>), AppError> {
    let record = request.into_record(state.clock.as_ref())?;
    state.collections.append(REQUESTS, record.to_value())?;
    info!(id_number = %record.id_number, subject = %record.subject, "request submitted");
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Debug, Serialize)]
pub(crate) struct StatsResponse {
    pub(crate) total: usize,
    pub(crate) open: usize,
    pub(crate) closed: usize,
    pub(crate) average_response: Option<ResponseTime>,
    pub(crate) average_response_label: String,
}

impl From<RequestStatistics> for StatsResponse {
    fn from(stats: RequestStatistics) -> Self {
        Self {
            average_response_label: stats.average_response_label(),
            total: stats.total,
            open: stats.open,
            closed: stats.closed,
            average_response: stats.average_response,
        }
    }
}

pub(crate) async fn stats_endpoint(
    Extension(state): Extension<AppState>,
) -> Result<Json<StatsResponse>, AppError> {
    let requests = state.collections.read_all(REQUESTS)?;
    Ok(Json(RequestStatistics::from_records(&requests).into()))
}

pub(crate) async fn export_endpoint(
    Extension(state): Extension<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let requests = state.collections.read_all(REQUESTS)?;
    let mut body = Vec::new();
    export_csv(&requests, &EntityConfig::requests(), &mut body)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        body,
    ))
}

pub(crate) async fn open_request(
    Extension(state): Extension<AppState>,
    Path(id_number): Path<String>,
) -> Result<Json<Vec<Value>>, AppError> {
    let desk = RequestDesk::new(&state.collections);
    Ok(Json(desk.open_request(&id_number)?))
}

pub(crate) async fn reply_to_request(
    Extension(state): Extension<AppState>,
    Path(id_number): Path<String>,
    Json(reply): Json<Reply>,
) -> Result<Json<Vec<Value>>, AppError> {
    let desk = RequestDesk::new(&state.collections);
    Ok(Json(desk.reply(&id_number, &reply, state.clock.as_ref())?))
}

pub(crate) async fn close_request(
    Extension(state): Extension<AppState>,
    Path(id_number): Path<String>,
) -> Result<Json<Vec<Value>>, AppError> {
    let desk = RequestDesk::new(&state.collections);
    Ok(Json(desk.close(&id_number, state.clock.as_ref())?))
}

pub(crate) async fn delete_user(
    Extension(state): Extension<AppState>,
    Path(id_number): Path<String>,
) -> Result<StatusCode, AppError> {
    let users = UserDirectory::new(&state.collections);
    if users.has_user_requests(&id_number)? {
        return Err(AppError::Conflict(format!(
            "user {id_number} still has open requests"
        )));
    }
    if users.delete_user(&id_number)? == 0 {
        return Err(AppError::NotFound(format!("user {id_number}")));
    }
    info!(%id_number, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::Collections;
    use axum::body::Body;
    use axum::http::Request;
    use blue_admin::records::{Clock, FixedClock, Reconciler};
    use blue_admin::storage::{CollectionStore, KeyValueStore, MemoryStore, USERS};
    use chrono::{TimeZone, Utc};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state() -> AppState {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2025, 10, 1, 10, 0, 0).unwrap(),
        ));
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let collections: Collections =
            CollectionStore::new(store, Arc::new(Reconciler::seeded(1, Arc::clone(&clock))));
        AppState {
            readiness: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            collections,
            clock,
        }
    }

    fn app(state: &AppState) -> Router {
        router().layer(Extension(state.clone()))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .expect("body readable");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds")
    }

    #[tokio::test]
    async fn email_endpoint_derives_address() {
        let state = state();
        let uri = "/api/v1/email?name=%D7%93%D7%95%D7%93%20%D7%9C%D7%95%D7%99";

        let response = app(&state)
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["name"], "דוד לוי");
        assert_eq!(body["email"], "dod.lvi@gmail.com");
    }

    #[tokio::test]
    async fn collection_reads_reconcile_requests() {
        let state = state();
        let put = json_request("PUT", "/api/v1/collections/requests", json!([{ "name": "רן בר" }]));
        let response = app(&state).oneshot(put).await.expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app(&state)
            .oneshot(
                Request::get("/api/v1/collections/requests")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        let body = body_json(response).await;
        assert_eq!(body[0]["email"], "rn.br@gmail.com");
        assert_eq!(body[0]["createdAt"], "2025-10-01T10:00:00.000Z");
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let state = state();
        let ok = json_request(
            "POST",
            "/api/v1/auth/login",
            json!({ "idNumber": "214305047", "password": "123123" }),
        );
        let response = app(&state).oneshot(ok).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["role"], "admin");

        let wrong = json_request(
            "POST",
            "/api/v1/auth/login",
            json!({ "idNumber": "214305047", "password": "nope" }),
        );
        let response = app(&state).oneshot(wrong).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let invalid = json_request(
            "POST",
            "/api/v1/auth/login",
            json!({ "idNumber": "12", "password": "" }),
        );
        let response = app(&state).oneshot(invalid).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["fields"]["idNumber"]["code"], "pattern");
    }

    #[tokio::test]
    async fn submitted_requests_feed_statistics() {
        let state = state();
        let submission = json_request(
            "POST",
            "/api/v1/requests",
            json!({
                "idNumber": "213233430",
                "name": "נועם אברהמי",
                "subject": "קורסים",
                "details": "שאלה לגבי ציונים בקורס מתמטיקה",
                "attachments": [{ "name": "grades.pdf", "size": 1024 }]
            }),
        );
        let response = app(&state).oneshot(submission).await.expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        let record = body_json(response).await;
        assert_eq!(record["status"], "פתוחה");
        assert_eq!(record["attachments"][0]["type"], "application/pdf");

        let response = app(&state)
            .oneshot(
                Request::get("/api/v1/requests/stats")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let stats = body_json(response).await;
        assert_eq!(stats["total"], 1);
        assert_eq!(stats["open"], 1);
        assert_eq!(stats["average_response_label"], "N/A");
    }

    #[tokio::test]
    async fn invalid_submissions_list_field_errors() {
        let state = state();
        let submission = json_request(
            "POST",
            "/api/v1/requests",
            json!({
                "idNumber": "1",
                "name": "נועם",
                "subject": "אחר",
                "details": "קצר"
            }),
        );

        let response = app(&state).oneshot(submission).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["fields"]["details"]["code"], "too_short");
    }

    #[tokio::test]
    async fn users_with_requests_cannot_be_deleted() {
        let state = state();
        state
            .collections
            .write_all(
                USERS,
                &[json!({ "idNumber": "213233430" }), json!({ "idNumber": "111111111" })],
            )
            .expect("users");
        state
            .collections
            .write_all(REQUESTS, &[json!({ "idNumber": "213233430", "name": "נועם" })])
            .expect("requests");

        let delete = |uri: &str| {
            Request::delete(uri.to_string())
                .body(Body::empty())
                .expect("request")
        };

        let response = app(&state)
            .oneshot(delete("/api/v1/users/213233430"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app(&state)
            .oneshot(delete("/api/v1/users/111111111"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app(&state)
            .oneshot(delete("/api/v1/users/999999999"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn export_returns_csv() {
        let state = state();
        state
            .collections
            .write_all(REQUESTS, &[json!({ "name": "רן בר" })])
            .expect("requests");

        let response = app(&state)
            .oneshot(
                Request::get("/api/v1/requests/export")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .expect("body");
        let text = String::from_utf8(bytes.to_vec()).expect("utf8");
        assert!(text.starts_with("idNumber,name,email,role,status,subject,details"));
        assert!(text.contains("rn.br@gmail.com"));
    }

    #[tokio::test]
    async fn replies_and_closing_follow_the_request_lifecycle() {
        let state = state();
        state
            .collections
            .write_all(
                REQUESTS,
                &[json!({ "idNumber": "213233430", "name": "נועם", "status": "פתוחה" })],
            )
            .expect("requests");

        let reply = json_request(
            "POST",
            "/api/v1/requests/213233430/replies",
            json!({ "sender": "מנהל", "text": "הבקשה התקבלה" }),
        );
        let response = app(&state).oneshot(reply).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert_eq!(updated[0]["status"], "בטיפול");
        assert_eq!(updated[0]["conversation"][0]["text"], "הבקשה התקבלה");

        let blank = json_request(
            "POST",
            "/api/v1/requests/213233430/replies",
            json!({ "sender": "סטודנט", "text": "  " }),
        );
        let response = app(&state).oneshot(blank).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let close = Request::post("/api/v1/requests/213233430/close")
            .body(Body::empty())
            .expect("request");
        let response = app(&state).oneshot(close).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await[0]["status"], "נסגרה");

        let late = json_request(
            "POST",
            "/api/v1/requests/213233430/replies",
            json!({ "sender": "סטודנט", "text": "תודה" }),
        );
        let response = app(&state).oneshot(late).await.expect("response");
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let missing = Request::post("/api/v1/requests/999999999/open")
            .body(Body::empty())
            .expect("request");
        let response = app(&state).oneshot(missing).await.expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
