//! HTTP client for the admin backend's size and size-quantity endpoints.

use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use models::{
    size::{CreateSizes, NameUsage, Size, SizeId},
    size_quantity::{SizeQuantity, SizeQuantityId, UpsertSizeQuantity},
};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;
use utils::{
    config::AdminConfig,
    response::{GENERIC_ERROR_MESSAGE, Listing, server_message},
};

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {}", .message.as_deref().unwrap_or(.body.as_str()))]
    Http {
        status: u16,
        message: Option<String>,
        body: String,
    },
    #[error("unauthorized: {}", .message.as_deref().unwrap_or("session rejected"))]
    Unauthorized { message: Option<String> },
    #[error("json error: {0}")]
    Serde(String),
    #[error("not logged in")]
    NotLoggedIn,
    #[error("invalid url: {0}")]
    Url(String),
}

impl ApiError {
    /// Text for the operator-facing toast: the server's own message when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            Self::Http {
                message: Some(message),
                ..
            }
            | Self::Unauthorized {
                message: Some(message),
            } => message.clone(),
            Self::NotLoggedIn => "Please log in again".to_string(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Authentication state of the operator. Created once, shared with every client, and driven
/// explicitly by login and logout.
#[derive(Debug, Default)]
pub struct Session {
    token: RwLock<Option<SecretString>>,
}

impl Session {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_token(token: SecretString) -> Arc<Self> {
        let session = Self::new();
        session.login(token);
        session
    }

    pub fn login(&self, token: SecretString) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token);
        debug!("Session token installed");
    }

    pub fn logout(&self) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
        debug!("Session cleared");
    }

    pub fn is_logged_in(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    fn bearer(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|token| format!("Bearer {}", token.expose_secret()))
    }
}

/// Size taxonomy endpoints
#[async_trait]
pub trait SizeApi: Send + Sync {
    async fn list_sizes(&self) -> Result<Vec<Size>, ApiError>;
    async fn check_size_name(&self, name: &str) -> Result<NameUsage, ApiError>;
    async fn create_sizes(&self, payload: &CreateSizes) -> Result<(), ApiError>;
    async fn delete_sizes(&self, ids: &[SizeId]) -> Result<(), ApiError>;
}

/// Per-product, per-size stock and pricing endpoints
#[async_trait]
pub trait SizeQuantityApi: Send + Sync {
    async fn list_size_quantities(
        &self,
        custom_product_id: &str,
    ) -> Result<Vec<SizeQuantity>, ApiError>;
    async fn create_size_quantities(&self, rows: &[UpsertSizeQuantity]) -> Result<(), ApiError>;
    async fn update_size_quantity(
        &self,
        id: SizeQuantityId,
        row: &UpsertSizeQuantity,
    ) -> Result<(), ApiError>;
    async fn delete_size_quantities(&self, custom_product_id: &str) -> Result<(), ApiError>;
}

/// Admin backend client
#[derive(Debug, Clone)]
pub struct AdminApiClient {
    http: Client,
    base_url: Url,
    session: Arc<Session>,
}

impl AdminApiClient {
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(base_url: Url, session: Arc<Session>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, session, Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: Url,
        session: Arc<Session>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("size-admin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    /// Build a client and session from resolved configuration. A configured token logs the
    /// session in straight away.
    pub fn from_config(config: &AdminConfig) -> Result<Self, ApiError> {
        let session = match &config.token {
            Some(token) => Session::with_token(token.clone()),
            None => Session::new(),
        };
        Self::with_timeout(config.api_url.clone(), session, config.request_timeout)
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        with_auth: bool,
    ) -> Result<RequestBuilder, ApiError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ApiError::Url(e.to_string()))?;
        let builder = self.http.request(method, url);

        if !with_auth {
            return Ok(builder);
        }
        match self.session.bearer() {
            Some(bearer) => Ok(builder.header(reqwest::header::AUTHORIZATION, bearer)),
            None => Err(ApiError::NotLoggedIn),
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let res = builder.send().await.map_err(map_reqwest_error)?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }

        let body = res.text().await.unwrap_or_default();
        let message = server_message(&body);
        warn!(status = status.as_u16(), message = ?message, "Admin API request failed");

        match status {
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized { message }),
            s => Err(ApiError::Http {
                status: s.as_u16(),
                message,
                body,
            }),
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        self.send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Serde(e.to_string()))
    }

    async fn send_body<B: Serialize + ?Sized>(
        &self,
        builder: RequestBuilder,
        body: &B,
    ) -> Result<(), ApiError> {
        self.send(builder.json(body)).await.map(|_| ())
    }
}

#[async_trait]
impl SizeApi for AdminApiClient {
    async fn list_sizes(&self) -> Result<Vec<Size>, ApiError> {
        let listing: Listing<Size> = self
            .send_json(self.request(Method::GET, "size", true)?)
            .await?;
        let sizes = listing.into_vec();
        debug!(count = sizes.len(), "Fetched size rows");
        Ok(sizes)
    }

    async fn check_size_name(&self, name: &str) -> Result<NameUsage, ApiError> {
        let builder = self
            .request(Method::GET, "size/check", true)?
            .query(&[("query", name)]);
        self.send_json(builder).await
    }

    async fn create_sizes(&self, payload: &CreateSizes) -> Result<(), ApiError> {
        debug!(
            sizes = payload.size_data.len(),
            chart_fields = payload.size_chart_data.len(),
            "Creating sizes"
        );
        self.send_body(self.request(Method::POST, "size", true)?, payload)
            .await
    }

    async fn delete_sizes(&self, ids: &[SizeId]) -> Result<(), ApiError> {
        let ids = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let builder = self
            .request(Method::DELETE, "size", true)?
            .query(&[("ids", ids)]);
        self.send(builder).await.map(|_| ())
    }
}

#[async_trait]
impl SizeQuantityApi for AdminApiClient {
    async fn list_size_quantities(
        &self,
        custom_product_id: &str,
    ) -> Result<Vec<SizeQuantity>, ApiError> {
        let builder = self
            .request(Method::GET, "size-quantity", true)?
            .query(&[("custom_product_id", custom_product_id)]);
        let listing: Listing<SizeQuantity> = self.send_json(builder).await?;
        Ok(listing.into_vec())
    }

    async fn create_size_quantities(&self, rows: &[UpsertSizeQuantity]) -> Result<(), ApiError> {
        self.send_body(self.request(Method::POST, "size-quantity", true)?, rows)
            .await
    }

    async fn update_size_quantity(
        &self,
        id: SizeQuantityId,
        row: &UpsertSizeQuantity,
    ) -> Result<(), ApiError> {
        let path = format!("size-quantity/{id}");
        self.send_body(self.request(Method::PATCH, &path, true)?, row)
            .await
    }

    async fn delete_size_quantities(&self, custom_product_id: &str) -> Result<(), ApiError> {
        let builder = self
            .request(Method::DELETE, "size-quantity", true)?
            .query(&[("custom_product_id", custom_product_id)]);
        self.send(builder).await.map(|_| ())
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use axum::{
        Json, Router,
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode},
        routing::{get, patch},
    };
    use models::size::NewSize;
    use serde_json::{Value, json};

    use super::*;

    #[derive(Clone, Default)]
    struct Recorded {
        calls: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
    }

    impl Recorded {
        fn push(&self, route: &str, headers: &HeaderMap, body: Value) {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            self.calls
                .lock()
                .unwrap()
                .push((route.to_string(), auth, body));
        }

        fn take(&self) -> Vec<(String, Option<String>, Value)> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }
    }

    async fn list_sizes(State(rec): State<Recorded>, headers: HeaderMap) -> Json<Value> {
        rec.push("GET /size", &headers, Value::Null);
        Json(json!({
            "data": [
                {"id": 1, "name": "Tees", "size": "S", "type": "topwear", "has_size_chart": true, "custom_size_id": "a", "is_cm": true},
                {"id": 2, "name": "Letters", "size": "XL", "has_size_chart": false}
            ]
        }))
    }

    async fn create_sizes(
        State(rec): State<Recorded>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        rec.push("POST /size", &headers, body);
        (StatusCode::OK, Json(json!({"message": "created"})))
    }

    async fn delete_sizes(
        State(rec): State<Recorded>,
        headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
    ) -> StatusCode {
        rec.push("DELETE /size", &headers, json!(q));
        StatusCode::OK
    }

    async fn check_name(
        State(rec): State<Recorded>,
        headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        rec.push("GET /size/check", &headers, json!(q));
        match q.get("query").map(String::as_str) {
            Some("Tees") => (StatusCode::OK, Json(json!({"total": 3}))),
            Some("Boom") => (
                StatusCode::CONFLICT,
                Json(json!({"statusCode": 409, "message": "Name check unavailable"})),
            ),
            _ => (StatusCode::OK, Json(json!({"total": 0}))),
        }
    }

    async fn list_quantities(
        State(rec): State<Recorded>,
        headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        rec.push("GET /size-quantity", &headers, json!(q));
        Json(json!([
            {"id": 10, "quantity": 4, "size_id": 1, "custom_product_id": "p-1", "price": 100.0, "discount": 5.0}
        ]))
    }

    async fn create_quantities(
        State(rec): State<Recorded>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> StatusCode {
        rec.push("POST /size-quantity", &headers, body);
        StatusCode::CREATED
    }

    async fn delete_quantities(
        State(rec): State<Recorded>,
        headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
    ) -> StatusCode {
        rec.push("DELETE /size-quantity", &headers, json!(q));
        StatusCode::OK
    }

    async fn patch_quantity(
        State(rec): State<Recorded>,
        headers: HeaderMap,
        Path(id): Path<i64>,
        Json(body): Json<Value>,
    ) -> StatusCode {
        rec.push(&format!("PATCH /size-quantity/{id}"), &headers, body);
        StatusCode::OK
    }

    async fn spawn_backend() -> (Url, Recorded) {
        let rec = Recorded::default();
        let app = Router::new()
            .route(
                "/api/size",
                get(list_sizes).post(create_sizes).delete(delete_sizes),
            )
            .route("/api/size/check", get(check_name))
            .route(
                "/api/size-quantity",
                get(list_quantities)
                    .post(create_quantities)
                    .delete(delete_quantities),
            )
            .route("/api/size-quantity/{id}", patch(patch_quantity))
            .with_state(rec.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base = Url::parse(&format!("http://{addr}/api/")).unwrap();
        (base, rec)
    }

    fn logged_in_client(base: Url) -> AdminApiClient {
        AdminApiClient::new(base, Session::with_token(SecretString::from("t0k")))
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_sizes_sends_bearer_and_unwraps_envelope() {
        let (base, rec) = spawn_backend().await;
        let client = logged_in_client(base);

        let sizes = client.list_sizes().await.unwrap();
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].wear_type, Some(models::size::WearType::Topwear));
        assert_eq!(sizes[1].wear_type, None);

        let calls = rec.take();
        assert_eq!(calls[0].0, "GET /size");
        assert_eq!(calls[0].1.as_deref(), Some("Bearer t0k"));
    }

    #[tokio::test]
    async fn test_logout_blocks_authenticated_calls() {
        let (base, rec) = spawn_backend().await;
        let client = logged_in_client(base);
        client.session().logout();

        let err = client.list_sizes().await.unwrap_err();
        assert!(matches!(err, ApiError::NotLoggedIn));
        assert!(rec.take().is_empty());

        client.session().login(SecretString::from("fresh"));
        client.list_sizes().await.unwrap();
        assert_eq!(rec.take()[0].1.as_deref(), Some("Bearer fresh"));
    }

    #[tokio::test]
    async fn test_check_name_and_server_message() {
        let (base, _rec) = spawn_backend().await;
        let client = logged_in_client(base);

        assert!(client.check_size_name("Tees").await.unwrap().is_taken());
        assert!(!client.check_size_name("Hats").await.unwrap().is_taken());

        let err = client.check_size_name("Boom").await.unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 409, .. }));
        assert_eq!(err.user_message(), "Name check unavailable");
    }

    #[tokio::test]
    async fn test_create_and_delete_sizes() {
        let (base, rec) = spawn_backend().await;
        let client = logged_in_client(base);

        let payload = CreateSizes {
            size_data: vec![NewSize::flat("Letters", "M", "id-1".to_string())],
            size_chart_data: vec![],
        };
        client.create_sizes(&payload).await.unwrap();
        client.delete_sizes(&[4, 5, 9]).await.unwrap();

        let calls = rec.take();
        assert_eq!(calls[0].0, "POST /size");
        assert_eq!(calls[0].2["size_data"][0]["size"], "M");
        assert_eq!(calls[0].2["size_chart_data"], json!([]));
        assert_eq!(calls[1].0, "DELETE /size");
        assert_eq!(calls[1].2["ids"], "4,5,9");
    }

    #[tokio::test]
    async fn test_size_quantity_round() {
        let (base, rec) = spawn_backend().await;
        let client = logged_in_client(base);

        let rows = client.list_size_quantities("p-1").await.unwrap();
        assert_eq!(rows[0].id, 10);

        let row = UpsertSizeQuantity::from(&rows[0]);
        client.update_size_quantity(rows[0].id, &row).await.unwrap();
        client.delete_size_quantities("p-1").await.unwrap();
        client.create_size_quantities(&[row]).await.unwrap();

        let routes: Vec<String> = rec.take().into_iter().map(|c| c.0).collect();
        assert_eq!(
            routes,
            vec![
                "GET /size-quantity",
                "PATCH /size-quantity/10",
                "DELETE /size-quantity",
                "POST /size-quantity"
            ]
        );
    }

    #[test]
    fn test_generic_message_fallback() {
        let err = ApiError::Http {
            status: 502,
            message: None,
            body: "<html>".to_string(),
        };
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);
        assert_eq!(ApiError::Timeout.user_message(), GENERIC_ERROR_MESSAGE);
    }
}
