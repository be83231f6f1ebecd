//! API client for the complaint, admin and notification workers.
//!
//! This module provides the `ApiClient` struct for reading complaint lists
//! and stats, confirming status changes, managing the warden profile, and
//! notifying students.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{
    ComplaintId, ComplaintPage, ComplaintRecord, ComplaintStatus, NotificationMessage,
    NotificationOutcome, Pagination, PushRequest, StatsSnapshot, Warden, WardenProfileUpdate,
};

use super::{ApiError, ComplaintSource};

// ============================================================================
// Constants
// ============================================================================

/// Worker serving complaint lists, details, stats and status changes
pub const DEFAULT_COMPLAINTS_BASE_URL: &str = "https://risecomplaint.mssonutech.workers.dev";

/// Worker serving warden profiles (bearer token required)
pub const DEFAULT_ADMIN_BASE_URL: &str = "https://admin.mssonutech.workers.dev";

/// Worker storing in-app notifications for students
pub const DEFAULT_NOTIFICATIONS_BASE_URL: &str = "https://sendnotification.mssonutech.workers.dev";

/// Worker holding students' registered push tokens
pub const DEFAULT_PUSH_TOKENS_BASE_URL: &str = "https://notification.mssonutech.workers.dev";

/// Push relay endpoint
pub const DEFAULT_PUSH_SEND_URL: &str = "https://pushnotification.mssonutech.workers.dev/send";

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Base URLs of the workers the dashboard talks to.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub complaints: String,
    pub admin: String,
    pub notifications: String,
    pub push_tokens: String,
    pub push_send: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            complaints: DEFAULT_COMPLAINTS_BASE_URL.to_string(),
            admin: DEFAULT_ADMIN_BASE_URL.to_string(),
            notifications: DEFAULT_NOTIFICATIONS_BASE_URL.to_string(),
            push_tokens: DEFAULT_PUSH_TOKENS_BASE_URL.to_string(),
            push_send: DEFAULT_PUSH_SEND_URL.to_string(),
        }
    }
}

// ============================================================================
// Response envelopes
// ============================================================================

#[derive(Debug, Deserialize)]
struct StatsEnvelope {
    data: Option<StatsSnapshot>,
}

#[derive(Debug, Deserialize)]
struct ComplaintsEnvelope {
    data: Option<Vec<ComplaintRecord>>,
    pagination: Option<Pagination>,
    message: Option<String>,
}

// Detail responses come both wrapped and bare
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ComplaintDetailResponse {
    Wrapped { data: ComplaintRecord },
    Bare(ComplaintRecord),
}

#[derive(Debug, Deserialize)]
struct SuccessResponse {
    #[serde(default)]
    success: bool,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WardenEnvelope {
    warden: Option<Warden>,
}

#[derive(Debug, Deserialize)]
struct PushTokensResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    tokens: Vec<String>,
}

#[derive(Debug, Serialize)]
struct StatusChangeBody<'a> {
    status: ComplaintStatus,
    warden_id: &'a str,
}

/// API client for the warden dashboard.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    endpoints: Endpoints,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(endpoints: Endpoints) -> Result<Self, ApiError> {
        Self::with_timeout(endpoints, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(endpoints: Endpoints, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoints,
            token: None,
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            endpoints: self.endpoints.clone(),
            token: Some(token),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidResponse("token is not a valid header value".to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let url = response.url().to_string();
            let body = response.text().await.unwrap_or_default();
            warn!(url = %url, status = %status, "Request failed");
            Err(ApiError::from_status(status, &body))
        }
    }

    fn decode<T: DeserializeOwned>(url: &str, text: &str) -> Result<T, ApiError> {
        serde_json::from_str(text).map_err(|e| {
            warn!(url = url, error = %e, "Malformed response body");
            ApiError::InvalidResponse(format!("{} from {}", e, url))
        })
    }

    /// Query values are percent-encoded by reqwest, so hostel names and roll
    /// numbers may contain any characters.
    fn request(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<RequestBuilder, ApiError> {
        let mut request = self
            .client
            .request(method, url)
            .headers(self.auth_headers()?)
            .header(header::CONTENT_TYPE, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        Ok(request)
    }

    async fn send<T, B>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        debug!(method = %method, url = url, query = ?query, "API request");

        let mut request = self.request(method, url, query)?;
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = Self::check_response(request.send().await?).await?;
        let text = response.text().await?;
        Self::decode(url, &text)
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        self.send::<T, ()>(Method::GET, url, &[], None).await
    }

    fn ensure_success(response: SuccessResponse, what: &str) -> Result<(), ApiError> {
        if response.success {
            Ok(())
        } else {
            let message = response.message.unwrap_or_else(|| format!("{} was not accepted", what));
            warn!(what = what, message = %message, "Server rejected request");
            Err(ApiError::Rejected(message))
        }
    }

    // ===== Complaints =====

    /// Fetch aggregate complaint counts for a hostel
    pub async fn fetch_stats(&self, hostel: &str) -> Result<StatsSnapshot, ApiError> {
        let url = format!("{}/api/stats/{}", self.endpoints.complaints, hostel);
        let envelope: StatsEnvelope = self.get(&url).await?;
        envelope
            .data
            .ok_or_else(|| ApiError::InvalidResponse(format!("stats response for {} has no data", hostel)))
    }

    /// Fetch one page of complaints for a hostel
    pub async fn fetch_complaints(
        &self,
        hostel: &str,
        page: u32,
        limit: u32,
    ) -> Result<ComplaintPage, ApiError> {
        let url = format!("{}/api/complaints", self.endpoints.complaints);
        let page_param = page.to_string();
        let limit_param = limit.to_string();
        let query = [
            ("hostel_name", hostel),
            ("page", page_param.as_str()),
            ("limit", limit_param.as_str()),
        ];
        let envelope: ComplaintsEnvelope = self
            .send::<_, ()>(Method::GET, &url, &query, None)
            .await?;

        let Some(records) = envelope.data else {
            let reason = envelope.message.unwrap_or_else(|| "missing data".to_string());
            return Err(ApiError::InvalidResponse(format!(
                "complaints response for {} page {}: {}",
                hostel, page, reason
            )));
        };

        let pagination = envelope.pagination.unwrap_or_else(|| {
            debug!(hostel = hostel, page, "Complaints response has no pagination, assuming a single page");
            Pagination {
                page,
                limit,
                total: records.len() as u64,
                total_pages: page,
            }
        });

        Ok(ComplaintPage { records, pagination })
    }

    /// Fetch a single complaint by id
    pub async fn fetch_complaint(&self, id: ComplaintId) -> Result<ComplaintRecord, ApiError> {
        let url = format!("{}/api/complaints/{}", self.endpoints.complaints, id);
        match self.get::<ComplaintDetailResponse>(&url).await? {
            ComplaintDetailResponse::Wrapped { data } => Ok(data),
            ComplaintDetailResponse::Bare(record) => Ok(record),
        }
    }

    /// Ask the server to move a complaint to `status`.
    /// Returns only once the server has confirmed the change.
    pub async fn update_complaint_status(
        &self,
        id: ComplaintId,
        status: ComplaintStatus,
        warden_id: &str,
    ) -> Result<(), ApiError> {
        let url = format!("{}/api/complaints/{}/status", self.endpoints.complaints, id);
        let body = StatusChangeBody { status, warden_id };
        let response: SuccessResponse = self.send(Method::PUT, &url, &[], Some(&body)).await?;
        Self::ensure_success(response, "status change")
    }

    // ===== Warden profile =====

    /// Fetch the warden profile (requires a token)
    pub async fn fetch_warden(&self, warden_id: &str) -> Result<Warden, ApiError> {
        let url = format!("{}/wardens/{}", self.endpoints.admin, warden_id);
        let envelope: WardenEnvelope = self.get(&url).await?;
        envelope
            .warden
            .ok_or_else(|| ApiError::NotFound(format!("warden {}", warden_id)))
    }

    /// Update editable profile fields (requires a token)
    pub async fn update_warden_profile(
        &self,
        warden_id: &str,
        update: &WardenProfileUpdate,
    ) -> Result<(), ApiError> {
        let url = format!("{}/wardens/{}", self.endpoints.admin, warden_id);
        let response: SuccessResponse = self.send(Method::PUT, &url, &[], Some(update)).await?;
        Self::ensure_success(response, "profile update")
    }

    // ===== Student notifications =====

    pub async fn send_notification(
        &self,
        roll_no: &str,
        message: &NotificationMessage,
    ) -> Result<(), ApiError> {
        let url = format!("{}/api/notifications", self.endpoints.notifications);
        let _: serde_json::Value = self
            .send(Method::POST, &url, &[("roll_no", roll_no)], Some(message))
            .await?;
        Ok(())
    }

    /// Push tokens registered by a student's devices
    pub async fn fetch_push_tokens(&self, roll_no: &str) -> Result<Vec<String>, ApiError> {
        let url = format!("{}/api/user-tokens/{}", self.endpoints.push_tokens, roll_no);
        let response: PushTokensResponse = self.get(&url).await?;
        if response.success {
            Ok(response.tokens)
        } else {
            Ok(Vec::new())
        }
    }

    pub async fn send_push_notification(
        &self,
        tokens: &[String],
        message: &NotificationMessage,
    ) -> Result<(), ApiError> {
        let body = PushRequest::new(tokens, message);
        let _: serde_json::Value = self
            .send(Method::POST, &self.endpoints.push_send, &[], Some(&body))
            .await?;
        Ok(())
    }

    /// Send the in-app notification and, if the student has devices
    /// registered, a push notification. Never fails; each leg reports its
    /// own outcome.
    pub async fn notify_student(
        &self,
        roll_no: &str,
        message: &NotificationMessage,
    ) -> NotificationOutcome {
        let in_app = self.send_notification(roll_no, message);
        let push = async {
            match self.fetch_push_tokens(roll_no).await {
                Ok(tokens) if tokens.is_empty() => None,
                Ok(tokens) => Some(self.send_push_notification(&tokens, message).await),
                Err(e) => Some(Err(e)),
            }
        };

        let (in_app, push) = futures::join!(in_app, push);

        if let Err(ref e) = in_app {
            warn!(roll_no = roll_no, error = %e, "In-app notification failed");
        }
        if let Some(Err(ref e)) = push {
            warn!(roll_no = roll_no, error = %e, "Push notification failed");
        }

        NotificationOutcome {
            in_app: in_app.map_err(|e| e.to_string()),
            push: push.map(|r| r.map_err(|e| e.to_string())),
        }
    }
}

#[async_trait]
impl ComplaintSource for ApiClient {
    async fn fetch_stats(&self, hostel: &str) -> Result<StatsSnapshot, ApiError> {
        ApiClient::fetch_stats(self, hostel).await
    }

    async fn fetch_complaints(
        &self,
        hostel: &str,
        page: u32,
        limit: u32,
    ) -> Result<ComplaintPage, ApiError> {
        ApiClient::fetch_complaints(self, hostel, page, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_envelope() {
        let json = r#"{"success": true, "data": {"total_complaints": 5, "pending": 1, "in_progress": 1, "resolved": 2, "rejected": 1}}"#;
        let envelope: StatsEnvelope = ApiClient::decode("stats", json).expect("stats should parse");
        assert_eq!(envelope.data.map(|s| s.total), Some(5));

        let empty: StatsEnvelope = ApiClient::decode("stats", r#"{"success": false}"#).expect("parses");
        assert!(empty.data.is_none());
    }

    #[test]
    fn test_malformed_body_is_invalid_response() {
        let result: Result<StatsEnvelope, _> = ApiClient::decode("stats", "<html>oops</html>");
        assert!(matches!(result, Err(ApiError::InvalidResponse(_))));
    }

    #[test]
    fn test_complaints_envelope_without_data() {
        let envelope: ComplaintsEnvelope =
            ApiClient::decode("complaints", r#"{"success": false, "message": "hostel not found"}"#)
                .expect("parses");
        assert!(envelope.data.is_none());
        assert_eq!(envelope.message.as_deref(), Some("hostel not found"));
    }

    #[test]
    fn test_detail_response_wrapped_and_bare() {
        let wrapped = r#"{"success": true, "data": {"id": 3, "status": "resolved"}}"#;
        let bare = r#"{"id": 4, "status": "pending"}"#;

        match ApiClient::decode::<ComplaintDetailResponse>("detail", wrapped).expect("wrapped") {
            ComplaintDetailResponse::Wrapped { data } => assert_eq!(data.id, ComplaintId(3)),
            other => panic!("expected wrapped, got {:?}", other),
        }
        match ApiClient::decode::<ComplaintDetailResponse>("detail", bare).expect("bare") {
            ComplaintDetailResponse::Bare(record) => assert_eq!(record.status, ComplaintStatus::Pending),
            other => panic!("expected bare, got {:?}", other),
        }
    }

    #[test]
    fn test_status_change_body() {
        let body = StatusChangeBody {
            status: ComplaintStatus::InProgress,
            warden_id: "warden001",
        };
        assert_eq!(
            serde_json::to_value(&body).expect("serialize"),
            serde_json::json!({"status": "in_progress", "warden_id": "warden001"})
        );
    }

    #[test]
    fn test_ensure_success() {
        let ok = SuccessResponse { success: true, message: None };
        assert!(ApiClient::ensure_success(ok, "status change").is_ok());

        let rejected = SuccessResponse {
            success: false,
            message: Some("already resolved".to_string()),
        };
        assert!(matches!(
            ApiClient::ensure_success(rejected, "status change"),
            Err(ApiError::Rejected(m)) if m == "already resolved"
        ));
    }

    #[test]
    fn test_with_token_sets_bearer_header() {
        let client = ApiClient::new(Endpoints::default())
            .expect("client builds")
            .with_token("abc.def".to_string());
        let headers = client.auth_headers().expect("headers");
        assert_eq!(
            headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer abc.def")
        );
    }

    #[test]
    fn test_query_values_are_encoded() {
        let client = ApiClient::new(Endpoints::default()).expect("client builds");
        let request = client
            .request(
                Method::GET,
                "https://example.test/api/complaints",
                &[("hostel_name", "A&B #1"), ("page", "1"), ("limit", "20")],
            )
            .expect("builder")
            .build()
            .expect("request builds");
        assert_eq!(
            request.url().query(),
            Some("hostel_name=A%26B+%231&page=1&limit=20")
        );
        assert_eq!(request.url().path(), "/api/complaints");
    }
}
