use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, AppResult};

use super::labels;
use super::messages;
use super::models::{Label, MessageResource, MessageSummary};

const GMAIL_API_BASE_URL: &str = "https://gmail.googleapis.com";

/// Thin wrapper over the Gmail REST endpoints. Authorization failures map
/// to [`AppError::Auth`] so callers can trigger re-authentication instead
/// of a blind retry; everything else surfaces as [`AppError::Api`].
#[derive(Debug, Clone)]
pub struct GmailClient {
    http: Client,
    base_url: String,
}

impl GmailClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            base_url: GMAIL_API_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn list(
        &self,
        query: &str,
        max_results: u32,
        label_ids: &[String],
        access_token: &str,
    ) -> AppResult<Vec<MessageSummary>> {
        let endpoint = messages::list_endpoint();
        let params = messages::list_query(query, max_results, label_ids);
        let response: MessageListResponse = self
            .get_json(endpoint, access_token, Some(&params))
            .await?;

        Ok(response.messages.unwrap_or_default())
    }

    pub async fn get(&self, id: &str, access_token: &str) -> AppResult<MessageResource> {
        let endpoint = messages::message_endpoint(id);
        let query = messages::get_query();
        self.get_json(&endpoint, access_token, Some(&query)).await
    }

    pub async fn send(&self, raw_message: &str, access_token: &str) -> AppResult<SendResponse> {
        let endpoint = messages::send_endpoint();
        let request = SendMessageRequest {
            raw: raw_message.to_string(),
        };
        self.post_json(endpoint, access_token, &request).await
    }

    pub async fn modify(
        &self,
        id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
        access_token: &str,
    ) -> AppResult<()> {
        let endpoint = messages::modify_endpoint(id);
        let body = ModifyLabelsRequest {
            add_label_ids: add_label_ids.to_vec(),
            remove_label_ids: remove_label_ids.to_vec(),
        };

        let _: ModifyLabelsResponse = self.post_json(&endpoint, access_token, &body).await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str, access_token: &str) -> AppResult<()> {
        let endpoint = messages::message_endpoint(id);
        let url = self.endpoint_url(&endpoint)?;
        let response = self.http.delete(url).bearer_auth(access_token).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_api_error(status, &body))
    }

    pub async fn list_labels(&self, access_token: &str) -> AppResult<Vec<Label>> {
        let endpoint = labels::list_labels_endpoint();
        let response: LabelListResponse = self.get_json(endpoint, access_token, None).await?;
        Ok(response.labels.unwrap_or_default())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        access_token: &str,
        query: Option<&[(String, String)]>,
    ) -> AppResult<T> {
        let mut request = self.http.get(self.endpoint_url(endpoint)?);
        if let Some(query) = query {
            request = request.query(query);
        }

        self.execute_json(request, access_token).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        access_token: &str,
        body: &B,
    ) -> AppResult<T> {
        let request = self.http.post(self.endpoint_url(endpoint)?).json(body);
        self.execute_json(request, access_token).await
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        access_token: &str,
    ) -> AppResult<T> {
        let response = request.bearer_auth(access_token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_api_error(status, &body));
        }

        Ok(response.json().await?)
    }

    fn endpoint_url(&self, endpoint: &str) -> AppResult<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.set_path(endpoint.trim_start_matches('/'));
        Ok(url)
    }
}

impl Default for GmailClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct MessageListResponse {
    messages: Option<Vec<MessageSummary>>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest {
    raw: String,
}

#[derive(Debug, Deserialize)]
pub struct SendResponse {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ModifyLabelsRequest {
    #[serde(rename = "addLabelIds")]
    add_label_ids: Vec<String>,
    #[serde(rename = "removeLabelIds")]
    remove_label_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ModifyLabelsResponse {}

#[derive(Debug, Deserialize)]
struct LabelListResponse {
    labels: Option<Vec<Label>>,
}

/// Error envelope the Gmail API wraps failures in:
/// `{"error": {"code": ..., "status": ..., "message": ..., "errors": [...]}}`.
#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    status: Option<String>,
    message: Option<String>,
    errors: Option<Vec<ApiErrorDetail>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    reason: Option<String>,
}

impl ApiErrorBody {
    fn describe(self) -> String {
        let mut out = self
            .message
            .unwrap_or_else(|| "unspecified error".to_string());

        if let Some(status) = self.status {
            out.push_str(&format!(" [{status}]"));
        }

        let reason = self
            .errors
            .into_iter()
            .flatten()
            .find_map(|detail| detail.reason);
        if let Some(reason) = reason {
            out.push_str(&format!(" (reason: {reason})"));
        }

        out
    }
}

fn map_api_error(status: StatusCode, body: &str) -> AppError {
    let detail = serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|envelope| envelope.error.describe())
        .unwrap_or_else(|_| match body.trim() {
            "" => "no error details in response body".to_string(),
            raw => raw.to_string(),
        });

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Auth(format!(
            "gmail api authorization failed ({status}): {detail}"
        )),
        _ => AppError::Api(format!("gmail api request failed ({status}): {detail}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_unauthorized_as_auth_error() {
        let error = map_api_error(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"code":401,"message":"Request had invalid authentication credentials.","status":"UNAUTHENTICATED"}}"#,
        );

        match error {
            AppError::Auth(message) => {
                assert!(message.contains("invalid authentication credentials"));
            }
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[test]
    fn maps_forbidden_as_auth_error() {
        let error = map_api_error(StatusCode::FORBIDDEN, "");
        assert!(matches!(error, AppError::Auth(_)));
    }

    #[test]
    fn maps_not_found_as_api_error() {
        let error = map_api_error(
            StatusCode::NOT_FOUND,
            r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#,
        );

        match error {
            AppError::Api(message) => {
                assert!(message.contains("Requested entity was not found"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_raw_body_for_unstructured_errors() {
        let error = map_api_error(StatusCode::BAD_GATEWAY, "upstream unavailable");
        match error {
            AppError::Api(message) => assert!(message.contains("upstream unavailable")),
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn resolves_endpoint_against_base_url() {
        let client = GmailClient::with_base_url("http://127.0.0.1:9999");
        let url = client
            .endpoint_url("/gmail/v1/users/me/messages")
            .expect("url should build");
        assert_eq!(url.as_str(), "http://127.0.0.1:9999/gmail/v1/users/me/messages");
    }
}
