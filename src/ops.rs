use crate::api::GmailClient;
use crate::api::models::{
    DeleteOutcome, Label, MessageDetail, MessageResource, MessageSummary, ModifyOutcome,
    SendOutcome, SendRequest,
};
use crate::auth::{AuthSession, FileTokenStore, GoogleOAuth, TokenExchanger, TokenStore};
use crate::error::AppResult;
use crate::mail::{message, mime};

/// Operation surface consumed by the tool dispatcher.
///
/// Read-only operations propagate failures; mutating operations resolve
/// into outcome records carrying a success flag, so nothing that changes
/// state ever throws across this seam.
#[allow(async_fn_in_trait)]
pub trait MailApi {
    async fn list_messages(
        &self,
        query: Option<&str>,
        max_results: Option<u32>,
        label_ids: &[String],
    ) -> AppResult<Vec<MessageSummary>>;

    async fn get_message_details(&self, message_id: &str) -> AppResult<MessageDetail>;

    async fn search_messages(
        &self,
        query: &str,
        max_results: Option<u32>,
    ) -> AppResult<Vec<MessageDetail>>;

    async fn send_message(&self, request: &SendRequest) -> SendOutcome;

    async fn modify_message(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> ModifyOutcome;

    async fn delete_message(&self, message_id: &str) -> DeleteOutcome;

    async fn get_labels(&self) -> AppResult<Vec<Label>>;
}

/// Gmail-backed implementation: combines the auth session, the REST
/// client, and the message codec.
#[derive(Debug)]
pub struct MailOps<S = FileTokenStore, X = GoogleOAuth> {
    session: AuthSession<S, X>,
    client: GmailClient,
}

impl<S: TokenStore, X: TokenExchanger> MailOps<S, X> {
    pub fn new(session: AuthSession<S, X>, client: GmailClient) -> Self {
        Self { session, client }
    }

    /// Full-fidelity message resource, undecoded.
    pub async fn get_message(&self, message_id: &str) -> AppResult<MessageResource> {
        let access_token = self.session.access_token().await?;
        self.client.get(message_id, &access_token).await
    }
}

impl<S: TokenStore, X: TokenExchanger> MailApi for MailOps<S, X> {
    async fn list_messages(
        &self,
        query: Option<&str>,
        max_results: Option<u32>,
        label_ids: &[String],
    ) -> AppResult<Vec<MessageSummary>> {
        let config = self.session.config();
        let query = query.unwrap_or(&config.default_query);
        let max_results = max_results.unwrap_or(config.default_max_results);

        let access_token = self.session.access_token().await?;
        let messages = self
            .client
            .list(query, max_results, label_ids, &access_token)
            .await?;

        tracing::info!("retrieved {} messages", messages.len());
        Ok(messages)
    }

    async fn get_message_details(&self, message_id: &str) -> AppResult<MessageDetail> {
        let resource = self.get_message(message_id).await?;
        Ok(message::decode(resource))
    }

    async fn search_messages(
        &self,
        query: &str,
        max_results: Option<u32>,
    ) -> AppResult<Vec<MessageDetail>> {
        let summaries = self.list_messages(Some(query), max_results, &[]).await?;

        // A single undecodable or vanished message must not fail the batch.
        let mut detailed = Vec::with_capacity(summaries.len());
        for summary in summaries {
            match self.get_message_details(&summary.id).await {
                Ok(details) => detailed.push(details),
                Err(err) => {
                    tracing::warn!("failed to get details for message {}: {err}", summary.id);
                }
            }
        }

        tracing::info!("retrieved details for {} messages", detailed.len());
        Ok(detailed)
    }

    async fn send_message(&self, request: &SendRequest) -> SendOutcome {
        let result = async {
            let access_token = self.session.access_token().await?;
            let raw = mime::build_raw_message(request);
            self.client.send(&raw, &access_token).await
        }
        .await;

        match result {
            Ok(response) => {
                tracing::info!("message sent successfully: {}", response.id);
                SendOutcome {
                    success: true,
                    message_id: Some(response.id),
                    thread_id: response.thread_id,
                    to: request.to.clone(),
                    subject: request.subject.clone(),
                    error: None,
                }
            }
            Err(err) => {
                tracing::error!("error sending message: {err}");
                SendOutcome {
                    success: false,
                    message_id: None,
                    thread_id: None,
                    to: request.to.clone(),
                    subject: request.subject.clone(),
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn modify_message(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> ModifyOutcome {
        let result = async {
            let access_token = self.session.access_token().await?;
            self.client
                .modify(message_id, add_label_ids, remove_label_ids, &access_token)
                .await
        }
        .await;

        match result {
            Ok(()) => {
                tracing::info!("message {message_id} modified successfully");
                ModifyOutcome {
                    success: true,
                    message_id: message_id.to_string(),
                    added: add_label_ids.to_vec(),
                    removed: remove_label_ids.to_vec(),
                    error: None,
                }
            }
            Err(err) => {
                tracing::error!("error modifying message {message_id}: {err}");
                ModifyOutcome {
                    success: false,
                    message_id: message_id.to_string(),
                    added: Vec::new(),
                    removed: Vec::new(),
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn delete_message(&self, message_id: &str) -> DeleteOutcome {
        let result = async {
            let access_token = self.session.access_token().await?;
            self.client.delete(message_id, &access_token).await
        }
        .await;

        match result {
            Ok(()) => {
                tracing::info!("message {message_id} deleted successfully");
                DeleteOutcome {
                    success: true,
                    message_id: message_id.to_string(),
                    error: None,
                }
            }
            Err(err) => {
                tracing::error!("error deleting message {message_id}: {err}");
                DeleteOutcome {
                    success: false,
                    message_id: message_id.to_string(),
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn get_labels(&self) -> AppResult<Vec<Label>> {
        let access_token = self.session.access_token().await?;
        let labels = self.client.list_labels(&access_token).await?;
        tracing::info!("retrieved {} labels", labels.len());
        Ok(labels)
    }
}
