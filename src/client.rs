//! Remote mailbox service
//!
//! [`MailService`] is the interface the feed and the viewer need from the
//! mailbox. [`GmailClient`] implements it over the Gmail REST API.

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::label::Label;
use crate::message::{Cursor, HistoryPage, Message, MessageRef, Profile};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

/// Operations on the remote mailbox.
#[async_trait]
pub trait MailService: Send + Sync + 'static {
    /// One page of change records since `cursor`.
    async fn list_history(
        &self,
        cursor: Cursor,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<HistoryPage>;

    /// A message in full format.
    async fn get_message(&self, id: &str) -> Result<Message>;

    async fn get_profile(&self) -> Result<Profile>;

    async fn modify_message(&self, id: &str, add: &[&str], remove: &[&str]) -> Result<()>;

    /// Send a complete RFC 2822 message on `thread_id`.
    async fn send_message(&self, thread_id: &str, raw: &str) -> Result<()>;

    async fn list_labels(&self) -> Result<Vec<Label>>;

    /// The newest `max` messages carrying `label`, newest first.
    async fn list_messages(&self, label: &str, max: u32) -> Result<Vec<MessageRef>>;
}

#[derive(Deserialize)]
struct LabelList {
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

/// Gmail REST client
pub struct GmailClient {
    config: SessionConfig,
    http: reqwest::Client,
}

impl GmailClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialised.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("mailtail/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Http(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/gmail/v1/users/{}/{path}",
            self.config.api_base, self.config.user
        )
    }

    async fn send(&self, what: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(|e| Error::Http(format!("{what} failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Api(format!("{what} failed with {status}: {body}")))
    }

    async fn json<T: DeserializeOwned>(&self, what: &str, request: RequestBuilder) -> Result<T> {
        self.send(what, request)
            .await?
            .json()
            .await
            .map_err(|e| Error::Decode(format!("{what}: {e}")))
    }
}

#[async_trait]
impl MailService for GmailClient {
    async fn list_history(
        &self,
        cursor: Cursor,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<HistoryPage> {
        let mut request = self.http.get(self.url("history")).query(&[
            ("startHistoryId", cursor.to_string()),
            ("maxResults", page_size.to_string()),
            ("historyTypes", "messageAdded".to_string()),
        ]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        self.json("List history", request).await
    }

    async fn get_message(&self, id: &str) -> Result<Message> {
        let request = self
            .http
            .get(self.url(&format!("messages/{id}")))
            .query(&[("format", "full")]);
        self.json(&format!("Get message {id}"), request).await
    }

    async fn get_profile(&self) -> Result<Profile> {
        self.json("Get profile", self.http.get(self.url("profile")))
            .await
    }

    async fn modify_message(&self, id: &str, add: &[&str], remove: &[&str]) -> Result<()> {
        let request = self
            .http
            .post(self.url(&format!("messages/{id}/modify")))
            .json(&json!({
                "addLabelIds": add,
                "removeLabelIds": remove,
            }));
        self.send(&format!("Modify message {id}"), request).await?;
        debug!("Modified {}: +{:?} -{:?}", id, add, remove);
        Ok(())
    }

    async fn send_message(&self, thread_id: &str, raw: &str) -> Result<()> {
        let request = self.http.post(self.url("messages/send")).json(&json!({
            "threadId": thread_id,
            "raw": URL_SAFE.encode(raw),
        }));
        self.send("Send message", request).await?;
        Ok(())
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        let list: LabelList = self
            .json("List labels", self.http.get(self.url("labels")))
            .await?;
        Ok(list.labels)
    }

    async fn list_messages(&self, label: &str, max: u32) -> Result<Vec<MessageRef>> {
        let request = self.http.get(self.url("messages")).query(&[
            ("labelIds", label.to_string()),
            ("maxResults", max.to_string()),
        ]);
        let list: MessageList = self.json("List messages", request).await?;
        Ok(list.messages)
    }
}
