//! In-process fake Gmail server
//!
//! Every endpoint of the mailbox is a `wiremock` mock mounted at start.
//! Paths follow `/gmail/v1/users/me/...`; every mock requires the
//! `Bearer test-token` authorization header, so a client that forgets
//! to authenticate gets a 404 from the mock server.
//!
//! History pages after the first are matched on their `pageToken` with a
//! higher priority than the first page, which matches any request.

use super::mailbox::Mailbox;
use serde_json::{Value, json};
use wiremock::matchers::{HeaderExactMatcher, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const TOKEN: &str = "test-token";
pub const BASE: &str = "/gmail/v1/users/me";

pub struct FakeGmailServer {
    server: MockServer,
}

impl FakeGmailServer {
    pub async fn start(mailbox: Mailbox) -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/profile")))
            .and(auth())
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "emailAddress": "me@example.com",
                "historyId": mailbox.history_id.to_string(),
            })))
            .mount(&server)
            .await;

        let labels: Vec<Value> = mailbox
            .labels
            .iter()
            .map(|(id, name)| json!({ "id": id, "name": name }))
            .collect();
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/labels")))
            .and(auth())
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "labels": labels })))
            .mount(&server)
            .await;

        for message in &mailbox.messages {
            let mut response = ResponseTemplate::new(200).set_body_json(message.to_json());
            if let Some(delay) = message.delay {
                response = response.set_delay(delay);
            }
            Mock::given(method("GET"))
                .and(path(format!("{BASE}/messages/{}", message.id)))
                .and(query_param("format", "full"))
                .and(auth())
                .respond_with(response)
                .mount(&server)
                .await;
        }

        let mut label_ids: Vec<&String> = mailbox
            .messages
            .iter()
            .flat_map(|m| m.labels.iter())
            .collect();
        label_ids.sort();
        label_ids.dedup();
        for label in label_ids {
            let refs: Vec<Value> = mailbox
                .messages
                .iter()
                .filter(|m| m.labels.contains(label))
                .map(|m| json!({ "id": m.id, "threadId": m.thread_id() }))
                .collect();
            Mock::given(method("GET"))
                .and(path(format!("{BASE}/messages")))
                .and(query_param("labelIds", label.as_str()))
                .and(auth())
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "messages": refs,
                    "resultSizeEstimate": refs.len(),
                })))
                .mount(&server)
                .await;
        }

        for page in &mailbox.pages {
            let mock = Mock::given(method("GET"))
                .and(path(format!("{BASE}/history")))
                .and(auth());
            let mock = match &page.token {
                Some(token) => mock.and(query_param("pageToken", token.as_str())),
                None => mock,
            };
            let priority = if page.token.is_some() { 1 } else { 5 };
            mock.respond_with(ResponseTemplate::new(200).set_body_json(page.to_json()))
                .with_priority(priority)
                .mount(&server)
                .await;
        }

        Mock::given(method("POST"))
            .and(path_regex(format!("^{BASE}/messages/[^/]+/modify$")))
            .and(auth())
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("{BASE}/messages/send")))
            .and(auth())
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "sent-1",
                "threadId": "thread-sent",
            })))
            .mount(&server)
            .await;

        Self { server }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// For mounting extra mocks, such as failures, ahead of the defaults.
    pub const fn mock_server(&self) -> &MockServer {
        &self.server
    }

    /// Requests received so far with `method` whose path ends with `suffix`.
    pub async fn received(&self, method: &str, suffix: &str) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == method && r.url.path().ends_with(suffix))
            .collect()
    }
}

fn auth() -> HeaderExactMatcher {
    header("authorization", format!("Bearer {TOKEN}").as_str())
}
