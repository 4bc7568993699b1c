//! Change-feed poller and concurrent message fetcher
//!
//! A poll cycle walks every page of change records since a cursor. For
//! each record it fetches the added messages concurrently and hands them
//! to the caller in the order the record listed them. The cursor reported
//! by the last page starts the next cycle.

use crate::client::MailService;
use crate::message::{Cursor, Message, MessageRef};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Change records requested per page.
pub const PAGE_SIZE: u32 = 20;

/// Follows the change history of a mailbox.
pub struct Feed<S> {
    service: Arc<S>,
    fetch_limit: Option<NonZeroUsize>,
}

impl<S: MailService> Feed<S> {
    /// A feed that fetches every message of a change record at once.
    #[must_use]
    pub const fn new(service: Arc<S>) -> Self {
        Self {
            service,
            fetch_limit: None,
        }
    }

    /// Cap the number of simultaneous message fetches.
    #[must_use]
    pub const fn with_fetch_limit(mut self, limit: NonZeroUsize) -> Self {
        self.fetch_limit = Some(limit);
        self
    }

    /// Cursor to start following from: the mailbox's current position.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile lookup fails.
    pub async fn start_cursor(&self) -> crate::Result<Cursor> {
        Ok(self.service.get_profile().await?.history_id)
    }

    /// Walk all pages of changes since `cursor` and return the next cursor.
    ///
    /// `on_message` sees every message added since `cursor` that could be
    /// fetched, in change-record order. A failed listing is retried with
    /// the same cursor and page token until it succeeds.
    pub async fn poll_cycle<F>(&self, cursor: Cursor, mut on_message: F) -> Cursor
    where
        F: FnMut(&Message),
    {
        let mut page_token: Option<String> = None;
        loop {
            let page = match self
                .service
                .list_history(cursor, PAGE_SIZE, page_token.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    error!("Listing history since {}: {}", cursor, e);
                    continue;
                }
            };

            for record in &page.history {
                let messages = self.fetch_batch(&record.added).await;
                for message in messages.iter().flatten() {
                    on_message(message);
                }
            }

            match page.next_page() {
                Some(token) => page_token = Some(token.to_string()),
                None => {
                    if page.history_id < cursor {
                        warn!(
                            "Service reported cursor {} behind {}, keeping {}",
                            page.history_id, cursor, cursor
                        );
                        return cursor;
                    }
                    debug!("Poll cycle done, cursor {} -> {}", cursor, page.history_id);
                    return page.history_id;
                }
            }
        }
    }

    /// Fetch every referenced message concurrently.
    ///
    /// The result has one slot per reference, in reference order; slots
    /// whose fetch failed are `None`.
    pub async fn fetch_batch(&self, refs: &[MessageRef]) -> Vec<Option<Message>> {
        let mut slots: Vec<Option<Message>> = refs.iter().map(|_| None).collect();
        let limiter = self.fetch_limit.map(|n| Arc::new(Semaphore::new(n.get())));

        let mut tasks = JoinSet::new();
        for (n, r) in refs.iter().enumerate() {
            let service = Arc::clone(&self.service);
            let limiter = limiter.clone();
            let id = r.id.clone();
            tasks.spawn(async move {
                let _permit = match limiter {
                    Some(limiter) => limiter.acquire_owned().await.ok(),
                    None => None,
                };
                let result = service.get_message(&id).await;
                (n, id, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((n, _, Ok(message))) => slots[n] = Some(message),
                Ok((_, id, Err(e))) => warn!("Getting message {:?}, skipping: {}", id, e),
                Err(e) => error!("Message fetch task failed: {}", e),
            }
        }
        slots
    }

    /// Poll forever, sleeping `interval` between cycles.
    pub async fn watch<F>(&self, mut cursor: Cursor, interval: Duration, mut on_message: F)
    where
        F: FnMut(&Message),
    {
        loop {
            cursor = self.poll_cycle(cursor, &mut on_message).await;
            tokio::time::sleep(interval).await;
        }
    }
}
