//! Message dispatch orchestration
//!
//! Takes an authenticated user's chat message, builds a context-enriched
//! prompt describing the tenant's current state, runs the external agent
//! under admission and concurrency bounds, and records the interaction:
//! rate check, store user message, optional enrichment, snapshot + history,
//! prompt assembly, bounded invocation, store reply, audit.

pub mod audit;
pub mod enrichment;
pub mod invoker;
pub mod prompt;
pub mod rate_limit;
pub mod snapshot;

#[cfg(test)]
mod dispatcher_tests;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::db::Database;
use crate::models::{
    Attachment, AuthedUser, DispatchResult, DispatchStatus, Message, MessageRole,
};
use audit::AuditRecorder;
use enrichment::Enricher;
use invoker::{AgentInvoker, InvokeError, InvokerConfig};
use rate_limit::RateLimiter;
use snapshot::SnapshotBuilder;

/// History rows fetched per dispatch; the prompt keeps the last 10 after the
/// just-stored user message is excluded
const HISTORY_FETCH_LIMIT: usize = 20;

/// User-facing replies substituted for agent failures. The root cause stays
/// in the server log.
pub const TIMEOUT_APOLOGY: &str =
    "I'm still thinking about that — it's taking longer than expected. Please try again in a moment.";
pub const ERROR_APOLOGY: &str =
    "I encountered an error connecting to the AI backend. Please try again shortly.";

#[derive(Debug)]
pub enum DispatchError {
    /// Admission failure: surfaced distinctly so the caller can map it to 429
    RateLimited,
    /// Conversation-store failure; nothing recoverable remains in this attempt
    Storage(rusqlite::Error),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::RateLimited => write!(f, "too many requests for this org"),
            DispatchError::Storage(e) => write!(f, "conversation store error: {}", e),
        }
    }
}

impl From<rusqlite::Error> for DispatchError {
    fn from(e: rusqlite::Error) -> Self {
        DispatchError::Storage(e)
    }
}

/// Composes the dispatch pipeline. One instance per process, owned by the
/// composition root and shared across request handlers.
pub struct Dispatcher {
    db: Arc<Database>,
    rate_limiter: RateLimiter,
    snapshot: SnapshotBuilder,
    invoker: AgentInvoker,
    audit: AuditRecorder,
    enricher: Option<Arc<dyn Enricher>>,
}

impl Dispatcher {
    pub fn new(
        db: Arc<Database>,
        invoker_config: InvokerConfig,
        rate_limit_max: usize,
        rate_limit_window: Duration,
        enricher: Option<Arc<dyn Enricher>>,
    ) -> Self {
        Self {
            rate_limiter: RateLimiter::new(rate_limit_max, rate_limit_window),
            snapshot: SnapshotBuilder::new(db.clone()),
            invoker: AgentInvoker::new(invoker_config),
            audit: AuditRecorder::new(db.clone()),
            db,
            enricher,
        }
    }

    /// Run one dispatch. Always terminates in a `DispatchResult` or an
    /// explicit error; agent failures after the user message is stored are
    /// converted into a stored apology reply, never surfaced raw.
    pub async fn dispatch(
        &self,
        user: &AuthedUser,
        message_text: &str,
        attachments: &[Attachment],
    ) -> Result<DispatchResult, DispatchError> {
        let identity = &user.identity;
        let org_id = identity.org_id.as_str();
        let start = Instant::now();

        // Admission control precedes any persistence or invocation
        if !self.rate_limiter.allow(org_id) {
            self.audit.record(
                org_id,
                &identity.user_id,
                message_text,
                "",
                "",
                start.elapsed().as_millis() as i64,
                DispatchStatus::RateLimited,
            );
            return Err(DispatchError::RateLimited);
        }

        // Store the user message first; its id is known before invocation
        let user_msg = Message::new(org_id, &identity.user_id, MessageRole::User, message_text);
        if let Err(e) = self.db.append_message(&user_msg) {
            log::error!("[DISPATCH] failed to store user message for {}: {}", org_id, e);
            self.audit.record(
                org_id,
                &identity.user_id,
                message_text,
                "",
                "",
                start.elapsed().as_millis() as i64,
                DispatchStatus::Error,
            );
            return Err(e.into());
        }

        // Optional enrichment side-path; must never fail the dispatch
        let enrichment_text = self.try_enrich(user, message_text).await;

        // Tenant state and trimmed history feed the prompt
        let snapshot_text = self.snapshot.build(org_id);
        let mut history = self
            .db
            .recent_messages(org_id, HISTORY_FETCH_LIMIT)
            .unwrap_or_else(|e| {
                log::warn!("[DISPATCH] history fetch failed for {}: {}", org_id, e);
                Vec::new()
            });
        // The just-stored user message renders as "Merchant says:", not history
        history.retain(|m| m.id != user_msg.id);

        let prompt_text = prompt::assemble(
            identity,
            message_text,
            &history,
            &snapshot_text,
            enrichment_text.as_deref(),
            attachments,
        );

        // One attempt, one outcome, always recorded
        let (reply_text, trace, status) = match self.invoker.invoke(&prompt_text).await {
            Ok(output) => (output.text, output.trace, DispatchStatus::Success),
            Err(InvokeError::Timeout) => {
                log::error!("[DISPATCH] agent timed out for org {}", org_id);
                (
                    TIMEOUT_APOLOGY.to_string(),
                    "(invocation timed out)".to_string(),
                    DispatchStatus::Timeout,
                )
            }
            Err(e) => {
                log::error!("[DISPATCH] agent invocation failed for org {}: {}", org_id, e);
                let trace = match e {
                    InvokeError::Failed { stderr, .. } => stderr,
                    other => other.to_string(),
                };
                (ERROR_APOLOGY.to_string(), trace, DispatchStatus::Error)
            }
        };

        // The user always receives a reply message once their message is stored
        let reply_msg = Message::new(org_id, &identity.user_id, MessageRole::Assistant, &reply_text);
        if let Err(e) = self.db.append_message(&reply_msg) {
            log::error!("[DISPATCH] failed to store reply for {}: {}", org_id, e);
            self.audit.record(
                org_id,
                &identity.user_id,
                message_text,
                &reply_text,
                &trace,
                start.elapsed().as_millis() as i64,
                DispatchStatus::Error,
            );
            return Err(e.into());
        }

        self.audit.record(
            org_id,
            &identity.user_id,
            message_text,
            &reply_text,
            &trace,
            start.elapsed().as_millis() as i64,
            status,
        );

        Ok(DispatchResult {
            reply_text,
            message_id: reply_msg.id,
        })
    }

    /// Enrichment side-path. Scrapes the first URL found in the message, or
    /// proactively scrapes the tenant's configured website when it has never
    /// produced products. Returns None on any failure.
    async fn try_enrich(&self, user: &AuthedUser, message_text: &str) -> Option<String> {
        let enricher = self.enricher.as_ref()?;
        let access_token = user.access_token.as_deref()?;
        let org_id = user.identity.org_id.as_str();

        if let Some(url) = enrichment::detect_url(message_text) {
            log::info!("[DISPATCH] scraping {} for org {}", url, org_id);
            let result = enricher.scrape(&url, access_token).await?;
            return Some(enrichment::format_scrape_block(&url, &result));
        }

        // Proactive scrape: website configured but no products anywhere yet,
        // and we have not scraped before
        let website = self
            .db
            .get_tenant_config(org_id)
            .ok()
            .flatten()
            .and_then(|c| c.website_url)?;
        let has_products = self.db.active_product_count(org_id).unwrap_or(0) > 0;
        let already_scraped = self.db.scraped_product_count(org_id).unwrap_or(0) > 0;
        if has_products || already_scraped {
            return None;
        }

        log::info!(
            "[DISPATCH] proactive scrape of {} for org {} (no products yet)",
            website,
            org_id
        );
        let result = enricher.scrape(&website, access_token).await?;
        Some(enrichment::format_scrape_block(&website, &result))
    }
}
