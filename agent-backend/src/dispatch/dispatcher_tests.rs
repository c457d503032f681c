//! Integration tests for the dispatch pipeline
//!
//! Wires a real Dispatcher against an in-memory database and stub agent
//! commands: `cat` echoes the assembled prompt back as the reply (so tests
//! can assert on prompt content), `false` fails, `sleep` outlives the
//! deadline. The scraping collaborator is a recording mock.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::db::{Database, TenantConfig};
use crate::dispatch::enrichment::{Enricher, ScrapeResult, ScrapedBrand, ScrapedProduct};
use crate::dispatch::invoker::InvokerConfig;
use crate::dispatch::{DispatchError, Dispatcher, ERROR_APOLOGY, TIMEOUT_APOLOGY};
use crate::models::{AuthedUser, DispatchStatus, MessageRole, TenantIdentity};

struct MockEnricher {
    calls: Mutex<Vec<String>>,
    result: Option<ScrapeResult>,
}

impl MockEnricher {
    fn returning(result: Option<ScrapeResult>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            result,
        })
    }

    fn scraped_urls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Enricher for MockEnricher {
    async fn scrape(&self, url: &str, _access_token: &str) -> Option<ScrapeResult> {
        self.calls.lock().unwrap().push(url.to_string());
        self.result.clone()
    }
}

fn stub_invoker(command: &str, args: &[&str], timeout_secs: u64) -> InvokerConfig {
    InvokerConfig {
        command: command.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        workdir: None,
        timeout: Duration::from_secs(timeout_secs),
        max_concurrent: 2,
    }
}

fn harness(
    command: &str,
    args: &[&str],
    rate_limit_max: usize,
    enricher: Option<Arc<MockEnricher>>,
) -> (Dispatcher, Arc<Database>) {
    let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
    let dispatcher = Dispatcher::new(
        db.clone(),
        stub_invoker(command, args, 10),
        rate_limit_max,
        Duration::from_secs(60),
        enricher.map(|e| e as Arc<dyn Enricher>),
    );
    (dispatcher, db)
}

fn user(org_id: &str, with_token: bool) -> AuthedUser {
    AuthedUser {
        identity: TenantIdentity {
            user_id: "u1".to_string(),
            org_id: org_id.to_string(),
            email: "jo@acme.test".to_string(),
            display_name: "Jo".to_string(),
        },
        access_token: if with_token {
            Some("tok".to_string())
        } else {
            None
        },
    }
}

fn sample_scrape() -> ScrapeResult {
    ScrapeResult {
        brand: ScrapedBrand {
            company_name: Some("Acme".to_string()),
            ..Default::default()
        },
        products: vec![ScrapedProduct {
            name: "BPC-157".to_string(),
            price: Some(49.99),
            description: None,
            confidence: Some(0.9),
        }],
    }
}

#[tokio::test]
async fn success_stores_user_then_assistant_message() {
    let (dispatcher, db) = harness("cat", &[], 10, None);

    let result = dispatcher
        .dispatch(&user("acme", false), "What's my current setup?", &[])
        .await
        .expect("dispatch");

    let messages = db.recent_messages("acme", 10).expect("read");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[0].content, "What's my current setup?");
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert_eq!(messages[1].id, result.message_id);
    assert_eq!(messages[0].org_id, messages[1].org_id);
    assert_eq!(messages[0].user_id, messages[1].user_id);

    let audits = db.list_audit_records("acme", 10).expect("audits");
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].status, DispatchStatus::Success);
}

#[tokio::test]
async fn prompt_for_empty_org_renders_absent_state_lines() {
    // cat echoes the prompt, so the reply exposes the assembled text
    let (dispatcher, _db) = harness("cat", &[], 10, None);

    let result = dispatcher
        .dispatch(&user("acme", false), "What's my current setup?", &[])
        .await
        .expect("dispatch");

    let prompt = &result.reply_text;
    assert!(prompt.contains("[SECURITY — ORG SCOPING]"));
    assert!(prompt.contains("Org ID: acme"));
    assert!(prompt.contains("Product catalog: None configured yet"));
    assert!(prompt.contains("Branding: Not configured"));
    assert!(prompt.contains("Payments: Not configured"));
    assert!(prompt.contains("Shipping: Not configured"));
    assert!(prompt.contains("Merchant says: What's my current setup?"));
}

#[tokio::test]
async fn agent_failure_stores_error_apology() {
    let (dispatcher, db) = harness("false", &[], 10, None);

    let result = dispatcher
        .dispatch(&user("acme", false), "hello", &[])
        .await
        .expect("dispatch succeeds despite agent failure");
    assert_eq!(result.reply_text, ERROR_APOLOGY);

    let messages = db.recent_messages("acme", 10).expect("read");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, ERROR_APOLOGY);

    let audits = db.list_audit_records("acme", 10).expect("audits");
    assert_eq!(audits[0].status, DispatchStatus::Error);
}

#[tokio::test]
async fn agent_timeout_stores_timeout_apology() {
    let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
    let dispatcher = Dispatcher::new(
        db.clone(),
        stub_invoker("sleep", &["30"], 1),
        10,
        Duration::from_secs(60),
        None,
    );

    let result = dispatcher
        .dispatch(&user("acme", false), "hello", &[])
        .await
        .expect("dispatch succeeds despite timeout");
    assert_eq!(result.reply_text, TIMEOUT_APOLOGY);

    let messages = db.recent_messages("acme", 10).expect("read");
    assert_eq!(messages[1].content, TIMEOUT_APOLOGY);

    let audits = db.list_audit_records("acme", 10).expect("audits");
    assert_eq!(audits[0].status, DispatchStatus::Timeout);
}

#[tokio::test]
async fn rate_limit_rejects_excess_calls_without_storing_messages() {
    let (dispatcher, db) = harness("cat", &[], 10, None);
    let caller = user("acme", false);

    for i in 0..10 {
        dispatcher
            .dispatch(&caller, &format!("call {}", i), &[])
            .await
            .expect("within quota");
    }
    assert_eq!(db.message_count("acme").expect("count"), 20);

    match dispatcher.dispatch(&caller, "call 10", &[]).await {
        Err(DispatchError::RateLimited) => {}
        other => panic!("expected RateLimited, got {:?}", other.map(|r| r.reply_text)),
    }
    // The throttled call stored nothing but was audited
    assert_eq!(db.message_count("acme").expect("count"), 20);
    let audits = db.list_audit_records("acme", 20).expect("audits");
    assert_eq!(audits[0].status, DispatchStatus::RateLimited);
}

#[tokio::test]
async fn rate_limit_is_per_org() {
    let (dispatcher, _db) = harness("cat", &[], 1, None);

    dispatcher
        .dispatch(&user("acme", false), "hi", &[])
        .await
        .expect("first acme call");
    assert!(matches!(
        dispatcher.dispatch(&user("acme", false), "hi", &[]).await,
        Err(DispatchError::RateLimited)
    ));
    dispatcher
        .dispatch(&user("globex", false), "hi", &[])
        .await
        .expect("other org unaffected");
}

#[tokio::test]
async fn url_in_message_triggers_scrape_and_block_in_prompt() {
    let enricher = MockEnricher::returning(Some(sample_scrape()));
    let (dispatcher, _db) = harness("cat", &[], 10, Some(enricher.clone()));

    let result = dispatcher
        .dispatch(&user("acme", true), "my site is https://acme.shop", &[])
        .await
        .expect("dispatch");

    assert_eq!(enricher.scraped_urls(), vec!["https://acme.shop".to_string()]);
    assert!(result.reply_text.contains("[WEBSITE SCRAPE RESULTS]"));
    assert!(result.reply_text.contains("Brand: Acme"));
}

#[tokio::test]
async fn message_without_url_never_triggers_scrape() {
    let enricher = MockEnricher::returning(Some(sample_scrape()));
    let (dispatcher, _db) = harness("cat", &[], 10, Some(enricher.clone()));

    dispatcher
        .dispatch(&user("acme", true), "set up payments please", &[])
        .await
        .expect("dispatch");

    assert!(enricher.scraped_urls().is_empty());
}

#[tokio::test]
async fn missing_credential_skips_enrichment() {
    let enricher = MockEnricher::returning(Some(sample_scrape()));
    let (dispatcher, _db) = harness("cat", &[], 10, Some(enricher.clone()));

    dispatcher
        .dispatch(&user("acme", false), "see https://acme.shop", &[])
        .await
        .expect("dispatch");

    assert!(enricher.scraped_urls().is_empty());
}

#[tokio::test]
async fn scrape_failure_is_silently_skipped() {
    let enricher = MockEnricher::returning(None);
    let (dispatcher, db) = harness("cat", &[], 10, Some(enricher.clone()));

    let result = dispatcher
        .dispatch(&user("acme", true), "see https://acme.shop", &[])
        .await
        .expect("dispatch must not fail on enrichment errors");

    assert_eq!(enricher.scraped_urls().len(), 1);
    assert!(!result.reply_text.contains("[WEBSITE SCRAPE RESULTS]"));
    assert_eq!(db.message_count("acme").expect("count"), 2);
}

#[tokio::test]
async fn proactive_scrape_fires_only_for_unscraped_configured_website() {
    let enricher = MockEnricher::returning(Some(sample_scrape()));
    let (dispatcher, db) = harness("cat", &[], 10, Some(enricher.clone()));
    db.upsert_tenant_config(
        "acme",
        &TenantConfig {
            website_url: Some("https://acme.shop".to_string()),
            ..Default::default()
        },
    )
    .expect("config");

    dispatcher
        .dispatch(&user("acme", true), "help me get set up", &[])
        .await
        .expect("dispatch");
    assert_eq!(enricher.scraped_urls(), vec!["https://acme.shop".to_string()]);

    // A catalog now exists (via the scrape import path); no rescrape
    db.insert_product("acme", "BPC-157", Some(49.99)).expect("product");
    dispatcher
        .dispatch(&user("acme", true), "what next?", &[])
        .await
        .expect("dispatch");
    assert_eq!(enricher.scraped_urls().len(), 1);
}

#[tokio::test]
async fn history_is_included_but_new_message_is_not_duplicated() {
    let (dispatcher, _db) = harness("cat", &[], 10, None);
    let caller = user("acme", false);

    dispatcher
        .dispatch(&caller, "first message", &[])
        .await
        .expect("dispatch");
    let result = dispatcher
        .dispatch(&caller, "second message", &[])
        .await
        .expect("dispatch");

    let prompt = &result.reply_text;
    assert!(prompt.contains("Merchant: first message"));
    assert!(prompt.contains("Merchant says: second message"));
    // The new message must not also appear as a history turn
    assert!(!prompt.contains("Merchant: second message"));
}
