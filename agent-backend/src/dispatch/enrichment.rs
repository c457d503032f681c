//! URL detection and the scraping collaborator client
//!
//! When a message mentions a website (or when a configured website has never
//! been scraped), the dispatcher asks the external scraping service for
//! structured brand and catalog data and injects the result into the prompt.
//! Enrichment is strictly best effort: any failure is logged and skipped.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;

// Match full URLs (https://...), www URLs (www....), and bare domains.
// Bare domain matching is limited to common TLDs to avoid false positives.
const BARE_DOMAIN_TLDS: &str =
    "com|net|org|io|ai|co|shop|store|us|biz|info|health|xyz|me|app|dev|bio|site|online|tech";

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"(?i)https?://[^\s<>"']+|www\.[^\s<>"']+\.[^\s<>"']+|[a-zA-Z0-9][-a-zA-Z0-9]*\.(?:{})(?:/[^\s<>"']*)?"#,
        BARE_DOMAIN_TLDS
    ))
    .expect("URL pattern compiles")
});

/// First recognizable URL in a message, normalized to include a scheme.
pub fn detect_url(text: &str) -> Option<String> {
    let raw = URL_PATTERN.find(text)?.as_str();
    if raw.starts_with("http://") || raw.starts_with("https://") {
        Some(raw.to_string())
    } else {
        Some(format!("https://{}", raw))
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScrapedBrand {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub primary_color: Option<String>,
    #[serde(default)]
    pub secondary_color: Option<String>,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapedProduct {
    pub name: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScrapeResult {
    #[serde(default)]
    pub brand: ScrapedBrand,
    #[serde(default)]
    pub products: Vec<ScrapedProduct>,
}

/// Render the scrape result into the prompt's enrichment block.
pub fn format_scrape_block(url: &str, result: &ScrapeResult) -> String {
    let mut block = String::new();
    block.push_str("[WEBSITE SCRAPE RESULTS]\n");
    block.push_str(&format!("Source: {}\n", url));

    if let Some(name) = &result.brand.company_name {
        block.push_str(&format!("Brand: {}\n", name));
    }
    if let Some(tagline) = &result.brand.tagline {
        block.push_str(&format!("Tagline: {}\n", tagline));
    }
    if let Some(color) = &result.brand.primary_color {
        block.push_str(&format!("Primary color: {}\n", color));
    }
    if let Some(color) = &result.brand.secondary_color {
        block.push_str(&format!("Secondary color: {}\n", color));
    }
    if let Some(font) = &result.brand.font_family {
        block.push_str(&format!("Font: {}\n", font));
    }
    if let Some(logo) = &result.brand.logo_url {
        block.push_str(&format!("Logo: {}\n", logo));
    }

    if result.products.is_empty() {
        block.push_str("No products were extracted.");
    } else {
        block.push_str(&format!("Extracted {} products:\n", result.products.len()));
        for product in &result.products {
            let price = product
                .price
                .map(|p| format!("${:.2}", p))
                .unwrap_or_else(|| "price unknown".to_string());
            let confidence = product
                .confidence
                .map(|c| format!(", confidence {:.2}", c))
                .unwrap_or_default();
            block.push_str(&format!("- {} ({}{})\n", product.name, price, confidence));
        }
        block.push_str(
            "These were auto-saved for review. Use this data instead of asking the merchant to repeat it.",
        );
    }
    block
}

/// Seam to the external scraping collaborator, mockable in tests.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Scrape a URL on the tenant's behalf. None means "no enrichment":
    /// transport errors, non-200 responses, and malformed bodies all
    /// collapse into it.
    async fn scrape(&self, url: &str, access_token: &str) -> Option<ScrapeResult>;
}

/// HTTP client for the scrape-brand endpoint
pub struct ScrapeClient {
    http: reqwest::Client,
    base_url: String,
}

impl ScrapeClient {
    pub fn new(base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Enricher for ScrapeClient {
    async fn scrape(&self, url: &str, access_token: &str) -> Option<ScrapeResult> {
        let endpoint = format!("{}/functions/v1/scrape-brand", self.base_url);
        let response = match self
            .http
            .post(&endpoint)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "url": url, "persist": true }))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                log::warn!("[SCRAPE] request to {} failed: {}", endpoint, e);
                return None;
            }
        };

        if !response.status().is_success() {
            log::warn!("[SCRAPE] {} returned {}", endpoint, response.status());
            return None;
        }

        match response.json::<ScrapeResult>().await {
            Ok(result) => {
                log::info!(
                    "[SCRAPE] {} extracted {} products",
                    url,
                    result.products.len()
                );
                Some(result)
            }
            Err(e) => {
                log::warn!("[SCRAPE] malformed response from {}: {}", endpoint, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_full_urls() {
        assert_eq!(
            detect_url("check https://acme.shop/products please"),
            Some("https://acme.shop/products".to_string())
        );
    }

    #[test]
    fn detects_www_urls_and_adds_scheme() {
        assert_eq!(
            detect_url("my site is www.acme-peptides.com ok"),
            Some("https://www.acme-peptides.com".to_string())
        );
    }

    #[test]
    fn detects_bare_domains_with_known_tlds() {
        assert_eq!(
            detect_url("we sell at acmepeptides.shop"),
            Some("https://acmepeptides.shop".to_string())
        );
    }

    #[test]
    fn ignores_text_without_urls() {
        assert_eq!(detect_url("set up my payments please"), None);
        assert_eq!(detect_url("I sell 3.5mg vials"), None);
    }

    #[test]
    fn first_url_wins() {
        assert_eq!(
            detect_url("see https://a.com and https://b.com"),
            Some("https://a.com".to_string())
        );
    }

    #[test]
    fn scrape_block_renders_brand_and_products() {
        let result = ScrapeResult {
            brand: ScrapedBrand {
                company_name: Some("Acme".to_string()),
                primary_color: Some("#112233".to_string()),
                ..Default::default()
            },
            products: vec![ScrapedProduct {
                name: "BPC-157".to_string(),
                price: Some(49.99),
                description: None,
                confidence: Some(0.9),
            }],
        };
        let block = format_scrape_block("https://acme.shop", &result);
        assert!(block.starts_with("[WEBSITE SCRAPE RESULTS]"));
        assert!(block.contains("Brand: Acme"));
        assert!(block.contains("- BPC-157 ($49.99, confidence 0.90)"));
    }

    #[test]
    fn scrape_block_handles_empty_extraction() {
        let block = format_scrape_block("https://acme.shop", &ScrapeResult::default());
        assert!(block.contains("No products were extracted."));
    }
}
