use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, TallyError};

pub const DEFAULT_ENDPOINT: &str = "https://pubmed.ncbi.nlm.nih.gov/";

/// Anything that can answer "how many articles match this expression".
#[async_trait]
pub trait CountSource: Send + Sync {
    async fn fetch_count(&self, expression: &str) -> Result<u64>;
}

/// Scrapes the result count off the PubMed search page.
pub struct PubMedClient {
    client: Client,
    endpoint: String,
}

impl PubMedClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let user_agents = [
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36",
            "Mozilla/5.0 (X11; Ubuntu; Linux x86_64) AppleWebKit/537.36",
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36",
            "Mozilla/5.0 (X11; Fedora; Linux x86_64) AppleWebKit/537.36",
        ];
        let user_agent = user_agents[fastrand::usize(..user_agents.len())];

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl CountSource for PubMedClient {
    async fn fetch_count(&self, expression: &str) -> Result<u64> {
        debug!(endpoint = %self.endpoint, expression, "requesting search page");

        let html = self
            .client
            .get(&self.endpoint)
            .query(&[("term", expression)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_count(&html).ok_or_else(|| TallyError::CountParse {
            expression: expression.to_string(),
            reason: "result count element missing or not a number".to_string(),
        })
    }
}

/// Pulls the result count out of a search page. The legacy page carries it
/// in `<input id="resultcount" value=..>`, the current one in a
/// `log_resultcount` meta tag.
pub fn parse_count(html: &str) -> Option<u64> {
    let document = Html::parse_document(html);

    let selectors = [
        ("#resultcount", "value"),
        ("meta[name='log_resultcount']", "content"),
    ];

    for (selector_str, attribute) in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(value) = document
            .select(&selector)
            .next()
            .and_then(|element| element.value().attr(attribute))
        {
            let digits: String = value.trim().chars().filter(|c| *c != ',').collect();
            return digits.parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_legacy_result_count() {
        let html = r#"<html><body><form>
            <input name="EntrezSystem2.PEntrez.DbConnector.Term" value="x">
            <input id="resultcount" type="hidden" value="1234">
        </form></body></html>"#;
        assert_eq!(parse_count(html), Some(1234));
    }

    #[test]
    fn falls_back_to_meta_tag_with_separators() {
        let html = r#"<html><head>
            <meta name="log_resultcount" content="12,345">
        </head><body></body></html>"#;
        assert_eq!(parse_count(html), Some(12345));
    }

    #[test]
    fn missing_or_garbled_count_is_none() {
        assert_eq!(parse_count("<html><body>No results</body></html>"), None);
        assert_eq!(
            parse_count(r#"<input id="resultcount" value="many">"#),
            None
        );
        assert_eq!(parse_count(r#"<input id="resultcount">"#), None);
    }
}
