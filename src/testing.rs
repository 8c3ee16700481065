use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Result, TallyError};
use crate::fetch::CountSource;

/// Canned counts keyed by expression; unknown expressions use `fallback`
/// or fail the way an unparsable page would.
pub struct StubSource {
    counts: HashMap<String, u64>,
    fallback: Option<u64>,
    calls: Mutex<Vec<String>>,
}

impl StubSource {
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fallback(mut self, count: u64) -> Self {
        self.fallback = Some(count);
        self
    }

    pub fn with(mut self, expression: &str, count: u64) -> Self {
        self.counts.insert(expression.to_string(), count);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CountSource for StubSource {
    async fn fetch_count(&self, expression: &str) -> Result<u64> {
        self.calls.lock().unwrap().push(expression.to_string());
        self.counts
            .get(expression)
            .copied()
            .or(self.fallback)
            .ok_or_else(|| TallyError::CountParse {
                expression: expression.to_string(),
                reason: "stub has no count".to_string(),
            })
    }
}
