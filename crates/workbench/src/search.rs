//! Debounced field search with late-response discarding.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use brms_api::{ApiError, RulesApi};
use brms_core::RuleField;
use tracing::debug;

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Each call to [`search`](FieldSearch::search) supersedes the ones before
/// it. A superseded call returns `Ok(None)`: either it never reached the
/// network, or its response arrived after a newer query was issued.
/// In-flight requests are not cancelled, only ignored.
#[derive(Debug)]
pub struct FieldSearch {
    generation: AtomicU64,
    delay: Duration,
}

impl Default for FieldSearch {
    fn default() -> Self {
        FieldSearch::new()
    }
}

impl FieldSearch {
    pub fn new() -> Self {
        FieldSearch::with_delay(SEARCH_DEBOUNCE)
    }

    pub fn with_delay(delay: Duration) -> Self {
        FieldSearch {
            generation: AtomicU64::new(0),
            delay,
        }
    }

    fn is_current(&self, token: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == token
    }

    pub async fn search(
        &self,
        api: &dyn RulesApi,
        query: &str,
    ) -> Result<Option<Vec<RuleField>>, ApiError> {
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let query = query.trim();
        if query.is_empty() {
            return Ok(Some(Vec::new()));
        }

        tokio::time::sleep(self.delay).await;
        if !self.is_current(token) {
            debug!(query, "search superseded before dispatch");
            return Ok(None);
        }

        let fields = api.search_fields(query).await?;
        if !self.is_current(token) {
            debug!(query, "discarding stale search results");
            return Ok(None);
        }
        Ok(Some(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brms_api::{InMemoryRulesApi, Operation};

    async fn api() -> InMemoryRulesApi {
        let api = InMemoryRulesApi::new();
        api.set_fields(vec![
            RuleField::named("customer.age", "Age"),
            RuleField::named("customer.income", "Income"),
        ])
        .await;
        api
    }

    #[test]
    fn default_debounce_is_half_a_second() {
        assert_eq!(FieldSearch::new().delay, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn single_search_returns_matches() {
        let api = api().await;
        let search = FieldSearch::with_delay(Duration::from_millis(5));
        let found = search.search(&api, "inc").await.unwrap().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field, "customer.income");
    }

    #[tokio::test]
    async fn rapid_typing_sends_one_request() {
        let api = api().await;
        let search = FieldSearch::with_delay(Duration::from_millis(50));
        let (first, second) = tokio::join!(search.search(&api, "a"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            search.search(&api, "ag").await
        });
        assert_eq!(first.unwrap(), None);
        assert_eq!(second.unwrap().map(|f| f.len()), Some(1));
        assert_eq!(api.calls_of(Operation::SearchFields).await.len(), 1);
    }

    #[tokio::test]
    async fn late_response_is_discarded() {
        let api = api().await;
        api.set_search_latency(Duration::from_millis(100)).await;
        let search = FieldSearch::with_delay(Duration::from_millis(5));
        let (first, second) = tokio::join!(search.search(&api, "age"), async {
            tokio::time::sleep(Duration::from_millis(40)).await;
            search.search(&api, "income").await
        });
        assert_eq!(first.unwrap(), None);
        assert_eq!(second.unwrap().map(|f| f[0].field.clone()), Some("customer.income".into()));
        // Both requests went out; the first was ignored, not cancelled.
        assert_eq!(api.calls_of(Operation::SearchFields).await.len(), 2);
    }

    #[tokio::test]
    async fn blank_query_skips_network() {
        let api = api().await;
        let search = FieldSearch::with_delay(Duration::from_millis(5));
        assert_eq!(search.search(&api, "  ").await.unwrap(), Some(Vec::new()));
        assert!(api.calls().await.is_empty());
    }
}
