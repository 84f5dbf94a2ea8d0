use serde_json::Value;

use crate::apify::ScrapeProvider;
use crate::types::ActorInput;

/// Apify's instagram-scraper actor.
pub const INSTAGRAM_SCRAPER_ACTOR: &str = "7RQ4RlfRihUhflQtJ";

/// Field names that may carry the follower count, tried in order. Which one
/// the actor emits is an undocumented external contract; `followersCount` is
/// what its current output uses, `followers` is a best-effort fallback.
const FOLLOWER_KEYS: [&str; 2] = ["followersCount", "followers"];

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("APIFY_TOKEN environment variable not set.")]
    MissingToken,

    #[error("Apify run failed to start or return.")]
    RunFailed,

    #[error("No data returned for user {0}")]
    NoData(String),

    #[error("Could not find followers count in response: {0:?}")]
    FieldNotFound(Vec<String>),

    /// Catch-all for transport errors, malformed responses, and coercion
    /// failures. Carries the underlying message verbatim.
    #[error("{0}")]
    Unclassified(String),
}

impl From<anyhow::Error> for LookupError {
    fn from(err: anyhow::Error) -> Self {
        LookupError::Unclassified(format!("{err:#}"))
    }
}

/// Resolves a username to its follower count through the given provider.
///
/// One actor run, one dataset fetch, first record only. Every failure is
/// terminal; nothing is retried.
pub fn lookup(provider: &dyn ScrapeProvider, username: &str) -> Result<u64, LookupError> {
    let input = ActorInput::single(username);
    let run = provider
        .call_actor(INSTAGRAM_SCRAPER_ACTOR, &input)?
        .ok_or(LookupError::RunFailed)?;

    let items = provider.list_dataset_items(&run.default_dataset_id)?;
    let Some(item) = items.first() else {
        return Err(LookupError::NoData(username.to_string()));
    };

    extract_followers(item)
}

/// Pulls the follower count out of one dataset record.
///
/// A key holding JSON null counts as absent and falls through to the next
/// candidate; zero does not.
fn extract_followers(item: &Value) -> Result<u64, LookupError> {
    for key in FOLLOWER_KEYS {
        match item.get(key) {
            None | Some(Value::Null) => continue,
            Some(value) => return coerce_count(key, value),
        }
    }
    Err(LookupError::FieldNotFound(field_names(item)))
}

/// Integer coercion mirrors a plain `int(...)`: integers pass through,
/// floats truncate, numeric strings parse. Anything else is unclassified.
fn coerce_count(key: &str, value: &Value) -> Result<u64, LookupError> {
    let unclassified = || {
        LookupError::Unclassified(format!("field {key} is not a follower count: {value}"))
    };
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_u64() {
                Ok(i)
            } else if let Some(f) = n.as_f64() {
                if f.is_finite() && f >= 0.0 {
                    Ok(f.trunc() as u64)
                } else {
                    Err(unclassified())
                }
            } else {
                Err(unclassified())
            }
        }
        Value::String(s) => s.trim().parse::<u64>().map_err(|_| unclassified()),
        _ => Err(unclassified()),
    }
}

fn field_names(item: &Value) -> Vec<String> {
    item.as_object()
        .map(|obj| obj.keys().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActorRun, RunStatus};
    use anyhow::Result;
    use serde_json::json;

    /// In-memory provider: a canned run outcome plus canned dataset items.
    struct StubProvider {
        run: Option<ActorRun>,
        items: Vec<Value>,
    }

    impl StubProvider {
        fn with_items(items: Vec<Value>) -> Self {
            StubProvider {
                run: Some(ActorRun {
                    id: "run1".to_string(),
                    status: RunStatus::Succeeded,
                    default_dataset_id: "ds1".to_string(),
                }),
                items,
            }
        }

        fn no_run() -> Self {
            StubProvider {
                run: None,
                items: Vec::new(),
            }
        }
    }

    impl ScrapeProvider for StubProvider {
        fn call_actor(&self, _actor_id: &str, input: &ActorInput) -> Result<Option<ActorRun>> {
            assert_eq!(input.usernames.len(), 1);
            Ok(self.run.clone())
        }

        fn list_dataset_items(&self, dataset_id: &str) -> Result<Vec<Value>> {
            assert_eq!(dataset_id, "ds1");
            Ok(self.items.clone())
        }
    }

    #[test]
    fn reads_followers_count_field() {
        let stub = StubProvider::with_items(vec![json!({"followersCount": 1234})]);
        assert_eq!(lookup(&stub, "nasa").unwrap(), 1234);
    }

    #[test]
    fn falls_back_to_followers_field() {
        let stub = StubProvider::with_items(vec![json!({"followers": 500})]);
        assert_eq!(lookup(&stub, "nasa").unwrap(), 500);
    }

    #[test]
    fn null_primary_falls_through_to_fallback() {
        let stub =
            StubProvider::with_items(vec![json!({"followersCount": null, "followers": 7})]);
        assert_eq!(lookup(&stub, "nasa").unwrap(), 7);
    }

    #[test]
    fn zero_is_a_valid_count_not_an_absence() {
        let stub =
            StubProvider::with_items(vec![json!({"followersCount": 0, "followers": 99})]);
        assert_eq!(lookup(&stub, "nasa").unwrap(), 0);
    }

    #[test]
    fn only_first_item_is_consulted() {
        let stub = StubProvider::with_items(vec![
            json!({"followersCount": 10}),
            json!({"followersCount": 9999}),
        ]);
        assert_eq!(lookup(&stub, "nasa").unwrap(), 10);
    }

    #[test]
    fn empty_dataset_reports_username() {
        let stub = StubProvider::with_items(vec![]);
        let err = lookup(&stub, "ghost_user").unwrap_err();
        assert!(matches!(err, LookupError::NoData(_)));
        assert_eq!(err.to_string(), "No data returned for user ghost_user");
    }

    #[test]
    fn missing_run_is_distinct_from_empty_dataset() {
        let stub = StubProvider::no_run();
        let err = lookup(&stub, "nasa").unwrap_err();
        assert!(matches!(err, LookupError::RunFailed));
        assert_eq!(err.to_string(), "Apify run failed to start or return.");
    }

    #[test]
    fn missing_fields_enumerate_actual_keys() {
        let stub =
            StubProvider::with_items(vec![json!({"username": "nasa", "postsCount": 3})]);
        let err = lookup(&stub, "nasa").unwrap_err();
        let LookupError::FieldNotFound(keys) = err else {
            panic!("expected FieldNotFound, got {err}");
        };
        assert!(keys.contains(&"username".to_string()));
        assert!(keys.contains(&"postsCount".to_string()));
    }

    #[test]
    fn truncates_float_and_parses_string_counts() {
        let stub = StubProvider::with_items(vec![json!({"followersCount": 1234.9})]);
        assert_eq!(lookup(&stub, "nasa").unwrap(), 1234);
        let stub = StubProvider::with_items(vec![json!({"followersCount": " 42 "})]);
        assert_eq!(lookup(&stub, "nasa").unwrap(), 42);
    }

    #[test]
    fn uncoercible_value_is_unclassified() {
        let stub = StubProvider::with_items(vec![json!({"followersCount": {"nested": true}})]);
        let err = lookup(&stub, "nasa").unwrap_err();
        assert!(matches!(err, LookupError::Unclassified(_)));
        assert!(err.to_string().contains("followersCount"));
    }

    #[test]
    fn repeated_lookups_are_idempotent() {
        let stub = StubProvider::with_items(vec![json!({"followersCount": 77})]);
        for _ in 0..3 {
            assert_eq!(lookup(&stub, "nasa").unwrap(), 77);
        }
    }
}
