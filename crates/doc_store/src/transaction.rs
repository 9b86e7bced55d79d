//! Optimistic read-modify-write over a `DocumentStore`.

use common::Error;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::{DocumentStore, Precondition};

/// Read `collection/key`, apply `update` to the decoded prior document
/// (`None` when absent), and write the result back conditioned on the
/// version that was read.
///
/// A conflicting concurrent write restarts the whole sequence with a fresh
/// read, up to `max_attempts` times. `update` may therefore run more than
/// once and must not have side effects. Any other error, including a prior
/// document that fails to decode, aborts immediately.
pub async fn run_transaction<S, T, F>(
    store: &S,
    collection: &str,
    key: &str,
    max_attempts: u32,
    mut update: F,
) -> Result<T, Error>
where
    S: DocumentStore + ?Sized,
    T: Serialize + DeserializeOwned + Send,
    F: FnMut(Option<T>) -> Result<T, Error> + Send,
{
    let max_attempts = max_attempts.max(1);
    let mut last_conflict = None;

    for attempt in 1..=max_attempts {
        let read = store.get(collection, key).await?;
        let precondition = Precondition::from_read(read.as_ref());

        let prior = match read {
            Some(doc) => Some(serde_json::from_value::<T>(doc.data).map_err(|e| {
                Error::Store(format!("failed to decode {collection}/{key}: {e}"))
            })?),
            None => None,
        };

        let updated = update(prior)?;
        let data = serde_json::to_value(&updated)?;

        match store.put(collection, key, data, precondition).await {
            Ok(version) => {
                debug!(collection, key, version, attempt, "transaction committed");
                return Ok(updated);
            }
            Err(e) if e.is_conflict() => {
                debug!(collection, key, attempt, error = %e, "transaction conflict, retrying");
                last_conflict = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(Error::StoreConflict(format!(
        "{collection}/{key}: gave up after {max_attempts} conflicting attempts ({})",
        last_conflict.map(|e| e.to_string()).unwrap_or_default()
    )))
}
