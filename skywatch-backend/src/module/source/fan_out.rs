///! Bounded concurrent enrichment of flight records

use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use skywatch_common::FlightRecord;

use crate::config::EnrichmentConfig;

/// Descriptive fields returned by a per-record lookup
pub trait Enrichment {
    fn apply(self, record: &mut FlightRecord);
}

#[derive(Debug, Clone, Copy)]
pub struct FanOutLimits {
    /// Lookups in flight at once, at least 1
    pub max_concurrent: usize,
    pub lookup_timeout: Duration,
}

impl Default for FanOutLimits {
    fn default() -> Self {
        Self::from(&EnrichmentConfig::default())
    }
}

impl From<&EnrichmentConfig> for FanOutLimits {
    fn from(config: &EnrichmentConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent.max(1),
            lookup_timeout: config.lookup_timeout(),
        }
    }
}

/// Run `lookup` for every record that carries a key and apply the results.
///
/// Records keep their input order. A failed or timed-out lookup leaves its
/// record as it was; records without a key are passed through untouched.
pub async fn enrich_all<E, F, Fut>(
    records: Vec<(FlightRecord, Option<String>)>,
    limits: FanOutLimits,
    lookup: F,
) -> Vec<FlightRecord>
where
    E: Enrichment,
    F: Fn(String) -> Fut,
    Fut: Future<Output = anyhow::Result<E>>,
{
    let lookup = &lookup;

    stream::iter(records)
        .map(|(mut record, key)| async move {
            let Some(key) = key else {
                return record;
            };

            match tokio::time::timeout(limits.lookup_timeout, lookup(key.clone())).await {
                Ok(Ok(enrichment)) => enrichment.apply(&mut record),
                Ok(Err(e)) => {
                    tracing::warn!("Lookup for {} ({}) failed: {:#}", record.identifier, key, e);
                }
                Err(_) => {
                    tracing::warn!(
                        "Lookup for {} ({}) timed out after {:?}",
                        record.identifier,
                        key,
                        limits.lookup_timeout
                    );
                }
            }
            record
        })
        .buffered(limits.max_concurrent.max(1))
        .collect()
        .await
}
