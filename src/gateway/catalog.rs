//! Known die identifiers shown by the gateway.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::task::JoinHandle;

use crate::dice::validate_identifier;
use crate::observability::{metrics, TraceContext};
use crate::specs::{LookupError, SpecificationClient};

/// Identifier list, seeded with a fallback and replaced once the store answers.
#[derive(Debug)]
pub struct KnownDice {
    identifiers: ArcSwap<Vec<String>>,
}

impl KnownDice {
    pub fn new(fallback: Vec<String>) -> Self {
        Self {
            identifiers: ArcSwap::from_pointee(fallback),
        }
    }

    pub fn get(&self) -> Arc<Vec<String>> {
        self.identifiers.load_full()
    }

    pub fn set(&self, identifiers: Vec<String>) {
        self.identifiers.store(Arc::new(identifiers));
    }

    pub fn contains(&self, die: &str) -> bool {
        self.identifiers.load().iter().any(|known| known == die)
    }

    /// Metric label for `die`. Dice outside the known list share one series.
    pub fn metric_label(&self, die: &str) -> String {
        if self.contains(die) {
            die.to_string()
        } else {
            metrics::UNRESOLVED_DIE.to_string()
        }
    }

    /// Ask the store for its identifiers. Malformed entries are dropped; an
    /// empty answer keeps the current list.
    pub async fn refresh(&self, catalog: &SpecificationClient) -> Result<usize, LookupError> {
        let ctx = TraceContext::new_root();
        let mut identifiers = catalog.list(&ctx).await?;
        identifiers.retain(|id| match validate_identifier(id) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(identifier = %id, error = %e, "Ignoring malformed die identifier from die service");
                false
            }
        });
        if identifiers.is_empty() {
            tracing::warn!("Die service returned empty identifier list");
            return Ok(self.get().len());
        }

        let count = identifiers.len();
        tracing::info!(count, identifiers = ?identifiers, "Die list fetched from die service");
        self.set(identifiers);
        Ok(count)
    }
}

/// Refresh `dice` once in the background; startup never waits on the store.
pub fn spawn_prefetch(dice: Arc<KnownDice>, catalog: SpecificationClient) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = dice.refresh(&catalog).await {
            tracing::error!(error = %e, fallback = ?dice.get(), "Failed to fetch die list, using fallback");
        }
    })
}
