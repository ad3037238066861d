//! Domain events raised while reconciling the catalog
use serde::Serialize;
use tracing::{debug, warn};
use crate::domain::aggregates::SyncOutcome;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReconcileEvent {
    CategorySynced { slug: String, outcome: SyncOutcome },
    ProductRelocated { product_id: String, from: String, to: String },
    ConflictSkipped { product_id: String, legacy_key: String, canonical_slug: String },
    LegacyCategoryDeleted { legacy_key: String },
    LegacyCategoryRetained { legacy_key: String, remaining: usize },
}

impl ReconcileEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::CategorySynced { .. } => "catalog.reconcile.category_synced",
            Self::ProductRelocated { .. } => "catalog.reconcile.product_relocated",
            Self::ConflictSkipped { .. } => "catalog.reconcile.conflict_skipped",
            Self::LegacyCategoryDeleted { .. } => "catalog.reconcile.legacy_deleted",
            Self::LegacyCategoryRetained { .. } => "catalog.reconcile.legacy_retained",
        }
    }
}

/// Best-effort fan-out to NATS; a publish failure never fails the run.
pub async fn publish(nats: Option<&async_nats::Client>, events: &[ReconcileEvent]) {
    let Some(client) = nats else { return };
    for event in events {
        let payload = match serde_json::to_vec(event) {
            Ok(p) => p,
            Err(e) => { warn!(error = %e, "failed to encode reconcile event"); continue; }
        };
        if let Err(e) = client.publish(event.subject().to_string(), payload.into()).await {
            warn!(subject = event.subject(), error = %e, "failed to publish reconcile event");
        }
    }
    if let Err(e) = client.flush().await {
        warn!(error = %e, "failed to flush NATS client");
    }
    debug!(count = events.len(), "published reconcile events");
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_event_encoding() {
        let e = ReconcileEvent::ConflictSkipped { product_id: "P2".into(), legacy_key: "가방".into(), canonical_slug: "bags".into() };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "conflict_skipped");
        assert_eq!(v["product_id"], "P2");
        assert_eq!(e.subject(), "catalog.reconcile.conflict_skipped");
    }
}
