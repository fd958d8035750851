//! Gap scanning for a single destination.

use crate::error::AuditError;
use crate::summary::{DestinationAudit, DestinationState};
use crate::traits::DocumentStore;
use crate::types::{DestinationPosition, ReportRecord};
use raven_etag::Etag;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Where a destination stands relative to the source high-water mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Acknowledged everything up to the high-water mark (or beyond it).
    Current,
    /// Behind the high-water mark.
    Lagging,
}

/// Classify a destination by its last acknowledged etag.
pub fn classify(last_acknowledged: &Etag, high_water: &Etag) -> Classification {
    if last_acknowledged.is_greater_than_or_equal(high_water) {
        Classification::Current
    } else {
        Classification::Lagging
    }
}

/// Whether a document key falls under the reserved internal prefix.
///
/// An empty prefix disables the filter.
pub fn is_internal(key: &str, internal_prefix: &str) -> bool {
    !internal_prefix.is_empty() && key.starts_with(internal_prefix)
}

/// Scan one destination and send a record for every document it is missing.
///
/// Documents after `high_water` were written after the run started and are
/// not reported. A cursor failure ends this destination's scan only; the
/// records already sent stay sent.
pub(crate) async fn scan_destination<S: DocumentStore + ?Sized>(
    store: &S,
    position: &DestinationPosition,
    high_water: Etag,
    internal_prefix: &str,
    records: &mpsc::Sender<ReportRecord>,
) -> DestinationAudit {
    let destination = &position.destination;
    let last_acknowledged = position.last_acknowledged;
    let mut audit = DestinationAudit {
        destination_url: destination.url.clone(),
        last_acknowledged: Some(last_acknowledged),
        state: DestinationState::Current,
    };

    if classify(&last_acknowledged, &high_water) == Classification::Current {
        info!(
            "Destination {} is up to date (last etag {})",
            destination.url, last_acknowledged
        );
        return audit;
    }

    info!(
        "Destination {} is behind: last etag {}, source at {}",
        destination.url, last_acknowledged, high_water
    );

    let mut emitted = 0u64;
    let mut internal_skipped = 0u64;

    let mut cursor = match store.open_document_stream(last_acknowledged).await {
        Ok(cursor) => cursor,
        Err(e) => {
            warn!(
                "Failed to open document stream for destination {}: {}",
                destination.url, e
            );
            audit.state = DestinationState::Failed {
                reason: e.to_string(),
                records: 0,
            };
            return audit;
        }
    };

    while let Some(next) = cursor.next().await {
        let document = match next {
            Ok(document) => document,
            Err(e) => {
                warn!(
                    "Aborting scan of destination {} after {} documents: {}",
                    destination.url, emitted, e
                );
                audit.state = DestinationState::Failed {
                    reason: e.to_string(),
                    records: emitted,
                };
                return audit;
            }
        };

        if !document.etag.is_greater_than(&last_acknowledged) {
            debug!(
                "Ignoring {} at {}: not after the acknowledged etag",
                document.key, document.etag
            );
            continue;
        }
        if document.etag.is_greater_than(&high_water) {
            debug!(
                "Reached {} past the high-water mark {}, stopping",
                document.etag, high_water
            );
            break;
        }
        if is_internal(&document.key, internal_prefix) {
            internal_skipped += 1;
            continue;
        }

        info!(
            "Doc Id = {}, Destination = {}",
            document.key, destination.url
        );
        let record = ReportRecord::from_snapshot(document, destination);
        if records.send(record).await.is_err() {
            let e = AuditError::Output("report writer stopped".to_string());
            warn!("Aborting scan of destination {}: {}", destination.url, e);
            audit.state = DestinationState::Failed {
                reason: e.to_string(),
                records: emitted,
            };
            return audit;
        }
        emitted += 1;
    }

    audit.state = DestinationState::Lagging {
        records: emitted,
        internal_skipped,
    };
    audit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use crate::types::{Destination, DocumentSnapshot};

    fn position(url: &str, acked: u64) -> DestinationPosition {
        DestinationPosition {
            destination: Destination::new(url, None),
            last_acknowledged: Etag::new(0, acked),
        }
    }

    async fn collect(
        store: &MemoryStore,
        position: &DestinationPosition,
        high_water: u64,
    ) -> (DestinationAudit, Vec<ReportRecord>) {
        let (tx, mut rx) = mpsc::channel(64);
        let audit = scan_destination(store, position, Etag::new(0, high_water), "Raven/", &tx).await;
        drop(tx);
        let mut records = Vec::new();
        while let Some(record) = rx.recv().await {
            records.push(record);
        }
        (audit, records)
    }

    fn store() -> MemoryStore {
        MemoryStore::new(vec![
            DocumentSnapshot::new("Raven/Config", Etag::new(0, 1), None),
            DocumentSnapshot::new("orders/1", Etag::new(0, 2), Some("Orders")),
            DocumentSnapshot::new("orders/2", Etag::new(0, 3), Some("Orders")),
        ])
    }

    #[test]
    fn test_classify() {
        let high_water = Etag::new(0, 3);
        assert_eq!(classify(&Etag::new(0, 3), &high_water), Classification::Current);
        assert_eq!(classify(&Etag::new(0, 4), &high_water), Classification::Current);
        assert_eq!(classify(&Etag::new(0, 2), &high_water), Classification::Lagging);
        assert_eq!(classify(&Etag::EMPTY, &high_water), Classification::Lagging);
        assert_eq!(classify(&Etag::EMPTY, &Etag::EMPTY), Classification::Current);
    }

    #[test]
    fn test_is_internal() {
        assert!(is_internal("Raven/Replication/Destinations", "Raven/"));
        assert!(!is_internal("raven/lowercase", "Raven/"));
        assert!(!is_internal("orders/1", "Raven/"));
        assert!(!is_internal("Raven/Config", ""));
    }

    #[tokio::test]
    async fn test_lagging_destination_reports_missing_documents() {
        let store = store();
        let (audit, records) = collect(&store, &position("http://d1", 1), 3).await;

        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["orders/1", "orders/2"]);
        assert!(records.iter().all(|r| r.destination_url == "http://d1"));
        assert!(records.iter().all(|r| r.entity_name == "Orders"));
        assert_eq!(
            audit.state,
            DestinationState::Lagging {
                records: 2,
                internal_skipped: 0
            }
        );
    }

    #[tokio::test]
    async fn test_internal_documents_are_dropped() {
        let store = store();
        let (audit, records) = collect(&store, &position("http://d1", 0), 3).await;

        assert_eq!(records.len(), 2);
        assert_eq!(
            audit.state,
            DestinationState::Lagging {
                records: 2,
                internal_skipped: 1
            }
        );
    }

    #[tokio::test]
    async fn test_current_destination_reports_nothing() {
        let store = store();
        let (audit, records) = collect(&store, &position("http://d2", 3), 3).await;

        assert!(records.is_empty());
        assert_eq!(audit.state, DestinationState::Current);
        assert_eq!(store.cursors_opened(), 0);
    }

    #[tokio::test]
    async fn test_documents_after_high_water_are_excluded() {
        let store = store();
        let (_, records) = collect(&store, &position("http://d1", 1), 2).await;

        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["orders/1"]);
        assert_eq!(store.open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_stream_failure_keeps_emitted_records() {
        let store = store().failing_at(Etag::new(0, 3));
        let (audit, records) = collect(&store, &position("http://d1", 1), 3).await;

        assert_eq!(records.len(), 1);
        match audit.state {
            DestinationState::Failed { records, .. } => assert_eq!(records, 1),
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(store.open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_records_follow_etag_order() {
        let store = MemoryStore::new(vec![
            DocumentSnapshot::new("users/2", Etag::new(1, 1), None),
            DocumentSnapshot::new("users/1", Etag::new(0, 9), None),
            DocumentSnapshot::new("users/3", Etag::new(1, 2), None),
        ]);
        let (tx, mut rx) = mpsc::channel(8);
        let position = position("http://d1", 0);

        scan_destination(&store, &position, Etag::new(1, 2), "Raven/", &tx).await;
        drop(tx);

        let mut previous = Etag::EMPTY;
        while let Some(record) = rx.recv().await {
            assert!(record.etag.is_greater_than_or_equal(&previous));
            previous = record.etag;
        }
        assert_eq!(previous, Etag::new(1, 2));
    }
}
