//! Collaborator contracts and the confirmation workflow.
//!
//! The engine never talks to the warehouse backend itself. Loading a
//! manifest, submitting the result and enriching terse payloads are
//! trait seams the embedder implements; the workflow wires the gate,
//! the ledger and those seams together.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::DecodedSymbol;
use crate::reconcile::{AcceptOutcome, ExpectedManifest, ScanSession, SessionSnapshot};
use crate::scan::DecodeGate;

/// Failures at the boundary to the embedding system.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The manifest source knows no document with this reference.
    #[error("no expected manifest found for `{0}`")]
    ReferenceNotFound(String),
    /// The collaborator could not be reached.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    /// Confirmation attempted before every line was satisfied.
    #[error("session is not complete")]
    Incomplete,
    /// The sink refused the snapshot.
    #[error("submission rejected: {0}")]
    Rejected(String),
}

/// Loads the expected manifest for a document reference.
pub trait ManifestSource {
    /// Fetch the manifest for `reference`.
    fn load(&mut self, reference: &str) -> Result<ExpectedManifest, WorkflowError>;
}

/// Receives the final snapshot when the operator confirms.
pub trait ReconcileSink {
    /// Deliver the snapshot to the backing system.
    fn submit(&mut self, snapshot: &SessionSnapshot) -> Result<(), WorkflowError>;
}

/// Fetches display detail for payloads that carry only an identity.
pub trait PayloadEnricher {
    /// Detail fields for `key`, or `None` when the key is unknown.
    fn lookup(&mut self, key: &str) -> Result<Option<Map<String, Value>>, WorkflowError>;
}

/// Disposition of one gated decode.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeDisposition {
    /// The box was recorded in the ledger.
    Accepted {
        /// Id assigned to the recorded box.
        box_id: u64,
        /// Manifest line it counted toward, when one was found.
        matched_line_id: Option<String>,
        /// The line went past its required quantity.
        overrun: bool,
    },
    /// Same identity already recorded; nothing changed.
    Duplicate { existing_box_id: u64 },
    /// The gate absorbed the event (mid-processing or debounce window).
    Throttled,
}

/// One reconciliation run: ledger, gate and the optional enricher.
pub struct ReconcileWorkflow {
    session: ScanSession,
    gate: DecodeGate,
    enricher: Option<Box<dyn PayloadEnricher>>,
}

impl ReconcileWorkflow {
    /// Wire a session to a gate. No enrichment until one is attached.
    pub fn new(session: ScanSession, gate: DecodeGate) -> Self {
        ReconcileWorkflow {
            session,
            gate,
            enricher: None,
        }
    }

    /// Attach an enrichment source for terse payloads.
    pub fn with_enricher(mut self, enricher: Box<dyn PayloadEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// The underlying ledger session.
    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    /// Single entry for every decoded symbol, camera or manual.
    ///
    /// The gate is claimed for the whole accept; only a recorded box
    /// starts the debounce window, so duplicates and throttles can be
    /// retried as soon as the operator reacts.
    pub fn handle_decode(&mut self, symbol: &DecodedSymbol) -> DecodeDisposition {
        if !self.gate.try_begin() {
            debug!(source = %symbol.source, "decode throttled");
            return DecodeDisposition::Throttled;
        }
        let disposition = match self.session.accept(&symbol.text) {
            AcceptOutcome::Accepted { scanned, overrun } => {
                self.maybe_enrich(scanned.id);
                DecodeDisposition::Accepted {
                    box_id: scanned.id,
                    matched_line_id: scanned.matched_line_id,
                    overrun,
                }
            }
            AcceptOutcome::Duplicate { existing_box_id } => {
                DecodeDisposition::Duplicate { existing_box_id }
            }
        };
        self.gate
            .finish(matches!(disposition, DecodeDisposition::Accepted { .. }));
        disposition
    }

    /// Typed codes go through the same gate and the same accept path.
    pub fn handle_manual(&mut self, text: &str) -> DecodeDisposition {
        self.handle_decode(&DecodedSymbol::manual(text))
    }

    /// Undo one recorded box. See [`ScanSession::remove`].
    pub fn remove_box(&mut self, box_id: u64) -> bool {
        self.session.remove(box_id)
    }

    /// Whether every manifest line is satisfied.
    pub fn is_complete(&self) -> bool {
        self.session.is_complete()
    }

    /// Current serializable view of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Submit the final snapshot. Refused until every line is satisfied.
    pub fn confirm(
        &self,
        sink: &mut dyn ReconcileSink,
    ) -> Result<SessionSnapshot, WorkflowError> {
        if !self.session.is_complete() {
            return Err(WorkflowError::Incomplete);
        }
        let snapshot = self.session.snapshot();
        sink.submit(&snapshot)?;
        info!(boxes = snapshot.boxes.len(), "session submitted");
        Ok(snapshot)
    }

    fn maybe_enrich(&mut self, box_id: u64) {
        let Some(enricher) = self.enricher.as_mut() else {
            return;
        };
        let Some(scanned) = self.session.boxes().iter().find(|b| b.id == box_id) else {
            return;
        };
        if !scanned.payload.is_terse() {
            return;
        }
        let key = scanned.payload.enrichment_key().to_string();
        match enricher.lookup(&key) {
            Ok(Some(detail)) => {
                self.session.enrich(box_id, &detail);
                debug!(box_id, "payload enriched");
            }
            Ok(None) => debug!(box_id, key = %key, "no enrichment detail found"),
            // Enrichment is best-effort; the box already counted.
            Err(err) => warn!(box_id, error = %err, "enrichment lookup failed"),
        }
    }
}

/// Load a manifest and start a workflow against it.
pub fn begin_session(
    source: &mut dyn ManifestSource,
    reference: &str,
    gate: DecodeGate,
) -> Result<ReconcileWorkflow, WorkflowError> {
    let manifest: ExpectedManifest = source.load(reference)?;
    info!(reference, lines = manifest.lines().len(), "session started");
    Ok(ReconcileWorkflow::new(ScanSession::new(manifest), gate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::reconcile::ExpectedLine;

    fn session(lines: &[(&str, u32)]) -> ScanSession {
        let lines = lines
            .iter()
            .map(|(id, qty)| ExpectedLine::new(*id, *qty))
            .collect();
        ScanSession::new(ExpectedManifest::new(Some("DOC-1".into()), lines).unwrap())
    }

    fn open_gate() -> DecodeGate {
        DecodeGate::new(Duration::ZERO)
    }

    struct RecordingSink {
        submissions: usize,
    }

    impl ReconcileSink for RecordingSink {
        fn submit(&mut self, snapshot: &SessionSnapshot) -> Result<(), WorkflowError> {
            assert!(snapshot.complete);
            self.submissions += 1;
            Ok(())
        }
    }

    struct MapEnricher {
        detail: Map<String, Value>,
        lookups: usize,
    }

    impl PayloadEnricher for MapEnricher {
        fn lookup(&mut self, _key: &str) -> Result<Option<Map<String, Value>>, WorkflowError> {
            self.lookups += 1;
            Ok(Some(self.detail.clone()))
        }
    }

    #[test]
    fn test_debounce_throttles_rapid_second_decode() {
        let mut workflow = ReconcileWorkflow::new(session(&[("SKU-A", 2)]), DecodeGate::default());
        let first = workflow.handle_manual(r#"{"transactionNo":"TX1","skuId":"SKU-A"}"#);
        assert!(matches!(first, DecodeDisposition::Accepted { .. }));
        // Well inside the default window.
        let second = workflow.handle_manual(r#"{"transactionNo":"TX2","skuId":"SKU-A"}"#);
        assert_eq!(second, DecodeDisposition::Throttled);
    }

    #[test]
    fn test_duplicate_does_not_start_debounce() {
        let mut workflow = ReconcileWorkflow::new(session(&[("SKU-A", 2)]), open_gate());
        workflow.handle_manual("LOT-1");
        assert_eq!(
            workflow.handle_manual("LOT-1"),
            DecodeDisposition::Duplicate { existing_box_id: 1 }
        );
        // Still open for a different box right away.
        assert!(matches!(
            workflow.handle_manual("LOT-2"),
            DecodeDisposition::Accepted { .. }
        ));
    }

    #[test]
    fn test_terse_payload_gets_enriched() {
        let detail: Map<String, Value> =
            serde_json::from_str(r#"{"batchNo":"B9","netWeight":"12.0"}"#).unwrap();
        let mut workflow = ReconcileWorkflow::new(session(&[("SKU-A", 1)]), open_gate())
            .with_enricher(Box::new(MapEnricher { detail, lookups: 0 }));
        workflow.handle_manual(r#"{"transactionNo":"TX1"}"#);
        let scanned = &workflow.session().boxes()[0];
        assert_eq!(scanned.payload.batch_no.as_deref(), Some("B9"));
        assert_eq!(scanned.payload.net_weight.as_deref(), Some("12.0"));
    }

    #[test]
    fn test_detailed_payload_skips_enrichment() {
        let detail: Map<String, Value> = serde_json::from_str(r#"{"batchNo":"B9"}"#).unwrap();
        let mut workflow = ReconcileWorkflow::new(session(&[("SKU-A", 1)]), open_gate())
            .with_enricher(Box::new(MapEnricher { detail, lookups: 0 }));
        workflow.handle_manual(r#"{"transactionNo":"TX1","netWeight":"3.5"}"#);
        let scanned = &workflow.session().boxes()[0];
        // Producer detail present, so the lookup never ran.
        assert_eq!(scanned.payload.batch_no, None);
        assert_eq!(scanned.payload.net_weight.as_deref(), Some("3.5"));
    }

    #[test]
    fn test_confirm_requires_completion() {
        let mut workflow = ReconcileWorkflow::new(session(&[("SKU-A", 1)]), open_gate());
        let mut sink = RecordingSink { submissions: 0 };
        assert!(matches!(
            workflow.confirm(&mut sink),
            Err(WorkflowError::Incomplete)
        ));
        workflow.handle_manual(r#"{"transactionNo":"TX1","skuId":"SKU-A"}"#);
        let snapshot = workflow.confirm(&mut sink).unwrap();
        assert!(snapshot.complete);
        assert_eq!(sink.submissions, 1);
    }

    #[test]
    fn test_remove_reopens_completion() {
        let mut workflow = ReconcileWorkflow::new(session(&[("SKU-A", 1)]), open_gate());
        let DecodeDisposition::Accepted { box_id, .. } =
            workflow.handle_manual(r#"{"transactionNo":"TX1","skuId":"SKU-A"}"#)
        else {
            panic!("expected acceptance");
        };
        assert!(workflow.is_complete());
        assert!(workflow.remove_box(box_id));
        assert!(!workflow.is_complete());
        assert!(!workflow.remove_box(box_id));
    }
}
