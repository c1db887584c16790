//! Reconciliation ledger: the authoritative record of which boxes have
//! been scanned against an expected manifest.
//!
//! The session owns every mutation. Box ids are handed out from a
//! per-session counter and never reused, so a removed box keeps its id
//! forever and late removal requests for it stay harmless.

pub mod manifest;

pub use manifest::{ExpectedLine, ExpectedManifest, ManifestError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::models::BoxIdentity;
use crate::payload::{BoxPayload, FieldAliases};

/// One accepted box, as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannedBox {
    /// Session-scoped id, monotonically assigned and never reused.
    pub id: u64,
    /// Identity the duplicate check ran against.
    pub identity: BoxIdentity,
    /// Manifest line this box counted toward, when one was found.
    pub matched_line_id: Option<String>,
    /// Parsed payload; display fields may be filled by enrichment later.
    pub payload: BoxPayload,
    /// When the box was accepted.
    pub scanned_at: DateTime<Utc>,
}

/// Result of offering a decoded payload to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum AcceptOutcome {
    /// The box was recorded. `overrun` is set when its line went past the
    /// required quantity.
    Accepted { scanned: ScannedBox, overrun: bool },
    /// A box with the same identity is already in the ledger; the session
    /// is unchanged.
    Duplicate { existing_box_id: u64 },
}

/// Per-line progress as exposed in a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct LineProgress {
    /// Manifest line id.
    pub line_id: String,
    /// Human-readable description, when the manifest carried one.
    pub description: Option<String>,
    /// Boxes the manifest calls for.
    pub required_quantity: u32,
    /// Boxes counted toward this line so far.
    pub scanned_count: u32,
    /// Boxes still missing.
    pub pending: u32,
    /// Boxes scanned past the requirement.
    pub overrun: u32,
}

impl From<&ExpectedLine> for LineProgress {
    fn from(line: &ExpectedLine) -> Self {
        LineProgress {
            line_id: line.line_id.clone(),
            description: line.description.clone(),
            required_quantity: line.required_quantity,
            scanned_count: line.scanned_count,
            pending: line.pending(),
            overrun: line.overrun(),
        }
    }
}

/// Serializable view of the whole session, for display or submission.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// Document reference of the underlying manifest.
    pub reference: Option<String>,
    /// Whether the session was complete when the snapshot was taken.
    pub complete: bool,
    /// Per-line progress, in manifest order.
    pub lines: Vec<LineProgress>,
    /// Every recorded box, in scan order.
    pub boxes: Vec<ScannedBox>,
    /// Snapshot timestamp.
    pub generated_at: DateTime<Utc>,
}

/// A reconciliation session: one manifest plus the boxes scanned so far.
#[derive(Debug)]
pub struct ScanSession {
    manifest: ExpectedManifest,
    boxes: Vec<ScannedBox>,
    next_box_id: u64,
    aliases: FieldAliases,
}

impl ScanSession {
    /// Start a session against `manifest` with the default alias lists.
    pub fn new(manifest: ExpectedManifest) -> Self {
        ScanSession::with_aliases(manifest, FieldAliases::default())
    }

    /// Start a session with deployment-specific alias lists.
    pub fn with_aliases(manifest: ExpectedManifest, aliases: FieldAliases) -> Self {
        ScanSession {
            manifest,
            boxes: Vec::new(),
            next_box_id: 1,
            aliases,
        }
    }

    /// The manifest being reconciled, with live per-line counts.
    pub fn manifest(&self) -> &ExpectedManifest {
        &self.manifest
    }

    /// Every recorded box, in scan order.
    pub fn boxes(&self) -> &[ScannedBox] {
        &self.boxes
    }

    /// Alias lists this session parses payloads with.
    pub fn aliases(&self) -> &FieldAliases {
        &self.aliases
    }

    /// Number of recorded boxes that counted toward a manifest line.
    pub fn matched_count(&self) -> usize {
        self.boxes.iter().filter(|b| b.matched_line_id.is_some()).count()
    }

    /// Recorded boxes with no manifest line, in scan order. These need a
    /// human decision before the session can be trusted.
    pub fn unmatched_boxes(&self) -> Vec<&ScannedBox> {
        self.boxes.iter().filter(|b| b.matched_line_id.is_none()).collect()
    }

    /// Offer one decoded payload to the ledger.
    ///
    /// Parsing never fails, so every call yields either a recorded box or
    /// a duplicate verdict. Duplicates leave the session untouched.
    pub fn accept(&mut self, raw: &str) -> AcceptOutcome {
        let payload = BoxPayload::parse(raw, &self.aliases);
        let identity = payload.identity();
        if let Some(existing) = self.boxes.iter().find(|b| b.identity == identity) {
            debug!(existing_box_id = existing.id, identity = %identity, "duplicate scan ignored");
            return AcceptOutcome::Duplicate {
                existing_box_id: existing.id,
            };
        }

        let matched_line_id = self.correlate(&identity);
        let id = self.next_box_id;
        self.next_box_id += 1;

        let mut overrun = false;
        if let Some(line_id) = &matched_line_id {
            if let Some(line) = self.manifest.line_mut(line_id) {
                line.scanned_count += 1;
                if line.scanned_count > line.required_quantity {
                    overrun = true;
                    warn!(
                        line_id = %line_id,
                        scanned = line.scanned_count,
                        required = line.required_quantity,
                        "line overrun"
                    );
                }
            }
        }

        let scanned = ScannedBox {
            id,
            identity,
            matched_line_id,
            payload,
            scanned_at: Utc::now(),
        };
        debug!(
            box_id = scanned.id,
            line = scanned.matched_line_id.as_deref().unwrap_or("-"),
            identity = %scanned.identity,
            "box accepted"
        );
        self.boxes.push(scanned.clone());
        AcceptOutcome::Accepted { scanned, overrun }
    }

    /// Undo one accepted box. Returns false when the id is unknown, which
    /// covers repeated removal of the same box.
    pub fn remove(&mut self, box_id: u64) -> bool {
        let Some(pos) = self.boxes.iter().position(|b| b.id == box_id) else {
            debug!(box_id, "remove ignored, no such box");
            return false;
        };
        let removed = self.boxes.remove(pos);
        if let Some(line_id) = &removed.matched_line_id {
            if let Some(line) = self.manifest.line_mut(line_id) {
                line.scanned_count = line.scanned_count.saturating_sub(1);
            }
        }
        debug!(box_id, identity = %removed.identity, "box removed");
        true
    }

    /// Merge externally fetched detail into a recorded box's payload.
    /// Identity fields are untouched, so past duplicate verdicts hold.
    pub fn enrich(&mut self, box_id: u64, detail: &Map<String, Value>) -> bool {
        let Some(scanned) = self.boxes.iter_mut().find(|b| b.id == box_id) else {
            return false;
        };
        scanned.payload.merge_detail(detail, &self.aliases);
        true
    }

    /// Every line satisfied, with at least one box actually scanned.
    /// An empty manifest never completes.
    pub fn is_complete(&self) -> bool {
        !self.manifest.is_empty() && self.manifest.all_satisfied() && !self.boxes.is_empty()
    }

    /// Freeze the session into a serializable view.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            reference: self.manifest.reference.clone(),
            complete: self.is_complete(),
            lines: self.manifest.lines().iter().map(LineProgress::from).collect(),
            boxes: self.boxes.clone(),
            generated_at: Utc::now(),
        }
    }

    /// Pick the manifest line a box belongs to.
    ///
    /// SKU match wins; an opaque code may match a line id directly. With
    /// exactly one expected line and no SKU on the label, the box is
    /// assumed to belong to that line. Multi-line manifests never guess.
    fn correlate(&self, identity: &BoxIdentity) -> Option<String> {
        if let Some(sku) = identity.sku_id() {
            return self.manifest.line(sku).map(|l| l.line_id.clone());
        }
        if let Some(text) = identity.opaque_text() {
            if let Some(line) = self.manifest.line(text) {
                return Some(line.line_id.clone());
            }
        }
        if self.manifest.lines().len() == 1 {
            return Some(self.manifest.lines()[0].line_id.clone());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(lines: &[(&str, u32)]) -> ExpectedManifest {
        let lines = lines
            .iter()
            .map(|(id, qty)| ExpectedLine::new(*id, *qty))
            .collect();
        ExpectedManifest::new(Some("DOC-1".into()), lines).unwrap()
    }

    fn box_json(tx: &str, sku: &str) -> String {
        format!(r#"{{"transactionNo":"{tx}","skuId":"{sku}"}}"#)
    }

    #[test]
    fn test_sku_match_increments_line() {
        let mut session = ScanSession::new(manifest(&[("SKU-A", 2), ("SKU-B", 1)]));
        match session.accept(&box_json("TX1", "SKU-A")) {
            AcceptOutcome::Accepted { scanned, overrun } => {
                assert_eq!(scanned.id, 1);
                assert_eq!(scanned.matched_line_id.as_deref(), Some("SKU-A"));
                assert!(!overrun);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(session.manifest().line("SKU-A").unwrap().scanned_count, 1);
        assert_eq!(session.manifest().line("SKU-B").unwrap().scanned_count, 0);
        assert_eq!(session.matched_count(), 1);
        assert!(session.unmatched_boxes().is_empty());
    }

    #[test]
    fn test_opaque_code_matches_line_id() {
        let mut session = ScanSession::new(manifest(&[("LOT-9", 1), ("SKU-B", 1)]));
        let AcceptOutcome::Accepted { scanned, .. } = session.accept("LOT-9") else {
            panic!("expected acceptance");
        };
        assert_eq!(scanned.matched_line_id.as_deref(), Some("LOT-9"));
    }

    #[test]
    fn test_single_line_fallback_only_without_sku() {
        let mut session = ScanSession::new(manifest(&[("SKU-A", 2)]));
        let AcceptOutcome::Accepted { scanned, .. } = session.accept("LOT-1") else {
            panic!("expected acceptance");
        };
        assert_eq!(scanned.matched_line_id.as_deref(), Some("SKU-A"));

        // An explicit SKU that matches nothing must not fall back.
        let AcceptOutcome::Accepted { scanned, .. } = session.accept(&box_json("TX1", "SKU-X"))
        else {
            panic!("expected acceptance");
        };
        assert_eq!(scanned.matched_line_id, None);
    }

    #[test]
    fn test_multi_line_manifest_never_guesses() {
        let mut session = ScanSession::new(manifest(&[("SKU-A", 1), ("SKU-B", 1)]));
        let AcceptOutcome::Accepted { scanned, .. } = session.accept("LOT-1") else {
            panic!("expected acceptance");
        };
        assert_eq!(scanned.matched_line_id, None);
        assert!(!session.is_complete());
        assert_eq!(session.matched_count(), 0);
        assert_eq!(session.unmatched_boxes().len(), 1);
    }

    #[test]
    fn test_duplicate_leaves_session_unchanged() {
        let mut session = ScanSession::new(manifest(&[("SKU-A", 2)]));
        session.accept(&box_json("TX1", "SKU-A"));
        let before = session.manifest().line("SKU-A").unwrap().scanned_count;
        match session.accept(&box_json("TX1", "SKU-A")) {
            AcceptOutcome::Duplicate { existing_box_id } => assert_eq!(existing_box_id, 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(session.manifest().line("SKU-A").unwrap().scanned_count, before);
        assert_eq!(session.boxes().len(), 1);
    }

    #[test]
    fn test_overrun_is_reported_not_capped() {
        let mut session = ScanSession::new(manifest(&[("SKU-A", 1)]));
        session.accept(&box_json("TX1", "SKU-A"));
        let AcceptOutcome::Accepted { overrun, .. } = session.accept(&box_json("TX2", "SKU-A"))
        else {
            panic!("expected acceptance");
        };
        assert!(overrun);
        assert_eq!(session.manifest().line("SKU-A").unwrap().scanned_count, 2);
        assert_eq!(session.manifest().line("SKU-A").unwrap().overrun(), 1);
    }

    #[test]
    fn test_remove_decrements_and_ids_are_never_reused() {
        let mut session = ScanSession::new(manifest(&[("SKU-A", 2)]));
        session.accept(&box_json("TX1", "SKU-A"));
        assert!(session.remove(1));
        assert_eq!(session.manifest().line("SKU-A").unwrap().scanned_count, 0);
        assert!(!session.remove(1));

        let AcceptOutcome::Accepted { scanned, .. } = session.accept(&box_json("TX1", "SKU-A"))
        else {
            panic!("expected acceptance");
        };
        assert_eq!(scanned.id, 2);
    }

    #[test]
    fn test_completion_requires_boxes_and_satisfied_lines() {
        let mut session = ScanSession::new(manifest(&[("SKU-A", 1)]));
        assert!(!session.is_complete());
        session.accept(&box_json("TX1", "SKU-A"));
        assert!(session.is_complete());

        let empty = ExpectedManifest::new(None, Vec::new()).unwrap();
        let mut session = ScanSession::new(empty);
        session.accept("LOT-1");
        assert!(!session.is_complete());
    }

    #[test]
    fn test_enrich_fills_detail_in_place() {
        let mut session = ScanSession::new(manifest(&[("SKU-A", 1)]));
        session.accept(&box_json("TX1", "SKU-A"));
        let detail: Map<String, Value> =
            serde_json::from_str(r#"{"batchNo":"B1","netWeight":"18.2"}"#).unwrap();
        assert!(session.enrich(1, &detail));
        let scanned = &session.boxes()[0];
        assert_eq!(scanned.payload.batch_no.as_deref(), Some("B1"));
        assert_eq!(scanned.payload.net_weight.as_deref(), Some("18.2"));
        assert!(!session.enrich(99, &detail));
    }

    #[test]
    fn test_snapshot_reflects_progress() {
        let mut session = ScanSession::new(manifest(&[("SKU-A", 2)]));
        session.accept(&box_json("TX1", "SKU-A"));
        let snap = session.snapshot();
        assert_eq!(snap.reference.as_deref(), Some("DOC-1"));
        assert!(!snap.complete);
        assert_eq!(snap.lines[0].pending, 1);
        assert_eq!(snap.boxes.len(), 1);
        // The snapshot is what gets submitted, so it must serialize.
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"SKU-A\""));
    }
}
