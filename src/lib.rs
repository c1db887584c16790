//! boxscan - camera-driven box identification and manifest reconciliation.
//!
//! The crate decodes QR labels from a live camera feed (or from typed
//! entry when no camera is usable), parses the label payloads into box
//! identities, and reconciles each accepted box against an expected
//! manifest until every line is satisfied.
//!
//! The pieces compose in layers:
//!
//! - [`capture`] opens a device and hands out frames
//! - [`decode`] turns frames into label text, preferring a platform
//!   detector and falling back to the bundled portable decoder
//! - [`scan`] drives the capture/decode loop as a state machine
//! - [`payload`] and [`models`] give decoded text a typed identity
//! - [`reconcile`] keeps the session ledger of scanned boxes
//! - [`workflow`] ties decode results to the ledger, debounces repeats
//!   and talks to the host system
//!
//! # Example
//!
//! ```
//! use boxscan::{DecodeGate, ExpectedLine, ExpectedManifest, ReconcileWorkflow, ScanSession};
//!
//! let manifest = ExpectedManifest::new(
//!     Some("PO-1042".into()),
//!     vec![ExpectedLine::new("L1", 1)],
//! )
//! .unwrap();
//! let session = ScanSession::new(manifest);
//! let mut workflow = ReconcileWorkflow::new(session, DecodeGate::default());
//!
//! let symbol = boxscan::DecodedSymbol::manual(r#"{"transactionNo":"TX-9","skuId":"L1"}"#);
//! workflow.handle_decode(&symbol);
//! assert!(workflow.is_complete());
//! ```

#![warn(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

/// Camera acquisition: devices, frames, the session lifecycle.
pub mod capture;
/// Engine configuration with environment overrides.
pub mod config;
/// Decoder backends and the selection policy between them.
pub mod decode;
/// Core value types shared across the crate.
pub mod models;
/// Label payload parsing and field-alias resolution.
pub mod payload;
/// The reconciliation ledger: manifests, scanned boxes, progress.
pub mod reconcile;
/// The scan loop state machine and its decode gate.
pub mod scan;
/// Host-system contracts and the end-to-end reconcile workflow.
pub mod workflow;

pub use capture::{
    CaptureConfig, CaptureDevice, CaptureError, CaptureSession, Facing, Frame, PixelFormat,
};
pub use config::EngineConfig;
pub use decode::{DecodeError, DecoderBackend, PlatformDetector, PortableDecoder};
pub use models::{BoxIdentity, DecodedSymbol, SymbolSource};
pub use payload::{BoxPayload, FieldAliases};
pub use reconcile::{
    AcceptOutcome, ExpectedLine, ExpectedManifest, LineProgress, ManifestError, ScanSession,
    ScannedBox, SessionSnapshot,
};
pub use scan::{
    CycleOutcome, DecodeGate, ManualOutcome, ScanController, ScanError, ScanState, StillOutcome,
};
pub use workflow::{
    begin_session, DecodeDisposition, ManifestSource, PayloadEnricher, ReconcileSink,
    ReconcileWorkflow, WorkflowError,
};
