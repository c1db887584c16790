use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Constraint violations in an expected manifest.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    /// Two lines share the same id, which would make correlation ambiguous.
    #[error("duplicate line id `{0}` in expected manifest")]
    DuplicateLineId(String),
}

/// One line of the expected manifest: an item and how many boxes of it
/// the session is supposed to collect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedLine {
    /// Line key; decoded SKUs and opaque codes correlate against this.
    pub line_id: String,
    /// Human-readable item description, for progress display.
    #[serde(default)]
    pub description: Option<String>,
    /// Boxes required before the line is satisfied.
    pub required_quantity: u32,
    /// Boxes counted so far. Can exceed `required_quantity`; overrun is
    /// surfaced, never capped.
    #[serde(default)]
    pub scanned_count: u32,
}

impl ExpectedLine {
    /// A fresh line with nothing scanned yet.
    pub fn new(line_id: impl Into<String>, required_quantity: u32) -> Self {
        ExpectedLine {
            line_id: line_id.into(),
            description: None,
            required_quantity,
            scanned_count: 0,
        }
    }

    /// Attach an item description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Boxes still missing on this line.
    pub fn pending(&self) -> u32 {
        self.required_quantity.saturating_sub(self.scanned_count)
    }

    /// Boxes counted beyond the requirement.
    pub fn overrun(&self) -> u32 {
        self.scanned_count.saturating_sub(self.required_quantity)
    }

    /// Whether the requirement has been met.
    pub fn is_satisfied(&self) -> bool {
        self.scanned_count >= self.required_quantity
    }
}

/// The list of lines a reconciliation session works against.
#[derive(Debug, Clone)]
pub struct ExpectedManifest {
    /// Document reference the manifest was loaded for, when known.
    pub reference: Option<String>,
    lines: Vec<ExpectedLine>,
}

impl ExpectedManifest {
    /// Build a manifest, rejecting repeated line ids. An empty manifest
    /// is allowed but can never reach completion.
    pub fn new(
        reference: Option<String>,
        lines: Vec<ExpectedLine>,
    ) -> Result<Self, ManifestError> {
        let mut seen = HashSet::new();
        for line in &lines {
            if !seen.insert(line.line_id.as_str()) {
                return Err(ManifestError::DuplicateLineId(line.line_id.clone()));
            }
        }
        Ok(ExpectedManifest { reference, lines })
    }

    /// All lines, in manifest order.
    pub fn lines(&self) -> &[ExpectedLine] {
        &self.lines
    }

    /// Look a line up by its id.
    pub fn line(&self, line_id: &str) -> Option<&ExpectedLine> {
        self.lines.iter().find(|l| l.line_id == line_id)
    }

    pub(crate) fn line_mut(&mut self, line_id: &str) -> Option<&mut ExpectedLine> {
        self.lines.iter_mut().find(|l| l.line_id == line_id)
    }

    /// Whether the manifest has no lines at all.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// True when every line has met its requirement.
    pub fn all_satisfied(&self) -> bool {
        self.lines.iter().all(ExpectedLine::is_satisfied)
    }
}
