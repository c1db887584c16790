use std::fmt;

use serde::{Deserialize, Serialize};

/// The composite key a decoded payload boils down to.
///
/// Two identities are equal iff all present fields are equal; a structured
/// identity never equals an opaque one. This equality is the sole
/// duplicate-detection criterion — there is no fuzzy matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum BoxIdentity {
    /// Identity assembled from recognized payload fields.
    Structured {
        /// Transaction number the label was printed under.
        transaction_no: String,
        /// Item identifier, when the producer included one.
        sku_id: Option<String>,
        /// Box ordinal within the transaction, when included.
        box_number: Option<u32>,
    },
    /// A payload with no recognized structure, treated as a single-field
    /// key (typically a batch/lot code).
    Opaque(String),
}

impl BoxIdentity {
    /// Build an opaque identity from raw text. Surrounding whitespace is
    /// not significant for duplicate detection.
    pub fn opaque(text: &str) -> Self {
        BoxIdentity::Opaque(text.trim().to_string())
    }

    /// Item identifier carried by this identity, if any.
    pub fn sku_id(&self) -> Option<&str> {
        match self {
            BoxIdentity::Structured { sku_id, .. } => sku_id.as_deref(),
            BoxIdentity::Opaque(_) => None,
        }
    }

    /// Opaque key text, when this identity has no structure.
    pub fn opaque_text(&self) -> Option<&str> {
        match self {
            BoxIdentity::Opaque(text) => Some(text),
            BoxIdentity::Structured { .. } => None,
        }
    }

    /// True when the payload carried no recognized fields.
    pub fn is_opaque(&self) -> bool {
        matches!(self, BoxIdentity::Opaque(_))
    }
}

impl fmt::Display for BoxIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxIdentity::Structured {
                transaction_no,
                sku_id,
                box_number,
            } => {
                write!(f, "{transaction_no}")?;
                if let Some(sku) = sku_id {
                    write!(f, "/{sku}")?;
                }
                if let Some(n) = box_number {
                    write!(f, "#{n}")?;
                }
                Ok(())
            }
            BoxIdentity::Opaque(text) => write!(f, "{text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structured(tx: &str, sku: Option<&str>, n: Option<u32>) -> BoxIdentity {
        BoxIdentity::Structured {
            transaction_no: tx.to_string(),
            sku_id: sku.map(str::to_string),
            box_number: n,
        }
    }

    #[test]
    fn test_equality_requires_all_fields() {
        let a = structured("TX1", Some("S1"), Some(1));
        let b = structured("TX1", Some("S1"), Some(1));
        let c = structured("TX1", Some("S1"), Some(2));
        let d = structured("TX1", None, Some(1));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_structured_never_equals_opaque() {
        let s = structured("LOT-1", None, None);
        let o = BoxIdentity::opaque("LOT-1");
        assert_ne!(s, o);
    }

    #[test]
    fn test_opaque_trims_whitespace() {
        assert_eq!(BoxIdentity::opaque("  LOT-9 \n"), BoxIdentity::opaque("LOT-9"));
    }

    #[test]
    fn test_display_compacts_fields() {
        assert_eq!(structured("TX1", Some("S1"), Some(3)).to_string(), "TX1/S1#3");
        assert_eq!(structured("TX1", None, None).to_string(), "TX1");
        assert_eq!(BoxIdentity::opaque("LOT-2").to_string(), "LOT-2");
    }
}
