//! Payload interpretation: turning decoded QR text into box fields.
//!
//! Label producers disagree on field names, so extraction walks
//! configurable alias lists in priority order. Parsing never fails:
//! text that is not a JSON object becomes an opaque payload keyed by
//! its raw text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::BoxIdentity;

/// Alias priority lists for the recognized payload fields.
///
/// Earlier names win. The defaults cover the label formats seen in
/// production; deployments with house formats override via config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldAliases {
    /// Names tried for the transaction number.
    pub transaction_no: Vec<String>,
    /// Names tried for the SKU identifier.
    pub sku_id: Vec<String>,
    /// Names tried for the box ordinal.
    pub box_number: Vec<String>,
    /// Names tried for the batch / lot number.
    pub batch_no: Vec<String>,
    /// Names tried for the net weight.
    pub net_weight: Vec<String>,
    /// Names tried for the gross weight.
    pub gross_weight: Vec<String>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for FieldAliases {
    fn default() -> Self {
        FieldAliases {
            transaction_no: names(&["transactionNo", "transaction_no", "tranNo", "txNo"]),
            sku_id: names(&["skuId", "sku_id", "sku", "itemId", "item_id"]),
            box_number: names(&["boxNumber", "box_number", "boxNo", "caseNo"]),
            batch_no: names(&["batchNo", "batch_no", "lotNo", "lot_no"]),
            net_weight: names(&["netWeight", "net_weight", "nw"]),
            gross_weight: names(&["grossWeight", "gross_weight", "gw"]),
        }
    }
}

/// First alias present in `map` with a usable scalar value.
///
/// Strings are trimmed; empty strings count as absent. Numbers are
/// carried as their display form. Other value types are skipped.
fn first_scalar(map: &Map<String, Value>, aliases: &[String]) -> Option<String> {
    for name in aliases {
        match map.get(name) {
            Some(Value::String(s)) => {
                let s = s.trim();
                if !s.is_empty() {
                    return Some(s.to_string());
                }
            }
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// One decoded payload, split into the fields the ledger and the UI need.
///
/// `transaction_no`, `sku_id` and `box_number` feed [`BoxIdentity`];
/// the remaining fields are display detail and may be filled in later
/// by enrichment without disturbing the identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxPayload {
    /// Decoded text, trimmed, exactly as it will be replayed on resubmit.
    pub raw: String,
    /// Parsed JSON object, when the text was one. Enrichment merges here.
    pub fields: Option<Map<String, Value>>,
    /// Transaction number, the primary identity component.
    pub transaction_no: Option<String>,
    /// SKU the box claims to contain.
    pub sku_id: Option<String>,
    /// Ordinal of this box within its transaction.
    pub box_number: Option<u32>,
    /// Batch / lot number, display only.
    pub batch_no: Option<String>,
    /// Net weight as printed on the label.
    pub net_weight: Option<String>,
    /// Gross weight as printed on the label.
    pub gross_weight: Option<String>,
}

impl BoxPayload {
    /// Interpret decoded text. Never fails: anything that is not a JSON
    /// object yields an opaque payload with all fields absent.
    pub fn parse(raw: &str, aliases: &FieldAliases) -> Self {
        let raw = raw.trim().to_string();
        let fields = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        };
        let mut payload = BoxPayload {
            raw,
            fields,
            transaction_no: None,
            sku_id: None,
            box_number: None,
            batch_no: None,
            net_weight: None,
            gross_weight: None,
        };
        payload.extract(aliases);
        payload
    }

    fn extract(&mut self, aliases: &FieldAliases) {
        let Some(map) = &self.fields else { return };
        self.transaction_no = first_scalar(map, &aliases.transaction_no);
        self.sku_id = first_scalar(map, &aliases.sku_id);
        // A box number that does not parse as an ordinal is dropped rather
        // than failing the whole payload.
        self.box_number =
            first_scalar(map, &aliases.box_number).and_then(|s| s.parse::<u32>().ok());
        self.batch_no = first_scalar(map, &aliases.batch_no);
        self.net_weight = first_scalar(map, &aliases.net_weight);
        self.gross_weight = first_scalar(map, &aliases.gross_weight);
    }

    /// Identity used for duplicate detection and line correlation.
    ///
    /// Structured only when a transaction number was recognized; identity
    /// fields are fixed at parse time and never change under enrichment.
    pub fn identity(&self) -> BoxIdentity {
        match &self.transaction_no {
            Some(tx) => BoxIdentity::Structured {
                transaction_no: tx.clone(),
                sku_id: self.sku_id.clone(),
                box_number: self.box_number,
            },
            None => BoxIdentity::opaque(&self.raw),
        }
    }

    /// Key handed to the enrichment lookup.
    pub fn enrichment_key(&self) -> &str {
        self.transaction_no.as_deref().unwrap_or(&self.raw)
    }

    /// True when the label carried no display detail, which is the cue to
    /// ask the enrichment source for the rest.
    pub fn is_terse(&self) -> bool {
        self.batch_no.is_none() && self.net_weight.is_none() && self.gross_weight.is_none()
    }

    /// Merge detail fetched from an external source.
    ///
    /// Values already present win; only display fields are re-extracted,
    /// so the identity computed at scan time stays valid.
    pub fn merge_detail(&mut self, detail: &Map<String, Value>, aliases: &FieldAliases) {
        let map = self.fields.get_or_insert_with(Map::new);
        for (key, value) in detail {
            map.entry(key.clone()).or_insert_with(|| value.clone());
        }
        if self.batch_no.is_none() {
            self.batch_no = first_scalar(map, &aliases.batch_no);
        }
        if self.net_weight.is_none() {
            self.net_weight = first_scalar(map, &aliases.net_weight);
        }
        if self.gross_weight.is_none() {
            self.gross_weight = first_scalar(map, &aliases.gross_weight);
        }
    }
}
