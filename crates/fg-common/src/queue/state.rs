use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::fit::{FitRecord, extract_fit};
use crate::killmail::{Killmail, Valuation};

/// Per-killmail processing state. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    Unprocessed,
    Extracted,
    Valued,
}

impl ProcessingState {
    pub fn as_i16(self) -> i16 {
        match self {
            ProcessingState::Unprocessed => 0,
            ProcessingState::Extracted => 1,
            ProcessingState::Valued => 2,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(ProcessingState::Unprocessed),
            1 => Some(ProcessingState::Extracted),
            2 => Some(ProcessingState::Valued),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingState::Unprocessed => "unprocessed",
            ProcessingState::Extracted => "extracted",
            ProcessingState::Valued => "valued",
        }
    }
}

/// State of a `hash` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashState {
    Fetched,
}

impl HashState {
    pub fn as_i16(self) -> i16 {
        match self {
            HashState::Fetched => 1,
        }
    }
}

/// The two worker stages of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extraction,
    Valuation,
}

impl Stage {
    /// State a row must be in to be claimed by this stage.
    pub fn claims(self) -> ProcessingState {
        match self {
            Stage::Extraction => ProcessingState::Unprocessed,
            Stage::Valuation => ProcessingState::Extracted,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Extraction => "extraction",
            Stage::Valuation => "valuation",
        }
    }
}

/// Row handed to a stage after a successful claim.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedKillmail {
    pub id: i64,
    pub raw_killmail: Value,
    pub raw_valuation: Option<Value>,
    pub state: ProcessingState,
}

/// Everything a stage wants written, applied atomically with the claim.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub killmail_id: i64,
    /// Inserted with conflict-is-noop semantics.
    pub fit: Option<FitRecord>,
    /// Written to the existing fit only where its cost is still empty.
    pub cost: Option<i64>,
    pub next: ProcessingState,
}

/// A stored payload that no longer decodes. Never retried.
#[derive(Debug, Error)]
#[error("killmail {killmail_id}: stored {field} payload does not decode: {source}")]
pub struct CorruptPayload {
    pub killmail_id: i64,
    pub field: &'static str,
    #[source]
    pub source: serde_json::Error,
}

fn decode_valuation(claimed: &ClaimedKillmail) -> Result<Option<Valuation>, CorruptPayload> {
    match &claimed.raw_valuation {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => serde_json::from_value(raw.clone())
            .map(Some)
            .map_err(|source| CorruptPayload {
                killmail_id: claimed.id,
                field: "valuation",
                source,
            }),
    }
}

/// Decode the killmail, extract its fit and decide the next state. A fitted
/// value already present in the valuation lets the row skip straight to
/// [`ProcessingState::Valued`].
pub fn plan_extraction(
    claimed: &ClaimedKillmail,
    catalog: &Catalog,
) -> Result<Transition, CorruptPayload> {
    let killmail: Killmail =
        serde_json::from_value(claimed.raw_killmail.clone()).map_err(|source| CorruptPayload {
            killmail_id: claimed.id,
            field: "killmail",
            source,
        })?;
    let cost = decode_valuation(claimed)?.and_then(|valuation| valuation.cost());

    let mut fit = extract_fit(&killmail, catalog, cost);
    if let Some(fit) = fit.as_mut() {
        fit.killmail_id = claimed.id;
    }

    Ok(Transition {
        killmail_id: claimed.id,
        fit,
        cost: None,
        next: if cost.is_some() {
            ProcessingState::Valued
        } else {
            ProcessingState::Extracted
        },
    })
}

/// Decode the valuation and attach its cost to the existing fit, if any.
pub fn plan_valuation(claimed: &ClaimedKillmail) -> Result<Transition, CorruptPayload> {
    let cost = decode_valuation(claimed)?.and_then(|valuation| valuation.cost());

    Ok(Transition {
        killmail_id: claimed.id,
        fit: None,
        cost,
        next: ProcessingState::Valued,
    })
}

pub fn plan_transition(
    stage: Stage,
    claimed: &ClaimedKillmail,
    catalog: &Catalog,
) -> Result<Transition, CorruptPayload> {
    match stage {
        Stage::Extraction => plan_extraction(claimed, catalog),
        Stage::Valuation => plan_valuation(claimed),
    }
}
