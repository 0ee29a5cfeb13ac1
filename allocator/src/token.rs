//! # Energy Point Tokens
//!
//! A ship's Energy Points are individual token records embedded in the ship
//! entity. Each token is either *active* (counted toward capacity) or
//! dormant, and each active token has exactly one *holder*: the ship itself
//! (the ship pool) or one crew member.
//!
//! On the store side a token is an [`EmbeddedRecord`] of type
//! [`EP_TOKEN_RECORD_TYPE`] whose `system` payload is
//! `{ "active": bool, "holder": "<entity id>" }`.

use serde::{Deserialize, Serialize};

use crate::config::{EP_TOKEN_RECORD_NAME, EP_TOKEN_RECORD_TYPE};
use crate::store::{EmbeddedRecord, RecordId, RecordPatch, RecordSpec};

/// Identifier of a ship, crew member or any other entity.
pub type EntityId = String;

/// Identifier of an Energy Point token (its embedded record id).
pub type TokenId = RecordId;

// ---------------------------------------------------------------------------
// Ship
// ---------------------------------------------------------------------------

/// The vehicle owning an Energy Point pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ship {
    /// Entity id. Also the holder value meaning "in the ship pool".
    pub id: EntityId,
    pub name: String,
    /// Per-ship cap on active tokens. `None` or zero defers to configuration.
    #[serde(default)]
    pub max_energy_points: Option<u32>,
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// One Energy Point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub active: bool,
    pub holder: EntityId,
}

/// The `system` payload of a token record.
#[derive(Debug, Deserialize)]
struct TokenSystem {
    active: bool,
    holder: EntityId,
}

impl Token {
    /// The creation request for a dormant token sitting in `ship_id`'s pool.
    pub fn blank_spec(ship_id: &str) -> RecordSpec {
        RecordSpec {
            name: EP_TOKEN_RECORD_NAME.to_string(),
            record_type: EP_TOKEN_RECORD_TYPE.to_string(),
            system: serde_json::json!({ "active": false, "holder": ship_id }),
        }
    }

    /// Reads a token out of its store record.
    pub fn from_record(record: &EmbeddedRecord) -> Result<Self, serde_json::Error> {
        let system: TokenSystem = serde_json::from_value(record.system.clone())?;
        Ok(Self {
            id: record.id.clone(),
            active: system.active,
            holder: system.holder,
        })
    }

    /// The patch writing this token's state back to the store.
    pub fn to_patch(&self) -> RecordPatch {
        RecordPatch {
            id: self.id.clone(),
            system: serde_json::json!({ "active": self.active, "holder": self.holder }),
        }
    }

    /// Active and held by `holder`. Dormant tokens are held by no one.
    pub fn is_held_by(&self, holder: &str) -> bool {
        self.active && self.holder == holder
    }
}
