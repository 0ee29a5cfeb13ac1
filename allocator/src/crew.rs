//! # Crew, Users & Permissions
//!
//! Who is aboard a ship, what station they man, and who is allowed to act
//! on their behalf. The allocator never edits any of this; it reads it
//! through the [`CrewDirectory`] seam to validate holders and to decide
//! whether a user may redistribute a ship's Energy Points.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::ENGINEER_POSITION;
use crate::store::StoreResult;
use crate::token::EntityId;

/// Identifier of a user (a person at the table, not an in-world entity).
pub type UserId = String;

// ---------------------------------------------------------------------------
// Crew
// ---------------------------------------------------------------------------

/// The station a crew member occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrewPosition {
    Captain,
    Pilot,
    Engineer,
    Gunner,
    Crew,
}

impl CrewPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrewPosition::Captain => "captain",
            CrewPosition::Pilot => "pilot",
            CrewPosition::Engineer => "engineer",
            CrewPosition::Gunner => "gunner",
            CrewPosition::Crew => "crew",
        }
    }

    /// Engineers' owners may redistribute the ship's Energy Points.
    pub fn is_engineer(&self) -> bool {
        self.as_str() == ENGINEER_POSITION
    }
}

impl fmt::Display for CrewPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrewPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "captain" => Ok(CrewPosition::Captain),
            "pilot" => Ok(CrewPosition::Pilot),
            "engineer" => Ok(CrewPosition::Engineer),
            "gunner" => Ok(CrewPosition::Gunner),
            "crew" => Ok(CrewPosition::Crew),
            other => Err(format!("unknown crew position: {other}")),
        }
    }
}

/// Summary of one crew member aboard a ship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewMember {
    /// Entity id, usable as a token holder.
    pub id: EntityId,
    pub name: String,
    pub position: CrewPosition,
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// Ownership level a user holds over an entity. Ordered from least to most.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    None,
    Limited,
    Observer,
    Owner,
}

/// The permission-bearing entity behind a crew member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub permissions: HashMap<UserId, Permission>,
}

impl EntityRecord {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            permissions: HashMap::new(),
        }
    }

    /// Builder-style permission grant.
    pub fn with_permission(mut self, user: impl Into<UserId>, level: Permission) -> Self {
        self.permissions.insert(user.into(), level);
        self
    }

    /// The level `user` holds here; [`Permission::None`] when unlisted.
    pub fn permission_for(&self, user: &str) -> Permission {
        self.permissions.get(user).copied().unwrap_or_default()
    }

    pub fn is_owned_by(&self, user: &str) -> bool {
        self.permission_for(user) >= Permission::Owner
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// A user's role at the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Player,
    Trusted,
    Assistant,
    GameMaster,
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "player" => Ok(UserRole::Player),
            "trusted" => Ok(UserRole::Trusted),
            "assistant" => Ok(UserRole::Assistant),
            "gamemaster" | "gm" => Ok(UserRole::GameMaster),
            other => Err(format!("unknown user role: {other}")),
        }
    }
}

/// The user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub role: UserRole,
}

impl User {
    pub fn new(id: impl Into<UserId>, role: UserRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// Assistants and game masters hold administrative privilege.
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Assistant | UserRole::GameMaster)
    }
}

// ---------------------------------------------------------------------------
// CrewDirectory
// ---------------------------------------------------------------------------

/// Read-only access to ship crews and the entities behind them.
#[async_trait]
pub trait CrewDirectory: Send + Sync {
    /// Everyone currently aboard `ship_id`. Unknown ships have no crew.
    async fn crew_for_ship(&self, ship_id: &str) -> StoreResult<Vec<CrewMember>>;

    /// The entity with permission metadata for `id`, if it exists.
    async fn entity_by_id(&self, id: &str) -> StoreResult<Option<EntityRecord>>;
}

/// In-memory crew roster and entity table.
#[derive(Debug, Default)]
pub struct InMemoryCrewDirectory {
    crews: RwLock<HashMap<EntityId, Vec<CrewMember>>>,
    entities: RwLock<HashMap<EntityId, EntityRecord>>,
}

impl InMemoryCrewDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts `member` aboard `ship_id`, replacing any earlier entry for them.
    pub fn enlist(&self, ship_id: &str, member: CrewMember) {
        let mut crews = self.crews.write();
        let crew = crews.entry(ship_id.to_string()).or_default();
        crew.retain(|m| m.id != member.id);
        crew.push(member);
    }

    /// Removes `crew_id` from `ship_id`. Returns whether they were aboard.
    pub fn discharge(&self, ship_id: &str, crew_id: &str) -> bool {
        let mut crews = self.crews.write();
        let Some(crew) = crews.get_mut(ship_id) else {
            return false;
        };
        let before = crew.len();
        crew.retain(|m| m.id != crew_id);
        crew.len() != before
    }

    pub fn insert_entity(&self, entity: EntityRecord) {
        self.entities.write().insert(entity.id.clone(), entity);
    }
}

#[async_trait]
impl CrewDirectory for InMemoryCrewDirectory {
    async fn crew_for_ship(&self, ship_id: &str) -> StoreResult<Vec<CrewMember>> {
        Ok(self.crews.read().get(ship_id).cloned().unwrap_or_default())
    }

    async fn entity_by_id(&self, id: &str) -> StoreResult<Option<EntityRecord>> {
        Ok(self.entities.read().get(id).cloned())
    }
}
