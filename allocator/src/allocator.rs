//! # Token Allocator
//!
//! The store-facing half of Energy Point management. Every operation follows
//! the same shape:
//!
//! ```text
//! list tokens ──► sort by id ──► plan (pure, allocation.rs) ──► one bulk write
//! ```
//!
//! One read, one write, no retries. There is no isolation between
//! operations: two allocations racing on the same ship are last-writer-wins,
//! so hosts that need strict ordering queue requests per ship.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::allocation::{self, AllocationSummary};
use crate::config::{
    positive_count, ConfigSource, DEFAULT_MAX_EP_SETTING, EP_TOKEN_RECORD_TYPE,
    FALLBACK_MAX_ENERGY_POINTS, SETTINGS_NAMESPACE,
};
use crate::crew::{CrewDirectory, User};
use crate::store::{EntityStore, RecordSpec, StoreError};
use crate::token::{Ship, Token};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during allocation.
#[derive(Debug, thiserror::Error)]
pub enum AllocatorError {
    /// The entity store rejected a read or write.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    /// A count argument was negative.
    #[error("invalid {field}: {value} (must be zero or greater)")]
    InvalidCount {
        /// Name of the offending argument.
        field: &'static str,
        value: i64,
    },

    /// A token record's payload could not be read.
    #[error("malformed token {id}: {reason}")]
    MalformedToken { id: String, reason: String },

    /// Tokens can only be granted to someone aboard the ship.
    #[error("{crew} is not aboard ship {ship}")]
    NotCrewMember { ship: String, crew: String },
}

pub type AllocatorResult<T> = Result<T, AllocatorError>;

/// Converts a signed count from the outside world into a usable one.
pub fn validate_count(field: &'static str, value: i64) -> AllocatorResult<usize> {
    usize::try_from(value).map_err(|_| AllocatorError::InvalidCount { field, value })
}

// ---------------------------------------------------------------------------
// TokenAllocator
// ---------------------------------------------------------------------------

/// Moves a ship's Energy Points between its pool and its crew.
#[derive(Clone)]
pub struct TokenAllocator {
    store: Arc<dyn EntityStore>,
    crew: Arc<dyn CrewDirectory>,
    config: Arc<dyn ConfigSource>,
}

impl TokenAllocator {
    pub fn new(
        store: Arc<dyn EntityStore>,
        crew: Arc<dyn CrewDirectory>,
        config: Arc<dyn ConfigSource>,
    ) -> Self {
        Self {
            store,
            crew,
            config,
        }
    }

    /// Every token on the ship, active or not, in allocation order.
    pub async fn tokens(&self, ship: &Ship) -> AllocatorResult<Vec<Token>> {
        let records = self
            .store
            .list_embedded_records_by_type(&ship.id, EP_TOKEN_RECORD_TYPE)
            .await?;

        let mut tokens = records
            .iter()
            .map(|record| {
                Token::from_record(record).map_err(|e| AllocatorError::MalformedToken {
                    id: record.id.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<AllocatorResult<Vec<_>>>()?;
        allocation::sort_tokens(&mut tokens);

        debug!(ship = %ship.id, tokens = tokens.len(), "loaded energy point tokens");
        Ok(tokens)
    }

    async fn write(&self, ship: &Ship, tokens: &[Token]) -> AllocatorResult<()> {
        if tokens.is_empty() {
            debug!(ship = %ship.id, "nothing to write");
            return Ok(());
        }
        let patches = tokens.iter().map(Token::to_patch).collect();
        self.store
            .update_embedded_records(&ship.id, patches)
            .await?;
        Ok(())
    }

    /// Mints `count` dormant tokens into the ship pool.
    ///
    /// Existing tokens are left alone. Returns the new tokens with their
    /// store-assigned ids.
    pub async fn create_tokens(&self, ship: &Ship, count: i64) -> AllocatorResult<Vec<Token>> {
        let count = validate_count("count", count)?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let specs: Vec<RecordSpec> = (0..count).map(|_| Token::blank_spec(&ship.id)).collect();
        let records = self
            .store
            .create_embedded_records(&ship.id, specs)
            .await?;

        let created = records
            .iter()
            .map(|record| {
                Token::from_record(record).map_err(|e| AllocatorError::MalformedToken {
                    id: record.id.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<AllocatorResult<Vec<_>>>()?;

        info!(ship = %ship.id, created = created.len(), "minted energy point tokens");
        Ok(created)
    }

    /// Resizes the active set.
    ///
    /// This is a full reset: every token returns to the ship pool and goes
    /// dormant, then the first `active_count` are reactivated. Crew members
    /// lose whatever they held. No tokens are minted, so asking for more than
    /// exist activates all of them.
    pub async fn set_active_count(&self, ship: &Ship, active_count: i64) -> AllocatorResult<()> {
        let active_count = validate_count("active_count", active_count)?;
        let tokens = self.tokens(ship).await?;

        if active_count > tokens.len() {
            warn!(
                ship = %ship.id,
                requested = active_count,
                available = tokens.len(),
                "not enough tokens to activate; activating all"
            );
        }

        let next = allocation::plan_activation(&tokens, &ship.id, active_count);
        self.write(ship, &next).await?;

        info!(
            ship = %ship.id,
            active = active_count.min(next.len()),
            total = next.len(),
            "reset energy point pool"
        );
        Ok(())
    }

    /// Active tokens sitting in the ship pool.
    pub async fn ship_token_count(&self, ship: &Ship) -> AllocatorResult<usize> {
        let tokens = self.tokens(ship).await?;
        Ok(allocation::count_held(&tokens, &ship.id))
    }

    /// Active tokens held by `crew_id`.
    pub async fn crew_token_count(&self, ship: &Ship, crew_id: &str) -> AllocatorResult<usize> {
        let tokens = self.tokens(ship).await?;
        Ok(allocation::count_held(&tokens, crew_id))
    }

    /// Sets how many active tokens `crew_id` holds.
    ///
    /// Whatever the crew member held is first returned to the pool, then up
    /// to `requested_count` pool tokens are handed over. A request the pool
    /// can't cover is clamped, not refused. Returns the number granted.
    ///
    /// # Errors
    ///
    /// Returns [`AllocatorError::NotCrewMember`] for a positive request on
    /// behalf of someone not aboard, and for any request naming the ship
    /// itself. Emptying a departed holder is allowed.
    pub async fn set_crew_token_count(
        &self,
        ship: &Ship,
        crew_id: &str,
        requested_count: i64,
    ) -> AllocatorResult<usize> {
        let requested = validate_count("requested_count", requested_count)?;
        if crew_id == ship.id {
            return Err(AllocatorError::NotCrewMember {
                ship: ship.id.clone(),
                crew: crew_id.to_string(),
            });
        }

        if requested > 0 {
            let crew = self.crew.crew_for_ship(&ship.id).await?;
            if !crew.iter().any(|m| m.id == crew_id) {
                return Err(AllocatorError::NotCrewMember {
                    ship: ship.id.clone(),
                    crew: crew_id.to_string(),
                });
            }
        }

        let tokens = self.tokens(ship).await?;
        let plan = allocation::plan_crew_allocation(&tokens, &ship.id, crew_id, requested);
        if plan.clamped() {
            warn!(
                ship = %ship.id,
                crew = crew_id,
                requested,
                granted = plan.granted,
                "ship pool too small, clamping crew allocation"
            );
        }
        self.write(ship, &plan.tokens).await?;

        info!(
            ship = %ship.id,
            crew = crew_id,
            reclaimed = plan.reclaimed,
            granted = plan.granted,
            "reassigned crew energy points"
        );
        Ok(plan.granted)
    }

    /// Whether any active token is held outside the ship pool.
    pub async fn crew_holds_any_tokens(&self, ship: &Ship) -> AllocatorResult<bool> {
        let tokens = self.tokens(ship).await?;
        Ok(allocation::crew_holds_any(&tokens, &ship.id))
    }

    /// The cap on active tokens for `ship`.
    ///
    /// A positive per-ship override wins. Otherwise the configured default
    /// applies, and [`FALLBACK_MAX_ENERGY_POINTS`] if that is unusable.
    pub fn max_allowed_tokens(&self, ship: &Ship) -> u32 {
        if let Some(max) = ship.max_energy_points.filter(|max| *max > 0) {
            return max;
        }

        match self
            .config
            .get_setting(SETTINGS_NAMESPACE, DEFAULT_MAX_EP_SETTING)
        {
            Some(value) => positive_count(&value).unwrap_or_else(|| {
                warn!(%value, "configured energy point maximum is not a positive integer");
                FALLBACK_MAX_ENERGY_POINTS
            }),
            None => {
                warn!(
                    setting = DEFAULT_MAX_EP_SETTING,
                    "energy point maximum not configured, using fallback"
                );
                FALLBACK_MAX_ENERGY_POINTS
            }
        }
    }

    /// Whether `user` may redistribute this ship's Energy Points.
    ///
    /// Administrators always may. Anyone else needs owner permission over at
    /// least one of the ship's engineers.
    pub async fn can_modify_tokens(&self, ship: &Ship, user: &User) -> AllocatorResult<bool> {
        if user.is_admin() {
            return Ok(true);
        }

        let crew = self.crew.crew_for_ship(&ship.id).await?;
        for engineer in crew.iter().filter(|m| m.position.is_engineer()) {
            let Some(entity) = self.crew.entity_by_id(&engineer.id).await? else {
                continue;
            };
            if entity.is_owned_by(&user.id) {
                debug!(ship = %ship.id, user = %user.id, engineer = %engineer.id, "user owns an engineer");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Holder accounting over a single read.
    pub async fn allocation_summary(&self, ship: &Ship) -> AllocatorResult<AllocationSummary> {
        let tokens = self.tokens(ship).await?;
        Ok(allocation::summarize(&tokens, &ship.id))
    }

    /// Returns tokens held by anyone no longer aboard to the ship pool.
    ///
    /// Returns how many moved. Nothing is written when nothing moves.
    pub async fn reclaim_departed(&self, ship: &Ship) -> AllocatorResult<usize> {
        let crew = self.crew.crew_for_ship(&ship.id).await?;
        let aboard: HashSet<&str> = crew.iter().map(|m| m.id.as_str()).collect();

        let tokens = self.tokens(ship).await?;
        let (next, moved) = allocation::plan_reclaim_departed(&tokens, &ship.id, &aboard);
        if moved > 0 {
            self.write(ship, &next).await?;
            info!(ship = %ship.id, moved, "reclaimed tokens from departed holders");
        }
        Ok(moved)
    }
}
