//! # Allocation Planning
//!
//! Pure functions from the current token states and a request to the next
//! token states. No store, no async, no clocks: every transition the
//! allocator performs is computed here and can be tested on plain vectors.
//!
//! All planners preserve the token id set of their input (nothing is minted
//! or dropped) and only ever touch `active` and `holder`. Dormant tokens are
//! invisible to holder accounting.
//!
//! Ordering matters: activation and grants take tokens from the front of the
//! slice. Callers sort with [`sort_tokens`] first so that the choice is
//! deterministic rather than whatever order the store happened to return.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::token::{EntityId, Token};

/// Puts tokens in the canonical allocation order (ascending id).
pub fn sort_tokens(tokens: &mut [Token]) {
    tokens.sort_by(|a, b| a.id.cmp(&b.id));
}

/// Full reset: every token back to the ship and dormant, then the first
/// `active_count` reactivated.
///
/// Returns the next state of *every* token. Asking for more than exist
/// simply activates all of them.
pub fn plan_activation(tokens: &[Token], ship_id: &str, active_count: usize) -> Vec<Token> {
    tokens
        .iter()
        .enumerate()
        .map(|(position, token)| Token {
            id: token.id.clone(),
            active: position < active_count,
            holder: ship_id.to_string(),
        })
        .collect()
}

/// Outcome of a crew allocation plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrewAllocation {
    /// Next state of every active token.
    pub tokens: Vec<Token>,
    /// Tokens taken back from the crew member before granting.
    pub reclaimed: usize,
    /// Tokens the crew member holds afterwards.
    pub granted: usize,
    pub requested: usize,
}

impl CrewAllocation {
    /// Whether the ship pool could not cover the request.
    pub fn clamped(&self) -> bool {
        self.granted < self.requested
    }
}

/// Reclaim-then-allocate.
///
/// 1. Every active token held by `crew_id` goes back to the ship.
/// 2. `min(requested, ship pool)` of the ship-held tokens, front first, go
///    to `crew_id`.
///
/// Tokens held by other crew members are never touched.
pub fn plan_crew_allocation(
    tokens: &[Token],
    ship_id: &str,
    crew_id: &str,
    requested: usize,
) -> CrewAllocation {
    let mut next: Vec<Token> = tokens.iter().filter(|t| t.active).cloned().collect();

    let mut reclaimed = 0;
    for token in next.iter_mut().filter(|t| t.holder == crew_id) {
        token.holder = ship_id.to_string();
        reclaimed += 1;
    }

    let available = count_held(&next, ship_id);
    let granted = requested.min(available);
    for token in next
        .iter_mut()
        .filter(|t| t.holder == ship_id)
        .take(granted)
    {
        token.holder = crew_id.to_string();
    }

    CrewAllocation {
        tokens: next,
        reclaimed,
        granted,
        requested,
    }
}

/// Returns to the ship every active token whose holder is neither the ship
/// nor one of `crew`.
///
/// Yields the next state of every active token and how many moved.
pub fn plan_reclaim_departed(
    tokens: &[Token],
    ship_id: &str,
    crew: &HashSet<&str>,
) -> (Vec<Token>, usize) {
    let mut next: Vec<Token> = tokens.iter().filter(|t| t.active).cloned().collect();
    let mut moved = 0;
    for token in next
        .iter_mut()
        .filter(|t| t.holder != ship_id && !crew.contains(t.holder.as_str()))
    {
        token.holder = ship_id.to_string();
        moved += 1;
    }
    (next, moved)
}

/// Active tokens held by `holder`.
pub fn count_held(tokens: &[Token], holder: &str) -> usize {
    tokens.iter().filter(|t| t.is_held_by(holder)).count()
}

/// Whether any active token sits outside the ship pool.
pub fn crew_holds_any(tokens: &[Token], ship_id: &str) -> bool {
    tokens.iter().any(|t| t.active && t.holder != ship_id)
}

/// Holder accounting for one ship.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSummary {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    /// Active tokens in the ship pool.
    pub ship_pool: usize,
    /// Active tokens per non-ship holder.
    pub crew: BTreeMap<EntityId, usize>,
}

pub fn summarize(tokens: &[Token], ship_id: &str) -> AllocationSummary {
    let mut summary = AllocationSummary {
        total: tokens.len(),
        ..Default::default()
    };
    for token in tokens {
        if !token.active {
            summary.inactive += 1;
            continue;
        }
        summary.active += 1;
        if token.holder == ship_id {
            summary.ship_pool += 1;
        } else {
            *summary.crew.entry(token.holder.clone()).or_default() += 1;
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHIP: &str = "ship-1";

    fn token(id: &str, active: bool, holder: &str) -> Token {
        Token {
            id: id.into(),
            active,
            holder: holder.into(),
        }
    }

    fn ids(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn sort_orders_by_id() {
        let mut tokens = vec![token("c", false, SHIP), token("a", false, SHIP), token("b", false, SHIP)];
        sort_tokens(&mut tokens);
        assert_eq!(ids(&tokens), vec!["a", "b", "c"]);
    }

    #[test]
    fn activation_resets_crew_holders() {
        let tokens = vec![
            token("a", true, "crew-1"),
            token("b", true, SHIP),
            token("c", false, SHIP),
            token("d", true, "crew-2"),
        ];
        let next = plan_activation(&tokens, SHIP, 2);

        assert_eq!(ids(&next), ids(&tokens));
        assert!(next.iter().all(|t| t.holder == SHIP));
        assert_eq!(next.iter().filter(|t| t.active).count(), 2);
        assert!(next[0].active && next[1].active);
        assert!(!crew_holds_any(&next, SHIP));
    }

    #[test]
    fn activation_beyond_existing_activates_all() {
        let tokens = vec![token("a", false, SHIP), token("b", false, SHIP)];
        let next = plan_activation(&tokens, SHIP, 10);
        assert_eq!(next.len(), 2);
        assert!(next.iter().all(|t| t.active));
    }

    #[test]
    fn activation_to_zero_deactivates_everything() {
        let tokens = vec![token("a", true, "crew-1"), token("b", true, SHIP)];
        let next = plan_activation(&tokens, SHIP, 0);
        assert!(next.iter().all(|t| !t.active && t.holder == SHIP));
    }

    #[test]
    fn crew_allocation_grants_from_front_of_pool() {
        let tokens = vec![
            token("a", true, SHIP),
            token("b", true, SHIP),
            token("c", true, SHIP),
            token("d", false, SHIP),
        ];
        let plan = plan_crew_allocation(&tokens, SHIP, "crew-1", 2);

        assert_eq!(plan.granted, 2);
        assert_eq!(plan.reclaimed, 0);
        assert!(!plan.clamped());
        // Only active tokens are part of the plan.
        assert_eq!(ids(&plan.tokens), vec!["a", "b", "c"]);
        assert_eq!(plan.tokens[0].holder, "crew-1");
        assert_eq!(plan.tokens[1].holder, "crew-1");
        assert_eq!(plan.tokens[2].holder, SHIP);
    }

    #[test]
    fn crew_allocation_reclaims_before_granting() {
        let tokens = vec![
            token("a", true, "crew-1"),
            token("b", true, "crew-1"),
            token("c", true, "crew-1"),
            token("d", true, SHIP),
        ];
        let plan = plan_crew_allocation(&tokens, SHIP, "crew-1", 1);

        assert_eq!(plan.reclaimed, 3);
        assert_eq!(plan.granted, 1);
        assert_eq!(count_held(&plan.tokens, "crew-1"), 1);
        assert_eq!(count_held(&plan.tokens, SHIP), 3);
    }

    #[test]
    fn crew_allocation_clamps_to_pool() {
        let tokens = vec![
            token("a", true, "crew-1"),
            token("b", true, "crew-1"),
            token("c", true, SHIP),
            token("d", false, SHIP),
        ];
        let plan = plan_crew_allocation(&tokens, SHIP, "crew-2", 5);

        assert_eq!(plan.granted, 1);
        assert!(plan.clamped());
        assert_eq!(count_held(&plan.tokens, "crew-2"), 1);
        // Other crew members keep what they had.
        assert_eq!(count_held(&plan.tokens, "crew-1"), 2);
    }

    #[test]
    fn crew_allocation_of_zero_empties_holder() {
        let tokens = vec![token("a", true, "crew-1"), token("b", true, "crew-2")];
        let plan = plan_crew_allocation(&tokens, SHIP, "crew-1", 0);

        assert_eq!(plan.granted, 0);
        assert_eq!(count_held(&plan.tokens, "crew-1"), 0);
        assert_eq!(count_held(&plan.tokens, "crew-2"), 1);
        assert_eq!(count_held(&plan.tokens, SHIP), 1);

        let again = plan_crew_allocation(&plan.tokens, SHIP, "crew-1", 0);
        assert_eq!(again.tokens, plan.tokens);
        assert_eq!(again.reclaimed, 0);
    }

    #[test]
    fn reclaim_departed_only_moves_strangers() {
        let tokens = vec![
            token("a", true, "crew-1"),
            token("b", true, "gone"),
            token("c", true, SHIP),
            token("d", false, "gone"),
        ];
        let crew: HashSet<&str> = ["crew-1"].into_iter().collect();
        let (next, moved) = plan_reclaim_departed(&tokens, SHIP, &crew);

        assert_eq!(moved, 1);
        assert_eq!(ids(&next), vec!["a", "b", "c"]);
        assert_eq!(next[0].holder, "crew-1");
        assert_eq!(next[1].holder, SHIP);
    }

    #[test]
    fn dormant_tokens_are_never_counted() {
        let tokens = vec![token("a", false, "crew-1"), token("b", false, SHIP)];
        assert_eq!(count_held(&tokens, "crew-1"), 0);
        assert_eq!(count_held(&tokens, SHIP), 0);
        assert!(!crew_holds_any(&tokens, SHIP));
    }

    #[test]
    fn summary_accounts_for_every_token() {
        let tokens = vec![
            token("a", true, "crew-1"),
            token("b", true, "crew-1"),
            token("c", true, SHIP),
            token("d", false, "crew-2"),
            token("e", true, "crew-3"),
        ];
        let summary = summarize(&tokens, SHIP);

        assert_eq!(summary.total, 5);
        assert_eq!(summary.active, 4);
        assert_eq!(summary.inactive, 1);
        assert_eq!(summary.ship_pool, 1);
        assert_eq!(summary.crew.get("crew-1"), Some(&2));
        assert_eq!(summary.crew.get("crew-2"), None);
        assert_eq!(summary.crew.get("crew-3"), Some(&1));
    }
}
