// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # EP Allocator — Ship Energy Point Allocation
//!
//! A ship owns a fixed set of Energy Point tokens. Some are active, most of
//! the time some sit in the ship pool, and the rest are handed out to the
//! crew. This crate moves them around without ever creating, losing or
//! duplicating one.
//!
//! ## Architecture
//!
//! - **token** — Token and ship types, record (de)serialization.
//! - **allocation** — Pure planners: reset/activate, reclaim/grant, summaries.
//! - **allocator** — `TokenAllocator`: load, plan, write back in one call.
//! - **store** — The `EntityStore` seam plus in-memory and sled backends.
//! - **crew** — Crew positions, users, permissions, the `CrewDirectory` seam.
//! - **config** — Setting keys, constants, the `ConfigSource` seam.
//!
//! ## Invariants
//!
//! 1. Allocation never changes the set of token ids; only `active` and
//!    `holder` move.
//! 2. A holder is the ship or someone aboard it.
//! 3. Resizing the active set returns everything to the ship first.
//! 4. Dormant tokens are held by no one.

pub mod allocation;
pub mod allocator;
pub mod config;
pub mod crew;
pub mod store;
pub mod token;

pub use allocation::{AllocationSummary, CrewAllocation};
pub use allocator::{validate_count, AllocatorError, AllocatorResult, TokenAllocator};
pub use config::{ConfigSource, StaticConfig};
pub use crew::{
    CrewDirectory, CrewMember, CrewPosition, EntityRecord, InMemoryCrewDirectory, Permission,
    User, UserRole,
};
pub use store::{EntityStore, InMemoryEntityStore, SledEntityStore, StoreError};
pub use token::{EntityId, Ship, Token, TokenId};
