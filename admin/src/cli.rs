//! # CLI Interface
//!
//! Defines the command-line argument structure for `ep-admin` using `clap`
//! derive. Ship and crew bookkeeping (`init-ship`, `enlist`, `discharge`)
//! sits next to the allocation commands (`provision`, `activate`, `assign`,
//! `reclaim`) and the read-only `status`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use ep_allocator::{CrewPosition, User, UserRole};

use crate::logging::LogFormat;

/// Ship Energy Point administration.
///
/// Keeps ships, crews and Energy Point tokens in a local database and moves
/// tokens between each ship's pool and its crew.
#[derive(Parser, Debug)]
#[command(
    name = "ep-admin",
    about = "Ship Energy Point administration",
    version,
    propagate_version = true
)]
pub struct EpAdminCli {
    /// Directory holding the ship database. Created on first use.
    #[arg(long, short = 'd', env = "EP_DATA_DIR", default_value = "./ep-data", global = true)]
    pub data_dir: PathBuf,

    /// JSON settings file, e.g. `{ "starship": { "defaultMaxEnergyPoints": 6 } }`.
    #[arg(long, env = "EP_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    /// Log output format: pretty or json.
    #[arg(long, env = "EP_LOG_FORMAT", default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a ship (or update its name and cap).
    InitShip(InitShipArgs),
    /// Put a crew member aboard a ship.
    Enlist(EnlistArgs),
    /// Remove a crew member from a ship and return their tokens to its pool.
    Discharge(DischargeArgs),
    /// Mint dormant tokens into a ship's pool. Administrators only.
    Provision(CountArgs),
    /// Reset the pool and set how many tokens are active.
    Activate(CountArgs),
    /// Set how many active tokens a crew member holds.
    Assign(AssignArgs),
    /// Return tokens held by departed crew to the ship pool.
    Reclaim(ReclaimArgs),
    /// Show a ship's token accounting.
    Status(StatusArgs),
}

/// The user a mutating command acts for.
#[derive(Args, Debug, Clone)]
pub struct ActorArgs {
    /// Acting user id.
    #[arg(long = "user", env = "EP_USER")]
    pub user_id: String,

    /// Acting user's role: player, trusted, assistant or gamemaster.
    #[arg(long, env = "EP_ROLE", default_value = "player")]
    pub role: UserRole,
}

impl ActorArgs {
    pub fn user(&self) -> User {
        User::new(self.user_id.clone(), self.role)
    }
}

/// Arguments for `init-ship`.
#[derive(Args, Debug)]
pub struct InitShipArgs {
    #[arg(long)]
    pub id: String,

    #[arg(long)]
    pub name: String,

    /// Per-ship cap on active tokens. Omit (or 0) to use the configured default.
    #[arg(long)]
    pub max: Option<u32>,
}

/// Arguments for `enlist`.
#[derive(Args, Debug)]
pub struct EnlistArgs {
    #[arg(long)]
    pub ship: String,

    /// Crew member entity id.
    #[arg(long)]
    pub crew: String,

    #[arg(long)]
    pub name: String,

    /// captain, pilot, engineer, gunner or crew.
    #[arg(long, default_value = "crew")]
    pub position: CrewPosition,

    /// Users owning this crew member. Repeatable.
    #[arg(long = "owner")]
    pub owners: Vec<String>,
}

/// Arguments for `discharge`.
#[derive(Args, Debug)]
pub struct DischargeArgs {
    #[arg(long)]
    pub ship: String,

    #[arg(long)]
    pub crew: String,

    #[command(flatten)]
    pub actor: ActorArgs,
}

/// Arguments for commands taking a single token count.
#[derive(Args, Debug)]
pub struct CountArgs {
    #[arg(long)]
    pub ship: String,

    #[arg(long, allow_negative_numbers = true)]
    pub count: i64,

    #[command(flatten)]
    pub actor: ActorArgs,
}

/// Arguments for `assign`.
#[derive(Args, Debug)]
pub struct AssignArgs {
    #[arg(long)]
    pub ship: String,

    #[arg(long)]
    pub crew: String,

    #[arg(long, allow_negative_numbers = true)]
    pub count: i64,

    #[command(flatten)]
    pub actor: ActorArgs,
}

/// Arguments for `reclaim`.
#[derive(Args, Debug)]
pub struct ReclaimArgs {
    #[arg(long)]
    pub ship: String,

    #[command(flatten)]
    pub actor: ActorArgs,
}

/// Arguments for `status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[arg(long)]
    pub ship: String,

    /// Print machine-readable JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}
