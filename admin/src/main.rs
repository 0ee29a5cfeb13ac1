// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # EP Admin
//!
//! Entry point for the `ep-admin` binary. Parses CLI arguments, initializes
//! logging, opens the ship database and runs one command against it.
//!
//! Every allocation command goes through `TokenAllocator`; this file only
//! resolves ships, checks who is asking, and prints results.

mod cli;
mod logging;

use std::sync::Arc;

use anyhow::{bail, ensure, Context, Result};
use clap::Parser;

use ep_allocator::{
    CrewMember, EntityRecord, Permission, Ship, SledEntityStore, StaticConfig, TokenAllocator,
    User,
};

use cli::{Commands, EpAdminCli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = EpAdminCli::parse();
    logging::init_logging("ep_admin=info,ep_allocator=info", cli.log_format);

    std::fs::create_dir_all(&cli.data_dir).with_context(|| {
        format!("failed to create data directory: {}", cli.data_dir.display())
    })?;
    let store = SledEntityStore::open(&cli.data_dir)
        .with_context(|| format!("failed to open database at {}", cli.data_dir.display()))?;
    tracing::debug!(path = %cli.data_dir.display(), "database opened");

    let config = match &cli.settings {
        Some(path) => StaticConfig::from_json_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => StaticConfig::new(),
    };

    let shared = Arc::new(store.clone());
    let allocator = TokenAllocator::new(shared.clone(), shared, Arc::new(config));

    run(cli.command, &store, &allocator).await?;

    store.flush().context("failed to flush database")?;
    Ok(())
}

async fn run(command: Commands, store: &SledEntityStore, allocator: &TokenAllocator) -> Result<()> {
    match command {
        Commands::InitShip(args) => {
            let ship = Ship {
                id: args.id,
                name: args.name,
                max_energy_points: args.max,
            };
            store.put_ship(&ship)?;
            tracing::info!(ship = %ship.id, "ship registered");
            println!("registered ship {} ({})", ship.name, ship.id);
        }
        Commands::Enlist(args) => {
            let ship = load_ship(store, &args.ship)?;
            // Re-enlisting keeps the permissions already granted.
            let mut existing = store
                .get_entity(&args.crew)?
                .unwrap_or_else(|| EntityRecord::new(args.crew.clone(), args.name.clone()));
            existing.name = args.name.clone();
            let entity = args
                .owners
                .iter()
                .fold(existing, |entity, owner| {
                    entity.with_permission(owner.clone(), Permission::Owner)
                });
            store.put_entity(&entity)?;
            store.enlist(
                &ship.id,
                &CrewMember {
                    id: args.crew,
                    name: args.name,
                    position: args.position,
                },
            )?;
            println!("{} enlisted aboard {} as {}", entity.name, ship.name, args.position);
        }
        Commands::Discharge(args) => {
            let ship = load_ship(store, &args.ship)?;
            authorize(allocator, &ship, &args.actor.user()).await?;

            if !store.discharge(&ship.id, &args.crew)? {
                bail!("{} is not aboard {}", args.crew, ship.id);
            }
            let moved = allocator.reclaim_departed(&ship).await?;
            println!(
                "{} discharged from {}; returned {} tokens to the pool",
                args.crew, ship.name, moved
            );
        }
        Commands::Provision(args) => {
            let ship = load_ship(store, &args.ship)?;
            let user = args.actor.user();
            ensure!(
                user.is_admin(),
                "only administrators may provision tokens (user {} is {:?})",
                user.id,
                user.role
            );
            let created = allocator.create_tokens(&ship, args.count).await?;
            println!("minted {} dormant tokens on {}", created.len(), ship.name);
        }
        Commands::Activate(args) => {
            let ship = load_ship(store, &args.ship)?;
            authorize(allocator, &ship, &args.actor.user()).await?;

            let max = allocator.max_allowed_tokens(&ship);
            if args.count > i64::from(max) {
                tracing::warn!(
                    ship = %ship.id,
                    requested = args.count,
                    max,
                    "activating more tokens than the ship allows"
                );
            }
            allocator.set_active_count(&ship, args.count).await?;
            let pool = allocator.ship_token_count(&ship).await?;
            println!("{} now has {} active tokens in its pool", ship.name, pool);
        }
        Commands::Assign(args) => {
            let ship = load_ship(store, &args.ship)?;
            authorize(allocator, &ship, &args.actor.user()).await?;

            let granted = allocator
                .set_crew_token_count(&ship, &args.crew, args.count)
                .await?;
            if i64::try_from(granted).map_or(false, |granted| granted < args.count) {
                println!(
                    "{} asked for {} but the pool only had {}",
                    args.crew, args.count, granted
                );
            }
            println!("{} holds {} tokens on {}", args.crew, granted, ship.name);
        }
        Commands::Reclaim(args) => {
            let ship = load_ship(store, &args.ship)?;
            authorize(allocator, &ship, &args.actor.user()).await?;

            let moved = allocator.reclaim_departed(&ship).await?;
            println!("returned {} tokens to {}", moved, ship.name);
        }
        Commands::Status(args) => {
            let ship = load_ship(store, &args.ship)?;
            let summary = allocator.allocation_summary(&ship).await?;
            let max = allocator.max_allowed_tokens(&ship);

            if args.json {
                let report = serde_json::json!({
                    "ship": ship,
                    "maxAllowed": max,
                    "summary": summary,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{} ({})", ship.name, ship.id);
                println!(
                    "  tokens:    {} total, {} active, {} dormant",
                    summary.total, summary.active, summary.inactive
                );
                println!("  max:       {}", max);
                println!("  ship pool: {}", summary.ship_pool);
                for (holder, held) in &summary.crew {
                    println!("  {:<10} {}", format!("{holder}:"), held);
                }
            }
        }
    }
    Ok(())
}

fn load_ship(store: &SledEntityStore, id: &str) -> Result<Ship> {
    store
        .get_ship(id)?
        .with_context(|| format!("unknown ship: {id} (run init-ship first)"))
}

async fn authorize(allocator: &TokenAllocator, ship: &Ship, user: &User) -> Result<()> {
    if !allocator.can_modify_tokens(ship, user).await? {
        bail!(
            "user {} may not modify energy points on {}: requires an administrator or the owner of one of its engineers",
            user.id,
            ship.id
        );
    }
    Ok(())
}
