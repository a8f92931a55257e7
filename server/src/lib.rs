//! # Game Server Library
//!
//! The authoritative server for the multiplayer lost-and-found game: dog
//! avatars roam a network of axis-aligned roads, collect lost objects into
//! bounded bags, and return them to offices for score. The server hosts
//! many maps at once, advances each live session on fixed time ticks, and
//! snapshots its state so a restart resumes play.
//!
//! ## Module Organization
//!
//! - [`map`] — immutable map data: roads with walkable bounds, buildings,
//!   offices, loot configuration.
//! - [`dog`] — avatar state and movement constrained to the road network.
//! - [`game`] — per-map sessions (the tick pipeline: move, spawn, pick up,
//!   return, publish) and the map/session registry.
//! - [`players`] — player rosters and bearer-token issuance.
//! - [`app`] — the application facade: joins, move commands, authorized
//!   reads, typed request errors.
//! - [`config`] — the JSON map configuration loader.
//! - [`snapshot`] — durable state capture, restore, and autosave.
//! - [`network`] — the axum HTTP API and static file serving.
//!
//! ## Concurrency
//!
//! All mutable state lives in one `Arc<Mutex<ServerState>>`. HTTP handlers,
//! the ticker task, and shutdown each hold the lock for a whole operation,
//! so every request and every tick is atomic with respect to the model —
//! the async rendition of a single-threaded game loop.

pub mod app;
pub mod config;
pub mod dog;
pub mod game;
pub mod map;
pub mod network;
pub mod players;
pub mod snapshot;
