//! anthill-core: a persistent, real-time colony simulation core.
//!
//! The world advances one tick per second whether or not anyone watches.
//! `transition` is the pure state machine, `bus` carries its events to
//! extensions, `store` keeps the document on disk, `catch_up` bridges
//! downtime, and `engine` ties them into the live loop.

pub mod bus;
pub mod catch_up;
pub mod clock;
pub mod command;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod event;
pub mod exploration_extension;
pub mod extension;
pub mod graveyard_extension;
pub mod registry;
pub mod rng;
pub mod serde_unix_seconds;
pub mod snapshot;
pub mod store;
pub mod transition;
pub mod types;
pub mod world;
