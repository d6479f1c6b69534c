//! Authoritative simulation core: entity registry, event-sourced world
//! state, snapshots, networking, interest management, admin, and chat.
//! The server binary wires this into a tick loop and a transport; nothing
//! in this crate touches a socket directly.

pub mod admin;
pub mod chat;
pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod interest;
pub mod net;
pub mod snapshot;
pub mod world;
