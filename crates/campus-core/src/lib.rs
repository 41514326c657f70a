//! Core types and trait definitions for the campus portal.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Persistence sits behind [`store::PortalStore`] and realtime delivery behind
//! [`notify::Broadcaster`]; the [`workflow::Workflow`] engine drives both.

pub mod club;
pub mod error;
pub mod lost_item;
pub mod moderation;
pub mod notify;
pub mod policy;
pub mod poll;
pub mod role;
pub mod store;
pub mod user;
pub mod workflow;

pub use error::{Error, Result};
pub use role::{Identity, Role};
pub use workflow::{ClaimWriteMode, Submitted, Workflow};

#[cfg(test)]
mod tests;
