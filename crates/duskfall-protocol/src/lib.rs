//! Shared vocabulary for Duskfall.
//!
//! This crate defines the words every other layer speaks:
//!
//! - **Identity** ([`PlayerId`], [`GameId`]): who and where.
//! - **Roles** ([`Role`], [`Faction`], [`Totem`], [`Template`],
//!   [`DeathCause`], [`Winner`]): the game's fixed vocabulary.
//! - **Notices** ([`Notice`], [`Recipient`]): structured outbound messages
//!   handed to the chat bridge. Rendering them into text is the bridge's job.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how notices and snapshots
//!   are turned into bytes for the bridge.
//!
//! # Architecture
//!
//! ```text
//! Chat bridge (text) ← Protocol (Notice) ← Game engine (events, state)
//! ```
//!
//! The protocol layer knows nothing about phases, timers, or the event bus.

mod codec;
mod error;
mod notice;
mod role;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use notice::{DeathReport, Notice, ShotOutcome};
pub use role::{DeathCause, Faction, Role, Template, Totem, Winner};
pub use types::{GameId, PlayerId, Recipient};
