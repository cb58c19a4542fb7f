//! Message vocabulary for the SSAP gateway.
//!
//! This crate holds the types shared between the gateway runtime and the
//! external SSAP codec: the shapes of parsed messages, the per-operation
//! request parameters, and the [`Codec`] seam that turns them into bytes and
//! back. Nothing here touches a socket or inspects raw bytes.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No behavior beyond small accessors and serde derives
//! - **Codec-agnostic**: The wire encoding lives behind [`Codec`]
//! - **Stable**: Changes only when the SSAP transaction set changes

pub mod codec;
pub mod message;
pub mod operation;

pub use codec::*;
pub use message::*;
pub use operation::*;
