//! Radio packet protocol for the sensor bridge.
//!
//! Remotes broadcast accelerometer and button readings; the bridge sends
//! commands back. Every packet uses the same 28-byte little-endian envelope
//! (see [`codec`] for the layout), and each device listens on a channel
//! derived from its identity with [`frequency_from_id`].

pub mod codec;
mod error;
mod link;
mod packet;

pub use codec::{decode_packet, encode_packet};
pub use error::*;
pub use link::*;
pub use packet::*;
