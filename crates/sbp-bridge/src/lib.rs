//! Multi-remote bridge.
//!
//! A bridge board listens to several remotes on the radio, relays the
//! readings of one "active" remote to the host, and lets the user cycle the
//! active remote. The [`RemoteRoster`] does the bookkeeping and the
//! [`BridgeRelay`] wraps it for concurrent use by the radio receive path and
//! the main loop.

mod relay;
mod roster;

pub use relay::*;
pub use roster::*;
