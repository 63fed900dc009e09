//! Serial Bridge Protocol
//!
//! This crate implements the textual protocol spoken between a sensor board
//! and its host over a serial link. It is pure: no I/O, no clocks, no hidden
//! state. The session state is an explicit [`ProtocolState`] and every side
//! effect goes through injected [`CommandHooks`].
//!
//! # Protocol Overview
//!
//! Every message is a single line terminated by `\n`:
//!
//! - **Commands** (host → device): `C[<id>]<TYPE>[<value>]`
//! - **Responses** (device → host): `R[<id>]<TYPE>[<value>]` or `R[<id>]ERROR[<code>]`
//! - **Periodic** (device → host): `P[<hex id>]AX[..]AY[..]...` or the compact `P<hex>...`
//!
//! The `<id>` is 1 to 8 hex digits chosen by the host and echoed verbatim.
//!
//! # Example
//!
//! ```rust
//! use sbp_protocol::{process_line, NoopHooks, ProtocolState};
//!
//! let mut state = ProtocolState::new(0x1234);
//! let response = process_line(&mut state, &mut NoopHooks, b"C[A1B2C3D4]HS[]").unwrap();
//! assert_eq!(response.encode().unwrap(), b"R[A1B2C3D4]HS[1]\n");
//! ```

mod codec;
mod commands;
mod dispatch;
mod error;
mod responses;
mod state;
mod telemetry;

pub use codec::*;
pub use commands::*;
pub use dispatch::*;
pub use error::*;
pub use responses::*;
pub use state::*;
pub use telemetry::*;
