//! ADB-over-TCP client used to talk to Fire TV devices.
//!
//! Implements the subset of the Android Debug Bridge transport the runtime
//! needs: the CNXN/AUTH handshake with RSA key material and the `shell:`
//! service for running one-shot commands.

#![warn(missing_docs, clippy::pedantic)]

mod auth;
mod device;
mod error;
mod wire;

pub use auth::AdbKey;
pub use device::{ConnectTimeouts, DeviceConnection};
pub use error::{AdbError, AdbResult};
pub use wire::{auth_type, Command, Packet, MAX_PAYLOAD, VERSION};
