//! Session-level tether control of Pentax DSLR cameras over USB.
//!
//! The cameras expose their remote-control protocol as vendor commands
//! layered on SCSI pass-through against the camera's mass-storage interface.
//! This crate implements the host side of that protocol: a [`session::PentaxTether`]
//! drives one camera through a platform-provided [`scsi::ScsiPassThrough`]
//! implementation, keeps a cached status snapshot fresh with a background
//! poller, validates writes against the connected model's capability record
//! and fans status changes out to per-topic observers.
//!
//! The platform pass-through driver and any user interface live outside this
//! crate; see the [`scsi`] module for the contract they plug into.

pub use session::{Options, OptionsError, PentaxTether, INVALID_BUFFER_INDEX};

pub mod capability;
pub mod proto;
pub mod scsi;
pub mod session;
pub mod value;

#[cfg(test)]
pub(crate) mod testutil;
