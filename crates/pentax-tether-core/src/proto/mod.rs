//! The vendor command codec.
//!
//! Everything in this module is a stateless, pure translation between logical
//! camera operations and the byte patterns of the vendor's SCSI transaction
//! grammar.  A transaction is a fixed little dance driven by the session's
//! command gateway:
//!
//! 1. optionally write up to four big-endian argument words
//!    ([`frame::write_args_cdb`]),
//! 2. issue the operation itself ([`frame::command_cdb`] with a
//!    (group, code) pair from [`ops`]),
//! 3. poll the 8-byte reply frame ([`frame::REPLY_STATUS_CDB`] /
//!    [`frame::ReplyFrame`]) until the camera clears its busy flag,
//! 4. optionally read the result payload ([`frame::READ_RESULT_CDB`]).
//!
//! The byte patterns replicate the vendor protocol exactly; the tables are
//! data, not behavior.

pub use status::*;

pub mod frame;
pub mod ops;
pub(crate) mod status;
