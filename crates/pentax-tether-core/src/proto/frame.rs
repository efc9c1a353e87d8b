//! CDB construction and the reply frame of the vendor transaction grammar.

use arbitrary_int::{u1, u7};
use bitbybit::bitfield;
use derive_more::{Deref, From};

/// Every vendor CDB is exactly eight bytes; the pass-through layer accepts up
/// to sixteen.
pub const CDB_LEN: usize = 8;

/// The camera never transfers more than four argument words per operation.
pub const MAX_ARG_WORDS: usize = 4;

/// A fully-formed vendor Command Data Block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deref, From)]
pub struct Cdb(pub [u8; CDB_LEN]);

/// Builds the CDB issuing a vendor operation.  `arg_bytes` is the number of
/// argument bytes previously supplied via [`write_args_cdb`] (four per word).
pub fn command_cdb(group: u8, code: u8, arg_bytes: u8) -> Cdb {
    Cdb([0xf0, 0x24, group, code, arg_bytes, 0x00, 0x00, 0x00])
}

/// Builds the CDB announcing an argument-word write of `words` u32 values.
pub fn write_args_cdb(words: usize) -> Cdb {
    debug_assert!(words <= MAX_ARG_WORDS);
    Cdb([0xf0, 0x4f, 0x00, 0x00, (words * 4) as u8, 0x00, 0x00, 0x00])
}

/// Encodes argument words into the payload accompanying [`write_args_cdb`].
/// Words travel big-endian.
pub fn encode_args(args: &[u32]) -> Vec<u8> {
    debug_assert!(args.len() <= MAX_ARG_WORDS);
    args.iter().flat_map(|word| word.to_be_bytes()).collect()
}

/// CDB polling the camera's 8-byte reply frame.
pub const REPLY_STATUS_CDB: Cdb = Cdb([0xf0, 0x26, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

/// CDB reading the pending result payload announced by the reply frame.
pub const READ_RESULT_CDB: Cdb = Cdb([0xf0, 0x49, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00]);

#[bitfield(u64)]
struct RawReplyFrame {
    // bytes 0-3: pending result length, little-endian on the wire
    #[bits(0..=31, rw)]
    length: u32,
    // bytes 4-5: reserved
    #[bits(32..=47, rw)]
    reserved: u16,
    // byte 6: result code, zero on success
    #[bits(48..=55, rw)]
    result: u8,
    // byte 7: busy flag in bit 0
    #[bit(56, rw)]
    busy: u1,
    #[bits(57..=63, rw)]
    reserved2: u7,
}

/// The camera's decoded 8-byte reply frame.
///
/// The camera keeps the busy bit raised while it processes the preceding
/// operation; once it drops, `result` reports the outcome and `length` the
/// number of result bytes ready for [`READ_RESULT_CDB`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyFrame {
    /// Number of pending result bytes.
    pub length: u32,
    /// Vendor result code; zero means success.
    pub result: u8,
    /// Whether the camera is still processing the operation.
    pub busy: bool,
}

impl ReplyFrame {
    /// Decodes the raw frame bytes.
    pub fn parse(raw: &[u8; CDB_LEN]) -> Self {
        let frame = RawReplyFrame::new_with_raw_value(u64::from_le_bytes(*raw));
        Self {
            length: frame.length(),
            result: frame.result(),
            busy: frame.busy() == u1::new(1),
        }
    }

    /// Whether the operation completed successfully.
    pub fn is_ok(&self) -> bool {
        !self.busy && self.result == 0
    }

    /// Encodes the frame back to wire bytes (used by test fakes).
    pub fn to_raw(&self) -> [u8; CDB_LEN] {
        RawReplyFrame::builder()
            .with_length(self.length)
            .with_reserved(0)
            .with_result(self.result)
            .with_busy(u1::new(u8::from(self.busy)))
            .with_reserved2(u7::new(0))
            .build()
            .raw_value()
            .to_le_bytes()
    }
}

#[cfg(test)]
mod tests;
