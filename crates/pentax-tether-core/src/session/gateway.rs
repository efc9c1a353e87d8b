//! The serialized command gateway.
//!
//! Every host↔camera exchange is one vendor transaction (arguments →
//! command → busy poll → optional result read) executed while holding the
//! transport mutex, so there is at most one outstanding SCSI transaction on
//! the device at any time.  The mutex is only ever held for the duration of
//! one transaction; settle waits (shutter, focus) happen in the session with
//! the mutex released.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use snafu::{ensure, Snafu};

use crate::proto::frame::{
    command_cdb, encode_args, write_args_cdb, Cdb, ReplyFrame, CDB_LEN, READ_RESULT_CDB,
    REPLY_STATUS_CDB,
};
use crate::proto::ops::{self, SettingOp};
use crate::proto::{decode_status, StatusError, StatusSnapshot, STATUS_BUFFER_LEN};
use crate::scsi::{DataTransfer, ScsiHandle, TransportError};

/// Per-transfer SCSI timeout, matching the vendor driver.
const SCSI_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay between busy-flag polls.
const BUSY_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Busy polls before the transaction is abandoned (~5 s).
const BUSY_POLL_LIMIT: u32 = 500;

/// Length of the short status block read during the connect handshake.
const SHORT_STATUS_LEN: usize = 28;

/// Errors surfaced by gateway transactions.
#[derive(Debug, Snafu)]
pub(crate) enum CommandError {
    /// No handle is installed, or the device went away mid-transaction.
    #[snafu(display("not connected"))]
    NotConnected,

    /// The transport layer failed.
    #[snafu(display("transport failure"))]
    Transport {
        /// The underlying transport error.
        source: TransportError,
    },

    /// The camera reported a non-zero result code.
    #[snafu(display("camera rejected the command with code {code:#04x}"))]
    Command {
        /// Vendor result code.
        code: u8,
    },

    /// The camera never cleared its busy flag.
    #[snafu(display("camera stayed busy for more than {limit} polls"))]
    Busy {
        /// Number of polls performed.
        limit: u32,
    },

    /// The result payload was shorter or longer than announced.
    #[snafu(display("result read returned {actual} bytes, expected {expected}"))]
    ShortRead {
        /// Bytes actually transferred.
        actual: u32,
        /// Bytes the reply frame announced.
        expected: u32,
    },

    /// A status block failed to decode.
    #[snafu(display("undecodable status block"))]
    Status {
        /// The decode failure.
        source: StatusError,
    },
}

impl CommandError {
    /// Whether this failure invalidates the device handle.
    pub(crate) fn is_device_gone(&self) -> bool {
        matches!(self, Self::NotConnected)
            || matches!(self, Self::Transport { source } if source.is_device_gone())
    }
}

/// Location and size of an opened buffer, as reported by the segment query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BufferInfo {
    /// Base address for block downloads.
    pub(crate) address: u32,
    /// Total payload size in bytes.
    pub(crate) total: u32,
}

/// The serialized host↔camera gateway.  Owns the transport mutex.
pub(crate) struct Gateway {
    handle: Mutex<Option<Box<dyn ScsiHandle>>>,
    connected: AtomicBool,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway").field("connected", &self.is_connected()).finish_non_exhaustive()
    }
}

impl Gateway {
    pub(crate) fn new() -> Self {
        Self { handle: Mutex::new(None), connected: AtomicBool::new(false) }
    }

    /// Installs a freshly opened device handle.
    pub(crate) fn install(&self, handle: Box<dyn ScsiHandle>) {
        *self.handle.lock().unwrap() = Some(handle);
        self.connected.store(true, Ordering::Release);
    }

    /// Drops the device handle, if any; returns whether one was present.
    pub(crate) fn clear(&self) -> bool {
        let had = self.handle.lock().unwrap().take().is_some();
        self.connected.store(false, Ordering::Release);
        had
    }

    /// Whether a device handle is installed.  Lock-free mirror so read paths
    /// need not touch the transport mutex.
    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Runs one full vendor transaction.  `read_len` caps the result read;
    /// `None` skips the data phase entirely.
    fn transact(
        &self,
        group: u8,
        code: u8,
        args: &[u32],
        read_len: Option<usize>,
    ) -> Result<Vec<u8>, CommandError> {
        let mut guard = self.handle.lock().unwrap();
        let result = Self::transact_locked(guard.as_deref_mut(), group, code, args, read_len);
        if let Err(e) = &result {
            if e.is_device_gone() {
                *guard = None;
                self.connected.store(false, Ordering::Release);
            }
        }
        result
    }

    fn transact_locked<'a>(
        handle: Option<&'a mut (dyn ScsiHandle + 'static)>,
        group: u8,
        code: u8,
        args: &[u32],
        read_len: Option<usize>,
    ) -> Result<Vec<u8>, CommandError> {
        let handle = handle.ok_or(CommandError::NotConnected)?;

        if !args.is_empty() {
            let payload = encode_args(args);
            execute(handle, &write_args_cdb(args.len()), DataTransfer::Out(&payload))?;
        }

        execute(handle, &command_cdb(group, code, (args.len() * 4) as u8), DataTransfer::None)?;

        let frame = wait_ready(handle)?;
        ensure!(frame.result == 0, CommandSnafu { code: frame.result });

        let Some(read_len) = read_len else {
            return Ok(Vec::new());
        };
        let expected = frame.length.min(read_len as u32);
        if expected == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; expected as usize];
        let transferred = execute(handle, &READ_RESULT_CDB, DataTransfer::In(&mut buf))?;
        ensure!(transferred == expected, ShortReadSnafu { actual: transferred, expected });
        Ok(buf)
    }

    // ----- vendor operations ------------------------------------------------

    /// Identify the connected body; returns the wire model tag.
    pub(crate) fn identify(&self) -> Result<u32, CommandError> {
        let raw = self.transact(ops::group::SYSTEM, ops::system::IDENTIFY, &[], Some(8))?;
        ensure!(raw.len() >= 4, ShortReadSnafu { actual: raw.len() as u32, expected: 8u32 });
        Ok(u32::from_be_bytes(raw[..4].try_into().unwrap()))
    }

    /// Enter or leave tethered-control mode.
    pub(crate) fn set_connect_mode(&self, enable: bool) -> Result<(), CommandError> {
        self.transact(ops::group::SYSTEM, ops::system::SET_MODE, &[u32::from(enable)], None)?;
        Ok(())
    }

    /// The short status block exchanged during the connect handshake.  Its
    /// contents are unused; a successful exchange proves the device speaks
    /// the protocol.
    pub(crate) fn short_status(&self) -> Result<Vec<u8>, CommandError> {
        self.transact(
            ops::group::SYSTEM,
            ops::system::SHORT_STATUS,
            &[],
            Some(SHORT_STATUS_LEN),
        )
    }

    /// Reads and decodes the full status block.
    pub(crate) fn full_status(&self, af_point_count: u32) -> Result<StatusSnapshot, CommandError> {
        let raw = self.transact(
            ops::group::SYSTEM,
            ops::system::FULL_STATUS,
            &[],
            Some(STATUS_BUFFER_LEN),
        )?;
        decode_status(&raw, af_point_count).map_err(|source| CommandError::Status { source })
    }

    /// Reads the DSP firmware string.
    pub(crate) fn firmware(&self) -> Result<String, CommandError> {
        let raw = self.transact(ops::group::DSP, ops::dsp::INFO, &[], Some(16))?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Writes one camera property.
    pub(crate) fn set_property(&self, op: SettingOp, args: &[u32]) -> Result<(), CommandError> {
        self.transact(ops::group::SETTING, op.code(), args, None)?;
        Ok(())
    }

    /// Half-presses the shutter button, driving an autofocus run.
    pub(crate) fn focus(&self) -> Result<(), CommandError> {
        self.transact(ops::group::ACTION, ops::action::PRESS_SHUTTER, &[ops::PRESS_HALF], None)?;
        Ok(())
    }

    /// Fully presses the shutter button.
    pub(crate) fn shutter(&self) -> Result<(), CommandError> {
        self.transact(ops::group::ACTION, ops::action::PRESS_SHUTTER, &[ops::PRESS_FULL], None)?;
        Ok(())
    }

    /// Runs the dust removal program.
    pub(crate) fn dust_removal(&self) -> Result<(), CommandError> {
        self.transact(ops::group::ACTION, ops::action::DUST_REMOVAL, &[1], None)?;
        Ok(())
    }

    /// Selects a buffer for reading and returns its download window.
    pub(crate) fn open_buffer(
        &self,
        index: u32,
        buffer_type: u32,
        resolution: u32,
    ) -> Result<BufferInfo, CommandError> {
        self.transact(
            ops::group::BUFFER,
            ops::buffer::SELECT,
            &[index, buffer_type, resolution, 0],
            None,
        )?;
        self.segment_info()
    }

    fn segment_info(&self) -> Result<BufferInfo, CommandError> {
        let raw =
            self.transact(ops::group::SEGMENT, ops::buffer::SEGMENT_INFO, &[], Some(16))?;
        ensure!(raw.len() >= 16, ShortReadSnafu { actual: raw.len() as u32, expected: 16u32 });
        Ok(BufferInfo {
            address: u32::from_be_bytes(raw[4..8].try_into().unwrap()),
            total: u32::from_be_bytes(raw[8..12].try_into().unwrap()),
        })
    }

    /// Downloads one block of the selected buffer.  Image drains chunk at
    /// the 64 KiB ceiling; the camera-decoded preview transfers whole.
    pub(crate) fn read_buffer_block(
        &self,
        address: u32,
        length: u32,
    ) -> Result<Vec<u8>, CommandError> {
        self.transact(
            ops::group::DOWNLOAD,
            ops::buffer::DOWNLOAD_BLOCK,
            &[address, length],
            Some(length as usize),
        )
    }

    /// Closes the selected buffer.
    pub(crate) fn close_buffer(&self) -> Result<(), CommandError> {
        self.transact(ops::group::BUFFER, ops::buffer::CLOSE, &[0], None)?;
        Ok(())
    }

    /// Deletes a buffer, freeing the in-camera slot.
    pub(crate) fn delete_buffer(&self, index: u32) -> Result<(), CommandError> {
        self.transact(ops::group::BUFFER, ops::buffer::DELETE, &[index], None)?;
        Ok(())
    }
}

fn execute(
    handle: &mut dyn ScsiHandle,
    cdb: &Cdb,
    data: DataTransfer<'_>,
) -> Result<u32, CommandError> {
    handle
        .execute(&cdb.0, data, SCSI_TIMEOUT)
        .map_err(|source| CommandError::Transport { source })
}

/// Polls the reply frame until the camera clears its busy flag.  The 10 ms
/// poll sleeps are part of the transaction and happen with the transport
/// mutex held; they are bounded by [`BUSY_POLL_LIMIT`].
fn wait_ready(handle: &mut dyn ScsiHandle) -> Result<ReplyFrame, CommandError> {
    for _ in 0..BUSY_POLL_LIMIT {
        let mut raw = [0u8; CDB_LEN];
        execute(handle, &REPLY_STATUS_CDB, DataTransfer::In(&mut raw))?;
        let frame = ReplyFrame::parse(&raw);
        if !frame.busy {
            return Ok(frame);
        }
        thread::sleep(BUSY_POLL_INTERVAL);
    }
    Err(CommandError::Busy { limit: BUSY_POLL_LIMIT })
}
