//! Contract for the platform SCSI pass-through layer.
//!
//! The platform-specific driver (sg on Linux, `IOCTL_SCSI_PASS_THROUGH_DIRECT`
//! on Windows) lives outside this crate; it plugs in by implementing
//! [`ScsiPassThrough`] and [`ScsiHandle`].  The session holds a dedicated
//! mutex around every [`ScsiHandle::execute`] call, so implementations need
//! not be re-entrant on a single handle.

use std::time::Duration;

use snafu::Snafu;

/// Vendor identification string the session matches camera block devices by.
pub const PENTAX_VENDOR_ID: &str = "PENTAX";

/// One enumerated block device, as reported by the platform's device-property
/// query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Platform-specific device path (e.g. `/dev/sg3` or `\\.\E:`).
    pub path: String,
    /// SCSI vendor identification string.
    pub vendor_id: String,
    /// SCSI product identification string.
    pub product_id: String,
}

impl DeviceDescriptor {
    /// Whether this device identifies as a Pentax camera.
    pub fn is_pentax(&self) -> bool {
        self.vendor_id.trim().eq_ignore_ascii_case(PENTAX_VENDOR_ID)
    }
}

/// Data phase of a single SCSI transaction.
#[derive(Debug)]
pub enum DataTransfer<'a> {
    /// No data phase.
    None,
    /// Device-to-host transfer into the buffer.
    In(&'a mut [u8]),
    /// Host-to-device transfer from the buffer.
    Out(&'a [u8]),
}

/// An open pass-through handle to one block device.
pub trait ScsiHandle: Send {
    /// Executes a single Command Data Block with an optional data phase.
    ///
    /// Blocks until the device completes or the timeout expires, and returns
    /// the number of bytes actually transferred.  Not re-entrant: callers
    /// serialize access to one handle.
    fn execute(
        &mut self,
        cdb: &[u8],
        data: DataTransfer<'_>,
        timeout: Duration,
    ) -> Result<u32, TransportError>;
}

/// The platform's device enumeration and open entry points.
pub trait ScsiPassThrough: Send + Sync {
    /// Enumerates the block devices currently visible to the platform.
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, TransportError>;

    /// Opens a pass-through handle to the given device.
    fn open(&self, device: &DeviceDescriptor) -> Result<Box<dyn ScsiHandle>, TransportError>;
}

/// Error kinds the transport surfaces.
#[derive(Debug, Snafu)]
pub enum TransportError {
    /// The handle is invalid: the device was unplugged or never opened.
    #[snafu(display("device is gone"))]
    DeviceGone,

    /// The pass-through transaction itself failed.
    #[snafu(display("SCSI transaction failed: {message}"))]
    Scsi {
        /// Platform-specific failure description.
        message: String,
    },

    /// The device did not complete within the allotted time.
    #[snafu(display("SCSI transaction timed out after {timeout:?}"))]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The request was malformed (oversized CDB, zero-length transfer, …).
    #[snafu(display("invalid transfer parameters: {message}"))]
    Parameter {
        /// What was wrong with the request.
        message: String,
    },
}

impl TransportError {
    /// Whether this error invalidates the device handle.
    pub fn is_device_gone(&self) -> bool {
        matches!(self, Self::DeviceGone)
    }
}
