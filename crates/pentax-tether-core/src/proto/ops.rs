//! The vendor operation table: (group, code) pairs and related wire
//! constants, replicated byte-for-byte from the camera protocol.

/// Command groups.
pub mod group {
    /// Session and status operations.
    pub const SYSTEM: u8 = 0x00;
    /// DSP queries (firmware information).
    pub const DSP: u8 = 0x01;
    /// Image buffer lifecycle.
    pub const BUFFER: u8 = 0x02;
    /// Buffer segment queries.
    pub const SEGMENT: u8 = 0x04;
    /// Buffer block downloads.
    pub const DOWNLOAD: u8 = 0x06;
    /// Mechanical actions (focus, shutter, dust removal).
    pub const ACTION: u8 = 0x10;
    /// Parameter writes.
    pub const SETTING: u8 = 0x18;
}

/// Codes within [`group::SYSTEM`].
pub mod system {
    /// Enter (arg 1) or leave (arg 0) tethered-control mode.
    pub const SET_MODE: u8 = 0x00;
    /// Short status block used during the connect handshake.
    pub const SHORT_STATUS: u8 = 0x01;
    /// Model identification; yields two u32 words, the first is the model
    /// tag.
    pub const IDENTIFY: u8 = 0x04;
    /// Full status block.
    pub const FULL_STATUS: u8 = 0x08;
}

/// Codes within [`group::DSP`].
pub mod dsp {
    /// Firmware version string, up to 16 bytes, NUL padded.
    pub const INFO: u8 = 0x01;
}

/// Codes within [`group::BUFFER`], [`group::SEGMENT`] and
/// [`group::DOWNLOAD`].
pub mod buffer {
    /// Select a buffer for reading; args (index, buffer type, resolution, 0).
    pub const SELECT: u8 = 0x01;
    /// Close the currently selected buffer.
    pub const CLOSE: u8 = 0x03;
    /// Delete a buffer; arg (index).
    pub const DELETE: u8 = 0x04;
    /// Query the selected buffer's segment info; yields four u32 words
    /// (kind, address, length, next).
    pub const SEGMENT_INFO: u8 = 0x00;
    /// Download a block; args (address, length).
    pub const DOWNLOAD_BLOCK: u8 = 0x00;
}

/// Codes within [`group::ACTION`].
pub mod action {
    /// Shutter button; arg 1 is a half press (autofocus), arg 2 a full
    /// press (shutter release).
    pub const PRESS_SHUTTER: u8 = 0x05;
    /// Run the dust removal program; arg 1.
    pub const DUST_REMOVAL: u8 = 0x11;
}

/// Half-press argument for [`action::PRESS_SHUTTER`].
pub const PRESS_HALF: u32 = 1;
/// Full-press argument for [`action::PRESS_SHUTTER`].
pub const PRESS_FULL: u32 = 2;

/// Property-write codes within [`group::SETTING`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SettingOp {
    /// Auto-exposure metering pattern; arg (ordinal).
    AeMetering = 0x03,
    /// Flash mode; arg (ordinal).
    FlashMode = 0x04,
    /// Autofocus mode; arg (ordinal).
    AfMode = 0x05,
    /// Autofocus point selection mode; arg (wire value).
    AfPointSelection = 0x06,
    /// Selected autofocus points; arg (wire bitmap).
    AfPoints = 0x07,
    /// White balance mode; arg (ordinal).
    WhiteBalance = 0x10,
    /// White balance adjustment; args (mode, magenta/green raw, blue/amber
    /// raw).
    WhiteBalanceAdjust = 0x11,
    /// JPEG quality as a star count; arg (stars).
    JpegStars = 0x13,
    /// Sensitivity; args (fixed, auto min, auto max).
    Iso = 0x15,
    /// Shutter time; args (nominator, denominator).
    Shutter = 0x16,
    /// Aperture; args (nominator, denominator, 0).
    Aperture = 0x17,
    /// Exposure compensation; args (nominator, denominator).
    ExposureCompensation = 0x18,
    /// Flash exposure compensation; args (nominator, denominator).
    FlashExposureCompensation = 0x1a,
    /// JPEG image tone (color dynamics); arg (ordinal).
    JpegImageTone = 0x1b,
    /// Release / drive mode; arg (ordinal).
    ReleaseMode = 0x1c,
    /// JPEG saturation; arg (offset + value).
    JpegSaturation = 0x20,
    /// JPEG sharpness; arg (offset + value).
    JpegSharpness = 0x21,
    /// JPEG contrast; arg (offset + value).
    JpegContrast = 0x22,
    /// JPEG hue; arg (offset + value).
    JpegHue = 0x25,
}

impl SettingOp {
    /// The wire code byte of this property write.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Wire buffer-type identifiers for [`buffer::SELECT`].
pub mod buffer_type {
    /// Native Pentax raw.
    pub const PEF: u32 = 0;
    /// Adobe DNG raw.
    pub const DNG: u32 = 1;
    /// Best-quality JPEG; lower qualities follow at successive values (see
    /// the capability catalogue's resolver).
    pub const JPEG_BASE: u32 = 2;
    /// Camera-rendered preview image.
    pub const PREVIEW: u32 = 8;
    /// Camera-rendered thumbnail.
    pub const THUMBNAIL: u32 = 9;
}

/// Upper bound for a single buffer block download.
pub const DOWNLOAD_BLOCK_LIMIT: u32 = 64 * 1024;
