//! The decoded camera status snapshot and its wire layout.

use serde::{Deserialize, Serialize};
use snafu::{ensure, Snafu};

use crate::value::{
    AeMeteringMode, AfPointSelection, AutoFocusMode, ColorDynamicsMode, CustomEvSteps,
    CustomSensitivitySteps, ExposureMode, FlashMode, Rational, ReleaseMode, SRational, URational,
    WhiteBalanceMode,
};

/// Byte offsets of the big-endian status words.
///
/// This is the generation-III layout shared by the supported bodies.  The
/// offsets are vendor data: the decode below is driven entirely by this
/// table, so supporting a model with a shifted layout is a data change.
pub(crate) mod offset {
    pub(crate) const BUFFER_MASK: usize = 0x00;
    pub(crate) const EXPOSURE_MODE: usize = 0x04;
    pub(crate) const AE_METERING: usize = 0x08;
    pub(crate) const AF_MODE: usize = 0x0c;
    pub(crate) const AF_POINT_SELECTION: usize = 0x10;
    pub(crate) const SELECTED_AF_MASK: usize = 0x14;
    pub(crate) const FOCUSED_AF_MASK: usize = 0x18;
    pub(crate) const CURRENT_ISO: usize = 0x1c;
    pub(crate) const FIXED_ISO: usize = 0x20;
    pub(crate) const AUTO_ISO_MIN: usize = 0x24;
    pub(crate) const AUTO_ISO_MAX: usize = 0x28;
    pub(crate) const CURRENT_APERTURE_NOM: usize = 0x2c;
    pub(crate) const CURRENT_APERTURE_DEN: usize = 0x30;
    pub(crate) const LENS_MIN_APERTURE_NOM: usize = 0x34;
    pub(crate) const LENS_MIN_APERTURE_DEN: usize = 0x38;
    pub(crate) const LENS_MAX_APERTURE_NOM: usize = 0x3c;
    pub(crate) const LENS_MAX_APERTURE_DEN: usize = 0x40;
    pub(crate) const SHUTTER_NOM: usize = 0x44;
    pub(crate) const SHUTTER_DEN: usize = 0x48;
    pub(crate) const EC_NOM: usize = 0x4c;
    pub(crate) const EC_DEN: usize = 0x50;
    pub(crate) const FLASH_EC: usize = 0x54;
    pub(crate) const WHITE_BALANCE: usize = 0x58;
    pub(crate) const WB_ADJUST_MG: usize = 0x5c;
    pub(crate) const WB_ADJUST_BA: usize = 0x60;
    pub(crate) const FLASH_MODE: usize = 0x64;
    pub(crate) const ZOOM_NOM: usize = 0x68;
    pub(crate) const ZOOM_DEN: usize = 0x6c;
    pub(crate) const IMAGE_FORMAT: usize = 0x70;
    pub(crate) const JPEG_QUALITY: usize = 0x74;
    pub(crate) const JPEG_RESOLUTION: usize = 0x78;
    pub(crate) const JPEG_IMAGE_TONE: usize = 0x7c;
    pub(crate) const JPEG_SATURATION: usize = 0x80;
    pub(crate) const JPEG_HUE: usize = 0x84;
    pub(crate) const JPEG_CONTRAST: usize = 0x88;
    pub(crate) const JPEG_SHARPNESS: usize = 0x8c;
    pub(crate) const LENS_ID_1: usize = 0x90;
    pub(crate) const LENS_ID_2: usize = 0x94;
    pub(crate) const BATTERY_1: usize = 0x98;
    pub(crate) const BATTERY_2: usize = 0x9c;
    pub(crate) const BATTERY_3: usize = 0xa0;
    pub(crate) const BATTERY_4: usize = 0xa4;
    pub(crate) const SHAKE_REDUCTION: usize = 0xa8;
    pub(crate) const CUSTOM_EV_STEPS: usize = 0xac;
    pub(crate) const CUSTOM_SENSITIVITY_STEPS: usize = 0xb0;
    pub(crate) const RELEASE_MODE: usize = 0xb4;
}

/// Length of the status block the camera transfers.
pub const STATUS_BUFFER_LEN: usize = 0xb8;

/// An immutable, decoded camera state captured at a single refresh.
///
/// Mode fields decode unknown wire values to their `Invalid` variant, never
/// to a silent zero.  Raw fields (`wb_adjust_*`, `jpeg_*` tone words, the
/// masks and battery words) keep the wire representation; the session layer
/// applies the model-specific conversions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Bitmap of occupied in-camera image buffers.
    pub buffer_mask: u32,
    /// Exposure program.
    pub exposure_mode: ExposureMode,
    /// Metering pattern.
    pub ae_metering: AeMeteringMode,
    /// Autofocus drive mode.
    pub af_mode: AutoFocusMode,
    /// Autofocus point selection mode.
    pub af_point_selection: AfPointSelection,
    /// Wire bitmap of user-selected autofocus points.
    pub selected_af_mask: u32,
    /// Wire bitmap of points the last autofocus run used.
    pub focused_af_mask: u32,
    /// Sensitivity currently in effect.
    pub current_iso: u32,
    /// Configured fixed sensitivity; zero in auto.
    pub fixed_iso: u32,
    /// Lower bound of the auto sensitivity range.
    pub auto_iso_min: u32,
    /// Upper bound of the auto sensitivity range.
    pub auto_iso_max: u32,
    /// Aperture currently in effect.
    pub current_aperture: URational,
    /// Widest aperture of the mounted lens.
    pub lens_min_aperture: URational,
    /// Narrowest aperture of the mounted lens.
    pub lens_max_aperture: URational,
    /// Shutter time currently in effect, in seconds.
    pub current_shutter: URational,
    /// Exposure compensation.
    pub exposure_compensation: SRational,
    /// Flash exposure compensation in 1/256 EV units.
    pub flash_exposure_compensation: i32,
    /// White balance mode.
    pub white_balance: WhiteBalanceMode,
    /// Raw magenta/green white balance adjustment word.
    pub wb_adjust_mg: u32,
    /// Raw blue/amber white balance adjustment word.
    pub wb_adjust_ba: u32,
    /// Flash mode.
    pub flash_mode: FlashMode,
    /// Focal length of the mounted lens, in millimeters.
    pub zoom: URational,
    /// Raw image format word; doubles as the "camera current" wire buffer
    /// type during image retrieval.
    pub image_format: u32,
    /// JPEG quality as a star count.
    pub jpeg_quality: u32,
    /// Raw JPEG resolution class word.
    pub jpeg_resolution: u32,
    /// JPEG image tone.
    pub jpeg_image_tone: ColorDynamicsMode,
    /// Raw JPEG saturation word, centred at the model's property offset.
    pub jpeg_saturation: u32,
    /// Raw JPEG hue word, centred at the model's property offset.
    pub jpeg_hue: u32,
    /// Raw JPEG contrast word, centred at the model's property offset.
    pub jpeg_contrast: u32,
    /// Raw JPEG sharpness word, centred at the model's property offset.
    pub jpeg_sharpness: u32,
    /// Mounted lens identification pair.
    pub lens_id: (u32, u32),
    /// Raw battery cell words, in centivolts; zero marks an unpopulated
    /// cell.
    pub battery: [u32; 4],
    /// Whether shake reduction is engaged.
    pub shake_reduction: bool,
    /// Configured exposure step width.
    pub custom_ev_steps: CustomEvSteps,
    /// Configured sensitivity step behavior.
    pub custom_sensitivity_steps: CustomSensitivitySteps,
    /// Release / drive mode.
    pub release_mode: ReleaseMode,
}

/// Error type for when a status block cannot be decoded.
#[derive(Debug, Snafu)]
pub struct StatusError(InnerStatusError);

#[derive(Debug, Snafu)]
enum InnerStatusError {
    #[snafu(display(
        "status block of {actual} bytes is shorter than the {expected} byte layout"
    ))]
    Truncated { actual: usize, expected: usize },
}

fn word(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes(buf[offset..offset + 4].try_into().unwrap())
}

fn rational(buf: &[u8], nom_offset: usize, den_offset: usize) -> URational {
    Rational::new(word(buf, nom_offset), word(buf, den_offset))
}

/// Decodes a raw status block.
///
/// `af_point_count` selects the point-selection wire table of the connected
/// model (the capability catalogue knows it; the codec stays model-agnostic).
pub fn decode_status(buf: &[u8], af_point_count: u32) -> Result<StatusSnapshot, StatusError> {
    use offset::*;

    ensure!(
        buf.len() >= STATUS_BUFFER_LEN,
        TruncatedSnafu { actual: buf.len(), expected: STATUS_BUFFER_LEN }
    );

    Ok(StatusSnapshot {
        buffer_mask: word(buf, BUFFER_MASK),
        exposure_mode: ExposureMode::from_wire(word(buf, EXPOSURE_MODE)),
        ae_metering: AeMeteringMode::from_wire(word(buf, AE_METERING)),
        af_mode: AutoFocusMode::from_wire(word(buf, AF_MODE)),
        af_point_selection: AfPointSelection::from_wire(
            word(buf, AF_POINT_SELECTION),
            af_point_count,
        ),
        selected_af_mask: word(buf, SELECTED_AF_MASK),
        focused_af_mask: word(buf, FOCUSED_AF_MASK),
        current_iso: word(buf, CURRENT_ISO),
        fixed_iso: word(buf, FIXED_ISO),
        auto_iso_min: word(buf, AUTO_ISO_MIN),
        auto_iso_max: word(buf, AUTO_ISO_MAX),
        current_aperture: rational(buf, CURRENT_APERTURE_NOM, CURRENT_APERTURE_DEN),
        lens_min_aperture: rational(buf, LENS_MIN_APERTURE_NOM, LENS_MIN_APERTURE_DEN),
        lens_max_aperture: rational(buf, LENS_MAX_APERTURE_NOM, LENS_MAX_APERTURE_DEN),
        current_shutter: rational(buf, SHUTTER_NOM, SHUTTER_DEN),
        exposure_compensation: Rational::new(
            word(buf, EC_NOM) as i32,
            word(buf, EC_DEN) as i32,
        ),
        flash_exposure_compensation: word(buf, FLASH_EC) as i32,
        white_balance: WhiteBalanceMode::from_wire(word(buf, WHITE_BALANCE)),
        wb_adjust_mg: word(buf, WB_ADJUST_MG),
        wb_adjust_ba: word(buf, WB_ADJUST_BA),
        flash_mode: FlashMode::from_wire(word(buf, FLASH_MODE)),
        zoom: rational(buf, ZOOM_NOM, ZOOM_DEN),
        image_format: word(buf, IMAGE_FORMAT),
        jpeg_quality: word(buf, JPEG_QUALITY),
        jpeg_resolution: word(buf, JPEG_RESOLUTION),
        jpeg_image_tone: ColorDynamicsMode::from_wire(word(buf, JPEG_IMAGE_TONE)),
        jpeg_saturation: word(buf, JPEG_SATURATION),
        jpeg_hue: word(buf, JPEG_HUE),
        jpeg_contrast: word(buf, JPEG_CONTRAST),
        jpeg_sharpness: word(buf, JPEG_SHARPNESS),
        lens_id: (word(buf, LENS_ID_1), word(buf, LENS_ID_2)),
        battery: [
            word(buf, BATTERY_1),
            word(buf, BATTERY_2),
            word(buf, BATTERY_3),
            word(buf, BATTERY_4),
        ],
        shake_reduction: word(buf, SHAKE_REDUCTION) != 0,
        custom_ev_steps: CustomEvSteps::from_wire(word(buf, CUSTOM_EV_STEPS)),
        custom_sensitivity_steps: CustomSensitivitySteps::from_wire(
            word(buf, CUSTOM_SENSITIVITY_STEPS),
        ),
        release_mode: ReleaseMode::from_wire(word(buf, RELEASE_MODE)),
    })
}

#[cfg(test)]
mod tests;
