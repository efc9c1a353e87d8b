//! The session controller: the public operation surface of the crate.
//!
//! A [`PentaxTether`] owns the device handle, the status cache, the connected
//! model's capability record and the observer registry.  All public
//! operations are synchronous and infallible by signature: failures collapse
//! into `false`, the zero value or an empty collection, and the reason (no-op
//! write, invalid argument, I/O failure) is deliberately not distinguishable,
//! matching the vendor's own write semantics.  Disconnection is additionally
//! announced through the connection observers, exactly once per transition.
//!
//! Three locks with a fixed discipline serialize the session: the transport
//! mutex (one SCSI transaction at a time), the cache mutex (freshness check
//! and refresh are atomic; acquires the transport mutex internally, never the
//! reverse) and the registry mutex (held per-topic during fan-out).  Settle
//! waits after focus and shutter happen with no lock held.
//!
//! Observer callbacks run on whichever thread triggered the refresh — the
//! caller's or the poller's.  They must not synchronously re-enter write
//! operations or the registry (register/unregister) on the delivering
//! thread.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use garde::Validate;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use tracing::{debug, info, warn};

use crate::capability::{
    wb_adjust_from_wire, wb_adjust_to_wire, CameraModel, Catalogue, WB_ADJUST_OFFSET,
};
use crate::proto::ops::{buffer_type, SettingOp, DOWNLOAD_BLOCK_LIMIT};
use crate::proto::StatusSnapshot;
use crate::scsi::ScsiPassThrough;
use crate::value::{
    AeMeteringMode, AfPointSelection, AutoFocusMode, ColorDynamicsMode, ExposureMode, FlashMode,
    ImageFormat, ImageResolution, IsoSettings, JpegQuality, Rational, ReleaseMode, SRational,
    URational, WhiteBalanceMode,
};

use self::cache::StatusCache;
use self::gateway::{CommandError, Gateway};
use self::observers::ObserverRegistry;
use self::poller::Poller;

mod cache;
mod gateway;
mod observers;
mod poller;
mod steps;


/// Sentinel buffer index returned when a shot produced no retrievable
/// buffer.
pub const INVALID_BUFFER_INDEX: i32 = -1;

/// Interval between connect attempts.
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Fixed settle tail after a shutter release, on top of the exposure time.
const SHUTTER_SETTLE_TAIL: Duration = Duration::from_millis(500);

/// Settle wait when the pre-shot shutter time is unknown: a tenth of the
/// longest timed exposure (30 s) plus the fixed tail.
const SHUTTER_SETTLE_UNKNOWN: Duration = Duration::from_millis(3500);

/// Settle wait after triggering an autofocus run.
const FOCUS_SETTLE: Duration = Duration::from_millis(300);

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Whether a lost device schedules an automatic reconnect.
    #[garde(skip)]
    pub auto_reconnect: bool,
    /// How long an automatic reconnect keeps retrying, in seconds.
    #[garde(range(min = 1))]
    pub reconnect_timeout_seconds: u64,
    /// Maximum age of a cached status snapshot before reads refresh it, in
    /// seconds.  Also the poll cadence.
    #[garde(custom(check_max_age))]
    pub status_max_age_seconds: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_timeout_seconds: 60,
            status_max_age_seconds: 0.5,
        }
    }
}

fn check_max_age(value: &f64, _ctx: &()) -> garde::Result {
    if value.is_finite() && *value > 0.0 {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "status max age of {value} seconds must be a positive, finite duration"
        )))
    }
}

/// Error type for rejected session configuration.
#[derive(Debug, Snafu)]
#[snafu(display("session options failed validation"))]
pub struct OptionsError {
    source: garde::Report,
}

/// A tether session to one Pentax camera.
///
/// Dropping the session disconnects and joins the worker threads it owns.
pub struct PentaxTether {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for PentaxTether {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PentaxTether")
            .field("connected", &self.inner.is_connected())
            .finish_non_exhaustive()
    }
}

struct SessionInner {
    options: Options,
    provider: Box<dyn ScsiPassThrough>,
    catalogue: Catalogue,
    gateway: Gateway,
    cache: StatusCache,
    observers: ObserverRegistry,
    poller: Arc<Poller>,
    model: Mutex<Option<CameraModel>>,
    firmware: Mutex<String>,
    /// Whether observers currently believe the session is connected; the
    /// swap on this flag is what makes the one-notification-per-transition
    /// guarantee hold.
    announced: AtomicBool,
    cancel: Mutex<Option<Arc<AtomicBool>>>,
    shutting_down: AtomicBool,
    reconnect_active: AtomicBool,
    reconnect_thread: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for SessionInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionInner")
            .field("options", &self.options)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Snafu)]
enum ConnectError {
    #[snafu(display("device enumeration failed"))]
    Enumerate { source: crate::scsi::TransportError },

    #[snafu(display("no Pentax device present"))]
    NoCamera,

    #[snafu(display("device open failed"))]
    Open { source: crate::scsi::TransportError },

    #[snafu(display("connect handshake failed"))]
    Handshake { source: CommandError },

    #[snafu(display("camera reports unknown model tag {id:#x}"))]
    UnknownModel { id: u32 },
}

impl PentaxTether {
    /// Creates a session over the given pass-through layer with the built-in
    /// capability table.
    pub fn new(
        provider: Box<dyn ScsiPassThrough>,
        options: Options,
    ) -> Result<Self, OptionsError> {
        Self::with_catalogue(provider, options, Catalogue::builtin())
    }

    /// Creates a session with an externally loaded capability table.
    pub fn with_catalogue(
        provider: Box<dyn ScsiPassThrough>,
        options: Options,
        catalogue: Catalogue,
    ) -> Result<Self, OptionsError> {
        options.validate().context(OptionsSnafu)?;
        let cache = StatusCache::new(Duration::from_secs_f64(options.status_max_age_seconds));
        Ok(Self {
            inner: Arc::new(SessionInner {
                options,
                provider,
                catalogue,
                gateway: Gateway::new(),
                cache,
                observers: ObserverRegistry::default(),
                poller: Arc::new(Poller::default()),
                model: Mutex::new(None),
                firmware: Mutex::new(String::new()),
                announced: AtomicBool::new(false),
                cancel: Mutex::new(None),
                shutting_down: AtomicBool::new(false),
                reconnect_active: AtomicBool::new(false),
                reconnect_thread: Mutex::new(None),
            }),
        })
    }

    // ----- connection -------------------------------------------------------

    /// Connects to the first Pentax device the platform reports, retrying
    /// once per second until `timeout` elapses.  Returns whether the session
    /// reached the connected state.
    pub fn connect(&self, timeout: Duration) -> bool {
        self.connect_cancellable(timeout, None)
    }

    /// Like [`Self::connect`], with an external cancellation flag that is
    /// checked on every retry.  The flag is kept for the lifetime of the
    /// session and also cancels automatic reconnects.
    pub fn connect_cancellable(
        &self,
        timeout: Duration,
        cancel: Option<Arc<AtomicBool>>,
    ) -> bool {
        *self.inner.cancel.lock().unwrap() = cancel.clone();
        // A connect on a live session starts over.
        self.disconnect();
        self.inner.connect_and_start(timeout, cancel)
    }

    /// Disconnects, notifying connection observers exactly once if the
    /// session was connected.
    pub fn disconnect(&self) {
        self.inner.disconnect();
        self.inner.poller.stop_and_join();
    }

    /// Whether a device handle is currently installed.
    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    // ----- identification ---------------------------------------------------

    /// The connected model's name, or empty when disconnected.
    pub fn camera_name(&self) -> String {
        self.inner.model.lock().unwrap().as_ref().map(|m| m.name.clone()).unwrap_or_default()
    }

    /// The camera's DSP firmware version, or empty when disconnected.
    pub fn firmware(&self) -> String {
        self.inner.firmware.lock().unwrap().clone()
    }

    /// The mounted lens's identification pair, formatted, or empty when
    /// unavailable.
    pub fn lens_type(&self, force_refresh: bool) -> String {
        self.status(force_refresh)
            .map(|s| format!("{:#x}.{:#x}", s.lens_id.0, s.lens_id.1))
            .unwrap_or_default()
    }

    // ----- sensitivity ------------------------------------------------------

    /// Sensitivity currently in effect, or 0 when unavailable.
    pub fn iso(&self, force_refresh: bool) -> u32 {
        self.status(force_refresh).map_or(0, |s| s.current_iso)
    }

    /// The fixed/auto sensitivity configuration.
    pub fn iso_settings(&self, force_refresh: bool) -> IsoSettings {
        self.status(force_refresh).map_or_else(IsoSettings::default, |s| IsoSettings {
            fixed: s.fixed_iso,
            auto_min: s.auto_iso_min,
            auto_max: s.auto_iso_max,
        })
    }

    /// Sensitivity values the camera currently accepts.
    pub fn iso_steps(&self, force_refresh: bool) -> Vec<u32> {
        match (self.status(force_refresh), self.inner.model_record()) {
            (Some(status), Some(model)) => steps::iso_steps(&status, &model),
            _ => Vec::new(),
        }
    }

    /// Fixes the sensitivity to `iso`.
    pub fn set_fixed_iso(&self, iso: u32) -> bool {
        let Some(status) = self.status(true) else { return false };
        if status.fixed_iso == iso {
            return false;
        }
        let Some(model) = self.inner.model_record() else { return false };
        if !steps::iso_steps(&status, &model).contains(&iso) {
            return false;
        }
        self.inner.set_property(SettingOp::Iso, &[iso, 0, 0])
    }

    /// Lets the camera pick the sensitivity within `[min, max]`.
    pub fn set_auto_iso_range(&self, min: u32, max: u32) -> bool {
        let Some(status) = self.status(true) else { return false };
        if status.auto_iso_min == min && status.auto_iso_max == max {
            return false;
        }
        if min > max {
            return false;
        }
        let Some(model) = self.inner.model_record() else { return false };
        let steps = steps::iso_steps(&status, &model);
        if !steps.contains(&min) || !steps.contains(&max) {
            return false;
        }
        self.inner.set_property(SettingOp::Iso, &[0, min, max])
    }

    // ----- aperture ---------------------------------------------------------

    /// Aperture currently in effect, or the invalid rational.
    pub fn aperture(&self, force_refresh: bool) -> URational {
        self.status(force_refresh).map_or_else(Rational::invalid, |s| s.current_aperture)
    }

    /// Aperture values within the mounted lens's range.
    pub fn aperture_steps(&self, force_refresh: bool) -> Vec<URational> {
        self.status(force_refresh).map_or_else(Vec::new, |s| steps::aperture_steps(&s))
    }

    /// Sets the aperture.
    pub fn set_aperture(&self, aperture: URational) -> bool {
        let Some(status) = self.status(true) else { return false };
        if status.current_aperture == aperture {
            return false;
        }
        if !steps::aperture_steps(&status).contains(&aperture) {
            return false;
        }
        self.inner.set_property(SettingOp::Aperture, &[aperture.nom, aperture.den, 0])
    }

    // ----- shutter time -----------------------------------------------------

    /// Shutter time currently in effect, or the invalid rational.
    pub fn shutter_time(&self, force_refresh: bool) -> URational {
        self.status(force_refresh).map_or_else(Rational::invalid, |s| s.current_shutter)
    }

    /// Shutter times the camera accepts, longest first.
    pub fn shutter_time_steps(&self) -> Vec<URational> {
        steps::shutter_time_steps()
    }

    /// Sets the shutter time.
    pub fn set_shutter_time(&self, shutter: URational) -> bool {
        let Some(status) = self.status(true) else { return false };
        if status.current_shutter == shutter {
            return false;
        }
        if !steps::shutter_time_steps().contains(&shutter) {
            return false;
        }
        self.inner.set_property(SettingOp::Shutter, &[shutter.nom, shutter.den])
    }

    // ----- exposure compensation -------------------------------------------

    /// Exposure compensation currently in effect, or the invalid rational.
    pub fn exposure_compensation(&self, force_refresh: bool) -> SRational {
        self.status(force_refresh).map_or_else(Rational::invalid, |s| s.exposure_compensation)
    }

    /// Exposure compensation values for the camera's configured step width.
    pub fn exposure_compensation_steps(&self, force_refresh: bool) -> Vec<SRational> {
        self.status(force_refresh)
            .map_or_else(Vec::new, |s| steps::exposure_compensation_steps(s.custom_ev_steps))
    }

    /// Sets the exposure compensation.
    pub fn set_exposure_compensation(&self, compensation: SRational) -> bool {
        let Some(status) = self.status(true) else { return false };
        if status.exposure_compensation == compensation {
            return false;
        }
        if !steps::exposure_compensation_steps(status.custom_ev_steps).contains(&compensation) {
            return false;
        }
        self.inner.set_property(
            SettingOp::ExposureCompensation,
            &[compensation.nom as u32, compensation.den as u32],
        )
    }

    // ----- exposure mode and derived values ---------------------------------

    /// The exposure program, or `Invalid` when unavailable.  Selected on the
    /// mode dial; not settable over tether.
    pub fn exposure_mode(&self, force_refresh: bool) -> ExposureMode {
        self.status(force_refresh).map_or(ExposureMode::Invalid, |s| s.exposure_mode)
    }

    /// Battery cell voltages, unpopulated cells skipped.
    pub fn battery_voltage(&self, force_refresh: bool) -> Vec<f32> {
        self.status(force_refresh)
            .map_or_else(Vec::new, |s| crate::value::battery_voltages(&s.battery))
    }

    /// Focal length of the mounted lens, or the invalid rational.
    pub fn focal_length(&self, force_refresh: bool) -> URational {
        self.status(force_refresh).map_or_else(Rational::invalid, |s| s.zoom)
    }

    /// The exposure value `log2(aperture² / shutter_seconds)`, or 0 when
    /// unavailable.
    pub fn exposure_value(&self, force_refresh: bool) -> f64 {
        self.status(force_refresh)
            .map_or(0.0, |s| crate::value::exposure_value(&s.current_aperture, &s.current_shutter))
    }

    // ----- autofocus --------------------------------------------------------

    /// The autofocus drive mode, or `Invalid` when unavailable.
    pub fn auto_focus_mode(&self, force_refresh: bool) -> AutoFocusMode {
        self.status(force_refresh).map_or(AutoFocusMode::Invalid, |s| s.af_mode)
    }

    /// Sets the autofocus drive mode.
    pub fn set_auto_focus_mode(&self, mode: AutoFocusMode) -> bool {
        let Some(status) = self.status(true) else { return false };
        if status.af_mode == mode {
            return false;
        }
        let Some(wire) = mode.to_wire() else { return false };
        self.inner.set_property(SettingOp::AfMode, &[wire])
    }

    /// Number of autofocus points of the connected model, or 0.
    pub fn number_of_auto_focus_points(&self) -> u32 {
        self.inner.model_record().map_or(0, |m| m.af_point_count)
    }

    /// The point selection mode, or `Invalid` when unavailable.
    pub fn auto_focus_point_selection_mode(&self, force_refresh: bool) -> AfPointSelection {
        self.status(force_refresh).map_or(AfPointSelection::Invalid, |s| s.af_point_selection)
    }

    /// Sets the point selection mode.
    pub fn set_auto_focus_point_selection_mode(&self, mode: AfPointSelection) -> bool {
        let Some(status) = self.status(true) else { return false };
        if status.af_point_selection == mode {
            return false;
        }
        let Some(model) = self.inner.model_record() else { return false };
        let Some(wire) = mode.to_wire(model.af_point_count) else { return false };
        self.inner.set_property(SettingOp::AfPointSelection, &[wire])
    }

    /// Row-major indices of the user-selected focus points.
    pub fn selected_auto_focus_points(&self, force_refresh: bool) -> Vec<u32> {
        match (self.status(force_refresh), self.inner.model_record()) {
            (Some(status), Some(model)) => model.decode_af_points(status.selected_af_mask),
            _ => Vec::new(),
        }
    }

    /// Selects focus points by row-major index.
    pub fn set_selected_auto_focus_points(&self, indices: &[u32]) -> bool {
        let Some(status) = self.status(true) else { return false };
        let Some(model) = self.inner.model_record() else { return false };
        if indices.is_empty() || indices.iter().any(|&i| i >= model.af_point_count) {
            return false;
        }
        let mask = model.encode_af_points(indices);
        if mask == status.selected_af_mask {
            return false;
        }
        self.inner.set_property(SettingOp::AfPoints, &[mask])
    }

    // ----- JPEG rendition ---------------------------------------------------

    /// The JPEG color rendition, or `Invalid` when unavailable.
    pub fn color_dynamics_mode(&self, force_refresh: bool) -> ColorDynamicsMode {
        self.status(force_refresh).map_or(ColorDynamicsMode::Invalid, |s| s.jpeg_image_tone)
    }

    /// Sets the JPEG color rendition.
    pub fn set_color_dynamics_mode(&self, mode: ColorDynamicsMode) -> bool {
        let Some(status) = self.status(true) else { return false };
        if status.jpeg_image_tone == mode {
            return false;
        }
        let Some(wire) = mode.to_wire() else { return false };
        self.inner.set_property(SettingOp::JpegImageTone, &[wire])
    }

    /// JPEG saturation, centred at 0, or 0 when unavailable.
    pub fn tone_saturation(&self, force_refresh: bool) -> i32 {
        self.tone_property(force_refresh, |s| s.jpeg_saturation)
    }

    /// Inclusive JPEG saturation limits, or (0, 0) when disconnected.
    pub fn tone_saturation_limits(&self) -> (i32, i32) {
        self.tone_limits()
    }

    /// Sets the JPEG saturation.
    pub fn set_tone_saturation(&self, saturation: i32) -> bool {
        self.set_tone_property(SettingOp::JpegSaturation, |s| s.jpeg_saturation, saturation)
    }

    /// JPEG hue, centred at 0, or 0 when unavailable.
    pub fn tone_hue(&self, force_refresh: bool) -> i32 {
        self.tone_property(force_refresh, |s| s.jpeg_hue)
    }

    /// Inclusive JPEG hue limits, or (0, 0) when disconnected.
    pub fn tone_hue_limits(&self) -> (i32, i32) {
        self.tone_limits()
    }

    /// Sets the JPEG hue.
    pub fn set_tone_hue(&self, hue: i32) -> bool {
        self.set_tone_property(SettingOp::JpegHue, |s| s.jpeg_hue, hue)
    }

    /// JPEG contrast, centred at 0, or 0 when unavailable.
    pub fn tone_contrast(&self, force_refresh: bool) -> i32 {
        self.tone_property(force_refresh, |s| s.jpeg_contrast)
    }

    /// Inclusive JPEG contrast limits, or (0, 0) when disconnected.
    pub fn tone_contrast_limits(&self) -> (i32, i32) {
        self.tone_limits()
    }

    /// Sets the JPEG contrast.
    pub fn set_tone_contrast(&self, contrast: i32) -> bool {
        self.set_tone_property(SettingOp::JpegContrast, |s| s.jpeg_contrast, contrast)
    }

    /// JPEG sharpness, centred at 0, or 0 when unavailable.
    pub fn tone_sharpness(&self, force_refresh: bool) -> i32 {
        self.tone_property(force_refresh, |s| s.jpeg_sharpness)
    }

    /// Inclusive JPEG sharpness limits, or (0, 0) when disconnected.
    pub fn tone_sharpness_limits(&self) -> (i32, i32) {
        self.tone_limits()
    }

    /// Sets the JPEG sharpness.
    pub fn set_tone_sharpness(&self, sharpness: i32) -> bool {
        self.set_tone_property(SettingOp::JpegSharpness, |s| s.jpeg_sharpness, sharpness)
    }

    fn tone_property(&self, force_refresh: bool, field: impl Fn(&StatusSnapshot) -> u32) -> i32 {
        match (self.status(force_refresh), self.inner.model_record()) {
            (Some(status), Some(model)) => model.jpeg_property_from_wire(field(&status)),
            _ => 0,
        }
    }

    fn tone_limits(&self) -> (i32, i32) {
        self.inner.model_record().map_or((0, 0), |m| m.jpeg_property_limits())
    }

    fn set_tone_property(
        &self,
        op: SettingOp,
        field: impl Fn(&StatusSnapshot) -> u32,
        value: i32,
    ) -> bool {
        let Some(status) = self.status(true) else { return false };
        let Some(model) = self.inner.model_record() else { return false };
        if model.jpeg_property_from_wire(field(&status)) == value {
            return false;
        }
        let Some(wire) = model.jpeg_property_to_wire(value) else { return false };
        self.inner.set_property(op, &[wire])
    }

    // ----- metering, white balance, flash -----------------------------------

    /// The metering pattern, or `Invalid` when unavailable.
    pub fn auto_exposure_metering_mode(&self, force_refresh: bool) -> AeMeteringMode {
        self.status(force_refresh).map_or(AeMeteringMode::Invalid, |s| s.ae_metering)
    }

    /// Sets the metering pattern.
    pub fn set_auto_exposure_metering_mode(&self, mode: AeMeteringMode) -> bool {
        let Some(status) = self.status(true) else { return false };
        if status.ae_metering == mode {
            return false;
        }
        let Some(wire) = mode.to_wire() else { return false };
        self.inner.set_property(SettingOp::AeMetering, &[wire])
    }

    /// The white balance mode, or `Invalid` when unavailable.
    pub fn white_balance_mode(&self, force_refresh: bool) -> WhiteBalanceMode {
        self.status(force_refresh).map_or(WhiteBalanceMode::Invalid, |s| s.white_balance)
    }

    /// Sets the white balance mode.
    pub fn set_white_balance_mode(&self, mode: WhiteBalanceMode) -> bool {
        let Some(status) = self.status(true) else { return false };
        if status.white_balance == mode {
            return false;
        }
        let Some(wire) = mode.to_wire() else { return false };
        self.inner.set_property(SettingOp::WhiteBalance, &[wire])
    }

    /// White balance adjustment as (magenta/green, blue/amber), negative
    /// toward magenta and blue.
    pub fn white_balance_adjustment(&self, force_refresh: bool) -> (i32, i32) {
        self.status(force_refresh).map_or((0, 0), |s| {
            (wb_adjust_from_wire(s.wb_adjust_mg), wb_adjust_from_wire(s.wb_adjust_ba))
        })
    }

    /// Inclusive white balance adjustment range on both axes.
    pub fn white_balance_adjustment_range(&self) -> (i32, i32) {
        (-WB_ADJUST_OFFSET, WB_ADJUST_OFFSET)
    }

    /// Sets the white balance adjustment on both axes.
    pub fn set_white_balance_adjustment(&self, magenta_green: i32, blue_amber: i32) -> bool {
        let Some(status) = self.status(true) else { return false };
        if wb_adjust_from_wire(status.wb_adjust_mg) == magenta_green
            && wb_adjust_from_wire(status.wb_adjust_ba) == blue_amber
        {
            return false;
        }
        let (Some(mg), Some(ba)) =
            (wb_adjust_to_wire(magenta_green), wb_adjust_to_wire(blue_amber))
        else {
            return false;
        };
        let Some(mode) = status.white_balance.to_wire() else { return false };
        self.inner.set_property(SettingOp::WhiteBalanceAdjust, &[mode, mg, ba])
    }

    /// The flash mode, or `Invalid` when unavailable.
    pub fn flash_mode(&self, force_refresh: bool) -> FlashMode {
        self.status(force_refresh).map_or(FlashMode::Invalid, |s| s.flash_mode)
    }

    /// Sets the flash mode.
    pub fn set_flash_mode(&self, mode: FlashMode) -> bool {
        let Some(status) = self.status(true) else { return false };
        if status.flash_mode == mode {
            return false;
        }
        let Some(wire) = mode.to_wire() else { return false };
        self.inner.set_property(SettingOp::FlashMode, &[wire])
    }

    /// Flash exposure compensation, or the invalid rational.
    pub fn flash_exposure_compensation(&self, force_refresh: bool) -> SRational {
        self.status(force_refresh)
            .map_or_else(Rational::invalid, |s| Rational::new(s.flash_exposure_compensation, 256))
    }

    /// Flash exposure compensation values for the camera's configured step
    /// width.
    pub fn flash_exposure_compensation_steps(&self, force_refresh: bool) -> Vec<SRational> {
        self.status(force_refresh).map_or_else(Vec::new, |s| {
            steps::flash_exposure_compensation_steps(s.custom_ev_steps)
        })
    }

    /// Sets the flash exposure compensation.
    pub fn set_flash_exposure_compensation(&self, compensation: SRational) -> bool {
        let Some(status) = self.status(true) else { return false };
        if Rational::new(status.flash_exposure_compensation, 256) == compensation {
            return false;
        }
        if !steps::flash_exposure_compensation_steps(status.custom_ev_steps)
            .contains(&compensation)
        {
            return false;
        }
        self.inner.set_property(
            SettingOp::FlashExposureCompensation,
            &[compensation.nom as u32, compensation.den as u32],
        )
    }

    // ----- shake reduction and release mode ---------------------------------

    /// Whether shake reduction is engaged.
    pub fn shake_reduction(&self, force_refresh: bool) -> bool {
        self.status(force_refresh).is_some_and(|s| s.shake_reduction)
    }

    /// The release / drive mode, or `Invalid` when unavailable.
    pub fn release_mode(&self, force_refresh: bool) -> ReleaseMode {
        self.status(force_refresh).map_or(ReleaseMode::Invalid, |s| s.release_mode)
    }

    /// Sets the release / drive mode.
    pub fn set_release_mode(&self, mode: ReleaseMode) -> bool {
        let Some(status) = self.status(true) else { return false };
        if status.release_mode == mode {
            return false;
        }
        let Some(wire) = mode.to_wire() else { return false };
        self.inner.set_property(SettingOp::ReleaseMode, &[wire])
    }

    // ----- actions ----------------------------------------------------------

    /// Runs the autofocus and returns the row-major indices of the points
    /// that achieved focus (empty if unavailable).
    pub fn execute_focus(&self) -> Vec<u32> {
        if !self.inner.is_connected() {
            return Vec::new();
        }
        if self.inner.run_command("autofocus", |g| g.focus()).is_none() {
            return Vec::new();
        }
        // Settle with no lock held so observers and the poller proceed.
        thread::sleep(FOCUS_SETTLE);
        match (self.status(true), self.inner.model_record()) {
            (Some(status), Some(model)) => model.decode_af_points(status.focused_af_mask),
            _ => Vec::new(),
        }
    }

    /// Triggers the shutter and returns the index of the camera buffer the
    /// image landed in, or [`INVALID_BUFFER_INDEX`].
    ///
    /// Bulb mode is refused.  The call blocks for the pre-shot shutter time
    /// plus a 500 ms settle tail before the post-shot status is read.
    pub fn execute_shutter(&self) -> i32 {
        if !self.inner.is_connected() {
            return INVALID_BUFFER_INDEX;
        }
        let Some(pre) = self.status(true) else { return INVALID_BUFFER_INDEX };
        if pre.exposure_mode == ExposureMode::Bulb {
            debug!("refusing shutter release in bulb mode");
            return INVALID_BUFFER_INDEX;
        }
        if self.inner.run_command("shutter release", |g| g.shutter()).is_none() {
            return INVALID_BUFFER_INDEX;
        }

        let exposure = pre.current_shutter.to_f64();
        let settle = if exposure.is_finite() && exposure > 0.0 {
            Duration::from_secs_f64(exposure) + SHUTTER_SETTLE_TAIL
        } else {
            SHUTTER_SETTLE_UNKNOWN
        };
        thread::sleep(settle);

        let Some(model) = self.inner.model_record() else { return INVALID_BUFFER_INDEX };
        if model.limited_model {
            // The limited protocol cannot report buffer allocation; these
            // bodies always store to slot 0.
            return 0;
        }

        let Some(post) = self.status(true) else { return INVALID_BUFFER_INDEX };
        let new_buffers = (post.buffer_mask ^ pre.buffer_mask) & post.buffer_mask;
        debug_assert!(
            new_buffers.count_ones() <= 1,
            "one shot allocated several buffers: pre {:#x} post {:#x}",
            pre.buffer_mask,
            post.buffer_mask,
        );
        if new_buffers.count_ones() == 1 {
            new_buffers.trailing_zeros() as i32
        } else {
            INVALID_BUFFER_INDEX
        }
    }

    /// Runs the sensor dust removal program.
    pub fn execute_dust_removal(&self) -> bool {
        self.inner.is_connected()
            && self.inner.run_command("dust removal", |g| g.dust_removal()).is_some()
    }

    // ----- image retrieval --------------------------------------------------

    /// Downloads the image in `buffer_index` and deletes the buffer.
    ///
    /// `None` for format, quality or resolution means the camera's current
    /// setting.  `progress`, when present, receives the completed fraction
    /// in [0.0, 1.0] after every 64 KiB block.  Returns the image bytes, or
    /// empty on any failure.
    pub fn get_image(
        &self,
        buffer_index: u32,
        format: Option<ImageFormat>,
        quality: Option<JpegQuality>,
        resolution: Option<ImageResolution>,
        mut progress: Option<&mut dyn FnMut(f32)>,
    ) -> Vec<u8> {
        if !self.inner.is_connected() {
            return Vec::new();
        }
        let Some(status) = self.status(false) else { return Vec::new() };
        let Some(model) = self.inner.model_record() else { return Vec::new() };

        let wire_type = match format {
            Some(ImageFormat::Pef) => buffer_type::PEF,
            Some(ImageFormat::Dng) => buffer_type::DNG,
            Some(ImageFormat::Jpeg) => {
                model.jpeg_buffer_type(quality.map_or(status.jpeg_quality, JpegQuality::stars))
            }
            None => status.image_format,
        };
        let wire_resolution =
            resolution.map_or(status.jpeg_resolution, ImageResolution::to_wire);

        let Some(info) = self
            .inner
            .run_command("buffer open", |g| g.open_buffer(buffer_index, wire_type, wire_resolution))
        else {
            return Vec::new();
        };

        let mut data = Vec::with_capacity(info.total as usize);
        while (data.len() as u32) < info.total {
            let block = (info.total - data.len() as u32).min(DOWNLOAD_BLOCK_LIMIT);
            let address = info.address + data.len() as u32;
            match self.inner.run_command("buffer read", |g| g.read_buffer_block(address, block)) {
                Some(chunk) if !chunk.is_empty() => {
                    data.extend_from_slice(&chunk);
                    if let Some(progress) = progress.as_mut() {
                        progress(data.len() as f32 / info.total as f32);
                    }
                }
                _ => return Vec::new(),
            }
        }

        let _ = self.inner.run_command("buffer close", |g| g.close_buffer());
        let _ = self.inner.run_command("buffer delete", |g| g.delete_buffer(buffer_index));
        data
    }

    /// Downloads the camera-decoded preview of the image in `buffer_index`
    /// in a single transfer and deletes the buffer.
    pub fn get_preview_image(&self, buffer_index: u32) -> Vec<u8> {
        if !self.inner.is_connected() {
            return Vec::new();
        }
        let Some(info) = self
            .inner
            .run_command("preview open", |g| g.open_buffer(buffer_index, buffer_type::PREVIEW, 0))
        else {
            return Vec::new();
        };
        let Some(data) =
            self.inner.run_command("preview read", |g| g.read_buffer_block(info.address, info.total))
        else {
            return Vec::new();
        };
        let _ = self.inner.run_command("preview close", |g| g.close_buffer());
        let _ = self.inner.run_command("preview delete", |g| g.delete_buffer(buffer_index));
        data
    }

    // ----- observers --------------------------------------------------------

    /// Subscribes to connection state changes; the callback receives whether
    /// the session is connected.
    pub fn register_connection_changed(
        &self,
        callback: impl Fn(bool) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_connection(callback)
    }

    /// Subscribes to exposure mode changes.
    pub fn register_exposure_mode_changed(
        &self,
        callback: impl Fn(ExposureMode) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_exposure_mode(callback)
    }

    /// Subscribes to sensitivity changes.
    pub fn register_iso_changed(&self, callback: impl Fn(u32) + Send + 'static) -> u32 {
        self.inner.observers.register_iso(callback)
    }

    /// Subscribes to aperture changes.
    pub fn register_aperture_changed(
        &self,
        callback: impl Fn(URational) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_aperture(callback)
    }

    /// Subscribes to shutter time changes.
    pub fn register_shutter_time_changed(
        &self,
        callback: impl Fn(URational) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_shutter_time(callback)
    }

    /// Subscribes to exposure compensation changes.
    pub fn register_exposure_compensation_changed(
        &self,
        callback: impl Fn(SRational) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_exposure_compensation(callback)
    }

    /// Subscribes to battery voltage changes.
    pub fn register_battery_voltage_changed(
        &self,
        callback: impl Fn(Vec<f32>) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_battery(callback)
    }

    /// Subscribes to focal length changes.
    pub fn register_focal_length_changed(
        &self,
        callback: impl Fn(URational) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_focal_length(callback)
    }

    /// Subscribes to exposure value changes.
    pub fn register_exposure_value_changed(
        &self,
        callback: impl Fn(f64) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_exposure_value(callback)
    }

    /// Subscribes to autofocus mode changes.
    pub fn register_auto_focus_mode_changed(
        &self,
        callback: impl Fn(AutoFocusMode) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_af_mode(callback)
    }

    /// Subscribes to point selection mode changes.
    pub fn register_auto_focus_point_selection_mode_changed(
        &self,
        callback: impl Fn(AfPointSelection) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_af_point_selection_mode(callback)
    }

    /// Subscribes to selected focus point changes; the callback receives
    /// row-major indices.
    pub fn register_selected_auto_focus_points_changed(
        &self,
        callback: impl Fn(Vec<u32>) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_selected_af_points(callback)
    }

    /// Subscribes to JPEG color rendition changes.
    pub fn register_color_dynamics_mode_changed(
        &self,
        callback: impl Fn(ColorDynamicsMode) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_color_dynamics(callback)
    }

    /// Subscribes to JPEG saturation changes.
    pub fn register_tone_saturation_changed(
        &self,
        callback: impl Fn(i32) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_saturation(callback)
    }

    /// Subscribes to JPEG hue changes.
    pub fn register_tone_hue_changed(&self, callback: impl Fn(i32) + Send + 'static) -> u32 {
        self.inner.observers.register_hue(callback)
    }

    /// Subscribes to JPEG contrast changes.
    pub fn register_tone_contrast_changed(
        &self,
        callback: impl Fn(i32) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_contrast(callback)
    }

    /// Subscribes to JPEG sharpness changes.
    pub fn register_tone_sharpness_changed(
        &self,
        callback: impl Fn(i32) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_sharpness(callback)
    }

    /// Subscribes to metering pattern changes.
    pub fn register_auto_exposure_metering_mode_changed(
        &self,
        callback: impl Fn(AeMeteringMode) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_ae_metering(callback)
    }

    /// Subscribes to white balance mode changes.
    pub fn register_white_balance_mode_changed(
        &self,
        callback: impl Fn(WhiteBalanceMode) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_wb_mode(callback)
    }

    /// Subscribes to white balance adjustment changes; the callback receives
    /// the (magenta/green, blue/amber) pair.
    pub fn register_white_balance_adjustment_changed(
        &self,
        callback: impl Fn((i32, i32)) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_wb_adjust(callback)
    }

    /// Subscribes to flash mode changes.
    pub fn register_flash_mode_changed(
        &self,
        callback: impl Fn(FlashMode) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_flash_mode(callback)
    }

    /// Subscribes to flash exposure compensation changes.
    pub fn register_flash_exposure_compensation_changed(
        &self,
        callback: impl Fn(SRational) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_flash_ec(callback)
    }

    /// Subscribes to shake reduction changes.
    pub fn register_shake_reduction_changed(
        &self,
        callback: impl Fn(bool) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_shake_reduction(callback)
    }

    /// Subscribes to release mode changes.
    pub fn register_release_mode_changed(
        &self,
        callback: impl Fn(ReleaseMode) + Send + 'static,
    ) -> u32 {
        self.inner.observers.register_release_mode(callback)
    }

    /// Removes a subscriber from whichever topic holds its id.
    pub fn unregister(&self, id: u32) {
        self.inner.observers.unregister(id);
    }

    // ------------------------------------------------------------------------

    fn status(&self, force: bool) -> Option<Arc<StatusSnapshot>> {
        self.inner.poll_status(force)
    }
}

impl Drop for PentaxTether {
    fn drop(&mut self) {
        self.inner.shutting_down.store(true, Ordering::Release);
        self.disconnect();
        let reconnect = self.inner.reconnect_thread.lock().unwrap().take();
        if let Some(thread) = reconnect {
            let _ = thread.join();
        }
    }
}

impl SessionInner {
    fn is_connected(&self) -> bool {
        self.gateway.is_connected()
    }

    fn model_record(&self) -> Option<CameraModel> {
        self.model.lock().unwrap().clone()
    }

    /// Serves the cached snapshot, refreshing when forced or stale, and fans
    /// out observer notifications for whatever changed.
    fn poll_status(self: &Arc<Self>, force: bool) -> Option<Arc<StatusSnapshot>> {
        if !self.is_connected() {
            return None;
        }
        let model = self.model_record()?;
        match self.cache.read_with(force, || self.gateway.full_status(model.af_point_count)) {
            Ok((snapshot, refresh)) => {
                // The cache lock is released here; fan-out only takes the
                // registry lock.
                if let Some(refresh) = &refresh {
                    self.observers.dispatch(refresh, &model);
                }
                snapshot
            }
            Err(e) => {
                self.note_command_failure("status refresh", &e);
                None
            }
        }
    }

    /// Runs one gateway command, mapping failure to `None` and routing
    /// device loss into the reconnect machinery.
    fn run_command<T>(
        self: &Arc<Self>,
        what: &str,
        f: impl FnOnce(&Gateway) -> Result<T, CommandError>,
    ) -> Option<T> {
        match f(&self.gateway) {
            Ok(value) => Some(value),
            Err(e) => {
                self.note_command_failure(what, &e);
                None
            }
        }
    }

    fn set_property(self: &Arc<Self>, op: SettingOp, args: &[u32]) -> bool {
        self.run_command("property write", |g| g.set_property(op, args)).is_some()
    }

    fn note_command_failure(self: &Arc<Self>, what: &str, error: &CommandError) {
        if error.is_device_gone() {
            warn!("{what} failed, device is gone");
            self.handle_device_loss();
        } else {
            debug!("{what} failed: {error}");
        }
    }

    /// Device-gone path: drop the session to DISCONNECTED, announce it once
    /// and, when configured, schedule an asynchronous reconnect.  Runs on
    /// whatever thread noticed the loss, the poller included, so it never
    /// joins the poller here.
    fn handle_device_loss(self: &Arc<Self>) {
        self.gateway.clear();
        self.cache.invalidate();
        self.poller.signal_stop();
        if self.announced.swap(false, Ordering::AcqRel) {
            *self.model.lock().unwrap() = None;
            self.firmware.lock().unwrap().clear();
            self.observers.emit_connection(&false);
            self.schedule_reconnect();
        }
    }

    fn disconnect(&self) {
        if self.announced.swap(false, Ordering::AcqRel) {
            // Best effort; the device may already be gone.
            let _ = self.gateway.set_connect_mode(false);
            self.gateway.clear();
            self.cache.invalidate();
            *self.model.lock().unwrap() = None;
            self.firmware.lock().unwrap().clear();
            self.observers.emit_connection(&false);
            info!("disconnected");
        } else {
            self.gateway.clear();
        }
    }

    fn connect_and_start(self: &Arc<Self>, timeout: Duration, cancel: Option<Arc<AtomicBool>>) -> bool {
        if self.connect_blocking(timeout, cancel) {
            self.start_poller();
            true
        } else {
            false
        }
    }

    /// Retries the transport open and handshake once per second until
    /// success, timeout, cancellation or session teardown.
    fn connect_blocking(
        self: &Arc<Self>,
        timeout: Duration,
        cancel: Option<Arc<AtomicBool>>,
    ) -> bool {
        let start = Instant::now();
        loop {
            if self.shutting_down.load(Ordering::Acquire)
                || cancel.as_ref().is_some_and(|c| c.load(Ordering::Acquire))
            {
                return false;
            }
            match self.try_connect_once() {
                Ok(()) => return true,
                Err(e) => debug!("connect attempt failed: {e}"),
            }
            if start.elapsed() >= timeout {
                return false;
            }
            thread::sleep(CONNECT_RETRY_INTERVAL);
        }
    }

    fn try_connect_once(self: &Arc<Self>) -> Result<(), ConnectError> {
        let devices = self.provider.enumerate().context(EnumerateSnafu)?;
        let descriptor =
            devices.into_iter().find(|d| d.is_pentax()).ok_or(ConnectError::NoCamera)?;
        let handle = self.provider.open(&descriptor).context(OpenSnafu)?;
        self.gateway.install(handle);

        let handshake = (|| -> Result<(CameraModel, String), ConnectError> {
            self.gateway.short_status().context(HandshakeSnafu)?;
            self.gateway.set_connect_mode(true).context(HandshakeSnafu)?;
            let id = self.gateway.identify().context(HandshakeSnafu)?;
            let model = self
                .catalogue
                .lookup(id)
                .cloned()
                .ok_or(ConnectError::UnknownModel { id })?;
            let firmware = self.gateway.firmware().context(HandshakeSnafu)?;
            Ok((model, firmware))
        })();

        match handshake {
            Ok((model, firmware)) => {
                info!(model = %model.name, %firmware, "connected");
                *self.model.lock().unwrap() = Some(model);
                *self.firmware.lock().unwrap() = firmware;
                self.announced.store(true, Ordering::Release);
                self.observers.emit_connection(&true);
                // Prime the cache; the first snapshot fans out initial
                // values to every registered observer.
                let _ = self.poll_status(true);
                Ok(())
            }
            Err(e) => {
                self.gateway.clear();
                Err(e)
            }
        }
    }

    fn start_poller(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let interval = Duration::from_secs_f64(self.options.status_max_age_seconds);
        self.poller.start(interval, move || {
            let Some(inner) = weak.upgrade() else { return false };
            if !inner.is_connected() {
                return false;
            }
            let _ = inner.poll_status(false);
            inner.is_connected()
        });
    }

    /// Spawns one reconnect worker, if none is active and the options allow
    /// it.  The worker respects the session's cancellation flag and
    /// teardown.
    fn schedule_reconnect(self: &Arc<Self>) {
        if !self.options.auto_reconnect || self.shutting_down.load(Ordering::Acquire) {
            return;
        }
        if self.reconnect_active.swap(true, Ordering::AcqRel) {
            return;
        }
        let weak = Arc::downgrade(self);
        let timeout = Duration::from_secs(self.options.reconnect_timeout_seconds);
        info!("device lost, scheduling reconnect");
        let thread = thread::spawn(move || {
            if let Some(inner) = weak.upgrade() {
                let cancel = inner.cancel.lock().unwrap().clone();
                inner.connect_and_start(timeout, cancel);
                inner.reconnect_active.store(false, Ordering::Release);
            }
        });
        *self.reconnect_thread.lock().unwrap() = Some(thread);
    }
}
