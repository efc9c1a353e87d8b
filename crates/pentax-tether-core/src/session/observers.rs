//! Type-indexed registries of change subscribers.
//!
//! One map per topic, all behind a single registry mutex that is distinct
//! from both the cache and the transport mutex.  Subscriber ids come from one
//! monotonic counter and are unique across topics for the session's
//! lifetime, which lets [`ObserverRegistry::unregister`] sweep every map.
//!
//! Fan-out holds the registry lock for the duration of one topic's iteration
//! and releases it between topics.  Callbacks therefore must not register or
//! unregister observers, nor synchronously re-enter session write
//! operations, from the delivering thread.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use crate::capability::{wb_adjust_from_wire, CameraModel};
use crate::proto::StatusSnapshot;
use crate::session::cache::Refresh;
use crate::value::{
    battery_voltages, exposure_value, AeMeteringMode, AfPointSelection, AutoFocusMode,
    ColorDynamicsMode, ExposureMode, FlashMode, Rational, ReleaseMode, SRational, URational,
    WhiteBalanceMode,
};

type Callback<T> = Box<dyn Fn(T) + Send>;

/// Declares the topic maps plus their register and emit methods.  Ids are
/// handed out by the shared counter, so one `unregister` sweep covers every
/// topic.
macro_rules! topics {
    ($($topic:ident : $ty:ty, $register:ident, $emit:ident;)*) => {
        #[derive(Default)]
        struct Topics {
            next_id: u32,
            $($topic: BTreeMap<u32, Callback<$ty>>,)*
        }

        impl ObserverRegistry {
            $(
                /// Registers a change subscriber; returns its session-unique
                /// id.
                pub(crate) fn $register(
                    &self,
                    callback: impl Fn($ty) + Send + 'static,
                ) -> u32 {
                    let mut topics = self.topics.lock().unwrap();
                    topics.next_id += 1;
                    let id = topics.next_id;
                    topics.$topic.insert(id, Box::new(callback));
                    id
                }

                /// Delivers a value to every subscriber of this topic, in
                /// registration order.
                pub(crate) fn $emit(&self, value: &$ty) {
                    let topics = self.topics.lock().unwrap();
                    for callback in topics.$topic.values() {
                        callback(value.clone());
                    }
                }
            )*

            /// Removes the subscriber with the given id from whichever topic
            /// holds it.
            pub(crate) fn unregister(&self, id: u32) {
                let mut topics = self.topics.lock().unwrap();
                $(topics.$topic.remove(&id);)*
            }
        }
    };
}

topics! {
    connection: bool, register_connection, emit_connection;
    exposure_mode: ExposureMode, register_exposure_mode, emit_exposure_mode;
    iso: u32, register_iso, emit_iso;
    aperture: URational, register_aperture, emit_aperture;
    shutter_time: URational, register_shutter_time, emit_shutter_time;
    exposure_compensation: SRational, register_exposure_compensation, emit_exposure_compensation;
    battery: Vec<f32>, register_battery, emit_battery;
    focal_length: URational, register_focal_length, emit_focal_length;
    exposure_value: f64, register_exposure_value, emit_exposure_value;
    af_mode: AutoFocusMode, register_af_mode, emit_af_mode;
    af_point_selection_mode: AfPointSelection, register_af_point_selection_mode,
        emit_af_point_selection_mode;
    selected_af_points: Vec<u32>, register_selected_af_points, emit_selected_af_points;
    color_dynamics: ColorDynamicsMode, register_color_dynamics, emit_color_dynamics;
    saturation: i32, register_saturation, emit_saturation;
    hue: i32, register_hue, emit_hue;
    contrast: i32, register_contrast, emit_contrast;
    sharpness: i32, register_sharpness, emit_sharpness;
    ae_metering: AeMeteringMode, register_ae_metering, emit_ae_metering;
    wb_mode: WhiteBalanceMode, register_wb_mode, emit_wb_mode;
    wb_adjust: (i32, i32), register_wb_adjust, emit_wb_adjust;
    flash_mode: FlashMode, register_flash_mode, emit_flash_mode;
    flash_ec: SRational, register_flash_ec, emit_flash_ec;
    shake_reduction: bool, register_shake_reduction, emit_shake_reduction;
    release_mode: ReleaseMode, register_release_mode, emit_release_mode;
}

/// The session's observer registry.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    topics: Mutex<Topics>,
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry").finish_non_exhaustive()
    }
}

impl ObserverRegistry {
    /// Fans a successful refresh out to every topic whose value changed
    /// between the previous and current snapshot, in the declared topic
    /// order.  A first snapshot (no previous) counts as changed everywhere.
    ///
    /// Called once per cache generation, after the cache lock is released.
    pub(crate) fn dispatch(&self, refresh: &Refresh, model: &CameraModel) {
        let cur = refresh.current.as_ref();
        let prev = refresh.previous.as_deref();

        macro_rules! fire {
            ($emit:ident, $value_of:expr) => {{
                let value_of = $value_of;
                let new = value_of(cur);
                if prev.map_or(true, |p| value_of(p) != new) {
                    self.$emit(&new);
                }
            }};
        }

        fire!(emit_exposure_mode, |s: &StatusSnapshot| s.exposure_mode);
        fire!(emit_iso, |s: &StatusSnapshot| s.current_iso);
        fire!(emit_aperture, |s: &StatusSnapshot| s.current_aperture);
        fire!(emit_shutter_time, |s: &StatusSnapshot| s.current_shutter);
        fire!(emit_exposure_compensation, |s: &StatusSnapshot| s.exposure_compensation);
        fire!(emit_battery, |s: &StatusSnapshot| battery_voltages(&s.battery));
        fire!(emit_focal_length, |s: &StatusSnapshot| s.zoom);
        fire!(emit_exposure_value, |s: &StatusSnapshot| exposure_value(
            &s.current_aperture,
            &s.current_shutter
        ));
        fire!(emit_af_mode, |s: &StatusSnapshot| s.af_mode);
        fire!(emit_af_point_selection_mode, |s: &StatusSnapshot| s.af_point_selection);
        fire!(emit_selected_af_points, |s: &StatusSnapshot| model
            .decode_af_points(s.selected_af_mask));
        fire!(emit_color_dynamics, |s: &StatusSnapshot| s.jpeg_image_tone);
        fire!(emit_saturation, |s: &StatusSnapshot| model
            .jpeg_property_from_wire(s.jpeg_saturation));
        fire!(emit_hue, |s: &StatusSnapshot| model.jpeg_property_from_wire(s.jpeg_hue));
        fire!(emit_contrast, |s: &StatusSnapshot| model
            .jpeg_property_from_wire(s.jpeg_contrast));
        fire!(emit_sharpness, |s: &StatusSnapshot| model
            .jpeg_property_from_wire(s.jpeg_sharpness));
        fire!(emit_ae_metering, |s: &StatusSnapshot| s.ae_metering);
        fire!(emit_wb_mode, |s: &StatusSnapshot| s.white_balance);
        fire!(emit_wb_adjust, |s: &StatusSnapshot| (
            wb_adjust_from_wire(s.wb_adjust_mg),
            wb_adjust_from_wire(s.wb_adjust_ba)
        ));
        fire!(emit_flash_mode, |s: &StatusSnapshot| s.flash_mode);
        fire!(emit_flash_ec, |s: &StatusSnapshot| Rational::new(
            s.flash_exposure_compensation,
            256
        ));
        fire!(emit_shake_reduction, |s: &StatusSnapshot| s.shake_reduction);
        fire!(emit_release_mode, |s: &StatusSnapshot| s.release_mode);
    }
}
