use super::URational;

/// Shutter durations at or below this are treated as "no measurement" by the
/// exposure-value formula.
const MIN_SHUTTER_SECONDS: f64 = 1e-6;

/// The exposure value `log2(aperture² / shutter_seconds)`.
///
/// Returns `0.0` when the shutter time is missing, non-positive or at most a
/// microsecond, or when the aperture is missing; there is no meaningful EV in
/// those states.  The value is not normalized to a reference sensitivity.
pub fn exposure_value(aperture: &URational, shutter: &URational) -> f64 {
    let f = aperture.to_f64();
    let t = shutter.to_f64();
    if !f.is_finite() || !(t > MIN_SHUTTER_SECONDS) {
        return 0.0;
    }
    (f * f / t).log2()
}

/// Converts the four raw battery words (centivolts) to volts, skipping
/// unpopulated (zero) cells.
pub fn battery_voltages(raw: &[u32; 4]) -> Vec<f32> {
    raw.iter()
        .filter(|&&centivolts| centivolts != 0)
        .map(|&centivolts| centivolts as f32 * 0.01)
        .collect()
}
