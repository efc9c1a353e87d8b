//! Discrete value tables the camera accepts for exposure parameters.
//!
//! The tables are vendor data; which one applies depends on the camera's
//! configured step width, and the sensitivity table is additionally clamped
//! to the connected model's extended range.

use crate::capability::CameraModel;
use crate::proto::StatusSnapshot;
use crate::value::{CustomEvSteps, CustomSensitivitySteps, Rational, SRational, URational};

/// Third-stop sensitivity series.
const ISO_STEPS_THIRD: &[u32] = &[
    80, 100, 125, 160, 200, 250, 320, 400, 500, 640, 800, 1000, 1250, 1600, 2000, 2500, 3200,
    4000, 5000, 6400, 8000, 10000, 12800, 16000, 20000, 25600, 32000, 40000, 51200, 64000, 80000,
    102400,
];

/// Half-stop sensitivity series.
const ISO_STEPS_HALF: &[u32] = &[
    100, 140, 200, 280, 400, 560, 800, 1100, 1600, 2200, 3200, 4500, 6400, 9000, 12800, 18000,
    25600, 36000, 51200, 72000, 102400,
];

/// Full-stop sensitivity series.
const ISO_STEPS_FULL: &[u32] =
    &[100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

/// Third-stop aperture series, f-numbers scaled by ten.
const APERTURE_TENTHS: &[u32] = &[
    10, 11, 12, 14, 16, 18, 20, 22, 25, 28, 32, 35, 40, 45, 50, 56, 63, 71, 80, 90, 100, 110,
    130, 140, 160, 180, 200, 220, 250, 290, 320, 360, 400, 450,
];

/// Third-stop shutter time series, 30 s down to 1/8000 s.
const SHUTTER_STEPS: &[(u32, u32)] = &[
    (30, 1),
    (25, 1),
    (20, 1),
    (15, 1),
    (13, 1),
    (10, 1),
    (8, 1),
    (6, 1),
    (5, 1),
    (4, 1),
    (3, 1),
    (25, 10),
    (2, 1),
    (16, 10),
    (13, 10),
    (1, 1),
    (8, 10),
    (6, 10),
    (5, 10),
    (4, 10),
    (3, 10),
    (1, 4),
    (1, 5),
    (1, 6),
    (1, 8),
    (1, 10),
    (1, 13),
    (1, 15),
    (1, 20),
    (1, 25),
    (1, 30),
    (1, 40),
    (1, 50),
    (1, 60),
    (1, 80),
    (1, 100),
    (1, 125),
    (1, 160),
    (1, 200),
    (1, 250),
    (1, 320),
    (1, 400),
    (1, 500),
    (1, 640),
    (1, 800),
    (1, 1000),
    (1, 1250),
    (1, 1600),
    (1, 2000),
    (1, 2500),
    (1, 3200),
    (1, 4000),
    (1, 5000),
    (1, 6400),
    (1, 8000),
];

/// Sensitivity values the connected body accepts in its current step
/// configuration, clamped to the model's extended range.
pub(crate) fn iso_steps(status: &StatusSnapshot, model: &CameraModel) -> Vec<u32> {
    // The step-width keying mirrors the camera's own behavior: whole-stop
    // sensitivity steps unlock the third-stop series, otherwise the EV step
    // width decides.
    let table = if status.custom_sensitivity_steps == CustomSensitivitySteps::OneEv {
        ISO_STEPS_THIRD
    } else if status.custom_ev_steps == CustomEvSteps::Half {
        ISO_STEPS_HALF
    } else {
        ISO_STEPS_FULL
    };

    table
        .iter()
        .copied()
        .filter(|&iso| iso >= model.extended_iso_min && iso <= model.extended_iso_max)
        .collect()
}

/// Aperture values within the mounted lens's range.  An unreported lens bound
/// leaves that side unclamped.
pub(crate) fn aperture_steps(status: &StatusSnapshot) -> Vec<URational> {
    let min = status.lens_min_aperture;
    let max = status.lens_max_aperture;
    APERTURE_TENTHS
        .iter()
        .map(|&tenths| Rational::new(tenths, 10))
        .filter(|f| min.is_invalid() || f.to_f64() >= min.to_f64())
        .filter(|f| max.is_invalid() || f.to_f64() <= max.to_f64())
        .collect()
}

/// Shutter times the camera accepts, longest first.
pub(crate) fn shutter_time_steps() -> Vec<URational> {
    SHUTTER_STEPS.iter().map(|&(nom, den)| Rational::new(nom, den)).collect()
}

/// Exposure compensation values for the camera's configured step width,
/// ±5 EV.
pub(crate) fn exposure_compensation_steps(ev_steps: CustomEvSteps) -> Vec<SRational> {
    match ev_steps {
        CustomEvSteps::Half => (-10..=10).map(|n| Rational::new(n, 2)).collect(),
        _ => (-15..=15).map(|n| Rational::new(n, 3)).collect(),
    }
}

/// Flash exposure compensation values for the camera's configured step
/// width, ±2 EV.
pub(crate) fn flash_exposure_compensation_steps(ev_steps: CustomEvSteps) -> Vec<SRational> {
    match ev_steps {
        CustomEvSteps::Half => (-4..=4).map(|n| Rational::new(n, 2)).collect(),
        _ => (-6..=6).map(|n| Rational::new(n, 3)).collect(),
    }
}
