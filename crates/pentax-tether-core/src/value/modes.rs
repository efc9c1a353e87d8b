//! Tagged mode values and their vendor wire ordinals.
//!
//! Every enum carries an explicit `Invalid` variant: unknown wire values
//! decode to it rather than to a silent default, and it never encodes back to
//! the wire (except where the camera's own 27-point asymmetry dictates
//! otherwise, see [`AfPointSelection::to_wire`]).

use serde::{Deserialize, Serialize};

/// Creates a mode enum along with total `from_wire` / `to_wire` conversions.
/// Unrecognized wire values map to the `Invalid` variant, which in turn has
/// no wire representation.
macro_rules! mode_enum {
    (
        $(#[$attr:meta])*
        $name:ident { $($(#[$vattr:meta])* $variant:ident = $val:literal,)* }
    ) => {
        $(#[$attr])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
        )]
        pub enum $name {
            $($(#[$vattr])* $variant,)*

            /// Reported by the camera as invalid, or not known to this crate.
            Invalid,
        }

        impl $name {
            /// Decodes a vendor wire ordinal; unrecognized values map to
            /// [`Self::Invalid`].
            pub fn from_wire(value: u32) -> Self {
                match value {
                    $($val => Self::$variant,)*
                    _ => Self::Invalid,
                }
            }

            /// Encodes to the vendor wire ordinal, if this value has one.
            pub fn to_wire(self) -> Option<u32> {
                match self {
                    $(Self::$variant => Some($val),)*
                    Self::Invalid => None,
                }
            }
        }
    };
}

mode_enum!(
    /// The camera's exposure program, as selected on the mode dial.
    ExposureMode {
        /// Fully automatic "green" mode.
        Green = 0,
        /// Program auto exposure.
        Program = 1,
        /// Sensitivity priority.
        Sv = 2,
        /// Shutter priority.
        Tv = 3,
        /// Aperture priority.
        Av = 4,
        /// Shutter and aperture priority.
        TAv = 5,
        /// Manual exposure.
        Manual = 6,
        /// Bulb exposure.  Shutter release over tether is refused in this
        /// mode.
        Bulb = 7,
        /// Flash X-sync speed.
        X = 8,
    }
);

mode_enum!(
    /// Auto-exposure metering pattern.
    AeMeteringMode {
        /// Multi-segment metering.
        Multi = 0,
        /// Center-weighted metering.
        Center = 1,
        /// Spot metering.
        Spot = 2,
    }
);

mode_enum!(
    /// Autofocus drive mode.
    AutoFocusMode {
        /// Manual focus.
        Manual = 0,
        /// Single autofocus (AF.S).
        Single = 1,
        /// Continuous autofocus (AF.C).
        Continuous = 2,
        /// Automatic selection between single and continuous (AF.A).
        Auto = 3,
    }
);

mode_enum!(
    /// JPEG color rendition ("custom image" on the camera body).
    ColorDynamicsMode {
        /// Natural rendition.
        Natural = 0,
        /// Bright rendition.
        Bright = 1,
        /// Portrait rendition.
        Portrait = 2,
        /// Landscape rendition.
        Landscape = 3,
        /// Vibrant rendition.
        Vibrant = 4,
        /// Monochrome rendition.
        Monochrome = 5,
        /// Muted rendition.
        Muted = 6,
        /// Reversal-film rendition.
        ReversalFilm = 7,
        /// Bleach-bypass rendition.
        BleachBypass = 8,
        /// Radiant rendition.
        Radiant = 9,
        /// Cross-processing rendition.
        CrossProcessing = 10,
        /// Flat rendition.
        Flat = 11,
        /// Automatic selection.
        Auto = 12,
    }
);

mode_enum!(
    /// White balance mode.
    WhiteBalanceMode {
        /// Automatic white balance.
        Auto = 0,
        /// Daylight preset.
        Daylight = 1,
        /// Shade preset.
        Shade = 2,
        /// Cloudy preset.
        Cloudy = 3,
        /// Daylight-color fluorescent preset.
        FluorescentDaylightColor = 4,
        /// Daylight-white fluorescent preset.
        FluorescentDaylightWhite = 5,
        /// Cool-white fluorescent preset.
        FluorescentCoolWhite = 6,
        /// Tungsten preset.
        Tungsten = 7,
        /// Flash preset.
        Flash = 8,
        /// First manual (grey-card) memory.
        Manual = 9,
        /// Second manual memory.
        Manual2 = 10,
        /// Third manual memory.
        Manual3 = 11,
        /// First color-temperature memory.
        Kelvin1 = 12,
        /// Second color-temperature memory.
        Kelvin2 = 13,
        /// Third color-temperature memory.
        Kelvin3 = 14,
        /// Warm-white fluorescent preset.
        FluorescentWarmWhite = 15,
        /// Color-temperature enhancement.
        Cte = 16,
        /// Multi-pattern automatic white balance.
        MultiAuto = 17,
    }
);

mode_enum!(
    /// Flash discharge mode.
    FlashMode {
        /// Flash on.
        On = 0,
        /// Flash on with red-eye reduction.
        OnRedEye = 1,
        /// Slow-speed sync.
        Slow = 2,
        /// Slow-speed sync with red-eye reduction.
        SlowRedEye = 3,
        /// First (trailing) curtain sync.
        FirstCurtain = 4,
        /// Automatic discharge.
        Auto = 5,
        /// Automatic discharge with red-eye reduction.
        AutoRedEye = 6,
        /// Second (trailing) curtain sync.
        SecondCurtain = 7,
        /// Wireless controller acting as master.
        WirelessMaster = 8,
        /// Wireless controlled flash.
        WirelessControl = 9,
        /// Manual discharge.
        ManualDischarge = 10,
    }
);

mode_enum!(
    /// Shutter release / drive mode.
    ReleaseMode {
        /// Single frame release.
        Single = 0,
        /// Continuous release, high speed.
        ContinuousHi = 1,
        /// 12 second self timer.
        SelfTimer12 = 2,
        /// 2 second self timer.
        SelfTimer2 = 3,
        /// Infrared remote release.
        Remote = 4,
        /// Infrared remote release with 3 second delay.
        Remote3 = 5,
        /// Continuous release, low speed.
        ContinuousLo = 6,
        /// Continuous release via remote.
        RemoteContinuous = 7,
        /// Continuous release, medium speed.
        ContinuousMed = 8,
    }
);

mode_enum!(
    /// The camera's configured exposure-value step width.
    CustomEvSteps {
        /// Half-stop EV steps.
        Half = 0,
        /// Third-stop EV steps.
        Third = 1,
    }
);

mode_enum!(
    /// The camera's configured sensitivity step behavior.
    CustomSensitivitySteps {
        /// Sensitivity moves in whole stops.
        OneEv = 0,
        /// Sensitivity follows the configured EV step width.
        AsEv = 1,
    }
);

/// Autofocus point selection mode.
///
/// Unlike the other modes, the wire mapping depends on how many focus points
/// the connected model has; see [`Self::from_wire`] and [`Self::to_wire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AfPointSelection {
    /// Focus on a single, user-selected point.
    Spot,
    /// Expanded selection around one point.
    Select1,
    /// Expanded selection over 9 points.
    Select9,
    /// Expanded selection over 25 points.
    Select25,
    /// Expanded selection over all 27 points.
    Select27,
    /// Automatic selection among 9 points.
    Auto9,
    /// Automatic selection among all 27 points.
    Auto27,
    /// Automatic selection among 5 points.
    Auto5,
    /// Automatic selection among all 11 points.
    Auto11,
    /// Reported by the camera as invalid, or not known to this crate.
    Invalid,
}

impl AfPointSelection {
    /// Ordinal order shared by the 27-point wire decode and the serialized
    /// form of this enum.
    const ORDINALS: [AfPointSelection; 9] = [
        Self::Spot,
        Self::Select1,
        Self::Select9,
        Self::Select25,
        Self::Select27,
        Self::Auto9,
        Self::Auto27,
        Self::Auto5,
        Self::Auto11,
    ];

    /// Decodes the wire value for a model with `af_point_count` focus points.
    ///
    /// 11-point models use a four-value table; 27-point models report the
    /// plain ordinal.  Anything else decodes to [`Self::Invalid`].
    pub fn from_wire(value: u32, af_point_count: u32) -> Self {
        match af_point_count {
            11 => match value {
                0 => Self::Auto5,
                1 => Self::Select1,
                2 => Self::Spot,
                3 => Self::Auto11,
                _ => Self::Invalid,
            },
            27 => Self::ORDINALS
                .get(value as usize)
                .copied()
                .unwrap_or(Self::Invalid),
            _ => Self::Invalid,
        }
    }

    /// Encodes for a model with `af_point_count` focus points.
    ///
    /// The 27-point mapping is deliberately not the inverse of
    /// [`Self::from_wire`]: the camera only accepts four selection values and
    /// collapses everything else to the single-point selection.  This mirrors
    /// the camera's own behavior and must not be "fixed".
    pub fn to_wire(self, af_point_count: u32) -> Option<u32> {
        match af_point_count {
            11 => match self {
                Self::Auto5 => Some(0),
                Self::Select1 => Some(1),
                Self::Spot => Some(2),
                Self::Auto11 => Some(3),
                _ => None,
            },
            27 => Some(match self {
                Self::Auto9 => 0,
                Self::Select1 => 1,
                Self::Spot => 2,
                Self::Auto27 => 3,
                _ => 1,
            }),
            _ => None,
        }
    }
}

/// Requested on-disk format for image retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    /// Native Pentax raw.
    Pef,
    /// Adobe DNG raw.
    Dng,
    /// In-camera JPEG.
    Jpeg,
}

/// JPEG quality, as a star count on the camera body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JpegQuality {
    /// One star.
    Low,
    /// Two stars.
    Medium,
    /// Three stars.
    High,
    /// Four stars.
    Best,
}

impl JpegQuality {
    /// The star count this quality corresponds to.
    pub fn stars(self) -> u32 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Best => 4,
        }
    }
}

/// Requested JPEG resolution class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageResolution {
    /// Large.
    Large,
    /// Medium.
    Medium,
    /// Small.
    Small,
    /// Extra small.
    ExtraSmall,
}

impl ImageResolution {
    /// The wire ordinal of this resolution class.
    pub fn to_wire(self) -> u32 {
        match self {
            Self::Large => 0,
            Self::Medium => 1,
            Self::Small => 2,
            Self::ExtraSmall => 3,
        }
    }
}
