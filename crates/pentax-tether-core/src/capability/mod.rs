//! The per-model capability catalogue.
//!
//! A [`CameraModel`] record describes everything about a body that the
//! session must not hard-code: focus point count and bit order, extended
//! sensitivity bounds, JPEG property level count, the limited-protocol flag
//! and the JPEG buffer-type resolution.  Records are plain data — the built-in
//! table covers the supported bodies, and embedders can load additional
//! records through serde — so supporting a new model is a data change, not a
//! code change.

use std::collections::HashMap;

use garde::Validate;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::proto::ops::buffer_type;

pub use afpoints::{decode_af_points, encode_af_points};

mod afpoints;

/// Fixed white-balance adjustment offset: raw wire values [0, 14] map to
/// user-visible [-7, +7] on every supported body.
pub const WB_ADJUST_OFFSET: i32 = 7;

/// Decodes a raw white-balance adjustment word to its user-visible value.
pub fn wb_adjust_from_wire(raw: u32) -> i32 {
    raw as i32 - WB_ADJUST_OFFSET
}

/// Encodes a user-visible white-balance adjustment to the raw wire word, if
/// it is within range.
pub fn wb_adjust_to_wire(value: i32) -> Option<u32> {
    ((-WB_ADJUST_OFFSET..=WB_ADJUST_OFFSET).contains(&value))
        .then(|| (value + WB_ADJUST_OFFSET) as u32)
}

/// Capability record of one camera body.
///
/// Populated from the catalogue on successful connect and valid until
/// disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Validate, Serialize, Deserialize)]
pub struct CameraModel {
    /// The wire model tag reported by the identify operation.
    #[garde(skip)]
    pub id: u32,
    /// Human-readable model name.
    #[garde(length(min = 1))]
    pub name: String,
    /// Number of autofocus points; determines the wire bit order.
    #[garde(custom(check_af_point_count))]
    pub af_point_count: u32,
    /// Lowest sensitivity reachable with the extended range enabled.
    #[garde(range(min = 1))]
    pub extended_iso_min: u32,
    /// Highest sensitivity reachable with the extended range enabled.
    #[garde(custom(check_iso_range(&self)))]
    pub extended_iso_max: u32,
    /// Number of discrete levels the JPEG tone properties take.  Always odd:
    /// the middle level is the neutral setting.
    #[garde(custom(check_odd_levels))]
    pub jpeg_property_levels: u32,
    /// Best JPEG quality of the body, as a star count.
    #[garde(range(min = 1, max = 4))]
    pub max_jpeg_stars: u32,
    /// Whether the body speaks the limited protocol variant that cannot
    /// report buffer allocation after a shot.
    #[garde(skip)]
    pub limited_model: bool,
}

impl CameraModel {
    /// The JPEG tone property offset: user-visible signed values are stored
    /// on the wire as `offset + value`.
    pub fn jpeg_property_offset(&self) -> i32 {
        (self.jpeg_property_levels as i32 - 1) / 2
    }

    /// Inclusive user-visible limits of the JPEG tone properties.
    pub fn jpeg_property_limits(&self) -> (i32, i32) {
        let offset = self.jpeg_property_offset();
        (-offset, offset)
    }

    /// Decodes a raw JPEG tone word to its user-visible value.
    pub fn jpeg_property_from_wire(&self, raw: u32) -> i32 {
        raw as i32 - self.jpeg_property_offset()
    }

    /// Encodes a user-visible JPEG tone value to the raw wire word, if it is
    /// within the model's limits.
    pub fn jpeg_property_to_wire(&self, value: i32) -> Option<u32> {
        let (min, max) = self.jpeg_property_limits();
        ((min..=max).contains(&value)).then(|| (value + self.jpeg_property_offset()) as u32)
    }

    /// Resolves the wire buffer type serving a JPEG of the given quality.
    ///
    /// The camera exposes its best JPEG at [`buffer_type::JPEG_BASE`] and
    /// each lower quality at the next value; star counts outside the model's
    /// range clamp to it.
    pub fn jpeg_buffer_type(&self, stars: u32) -> u32 {
        let stars = stars.clamp(1, self.max_jpeg_stars);
        buffer_type::JPEG_BASE + (self.max_jpeg_stars - stars)
    }

    /// Decodes a wire autofocus bitmap using this model's bit order.
    pub fn decode_af_points(&self, mask: u32) -> Vec<u32> {
        decode_af_points(mask, self.af_point_count)
    }

    /// Encodes row-major autofocus indices using this model's bit order.
    pub fn encode_af_points(&self, indices: &[u32]) -> u32 {
        encode_af_points(indices, self.af_point_count)
    }
}

fn check_af_point_count(count: &u32, _ctx: &()) -> garde::Result {
    match *count {
        11 | 27 => Ok(()),
        other => Err(garde::Error::new(format!(
            "{other} autofocus points is not a known sensor layout (expected 11 or 27)"
        ))),
    }
}

fn check_iso_range(model: &CameraModel) -> impl FnOnce(&u32, &()) -> garde::Result + '_ {
    |max, _ctx| {
        if *max >= model.extended_iso_min {
            Ok(())
        } else {
            Err(garde::Error::new(format!(
                "extended sensitivity range [{}, {max}] is reversed",
                model.extended_iso_min
            )))
        }
    }
}

fn check_odd_levels(levels: &u32, _ctx: &()) -> garde::Result {
    if *levels % 2 == 1 {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "{levels} JPEG property levels has no neutral middle level (count must be odd)"
        )))
    }
}

/// Error type for building a [`Catalogue`].
#[derive(Debug, Snafu)]
pub struct CatalogueError(InnerCatalogueError);

#[derive(Debug, Snafu)]
enum InnerCatalogueError {
    #[snafu(display("capability record for {name:?} failed validation"))]
    InvalidModel { name: String, source: garde::Report },

    #[snafu(display("two capability records share the model tag {id:#x}"))]
    DuplicateId { id: u32 },
}

/// The capability table, keyed by wire model tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<CameraModel>", into = "Vec<CameraModel>")]
pub struct Catalogue {
    models: HashMap<u32, CameraModel>,
}

impl Catalogue {
    /// Builds a catalogue from capability records, validating each.
    pub fn new(records: impl IntoIterator<Item = CameraModel>) -> Result<Self, CatalogueError> {
        let mut models = HashMap::new();
        for record in records {
            record
                .validate()
                .with_context(|_| InvalidModelSnafu { name: record.name.clone() })?;
            let id = record.id;
            if models.insert(id, record).is_some() {
                return Err(DuplicateIdSnafu { id }.build().into());
            }
        }
        Ok(Self { models })
    }

    /// The built-in table of supported bodies.
    pub fn builtin() -> Self {
        Self::new(builtin_models()).expect("built-in capability table is valid")
    }

    /// Looks up the capability record for a wire model tag.
    pub fn lookup(&self, id: u32) -> Option<&CameraModel> {
        self.models.get(&id)
    }

    /// All records, in unspecified order.
    pub fn models(&self) -> impl Iterator<Item = &CameraModel> {
        self.models.values()
    }
}

impl TryFrom<Vec<CameraModel>> for Catalogue {
    type Error = CatalogueError;

    fn try_from(records: Vec<CameraModel>) -> Result<Self, Self::Error> {
        Self::new(records)
    }
}

impl From<Catalogue> for Vec<CameraModel> {
    fn from(catalogue: Catalogue) -> Self {
        catalogue.models.into_values().collect()
    }
}

fn builtin_models() -> Vec<CameraModel> {
    // Vendor data.  Tags are the identify words the bodies report.
    vec![
        CameraModel {
            id: 0x12aa2,
            name: "*ist DS".into(),
            af_point_count: 11,
            extended_iso_min: 200,
            extended_iso_max: 3200,
            jpeg_property_levels: 5,
            max_jpeg_stars: 3,
            limited_model: true,
        },
        CameraModel {
            id: 0x12c1e,
            name: "K10D".into(),
            af_point_count: 11,
            extended_iso_min: 100,
            extended_iso_max: 1600,
            jpeg_property_levels: 5,
            max_jpeg_stars: 4,
            limited_model: false,
        },
        CameraModel {
            id: 0x12cd2,
            name: "K20D".into(),
            af_point_count: 11,
            extended_iso_min: 100,
            extended_iso_max: 6400,
            jpeg_property_levels: 5,
            max_jpeg_stars: 4,
            limited_model: false,
        },
        CameraModel {
            id: 0x12db8,
            name: "K-7".into(),
            af_point_count: 11,
            extended_iso_min: 100,
            extended_iso_max: 6400,
            jpeg_property_levels: 9,
            max_jpeg_stars: 4,
            limited_model: false,
        },
        CameraModel {
            id: 0x12e6d,
            name: "K-5".into(),
            af_point_count: 11,
            extended_iso_min: 80,
            extended_iso_max: 51200,
            jpeg_property_levels: 9,
            max_jpeg_stars: 4,
            limited_model: false,
        },
        CameraModel {
            id: 0x12f52,
            name: "K-x".into(),
            af_point_count: 11,
            extended_iso_min: 100,
            extended_iso_max: 12800,
            jpeg_property_levels: 9,
            max_jpeg_stars: 4,
            limited_model: false,
        },
        CameraModel {
            id: 0x12f71,
            name: "K-r".into(),
            af_point_count: 11,
            extended_iso_min: 100,
            extended_iso_max: 25600,
            jpeg_property_levels: 9,
            max_jpeg_stars: 4,
            limited_model: false,
        },
        CameraModel {
            id: 0x12fc0,
            name: "K-3".into(),
            af_point_count: 27,
            extended_iso_min: 100,
            extended_iso_max: 51200,
            jpeg_property_levels: 9,
            max_jpeg_stars: 4,
            limited_model: false,
        },
        CameraModel {
            id: 0x13222,
            name: "K-70".into(),
            af_point_count: 27,
            extended_iso_min: 100,
            extended_iso_max: 102400,
            jpeg_property_levels: 9,
            max_jpeg_stars: 4,
            limited_model: false,
        },
    ]
}
