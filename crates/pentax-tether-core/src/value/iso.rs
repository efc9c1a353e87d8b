use garde::Validate;
use serde::{Deserialize, Serialize};

/// The camera's sensitivity configuration.
///
/// Sensitivity is either fixed to one value or left to the camera within an
/// auto range; the two are mutually exclusive on the wire, which is what
/// [`IsoSettings::is_valid`] checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Validate, Serialize, Deserialize)]
pub struct IsoSettings {
    /// Fixed sensitivity; zero when the camera selects automatically.
    #[garde(skip)]
    pub fixed: u32,
    /// Lower bound of the auto range; zero when sensitivity is fixed.
    #[garde(skip)]
    pub auto_min: u32,
    /// Upper bound of the auto range; zero when sensitivity is fixed.
    #[garde(custom(check_exclusive(&self)))]
    pub auto_max: u32,
}

impl IsoSettings {
    /// Fixed-sensitivity settings.
    pub fn fixed(value: u32) -> Self {
        Self { fixed: value, auto_min: 0, auto_max: 0 }
    }

    /// Auto-range settings.
    pub fn auto(min: u32, max: u32) -> Self {
        Self { fixed: 0, auto_min: min, auto_max: max }
    }

    /// Whether sensitivity is fixed rather than automatic.
    pub fn is_fixed(&self) -> bool {
        self.fixed > 0
    }

    /// Whether exactly one of the fixed value and an ordered auto range is
    /// present.
    pub fn is_valid(&self) -> bool {
        let auto_ok = self.auto_min > 0 && self.auto_max > 0 && self.auto_min <= self.auto_max;
        (self.fixed > 0) ^ auto_ok
    }
}

fn check_exclusive(settings: &IsoSettings) -> impl FnOnce(&u32, &()) -> garde::Result + '_ {
    |_, _| {
        if settings.is_valid() {
            Ok(())
        } else {
            Err(garde::Error::new(
                "either a fixed sensitivity or an ordered auto range must be set, not both",
            ))
        }
    }
}

#[cfg(test)]
mod tests;
