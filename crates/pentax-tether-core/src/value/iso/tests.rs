use garde::Validate;
use googletest::prelude::*;
use rstest::rstest;

use super::*;

#[googletest::test]
#[rstest]
#[case::fixed(IsoSettings::fixed(400), true)]
#[case::auto_range(IsoSettings::auto(100, 3200), true)]
#[case::single_value_auto_range(IsoSettings::auto(400, 400), true)]
#[case::nothing_set(IsoSettings::default(), false)]
#[case::both_set(IsoSettings { fixed: 400, auto_min: 100, auto_max: 3200 }, false)]
#[case::reversed_auto_range(IsoSettings::auto(3200, 100), false)]
#[case::half_open_auto_range(IsoSettings::auto(100, 0), false)]
fn test_validity(#[case] settings: IsoSettings, #[case] valid: bool) {
    expect_that!(settings.is_valid(), eq(valid));
    expect_that!(settings.validate().is_ok(), eq(valid));
}

#[googletest::test]
fn test_is_fixed() {
    expect_that!(IsoSettings::fixed(400).is_fixed(), is_true());
    expect_that!(IsoSettings::auto(100, 3200).is_fixed(), is_false());
}
