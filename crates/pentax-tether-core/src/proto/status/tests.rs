use googletest::prelude::*;

use super::*;
use crate::testutil::StatusFixture;
use crate::value::{
    AfPointSelection, AutoFocusMode, ExposureMode, FlashMode, Rational, WhiteBalanceMode,
};

#[googletest::test]
fn test_decode_default_fixture() {
    let snapshot = decode_status(&StatusFixture::default().encode(), 27).unwrap();

    expect_that!(snapshot.buffer_mask, eq(0b0001));
    expect_that!(snapshot.exposure_mode, eq(ExposureMode::Manual));
    expect_that!(snapshot.af_mode, eq(AutoFocusMode::Single));
    expect_that!(snapshot.af_point_selection, eq(AfPointSelection::Select1));
    expect_that!(snapshot.current_iso, eq(400));
    expect_that!(snapshot.fixed_iso, eq(400));
    expect_that!(snapshot.current_aperture, eq(Rational::new(40, 10)));
    expect_that!(snapshot.current_shutter, eq(Rational::new(1, 125)));
    expect_that!(snapshot.exposure_compensation, eq(Rational::new(0, 3)));
    expect_that!(snapshot.white_balance, eq(WhiteBalanceMode::Auto));
    expect_that!(snapshot.flash_mode, eq(FlashMode::Auto));
    expect_that!(snapshot.zoom, eq(Rational::new(50, 1)));
    expect_that!(snapshot.jpeg_quality, eq(4));
    expect_that!(snapshot.lens_id, eq((4, 250)));
    expect_that!(snapshot.battery, eq([780, 0, 0, 0]));
    expect_that!(snapshot.shake_reduction, is_true());
}

#[googletest::test]
fn test_unknown_ordinals_decode_to_invalid() {
    let mut fixture = StatusFixture::default();
    fixture.exposure_mode = 99;
    fixture.white_balance = 200;
    fixture.flash_mode = u32::MAX;
    fixture.release_mode = 17;

    let snapshot = decode_status(&fixture.encode(), 27).unwrap();
    expect_that!(snapshot.exposure_mode, eq(ExposureMode::Invalid));
    expect_that!(snapshot.white_balance, eq(WhiteBalanceMode::Invalid));
    expect_that!(snapshot.flash_mode, eq(FlashMode::Invalid));
    expect_that!(snapshot.release_mode, eq(crate::value::ReleaseMode::Invalid));
}

#[googletest::test]
fn test_af_point_selection_uses_model_table() {
    let mut fixture = StatusFixture::default();
    fixture.af_point_selection = 0;

    // Wire value 0 means auto-5 on an 11-point body and spot on a 27-point
    // body.
    let eleven = decode_status(&fixture.encode(), 11).unwrap();
    expect_that!(eleven.af_point_selection, eq(AfPointSelection::Auto5));
    let twenty_seven = decode_status(&fixture.encode(), 27).unwrap();
    expect_that!(twenty_seven.af_point_selection, eq(AfPointSelection::Spot));
}

#[googletest::test]
fn test_signed_fields() {
    let mut fixture = StatusFixture::default();
    fixture.ec = ((-2i32) as u32, 3);
    fixture.flash_ec = (-256i32) as u32;

    let snapshot = decode_status(&fixture.encode(), 27).unwrap();
    expect_that!(snapshot.exposure_compensation, eq(Rational::new(-2, 3)));
    expect_that!(snapshot.flash_exposure_compensation, eq(-256));
}

#[googletest::test]
fn test_truncated_buffer_is_rejected() {
    let err = decode_status(&[0u8; 16], 27).unwrap_err();
    expect_that!(
        err.to_string(),
        contains_substring("status block of 16 bytes is shorter than")
    );
}

#[googletest::test]
fn test_snapshot_debug_output_names_fields() {
    let snapshot = decode_status(&StatusFixture::default().encode(), 27).unwrap();
    expect_that!(format!("{snapshot:?}"), contains_substring("current_iso: 400"));
}
