use googletest::prelude::*;
use rstest::rstest;
use serde_test::Token;

use super::*;

#[googletest::test]
#[rstest]
#[case::half(URational::new(1, 2), 0.5)]
#[case::one_two_fifty(URational::new(1, 250), 0.004)]
#[case::whole(URational::new(8, 4), 2.0)]
#[case::zero_nominator(URational::new(0, 5), 0.0)]
fn test_unsigned_quotient(#[case] value: URational, #[case] expected: f64) {
    expect_that!(value.to_f64(), eq(expected));
}

#[googletest::test]
#[rstest]
#[case::negative(SRational::new(-3, 2), -1.5)]
#[case::negative_denominator(SRational::new(3, -2), -1.5)]
#[case::positive(SRational::new(5, 4), 1.25)]
fn test_signed_quotient(#[case] value: SRational, #[case] expected: f64) {
    expect_that!(value.to_f64(), eq(expected));
}

#[googletest::test]
fn test_invalid_sentinel() {
    expect_that!(URational::invalid().is_invalid(), is_true());
    expect_that!(URational::new(0, 0).is_invalid(), is_true());
    expect_that!(URational::new(1, 0).is_invalid(), is_false());
    expect_that!(URational::new(0, 1).is_invalid(), is_false());
    expect_that!(URational::invalid().to_f64().is_nan(), is_true());
}

#[googletest::test]
fn test_invalid_equality_short_circuit() {
    // Two invalid values are equal; that is the only equality a
    // zero-denominator value can pass.
    expect_that!(URational::new(0, 0), eq(URational::invalid()));
    expect_that!(SRational::new(0, 0), eq(SRational::invalid()));
}

#[googletest::test]
fn test_nan_quotient_is_unequal_to_itself() {
    let nan = URational::new(1, 0);
    expect_that!(nan == nan, is_false());
    expect_that!(nan == URational::invalid(), is_false());
    expect_that!(URational::invalid() == nan, is_false());
}

#[googletest::test]
#[rstest]
#[case::reduced_forms(URational::new(1, 2), URational::new(2, 4), true)]
#[case::different_values(URational::new(1, 2), URational::new(2, 3), false)]
#[case::zero_over_anything(URational::new(0, 5), URational::new(0, 3), true)]
#[case::same_pair(URational::new(30, 1), URational::new(30, 1), true)]
fn test_cross_multiplication_equality(
    #[case] a: URational,
    #[case] b: URational,
    #[case] expected: bool,
) {
    // a/b == c/d exactly when a*d == b*c for nonzero denominators; the
    // quotient comparison is exact for these values.
    expect_that!(a == b, eq(expected));
    expect_that!(b == a, eq(expected));
}

#[googletest::test]
fn test_signed_cross_multiplication() {
    expect_that!(SRational::new(-1, 2), eq(SRational::new(1, -2)));
    expect_that!(SRational::new(-1, 2), not(eq(SRational::new(1, 2))));
}

#[googletest::test]
fn test_display() {
    expect_that!(format!("{}", URational::new(1, 125)), eq("1/125"));
    expect_that!(format!("{}", SRational::new(-2, 3)), eq("-2/3"));
    expect_that!(format!("{}", URational::invalid()), eq("(invalid)"));
}

#[googletest::test]
fn test_serde() {
    serde_test::assert_tokens(
        &URational::new(1, 125),
        &[
            Token::Struct { name: "Rational", len: 2 },
            Token::Str("nom"),
            Token::U32(1),
            Token::Str("den"),
            Token::U32(125),
            Token::StructEnd,
        ],
    );
}
