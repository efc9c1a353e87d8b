use googletest::prelude::*;
use rstest::rstest;
use stdext::function_name;
use testutil::*;

use super::*;

#[derive(Debug)]
struct CdbTestCase {
    cdb: Cdb,
    expected: &'static str,
}

static CDB_TEST_CASES: LazyTestCases<CdbTestCase> = test_case_map!(
    // full status read, no arguments
    "full_status",
    CdbTestCase { cdb: command_cdb(0x00, 0x08, 0), expected: "F0 24 00 08 00 00 00 00" },
    //
    // identify
    "identify",
    CdbTestCase { cdb: command_cdb(0x00, 0x04, 0), expected: "F0 24 00 04 00 00 00 00" },
    //
    // sensitivity write carries three argument words
    "set_iso",
    CdbTestCase { cdb: command_cdb(0x18, 0x15, 12), expected: "F0 24 18 15 0C 00 00 00" },
    //
    // argument announcement for two words
    "write_two_args",
    CdbTestCase { cdb: write_args_cdb(2), expected: "F0 4F 00 00 08 00 00 00" },
    //
    // argument announcement for four words
    "write_four_args",
    CdbTestCase { cdb: write_args_cdb(4), expected: "F0 4F 00 00 10 00 00 00" },
    //
    // reply frame poll
    "reply_status",
    CdbTestCase { cdb: REPLY_STATUS_CDB, expected: "F0 26 00 00 00 00 00 00" },
    //
    // pending result read
    "read_result",
    CdbTestCase { cdb: READ_RESULT_CDB, expected: "F0 49 FF FF 00 00 00 00" },
);

#[googletest::test]
#[rstest]
#[case::full_status(function_name!())]
#[case::identify(function_name!())]
#[case::set_iso(function_name!())]
#[case::write_two_args(function_name!())]
#[case::write_four_args(function_name!())]
#[case::reply_status(function_name!())]
#[case::read_result(function_name!())]
fn test_cdb_layout(#[case] test_function_name: &str) {
    let tc = CDB_TEST_CASES.get_test_case(test_function_name);
    expect_that!(tc.cdb.0.to_vec(), eq(from_hex(tc.expected)));
}

#[googletest::test]
fn test_encode_args_is_big_endian() {
    expect_that!(encode_args(&[0x0102_0304]), eq(from_hex("01 02 03 04")));
    expect_that!(
        encode_args(&[800, 0, 0]),
        eq(from_hex("00 00 03 20 00 00 00 00 00 00 00 00"))
    );
    expect_that!(encode_args(&[]), empty());
}

#[derive(Debug)]
struct ReplyFrameTestCase {
    input: &'static str,
    parsed: ReplyFrame,
}

static REPLY_FRAME_TEST_CASES: LazyTestCases<ReplyFrameTestCase> = test_case_map!(
    // 184-byte status block ready
    "status_ready",
    ReplyFrameTestCase {
        input: "B8 00 00 00 00 00 00 00",
        parsed: ReplyFrame { length: 0xb8, result: 0, busy: false },
    },
    //
    // camera still processing
    "busy",
    ReplyFrameTestCase {
        input: "00 00 00 00 00 00 00 01",
        parsed: ReplyFrame { length: 0, result: 0, busy: true },
    },
    //
    // command rejected
    "rejected",
    ReplyFrameTestCase {
        input: "00 00 00 00 00 00 2A 00",
        parsed: ReplyFrame { length: 0, result: 0x2a, busy: false },
    },
    //
    // 64 KiB download block announced
    "large_length",
    ReplyFrameTestCase {
        input: "00 00 01 00 00 00 00 00",
        parsed: ReplyFrame { length: 0x10000, result: 0, busy: false },
    },
);

#[googletest::test]
#[rstest]
#[case::status_ready(function_name!())]
#[case::busy(function_name!())]
#[case::rejected(function_name!())]
#[case::large_length(function_name!())]
fn test_reply_frame_round_trip(#[case] test_function_name: &str) {
    let tc = REPLY_FRAME_TEST_CASES.get_test_case(test_function_name);
    let raw: [u8; CDB_LEN] = from_hex(tc.input).try_into().unwrap();
    let parsed = ReplyFrame::parse(&raw);
    expect_that!(parsed, eq(tc.parsed));
    expect_that!(parsed.to_raw(), eq(raw));
}

#[googletest::test]
fn test_reply_frame_is_ok() {
    expect_that!(ReplyFrame { length: 0, result: 0, busy: false }.is_ok(), is_true());
    expect_that!(ReplyFrame { length: 0, result: 1, busy: false }.is_ok(), is_false());
    expect_that!(ReplyFrame { length: 0, result: 0, busy: true }.is_ok(), is_false());
}
