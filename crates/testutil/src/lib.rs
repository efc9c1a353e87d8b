//! Internal test helpers shared by the pentax-tether crates.
//!
//! The helpers here are only ever used from `#[cfg(test)]` modules.  The crate
//! mainly provides a small registry for table-driven test cases that are keyed
//! by the name of the [`rstest`](https://docs.rs/rstest) case that consumes
//! them, so that large fixture tables can live in one place while the
//! parameterized test functions stay short.

use std::sync::LazyLock;

/// Parse a human-readable hex fixture string (e.g. `"F0 24 00 08 00"`) into
/// bytes.  Whitespace is ignored; both upper- and lowercase digits work.
///
/// Panics on malformed input, since the input is always a test fixture
/// literal.
pub fn from_hex(hex: &str) -> Vec<u8> {
    let compact: String = hex.split_whitespace().collect();
    data_encoding::HEXLOWER_PERMISSIVE
        .decode(compact.as_bytes())
        .unwrap_or_else(|e| panic!("invalid hex fixture {hex:?}: {e}"))
}

/// A lazily-built, named test case table.
///
/// Build one with [`test_case_map!`] and look cases up with
/// [`LazyTestCases::get_test_case`], passing `stdext::function_name!()` from
/// inside the rstest case so the case name selects the fixture.
#[derive(Debug)]
pub struct LazyTestCases<T: 'static> {
    cases: LazyLock<Vec<(&'static str, T)>>,
}

impl<T> LazyTestCases<T> {
    /// Used by [`test_case_map!`]; not intended to be called directly.
    pub const fn new(init: fn() -> Vec<(&'static str, T)>) -> Self {
        Self { cases: LazyLock::new(init) }
    }

    /// Look up the test case matching the calling test function.
    ///
    /// `test_function_name` is expected to be the fully-qualified name of an
    /// rstest-generated case function, i.e. to end in
    /// `::case_<digits>_<case_name>`.  The `<case_name>` part selects the
    /// fixture.  Panics if the name cannot be parsed or the case is unknown,
    /// which catches typos between the case list and the fixture table.
    pub fn get_test_case(&self, test_function_name: &str) -> &T {
        let tail = test_function_name.rsplit("::").next().unwrap();
        let name = tail
            .strip_prefix("case_")
            .map(|rest| rest.trim_start_matches(|c: char| c.is_ascii_digit()))
            .and_then(|rest| rest.strip_prefix('_'))
            .unwrap_or(tail);
        self.cases
            .iter()
            .find(|(case_name, _)| *case_name == name)
            .map(|(_, case)| case)
            .unwrap_or_else(|| panic!("no test case named {name:?} (from {test_function_name:?})"))
    }

    /// All case names in declaration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.cases.iter().map(|(name, _)| *name).collect()
    }
}

/// Builds a [`LazyTestCases`] table from alternating name / value pairs:
///
/// ```ignore
/// static CASES: LazyTestCases<MyCase> = test_case_map!(
///     "basic_success", MyCase { .. },
///     "error_case", MyCase { .. },
/// );
/// ```
#[macro_export]
macro_rules! test_case_map {
    ($($name:literal, $value:expr),+ $(,)?) => {
        $crate::LazyTestCases::new(|| vec![$(($name, $value)),+])
    };
}
