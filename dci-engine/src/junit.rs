//! JUnit XML decoding into per-test durations

use dci_common::{test_identifier, TestDurations};
use tracing::error;

/// How a zero or missing `time` attribute is recorded.
///
/// Both conventions exist in synced data and both are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingDuration {
    /// Keep the test with an explicit empty value
    #[default]
    Empty,
    /// Leave the test out entirely
    Omit,
}

/// Decode a JUnit report into `{classname}/{name} -> duration`.
///
/// Never fails: malformed XML is logged and yields an empty mapping.
pub fn decode(junit: &str, missing: MissingDuration) -> TestDurations {
    match try_decode(junit, missing) {
        Ok(durations) => durations,
        Err(e) => {
            error!("XMLSyntaxError {}", e);
            TestDurations::new()
        }
    }
}

fn try_decode(junit: &str, missing: MissingDuration) -> Result<TestDurations, roxmltree::Error> {
    let doc = roxmltree::Document::parse(junit)?;
    let root = doc.root_element();
    let mut durations = TestDurations::new();

    // A bare <testsuite> document is its own single suite.
    let suites: Vec<roxmltree::Node> = if root.has_tag_name("testsuite") {
        vec![root]
    } else {
        root.children().filter(|n| n.has_tag_name("testsuite")).collect()
    };

    for suite in suites {
        for case in suite.children().filter(|n| n.has_tag_name("testcase")) {
            let (Some(classname), Some(name)) = (case.attribute("classname"), case.attribute("name")) else {
                continue;
            };
            let key = test_identifier(classname, name);
            match parse_time(case.attribute("time")) {
                Some(time) => {
                    durations.insert(key, Some(time));
                }
                None if missing == MissingDuration::Empty => {
                    durations.insert(key, None);
                }
                None => {}
            }
        }
    }
    Ok(durations)
}

/// Zero, absent and unparsable times all count as missing
fn parse_time(time: Option<&str>) -> Option<f64> {
    time.and_then(|t| t.trim().parse::<f64>().ok())
        .filter(|t| *t != 0.0)
}
