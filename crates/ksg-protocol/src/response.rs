//! Response line formatting.
//!
//! Responses are tab-separated fields terminated by a single newline.
//! There is no escaping apart from replacing tabs in descriptions.

use ksg_core::ValueType;

/// One line of the `monitors` listing: `<name>\t<type>\n`.
pub fn monitor_line(name: &str, value_type: ValueType) -> String {
    format!("{name}\t{value_type}\n")
}

/// Reply to a value query.
pub fn value_line(value: &str) -> String {
    format!("{value}\n")
}

/// Reply to an info query: `<desc>\t<min>\t<max>\t<units>\n`.
///
/// Tabs inside the description become single spaces so the field count
/// stays fixed.
pub fn info_line(description: &str, min: &str, max: &str, units: &str) -> String {
    let description = description.replace('\t', " ");
    format!("{description}\t{min}\t{max}\t{units}\n")
}
