//! One-shot dump of all sensor readings.

use ksg_core::SensorSnapshot;

fn row(what: &str, now: &str, unit: &str, min: &str, max: &str, description: &str) -> String {
    format!("{what:>21} {now:<5} {unit:<5} {min:>5}-{max:<5} {description}\n")
}

/// Renders readings as a fixed-width table with a header row.
pub fn render_table(readings: &[SensorSnapshot]) -> String {
    let mut out = row("What", "Now", "Unit", "Min", "Max", "Description");
    for r in readings {
        out.push_str(&row(&r.name, &r.value, &r.unit, &r.min, &r.max, &r.description));
    }
    out
}

/// Renders readings as a pretty-printed JSON array.
pub fn render_json(readings: &[SensorSnapshot]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(readings)
}
