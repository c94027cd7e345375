//! Request parsing.
//!
//! Each protocol line is one request. Keyword matching always takes
//! precedence over sensor names, so a sensor called `monitors` or `quit`
//! is never selected by a value query.

/// Keyword that lists all sensors.
pub const MONITORS: &str = "monitors";

/// Keyword that ends the session.
pub const QUIT: &str = "quit";

/// Suffix selecting a sensor's metadata instead of its value.
pub const INFO_SUFFIX: char = '?';

/// A single parsed protocol line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    /// Blank line
    Empty,

    /// `monitors`
    Monitors,

    /// `quit`
    Quit,

    /// `<name>` - current value
    Value(&'a str),

    /// `<name>?` - description, range and unit
    Info(&'a str),
}

impl<'a> Request<'a> {
    /// Parses one line. Surrounding whitespace is ignored.
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();

        match line {
            "" => Self::Empty,
            MONITORS => Self::Monitors,
            QUIT => Self::Quit,
            _ => match line.strip_suffix(INFO_SUFFIX) {
                Some(name) => Self::Info(name),
                None => Self::Value(line),
            },
        }
    }
}
