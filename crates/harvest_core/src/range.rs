use std::fmt;

use crate::Snowflake;

/// Which end of a [`Range`] an anchor sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeEnd {
    Older,
    Newer,
}

impl fmt::Display for RangeEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeEnd::Older => write!(f, "older"),
            RangeEnd::Newer => write!(f, "newer"),
        }
    }
}

/// The two boundary ids exactly as the user supplied them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchors {
    pub start: Snowflake,
    pub end: Snowflake,
}

impl Anchors {
    pub fn new(start: Snowflake, end: Snowflake) -> Self {
        Self { start, end }
    }

    pub fn range(&self) -> Range {
        Range::between(self.start.clone(), self.end.clone())
    }
}

/// Inclusive id interval with `older <= newer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    older: Snowflake,
    newer: Snowflake,
}

impl Range {
    /// Orders the two ids; the arguments may come in either order.
    pub fn between(a: Snowflake, b: Snowflake) -> Self {
        if a <= b {
            Self { older: a, newer: b }
        } else {
            Self { older: b, newer: a }
        }
    }

    pub fn older(&self) -> &Snowflake {
        &self.older
    }

    pub fn newer(&self) -> &Snowflake {
        &self.newer
    }

    pub fn contains(&self, id: &Snowflake) -> bool {
        &self.older <= id && id <= &self.newer
    }

    pub fn end_of(&self, id: &Snowflake) -> RangeEnd {
        if id == &self.older {
            RangeEnd::Older
        } else {
            RangeEnd::Newer
        }
    }
}
