//! Source locations attached to instructions.

/// The source span of an instruction.
///
/// Every field is optional: pre-3.11 tables carry only a start line, 3.11+
/// tables may mark an instruction as having no location at all, and column
/// information may be absent even when lines are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, serde::Serialize, serde::Deserialize)]
pub struct InstrLocation {
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
    pub start_col: Option<u32>,
    pub end_col: Option<u32>,
}

impl InstrLocation {
    /// A location with no information, the default for fresh instructions.
    pub const NONE: Self = Self {
        start_line: None,
        end_line: None,
        start_col: None,
        end_col: None,
    };

    /// A line-only location, as produced by `SetLineno` markers and the
    /// pre-3.11 tables.
    #[must_use]
    pub fn line(line: u32) -> Self {
        Self {
            start_line: Some(line),
            end_line: Some(line),
            start_col: None,
            end_col: None,
        }
    }

    /// A full span.
    #[must_use]
    pub fn span(start_line: u32, end_line: u32, start_col: u32, end_col: u32) -> Self {
        Self {
            start_line: Some(start_line),
            end_line: Some(end_line),
            start_col: Some(start_col),
            end_col: Some(end_col),
        }
    }

    /// Whether no field is set.
    #[must_use]
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}
