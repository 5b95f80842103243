use std::fmt;

/// What kind of enrichment fetch produced the text being cached (spec §4.3).
/// Each kind gets its own summarizer instruction template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Memory,
    Calendar,
    Lists,
    Conversation,
    Generic,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Memory => "memory",
            SourceKind::Calendar => "calendar",
            SourceKind::Lists => "lists",
            SourceKind::Conversation => "conversation",
            SourceKind::Generic => "generic",
        }
    }

    pub fn summarizer_instruction(self) -> &'static str {
        match self {
            SourceKind::Memory => {
                "Summarize these recalled facts in one or two sentences, preserving names and dates."
            }
            SourceKind::Calendar => "Summarize this schedule information concisely, keeping exact times.",
            SourceKind::Lists => "Summarize this list content concisely, preserving item names.",
            SourceKind::Conversation => "Summarize this conversation excerpt in one or two sentences.",
            SourceKind::Generic => "Summarize this content concisely.",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
