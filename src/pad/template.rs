//! Pad directions and templates.

use crate::caps::Caps;

/// Direction of a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadDirection {
    /// Direction not known; such a pad can neither push nor receive.
    Unknown,
    /// Source pad: data leaves the node here.
    Src,
    /// Sink pad: data enters the node here.
    Sink,
}

impl PadDirection {
    /// The opposite direction. `Unknown` stays `Unknown`.
    pub fn opposite(self) -> Self {
        match self {
            PadDirection::Src => PadDirection::Sink,
            PadDirection::Sink => PadDirection::Src,
            PadDirection::Unknown => PadDirection::Unknown,
        }
    }
}

/// Whether a pad is always present or created dynamically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadPresence {
    /// Pad is always present on the node.
    Always,
    /// Pad appears depending on the stream (e.g. demuxer outputs).
    Sometimes,
    /// Pad is created when requested.
    Request,
}

/// Template describing pads a node can have.
///
/// The template's caps bound what a pad created from it may carry: caps
/// events that are not a subset are refused.
#[derive(Debug, Clone)]
pub struct PadTemplate {
    /// Name pattern (e.g. `"src"`, `"src_%u"`).
    pub name_template: String,
    /// Direction of pads created from this template.
    pub direction: PadDirection,
    /// Presence of pads created from this template.
    pub presence: PadPresence,
    /// Caps pads created from this template may carry.
    pub caps: Caps,
}

impl PadTemplate {
    /// Create a new pad template.
    pub fn new(
        name_template: impl Into<String>,
        direction: PadDirection,
        presence: PadPresence,
        caps: Caps,
    ) -> Self {
        Self {
            name_template: name_template.into(),
            direction,
            presence,
            caps,
        }
    }

    /// Template for an always-present source pad.
    pub fn src(name_template: impl Into<String>, caps: Caps) -> Self {
        Self::new(name_template, PadDirection::Src, PadPresence::Always, caps)
    }

    /// Template for an always-present sink pad.
    pub fn sink(name_template: impl Into<String>, caps: Caps) -> Self {
        Self::new(name_template, PadDirection::Sink, PadPresence::Always, caps)
    }

    /// Template for a sometimes-present source pad.
    pub fn sometimes_src(name_template: impl Into<String>, caps: Caps) -> Self {
        Self::new(name_template, PadDirection::Src, PadPresence::Sometimes, caps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_helpers() {
        let t = PadTemplate::sometimes_src("src_%u", Caps::any());
        assert_eq!(t.direction, PadDirection::Src);
        assert_eq!(t.presence, PadPresence::Sometimes);
        assert_eq!(PadDirection::Src.opposite(), PadDirection::Sink);
        assert_eq!(PadDirection::Unknown.opposite(), PadDirection::Unknown);
    }
}
