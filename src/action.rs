use std::fmt;

/// The four mutually exclusive things a user can ask the model to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    WholeDocumentUpdate,
    SelectionRewrite,
    ImageGeneration,
    PdfGeneration,
}

impl ActionKind {
    /// Whether the model returns a complete document (as opposed to a snippet).
    pub fn replaces_document(self) -> bool {
        !matches!(self, ActionKind::SelectionRewrite)
    }

    /// Prefix for user-facing failure messages.
    pub fn failure_prefix(self) -> &'static str {
        match self {
            ActionKind::WholeDocumentUpdate => "Failed to update presentation",
            ActionKind::SelectionRewrite => "Failed to modify selected code",
            ActionKind::ImageGeneration => "Failed to generate from image",
            ActionKind::PdfGeneration => "Failed to generate from PDF",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::WholeDocumentUpdate => "update",
            ActionKind::SelectionRewrite => "modify",
            ActionKind::ImageGeneration => "generate-image",
            ActionKind::PdfGeneration => "generate-pdf",
        };
        f.write_str(name)
    }
}

/// Single-flight state machine for the active action.
///
/// Only [`ActionState::try_start`] and [`ActionState::finish`] change it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActionState {
    #[default]
    Idle,
    Busy(ActionKind),
}

impl ActionState {
    /// `Idle -> Busy(kind)`. Returns `false` and changes nothing when already busy.
    pub fn try_start(&mut self, kind: ActionKind) -> bool {
        match self {
            ActionState::Idle => {
                *self = ActionState::Busy(kind);
                true
            }
            ActionState::Busy(active) => {
                tracing::debug!("Rejected {} while {} is in flight", kind, active);
                false
            }
        }
    }

    /// `Busy -> Idle`, unconditionally.
    pub fn finish(&mut self) {
        *self = ActionState::Idle;
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, ActionState::Busy(_))
    }

    pub fn active(&self) -> Option<ActionKind> {
        match self {
            ActionState::Idle => None,
            ActionState::Busy(kind) => Some(*kind),
        }
    }
}

/// Which input panel the user is working in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputMethod {
    #[default]
    Prompt,
    Image,
    Pdf,
}
