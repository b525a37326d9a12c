//! Tracks the user's selection in the editable view.
//!
//! The tracker only records what the view reports. Whether a selection is
//! usable for a rewrite is decided by the edit session.

use crate::document::slice_chars;

/// A captured, offset-addressed substring of the document.
///
/// Only meaningful against the document version it was captured from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Scroll position of a text surface, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollOffset {
    pub top: f64,
    pub left: f64,
}

/// Pieces of the current document needed to paint a passive highlight.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight<'a> {
    pub before: &'a str,
    pub selected: &'a str,
    pub after: &'a str,
    /// Where the overlay must be scrolled to line up with the input view.
    /// Only renderers that paint on a separate surface need it.
    pub scroll: ScrollOffset,
}

#[derive(Debug, Default)]
pub struct SelectionTracker {
    current: Option<Selection>,
    view_focused: bool,
    overlay_scroll: ScrollOffset,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a selection event from the view.
    ///
    /// `anchor` and `head` are char offsets in either order (backwards drags
    /// report `head < anchor`); both are clamped to the document. A collapsed
    /// range clears the selection.
    pub fn capture(&mut self, document: &str, anchor: usize, head: usize) -> Option<&Selection> {
        let len = document.chars().count();
        let (start, end) = if anchor <= head {
            (anchor, head)
        } else {
            (head, anchor)
        };
        let end = end.min(len);
        let start = start.min(end);

        if start == end {
            self.clear();
            return None;
        }

        let text = slice_chars(document, start, end)?.to_string();
        self.current = Some(Selection { text, start, end });
        self.current.as_ref()
    }

    pub fn current(&self) -> Option<&Selection> {
        self.current.as_ref()
    }

    pub fn clear(&mut self) {
        if self.current.take().is_some() {
            tracing::debug!("Selection cleared");
        }
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.view_focused = focused;
    }

    pub fn is_focused(&self) -> bool {
        self.view_focused
    }

    /// Follows the input view's scroll position so the overlay does not drift.
    pub fn sync_scroll(&mut self, offset: ScrollOffset) {
        self.overlay_scroll = offset;
    }

    /// Highlight to paint while the view is unfocused.
    ///
    /// Always sliced from the document passed in (the canonical one), never
    /// from the text captured with the selection. Offsets that outlived a
    /// shorter document are clamped.
    pub fn highlight<'a>(&self, document: &'a str) -> Option<Highlight<'a>> {
        if self.view_focused {
            return None;
        }
        let selection = self.current.as_ref()?;
        let len = document.chars().count();
        let end = selection.end.min(len);
        let start = selection.start.min(end);
        if start == end {
            return None;
        }

        Some(Highlight {
            before: slice_chars(document, 0, start)?,
            selected: slice_chars(document, start, end)?,
            after: slice_chars(document, end, len)?,
            scroll: self.overlay_scroll,
        })
    }
}
