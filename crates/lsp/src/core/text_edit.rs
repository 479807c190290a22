use crate::core::rope::RopeExt;
use ropey::Rope;
use std::ops::Range;

/// One contiguous replacement between two snapshots.
///
/// Offsets are char (Unicode scalar value) indices into the old and new text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EditFragment {
    pub old: Range<usize>,
    pub new: Range<usize>,
}

impl EditFragment {
    pub fn new(old: Range<usize>, new: Range<usize>) -> Self {
        Self { old, new }
    }

    pub fn is_insertion(&self) -> bool {
        self.old.is_empty() && !self.new.is_empty()
    }

    pub fn is_deletion(&self) -> bool {
        !self.old.is_empty() && self.new.is_empty()
    }

    /// Renders the fragment as an LSP edit: the range is addressed in `old`, the
    /// replacement text is taken from `new`.
    pub fn to_text_edit(&self, old: &Rope, new: &Rope) -> lsp_types::TextEdit {
        let range = lsp_types::Range::new(
            old.char_to_lsp_position(self.old.start),
            old.char_to_lsp_position(self.old.end),
        );
        let new_text = new.slice(self.new.clone()).to_string();
        lsp_types::TextEdit { range, new_text }
    }
}
