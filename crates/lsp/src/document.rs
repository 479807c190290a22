use crate::core::rope::RopeExt;
use std::path::PathBuf;

/// Immutable text captured from a live document at one instant.
#[derive(Clone, Debug)]
pub struct TextSnapshot {
    /// The textual content at capture time.
    pub content: ropey::Rope,
    /// Path of the document the text was captured from.
    pub origin: PathBuf,
}

impl TextSnapshot {
    pub fn new(text: &str, origin: impl Into<PathBuf>) -> Self {
        Self {
            content: ropey::Rope::from_str(text),
            origin: origin.into(),
        }
    }

    /// Get the snapshot text as a single string.
    /// This allocates - prefer working with the rope directly when possible.
    pub fn text_string(&self) -> String {
        self.content.to_string()
    }

    #[inline]
    pub fn len_chars(&self) -> usize {
        self.content.len_chars()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.content.len_bytes() == 0
    }

    /// Position of a char offset in this snapshot.
    pub fn position_at(&self, char_idx: usize) -> lsp_types::Position {
        self.content.char_to_lsp_position(char_idx)
    }
}
