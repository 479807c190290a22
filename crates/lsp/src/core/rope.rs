use anyhow::{anyhow, Result};
use ropey::Rope;
use std::ops::Range;

/// Conversions between rope offsets and LSP positions.
///
/// Positions use zero-based lines and UTF-16 code unit columns. Line breaks are
/// LF, CRLF and lone CR, matching the protocol; the crate builds ropey without
/// `unicode_lines` so its line index agrees.
pub trait RopeExt {
    fn char_to_lsp_position(&self, char_idx: usize) -> lsp_types::Position;
    fn lsp_position_to_char(&self, position: lsp_types::Position) -> Result<usize>;
    fn lsp_range_to_char_range(&self, range: lsp_types::Range) -> Result<Range<usize>>;
    fn apply_text_edit(&mut self, edit: &lsp_types::TextEdit) -> Result<()>;
    /// Applies edits whose ranges all address the current content.
    fn apply_text_edits(&mut self, edits: &[lsp_types::TextEdit]) -> Result<()>;
}

impl RopeExt for Rope {
    fn char_to_lsp_position(&self, char_idx: usize) -> lsp_types::Position {
        let line_idx = self.char_to_line(char_idx);

        let line_utf16_cu_idx = {
            let char_idx = self.line_to_char(line_idx);
            self.char_to_utf16_cu(char_idx)
        };

        let character_utf16_cu_idx = self.char_to_utf16_cu(char_idx);

        let line = line_idx;
        let character = character_utf16_cu_idx - line_utf16_cu_idx;

        lsp_types::Position::new(line as u32, character as u32)
    }

    fn lsp_position_to_char(&self, position: lsp_types::Position) -> Result<usize> {
        let line_idx = position.line as usize;
        if line_idx >= self.len_lines() {
            return Err(anyhow!(
                "line {} is out of bounds ({} lines)",
                position.line,
                self.len_lines()
            ));
        }

        let line_char_idx = self.line_to_char(line_idx);
        let line_utf16_cu_idx = self.char_to_utf16_cu(line_char_idx);
        let utf16_cu_idx = line_utf16_cu_idx + position.character as usize;
        if utf16_cu_idx > self.len_utf16_cu() {
            return Err(anyhow!(
                "character {} is out of bounds on line {}",
                position.character,
                position.line
            ));
        }

        Ok(self.utf16_cu_to_char(utf16_cu_idx))
    }

    fn lsp_range_to_char_range(&self, range: lsp_types::Range) -> Result<Range<usize>> {
        let start = self.lsp_position_to_char(range.start)?;
        let end = self.lsp_position_to_char(range.end)?;
        if end < start {
            return Err(anyhow!("range end precedes start: {:?}", range));
        }
        Ok(start..end)
    }

    fn apply_text_edit(&mut self, edit: &lsp_types::TextEdit) -> Result<()> {
        let range = self.lsp_range_to_char_range(edit.range)?;
        let start = range.start;
        self.remove(range);
        if !edit.new_text.is_empty() {
            self.insert(start, &edit.new_text);
        }
        Ok(())
    }

    fn apply_text_edits(&mut self, edits: &[lsp_types::TextEdit]) -> Result<()> {
        let mut resolved = edits
            .iter()
            .map(|edit| Ok((self.lsp_range_to_char_range(edit.range)?, edit.new_text.as_str())))
            .collect::<Result<Vec<_>>>()?;

        // Back to front so earlier offsets stay valid.
        resolved.sort_by_key(|(range, _)| (range.start, range.end));
        for pair in resolved.windows(2) {
            if pair[0].0.end > pair[1].0.start {
                return Err(anyhow!("overlapping edits at char {}", pair[1].0.start));
            }
        }
        for (range, text) in resolved.into_iter().rev() {
            let start = range.start;
            self.remove(range);
            if !text.is_empty() {
                self.insert(start, text);
            }
        }
        Ok(())
    }
}
