/// Buffer editor — a thin adapter over `tui_textarea::TextArea`.
///
/// The widget addresses text as (row, col) in characters. Commands work in
/// flat character offsets over the joined text, where each line break counts
/// as one character. Everything here converts between the two.
///
/// The widget only ever holds bare lines. A CRLF file is remembered as such
/// and gets its `\r\n` back from `text()`, and inserted text has its CRLF
/// breaks folded so the buffer never mixes the two.
use std::ops::Range;

use ratatui::{
    style::{Color, Modifier, Style},
    widgets::{Block, Borders},
};
use tui_textarea::{CursorMove, TextArea};

pub struct BufferEditor {
    textarea: TextArea<'static>,
    line_ending: &'static str,
}

impl BufferEditor {
    pub fn new(text: &str) -> Self {
        Self {
            textarea: build_textarea(text),
            line_ending: line_ending_of(text),
        }
    }

    /// Full buffer text, lines joined with the file's own line ending.
    pub fn text(&self) -> String {
        self.textarea.lines().join(self.line_ending)
    }

    /// Replace the whole buffer. Undo history starts over.
    pub fn set_text(&mut self, text: &str) {
        self.textarea = build_textarea(text);
        self.line_ending = line_ending_of(text);
    }

    pub fn is_crlf(&self) -> bool {
        self.line_ending == "\r\n"
    }

    pub fn cursor_offset(&self) -> usize {
        let (row, col) = self.textarea.cursor();
        offset_of(self.textarea.lines(), row, col)
    }

    /// Active selection as `[start, end)`, or `None` when nothing is selected
    /// or the selection is empty.
    pub fn selection_range(&self) -> Option<Range<usize>> {
        let ((sr, sc), (er, ec)) = self.textarea.selection_range()?;
        let lines = self.textarea.lines();
        let range = offset_of(lines, sr, sc)..offset_of(lines, er, ec);
        (!range.is_empty()).then_some(range)
    }

    /// Text covered by `range` (character offsets, one per line break).
    pub fn slice(&self, range: Range<usize>) -> String {
        self.textarea
            .lines()
            .join("\n")
            .chars()
            .skip(range.start)
            .take(range.len())
            .collect()
    }

    /// Select `[start, end)` and leave the cursor at `end`.
    #[cfg(test)]
    pub fn select(&mut self, range: Range<usize>) {
        self.textarea.cancel_selection();
        self.move_to_offset(range.start);
        self.textarea.start_selection();
        self.move_to_offset(range.end);
    }

    pub fn clear_selection(&mut self) {
        self.textarea.cancel_selection();
    }

    pub fn move_to_offset(&mut self, offset: usize) {
        let (row, col) = position_of(self.textarea.lines(), offset);
        match (u16::try_from(row), u16::try_from(col)) {
            (Ok(r), Ok(c)) => self.textarea.move_cursor(CursorMove::Jump(r, c)),
            _ => {
                // Jump is u16-addressed; walk for very large buffers.
                self.textarea.move_cursor(CursorMove::Top);
                for _ in 0..row {
                    self.textarea.move_cursor(CursorMove::Down);
                }
                self.textarea.move_cursor(CursorMove::Head);
                for _ in 0..col {
                    self.textarea.move_cursor(CursorMove::Forward);
                }
            }
        }
    }

    /// Insert `text` at the cursor without removing anything.
    pub fn insert_at_cursor(&mut self, text: &str) {
        self.textarea.cancel_selection();
        self.textarea.insert_str(fold_breaks(text));
    }

    /// Delete exactly `range` and insert `text` at its start. The selection is
    /// cleared and the cursor ends up after the inserted text.
    pub fn replace_range(&mut self, range: Range<usize>, text: &str) {
        self.textarea.cancel_selection();
        self.move_to_offset(range.start);
        if !range.is_empty() {
            self.textarea.delete_str(range.len());
        }
        self.textarea.insert_str(fold_breaks(text));
    }

    /// Forward a raw key event to the widget (typing, movement, undo, ...).
    pub fn input(&mut self, key: crossterm::event::KeyEvent) -> bool {
        self.textarea.input(key)
    }

    pub fn undo(&mut self) -> bool {
        self.textarea.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.textarea.redo()
    }

    pub fn widget(&self) -> &TextArea<'static> {
        &self.textarea
    }

    /// (row, col) of the cursor, 1-based for display.
    pub fn cursor_position(&self) -> (usize, usize) {
        let (row, col) = self.textarea.cursor();
        (row + 1, col + 1)
    }

    pub fn line_count(&self) -> usize {
        self.textarea.lines().len()
    }
}

fn line_ending_of(text: &str) -> &'static str {
    if text.contains("\r\n") { "\r\n" } else { "\n" }
}

fn fold_breaks(text: &str) -> String {
    text.replace("\r\n", "\n")
}

fn build_textarea(text: &str) -> TextArea<'static> {
    let crlf = line_ending_of(text) == "\r\n";
    let lines: Vec<String> = text
        .split('\n')
        .map(|l| if crlf { l.strip_suffix('\r').unwrap_or(l) } else { l })
        .map(str::to_string)
        .collect();
    let mut textarea = TextArea::new(lines);
    textarea.set_block(Block::default().borders(Borders::NONE));
    textarea.set_cursor_line_style(Style::default());
    textarea.set_line_number_style(Style::default().fg(Color::DarkGray));
    textarea.set_selection_style(Style::default().fg(Color::Black).bg(Color::Cyan));
    textarea.set_cursor_style(Style::default().add_modifier(Modifier::REVERSED));
    textarea
}

// ── Offset math ───────────────────────────────────────────────────────────────

fn offset_of(lines: &[String], row: usize, col: usize) -> usize {
    let before: usize = lines.iter().take(row).map(|l| l.chars().count() + 1).sum();
    before + col
}

/// Inverse of `offset_of`. Offsets past the end clamp to the last position.
fn position_of(lines: &[String], offset: usize) -> (usize, usize) {
    let mut remaining = offset;
    for (row, line) in lines.iter().enumerate() {
        let len = line.chars().count();
        if remaining <= len {
            return (row, remaining);
        }
        remaining -= len + 1;
    }
    let last = lines.len().saturating_sub(1);
    (last, lines.get(last).map(|l| l.chars().count()).unwrap_or(0))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_roundtrip_keeps_trailing_newline() {
        let ed = BufferEditor::new("a\nb\n");
        assert_eq!(ed.text(), "a\nb\n");
        assert_eq!(ed.line_count(), 3);
    }

    #[test]
    fn test_offset_math() {
        let lines = vec!["ab".to_string(), "".to_string(), "cdé".to_string()];
        assert_eq!(offset_of(&lines, 0, 0), 0);
        assert_eq!(offset_of(&lines, 1, 0), 3);
        assert_eq!(offset_of(&lines, 2, 3), 7);
        for offset in 0..=7 {
            let (r, c) = position_of(&lines, offset);
            assert_eq!(offset_of(&lines, r, c), offset, "offset {offset}");
        }
        assert_eq!(position_of(&lines, 99), (2, 3));
    }

    #[test]
    fn test_select_and_slice() {
        let mut ed = BufferEditor::new("abcXYZdef");
        ed.select(3..6);
        assert_eq!(ed.selection_range(), Some(3..6));
        assert_eq!(ed.slice(3..6), "XYZ");
    }

    #[test]
    fn test_replace_range_single_line() {
        let mut ed = BufferEditor::new("abcXYZdef");
        ed.select(3..6);
        ed.replace_range(3..6, "123");
        assert_eq!(ed.text(), "abc123def");
        assert_eq!(ed.selection_range(), None);
        assert_eq!(ed.cursor_offset(), 6);
    }

    #[test]
    fn test_replace_range_across_lines() {
        let mut ed = BufferEditor::new("fn a() {\n    old();\n}\n");
        // "    old();" spans offsets 9..19
        assert_eq!(ed.slice(9..19), "    old();");
        ed.replace_range(9..19, "    new();\n    more();");
        assert_eq!(ed.text(), "fn a() {\n    new();\n    more();\n}\n");
    }

    #[test]
    fn test_replace_range_ignores_cursor_position() {
        // Cursor parked at the very start, before the selection
        let mut ed = BufferEditor::new("abcXYZdef");
        ed.move_to_offset(0);
        ed.replace_range(3..6, "1");
        assert_eq!(ed.text(), "abc1def");
    }

    #[test]
    fn test_insert_at_cursor() {
        let mut ed = BufferEditor::new("hello\nworld");
        ed.move_to_offset(6);
        ed.insert_at_cursor("big ");
        assert_eq!(ed.text(), "hello\nbig world");
    }

    #[test]
    fn test_undo_reverts_splice() {
        let mut ed = BufferEditor::new("abcXYZdef");
        ed.replace_range(3..6, "1");
        assert_eq!(ed.text(), "abc1def");
        while ed.undo() {}
        assert_eq!(ed.text(), "abcXYZdef");
        assert!(ed.redo());
    }

    #[test]
    fn test_crlf_buffer_keeps_crlf_after_splice() {
        let mut ed = BufferEditor::new("l1\r\nl2\r\nl3\r\nl4");
        assert!(ed.is_crlf());
        assert_eq!(ed.slice(3..8), "l2\nl3");
        ed.replace_range(3..8, "a\r\nb\tc");
        assert_eq!(ed.text(), "l1\r\na\r\nb\tc\r\nl4");
    }

    #[test]
    fn test_lf_buffer_folds_crlf_reply() {
        let mut ed = BufferEditor::new("l1\nl2\nl3\nl4");
        ed.replace_range(3..8, "a\r\nb\tc");
        assert_eq!(ed.text(), "l1\na\nb\tc\nl4");

        ed.move_to_offset(0);
        ed.insert_at_cursor("x\r\n");
        assert_eq!(ed.text(), "x\nl1\na\nb\tc\nl4");
    }

    #[test]
    fn test_set_text_picks_up_line_ending() {
        let mut ed = BufferEditor::new("a\nb");
        ed.set_text("c\r\nd\r\n");
        assert!(ed.is_crlf());
        assert_eq!(ed.line_count(), 3);
        assert_eq!(ed.text(), "c\r\nd\r\n");
    }

    #[test]
    fn test_set_text_resets_cursor() {
        let mut ed = BufferEditor::new("one");
        ed.move_to_offset(3);
        ed.set_text("two\nlines");
        assert_eq!(ed.text(), "two\nlines");
        assert_eq!(ed.cursor_offset(), 0);
    }
}
