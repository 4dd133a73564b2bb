/// Main draw function and status/message lines.
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use unicode_width::UnicodeWidthStr;

use super::{AppState, Mode, overlays};

pub const SPINNER_GLYPHS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_MSGS: &[&str] = &["asking the model…", "waiting for a reply…", "still working…"];

pub fn spinner_frame(tick: u32) -> (&'static str, &'static str) {
    let glyph = SPINNER_GLYPHS[(tick as usize) % SPINNER_GLYPHS.len()];
    // Message cycles more slowly — changes every ~2 seconds (120ms × 16 ticks)
    let msg = SPINNER_MSGS[(tick as usize / 16) % SPINNER_MSGS.len()];
    (glyph, msg)
}

/// Keep the tail of `path` so it fits in `max` display columns.
pub fn truncate_path(path: &str, max: usize) -> String {
    if path.width() <= max {
        return path.to_string();
    }
    let budget = max.saturating_sub(1);
    let mut kept = Vec::new();
    let mut used = 0;
    for c in path.chars().rev() {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        kept.push(c);
    }
    let tail: String = kept.into_iter().rev().collect();
    format!("…{tail}")
}

// ── Top-level draw ─────────────────────────────────────────────────────────────

pub fn draw(f: &mut Frame, state: &AppState) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // buffer
            Constraint::Length(1), // status bar
            Constraint::Length(1), // message line
        ])
        .split(area);

    f.render_widget(state.controller.editor.widget(), chunks[0]);
    draw_status_bar(f, state, chunks[1]);
    draw_message(f, state, chunks[2]);

    match &state.mode {
        Mode::Prompt(dialog) => overlays::draw_prompt(f, dialog, chunks[0]),
        Mode::Picker(browser) => overlays::draw_picker(f, browser, chunks[0]),
        Mode::Editing | Mode::Waiting => {}
    }
}

fn draw_status_bar(f: &mut Frame, state: &AppState, area: Rect) {
    let (glyph, glyph_color) = if matches!(state.mode, Mode::Waiting) {
        (SPINNER_GLYPHS[(state.spinner_tick as usize) % SPINNER_GLYPHS.len()], Color::Cyan)
    } else {
        ("▲", Color::White)
    };

    let editor = &state.controller.editor;
    let (row, col) = editor.cursor_position();
    let eol = if editor.is_crlf() { "  CRLF" } else { "" };
    let position = format!("  Ln {row}/{}, Col {col}{eol}", editor.line_count());
    let selection = match editor.selection_range() {
        Some(range) => format!("  ({} selected)", range.len()),
        None => String::new(),
    };
    let turns = match state.controller.conversation() {
        Some(conv) => format!("{} turns · ", conv.log().len()),
        None => String::new(),
    };
    let right = format!("{turns}{} · {} ", state.profile, state.model);

    let fixed = 12 + position.width() + selection.width() + right.width();
    let path_room = (area.width as usize).saturating_sub(fixed).max(8);
    let path = truncate_path(&state.controller.active_path().display().to_string(), path_room);

    let used = 3 + path.width() + position.width() + selection.width();
    let pad = (area.width as usize).saturating_sub(used + right.width());

    let line = Line::from(vec![
        Span::raw(" "),
        Span::styled(glyph, Style::default().fg(glyph_color).add_modifier(Modifier::BOLD)),
        Span::raw(" "),
        Span::styled(path, Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::styled(position, Style::default().fg(Color::DarkGray)),
        Span::styled(selection, Style::default().fg(Color::Cyan)),
        Span::raw(" ".repeat(pad)),
        Span::styled(right, Style::default().fg(Color::DarkGray)),
    ]);

    f.render_widget(
        Paragraph::new(line).style(Style::default().bg(Color::Rgb(30, 30, 40))),
        area,
    );
}

fn draw_message(f: &mut Frame, state: &AppState, area: Rect) {
    let line = if matches!(state.mode, Mode::Waiting) {
        let (glyph, msg) = spinner_frame(state.spinner_tick);
        Line::from(vec![
            Span::styled(format!(" {glyph} "), Style::default().fg(Color::Cyan)),
            Span::styled(msg, Style::default().fg(Color::Cyan)),
            Span::styled("   Ctrl+Q quit", Style::default().fg(Color::DarkGray)),
        ])
    } else if let Some(status) = &state.status {
        let style = if status.error {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Green)
        };
        Line::from(Span::styled(format!(" {}", status.text), style))
    } else {
        Line::from(Span::raw(""))
    };
    f.render_widget(Paragraph::new(line), area);
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_path_short_unchanged() {
        assert_eq!(truncate_path("/tmp/a.py", 20), "/tmp/a.py");
    }

    #[test]
    fn test_truncate_path_keeps_tail() {
        let out = truncate_path("/home/user/projects/demo/main.py", 12);
        assert_eq!(out, "…emo/main.py");
        assert!(out.width() <= 12);
    }

    #[test]
    fn test_truncate_path_wide_chars() {
        let out = truncate_path("/data/日本語/ファイル.py", 10);
        assert!(out.starts_with('…'));
        assert!(out.width() <= 10);
        assert!(out.ends_with(".py"));
    }

    #[test]
    fn test_spinner_frame_cycles() {
        assert_eq!(spinner_frame(0).0, "⠋");
        assert_eq!(spinner_frame(10).0, "⠋");
        assert_ne!(spinner_frame(0).1, spinner_frame(16).1);
    }
}
