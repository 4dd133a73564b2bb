/// Overlay/popup draw functions — instruction dialog and switch-file picker.
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};

use super::PromptDialog;
use super::render::truncate_path;
use crate::picker::{EntryKind, FileBrowser};

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect { x, y, width, height }
}

fn hint_line(pairs: &[(&'static str, &'static str)]) -> Line<'static> {
    let mut spans = vec![Span::raw("  ")];
    for (key, label) in pairs {
        spans.push(Span::styled(*key, Style::default().fg(Color::Cyan)));
        spans.push(Span::styled(format!(" {label}  "), Style::default().fg(Color::DarkGray)));
    }
    Line::from(spans)
}

// ── Instruction dialog ─────────────────────────────────────────────────────────

pub fn draw_prompt(f: &mut Frame, dialog: &PromptDialog, area: Rect) {
    let popup_area = centered(area, 72, 7);
    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(Span::styled(
            dialog.title(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(popup_area);
    f.render_widget(block, popup_area);

    let input_area = Rect {
        height: inner.height.saturating_sub(1),
        ..inner
    };
    let hint_area = Rect {
        y: inner.y + inner.height.saturating_sub(1),
        height: 1,
        ..inner
    };

    f.render_widget(&dialog.input, input_area);
    f.render_widget(
        Paragraph::new(hint_line(&[("Enter", "send"), ("Esc", "cancel")])),
        hint_area,
    );
}

// ── Switch-file picker ─────────────────────────────────────────────────────────

pub fn draw_picker(f: &mut Frame, browser: &FileBrowser, area: Rect) {
    let popup_area = centered(area, 64, 18);
    f.render_widget(Clear, popup_area);

    let items: Vec<ListItem<'static>> = browser
        .entries()
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let base = match entry.kind {
                EntryKind::Parent | EntryKind::Dir => Style::default().fg(Color::Blue),
                EntryKind::File => Style::default().fg(Color::White),
            };
            let style = if i == browser.selected {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                base
            };
            ListItem::new(Line::from(vec![Span::raw("  "), Span::styled(entry.label(), style)]))
        })
        .collect();

    let max_title = popup_area.width.saturating_sub(4) as usize;
    let title = format!(" {} ", truncate_path(&browser.dir().display().to_string(), max_title));

    let block = Block::default()
        .title(Span::styled(title, Style::default().fg(Color::White).add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let inner = block.inner(popup_area);
    f.render_widget(block, popup_area);

    let hint_area = Rect {
        y: inner.y + inner.height.saturating_sub(1),
        height: 1,
        ..inner
    };
    let list_area = Rect {
        height: inner.height.saturating_sub(1),
        ..inner
    };

    // Scroll list to keep selected in view
    let visible = list_area.height as usize;
    let skip = if visible > 0 && browser.selected >= visible {
        browser.selected - visible + 1
    } else {
        0
    };
    let sliced: Vec<ListItem<'static>> = items.into_iter().skip(skip).collect();
    f.render_widget(List::new(sliced), list_area);

    f.render_widget(
        Paragraph::new(hint_line(&[("↑↓", "navigate"), ("Enter", "open"), ("⌫", "up"), ("Esc", "cancel")])),
        hint_area,
    );
}
