use ratatui::{
    layout::Alignment,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};

use crate::views::{ChatTurn, Role};

use super::app::App;
use super::types::FocusedField;

pub fn create_header(app: &App) -> Paragraph<'static> {
    let header_text = vec![Line::from(vec![
        Span::raw("docchat "),
        Span::styled(
            app.server_url.clone(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(app.current_time.clone(), Style::default().fg(Color::Yellow)),
    ])];

    Paragraph::new(header_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue))
                .title(" Document Chat ")
                .title_alignment(Alignment::Center),
        )
        .alignment(Alignment::Center)
}

fn role_style(role: Role) -> Style {
    match role {
        Role::User => Style::default().fg(Color::Green),
        Role::Assistant => Style::default().fg(Color::Cyan),
    }
}

pub fn transcript_lines(turns: &[ChatTurn]) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    if turns.is_empty() {
        lines.push(Line::from(vec![Span::styled(
            "No messages yet. Type a question and press Enter.",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )]));
    }

    for turn in turns {
        let style = role_style(turn.role);
        lines.push(Line::from(vec![
            Span::styled(format!("{}: ", turn.role.label()), style.add_modifier(Modifier::BOLD)),
            Span::styled(
                turn.at.format("%H:%M").to_string(),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        for line in turn.text.lines() {
            lines.push(Line::from(line.to_string()));
        }
        lines.push(Line::from(""));
    }

    lines
}

/// Rows the paragraph takes up once ratatui wraps it to `width` columns.
/// Pass the paragraph before its block is attached.
pub fn wrapped_height(paragraph: &Paragraph<'_>, width: u16) -> u16 {
    let rows = paragraph.line_count(width.max(1));
    u16::try_from(rows).unwrap_or(u16::MAX)
}

/// Scroll position that keeps the newest turn on screen, minus whatever the
/// user has scrolled back.
pub fn scroll_for(total_rows: u16, visible_rows: u16, offset_from_bottom: u16) -> u16 {
    total_rows
        .saturating_sub(visible_rows)
        .saturating_sub(offset_from_bottom)
}

pub fn create_chat_view(app: &App, inner_width: u16, inner_height: u16) -> Paragraph<'static> {
    let turns = app.transcript.turns();
    let body = Paragraph::new(transcript_lines(&turns)).wrap(Wrap { trim: false });
    let scroll = scroll_for(
        wrapped_height(&body, inner_width),
        inner_height,
        app.transcript.offset_from_bottom(),
    );

    let title = if app.transcript.auto_scroll() {
        format!(" Chat ({} messages) ", turns.len())
    } else {
        format!(" Chat ({} messages, auto-scroll off) ", turns.len())
    };

    body.block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(Color::Gray)),
    )
    .scroll((scroll, 0))
}

pub fn create_documents_view(app: &App) -> List<'static> {
    let names = app.documents.names();
    let items: Vec<ListItem> = if names.is_empty() {
        vec![ListItem::new(Span::styled(
            "(none yet)",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))]
    } else {
        names
            .into_iter()
            .map(|name| ListItem::new(Line::from(vec![Span::raw("• "), Span::raw(name)])))
            .collect()
    };

    List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Processed Documents ")
            .border_style(Style::default().fg(Color::Magenta)),
    )
}

fn field_block(title: &'static str, focused: bool, enabled: bool) -> Block<'static> {
    let style = if !enabled {
        Style::default().fg(Color::DarkGray)
    } else if focused {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };

    Block::default().borders(Borders::ALL).title(title).border_style(style)
}

pub fn create_chat_input(app: &App) -> Paragraph<'static> {
    let input = &app.controller.session().chat_input;
    let enabled = input.is_enabled();
    let focused = matches!(app.focused(), FocusedField::Chat);

    let text = if enabled {
        let cursor = if focused { "_" } else { "" };
        format!("{}{}", input.value(), cursor)
    } else {
        "(waiting for reply)".to_string()
    };

    Paragraph::new(text)
        .style(if enabled {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray)
        })
        .block(field_block(" Message ", focused, enabled))
}

pub fn create_file_input(app: &App) -> Paragraph<'static> {
    let selector = &app.controller.session().file_selector;
    let focused = matches!(app.focused(), FocusedField::Files);
    let enabled = selector.is_enabled();
    let value = selector.value();

    let text = if !enabled {
        Line::from(Span::styled(
            format!("(uploading) {}", value),
            Style::default().fg(Color::DarkGray),
        ))
    } else if value.is_empty() && !focused {
        Line::from(Span::styled(
            "Tab here and type PDF paths to upload",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(format!("{}{}", value, if focused { "_" } else { "" }))
    };

    Paragraph::new(text).block(field_block(" Upload (paths) ", focused, enabled))
}

pub fn create_status_bar(app: &App) -> Paragraph<'static> {
    let mut spans = Vec::new();
    if app.is_loading() {
        spans.push(Span::styled(
            format!("{} working ", app.spinner()),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
    }
    spans.push(Span::raw(app.status_message.clone()));
    spans.push(Span::styled(
        "  | Tab switch  Ctrl+N new chat  Ctrl+R refresh  Ctrl+A auto-scroll  Esc quit",
        Style::default().fg(Color::DarkGray),
    ));

    Paragraph::new(Line::from(spans))
}
