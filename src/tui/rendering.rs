use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    Frame, Terminal,
};
use tokio::sync::mpsc;

use super::app::App;
use super::types::AppMessage;
use super::widgets;

pub async fn run_tui(mut app: App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut rx = app.rx.take().context("TUI message receiver already taken")?;

    let res = run_app(&mut terminal, &mut app, &mut rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: &mut mpsc::UnboundedReceiver<AppMessage>,
) -> Result<()> {
    loop {
        if app.should_quit {
            return Ok(());
        }

        app.update_time();
        app.tick_spinner();

        terminal.draw(|f| ui(f, app))?;

        // Flow results first, then keyboard input
        while let Ok(msg) = rx.try_recv() {
            app.handle_message(msg);
        }

        // Poll without blocking the runtime threads the flows run on
        let ready = tokio::task::block_in_place(|| event::poll(Duration::from_millis(100)))?;
        if ready {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(5),    // Chat + documents
            Constraint::Length(3), // Message input
            Constraint::Length(3), // Upload input
            Constraint::Length(1), // Status
        ])
        .split(f.area());

    f.render_widget(widgets::create_header(app), rows[0]);

    let body = if app.show_documents {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(72), Constraint::Percentage(28)])
            .split(rows[1])
    } else {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(100)])
            .split(rows[1])
    };

    let chat_area = body[0];
    let inner_width = chat_area.width.saturating_sub(2);
    let inner_height = chat_area.height.saturating_sub(2);
    f.render_widget(widgets::create_chat_view(app, inner_width, inner_height), chat_area);

    if app.show_documents {
        f.render_widget(widgets::create_documents_view(app), body[1]);
    }

    f.render_widget(widgets::create_chat_input(app), rows[2]);
    f.render_widget(widgets::create_file_input(app), rows[3]);
    f.render_widget(widgets::create_status_bar(app), rows[4]);
}
