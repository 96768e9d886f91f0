use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use humansize::{format_size, DECIMAL};
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

use crate::keymap::{Action, Keymap};
use crate::labels::Label;
use crate::session::{Direction as FocusDirection, Session, UndoOutcome};
use crate::config::{MAX_GRID_SIZE, MIN_GRID_SIZE};

pub struct App {
    pub session: Session,
    pub keymap: Keymap,
    pub status_message: Option<String>,
    pub show_help: bool,
    pub should_quit: bool,
    pub groups_saved: usize,
    // Screen areas of the grid cells from the last draw, for mouse clicks
    cell_areas: Vec<Rect>,
}

impl App {
    pub fn new(session: Session, keymap: Keymap) -> Self {
        let status_message = if session.pending().is_empty() {
            Some("No images to review in this folder.".to_string())
        } else if session.already_recorded() > 0 {
            Some(format!(
                "Skipped {} image(s) saved in an earlier session.",
                session.already_recorded()
            ))
        } else if session.backup().has_history() {
            Some("This folder was reviewed before; its backup directory is not empty.".to_string())
        } else {
            None
        };
        Self {
            session,
            keymap,
            status_message,
            show_help: false,
            should_quit: false,
            groups_saved: 0,
            cell_areas: Vec::new(),
        }
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    pub fn on_key(&mut self, key_event: KeyEvent) {
        self.status_message = None; // Clear old status on new key press

        if key_event.code == KeyCode::Char('c') && key_event.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match self.keymap.action_for(key_event.code) {
            Some(action) => self.apply(action),
            None if self.show_help => self.show_help = false,
            None => log::trace!("Unbound key {:?}", key_event.code),
        }
    }

    pub fn on_mouse(&mut self, mouse_event: MouseEvent) {
        if mouse_event.kind != MouseEventKind::Down(MouseButton::Left) {
            return;
        }
        let (x, y) = (mouse_event.column, mouse_event.row);
        let hit = self.cell_areas.iter().position(|area| {
            x >= area.x && x < area.x + area.width && y >= area.y && y < area.y + area.height
        });
        if let Some(idx) = hit {
            self.status_message = None;
            if let Err(e) = self.session.toggle_cell(idx) {
                self.status_message = Some(e.to_string());
            }
        }
    }

    pub fn apply(&mut self, action: Action) {
        log::trace!("Applying action {:?}", action);
        let result = match action {
            Action::MoveLeft | Action::MoveRight | Action::MoveUp | Action::MoveDown => {
                let direction = match action {
                    Action::MoveLeft => FocusDirection::Left,
                    Action::MoveRight => FocusDirection::Right,
                    Action::MoveUp => FocusDirection::Up,
                    _ => FocusDirection::Down,
                };
                self.session.move_focus(direction);
                Ok(())
            }
            Action::ToggleMember => self.session.toggle_focused(),
            Action::Keep => self.session.label_focused(Label::Keep),
            Action::Delete => self.session.label_focused(Label::Delete),
            Action::SelectRows(rows) => {
                self.session.select_rows(rows as usize);
                Ok(())
            }
            Action::CompleteGroup => self.complete_group(),
            Action::Undo => self.undo(),
            Action::GridLarger => self.resize(1),
            Action::GridSmaller => self.resize(-1),
            Action::Help => {
                self.show_help = !self.show_help;
                Ok(())
            }
            Action::Quit => {
                self.should_quit = true;
                Ok(())
            }
        };
        if let Err(e) = result {
            log::debug!("Action {:?} failed: {}", action, e);
            self.status_message = Some(e.to_string());
        }
    }

    fn complete_group(&mut self) -> crate::error::Result<()> {
        let done = self.session.complete_group()?;
        self.groups_saved += 1;
        let prefix = if self.session.is_dry_run() { "[DRY RUN] " } else { "" };
        self.status_message = Some(format!(
            "{}Saved group {}: {} kept, {} moved to backup.",
            prefix,
            done.group_id,
            done.kept.len(),
            done.deleted.len()
        ));
        if !done.failed.is_empty() {
            let names: Vec<String> = done
                .failed
                .iter()
                .map(|(path, _)| path.file_name().unwrap_or_default().to_string_lossy().into_owned())
                .collect();
            self.status_message = Some(format!(
                "Saved group {}, but could not move {} to backup (see log).",
                done.group_id,
                names.join(", ")
            ));
        } else if self.session.pending().is_empty() {
            self.status_message = Some(format!("{}All images reviewed. Press q to quit.", prefix));
        }
        Ok(())
    }

    fn undo(&mut self) -> crate::error::Result<()> {
        let message = match self.session.undo()? {
            UndoOutcome::Relabeled { path, label } => format!(
                "Undo: {} is {} again.",
                path.file_name().unwrap_or_default().to_string_lossy(),
                label
            ),
            UndoOutcome::Restored(moved) => format!("Undo: restored {}.", moved.original.display()),
        };
        self.status_message = Some(message);
        Ok(())
    }

    fn resize(&mut self, delta: i32) -> crate::error::Result<()> {
        let size = (self.session.grid_size() as i32 + delta)
            .clamp(MIN_GRID_SIZE as i32, MAX_GRID_SIZE as i32) as usize;
        if size != self.session.grid_size() {
            self.session.set_grid_size(size)?;
            self.status_message = Some(format!("Grid is now {}x{}.", size, size));
        }
        Ok(())
    }
}

type TerminalBackend = CrosstermBackend<Stdout>;

/// Runs the review UI until the user quits and hands the session back.
pub fn run_tui_app(session: Session, keymap: Keymap) -> Result<Session> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(session, keymap);
    let res = run_main_loop(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        log::error!("TUI Error: {}", err);
        println!("Error in TUI: {}. Run with -vv for more details.", err);
    }

    log::info!("Review ended after {} saved group(s).", app.groups_saved);
    Ok(app.into_session())
}

fn run_main_loop(terminal: &mut Terminal<TerminalBackend>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            match event::read()? {
                CEvent::Key(key) if key.kind == KeyEventKind::Press => app.on_key(key),
                CEvent::Mouse(mouse) => app.on_mouse(mouse),
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn label_style(label: Option<Label>) -> Style {
    match label {
        Some(Label::Keep) => Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        Some(Label::Delete) => Style::default().fg(Color::Red).add_modifier(Modifier::CROSSED_OUT),
        Some(Label::Undecided) => Style::default().fg(Color::Cyan),
        None => Style::default(),
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn ui(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.size());

    // Progress header
    let session = &app.session;
    let title = format!(
        "{}{} ({}/{} done)",
        if session.is_dry_run() { "[DRY RUN] " } else { "" },
        session.directory().display(),
        session.completed(),
        session.loaded()
    );
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .gauge_style(Style::default().fg(Color::Green))
        .percent(session.progress_percent().round().clamp(0.0, 100.0) as u16);
    frame.render_widget(gauge, chunks[0]);

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)].as_ref())
        .split(chunks[1]);

    // Grid of pending images
    let n = session.grid_size();
    let grid_block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Images {}x{} (group: {})", n, n, session.group().len()));
    let grid_area = grid_block.inner(main_chunks[0]);
    frame.render_widget(grid_block, main_chunks[0]);

    let row_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, n as u32); n])
        .split(grid_area);
    let mut cell_areas = Vec::with_capacity(n * n);
    for row_area in row_areas.iter() {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, n as u32); n])
            .split(*row_area);
        cell_areas.extend(cols.iter().copied());
    }

    for (idx, image) in session.visible().iter().enumerate() {
        let Some(area) = cell_areas.get(idx).copied() else { break };
        let label = session.label_of(image);
        let is_focused = session.focus() == Some(idx);
        let border_style = if is_focused { Style::default().fg(Color::Yellow) } else { Style::default().fg(Color::White) };
        let marker = label.map(|l| l.marker()).unwrap_or("   ");

        let mut lines = vec![Line::from(Span::styled(format!("{} {}", marker, image.filename), label_style(label)))];
        if let Some(taken) = image.taken {
            lines.push(Line::from(Span::styled(taken.to_string(), Style::default().fg(Color::DarkGray))));
        }
        let cell = Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border_style)
                    .title(Span::styled(format!("{}", idx + 1), border_style)),
            );
        frame.render_widget(cell, area);
    }
    cell_areas.truncate(session.visible().len());

    // Details of the focused image
    let details: Vec<ListItem> = match session.focused_image() {
        Some(image) => {
            let label = session
                .label_of(image)
                .map(|l| l.to_string())
                .unwrap_or_else(|| "not in group".to_string());
            vec![
                ListItem::new(format!("File: {}", image.filename)),
                ListItem::new(format!("Size: {}", format_size(image.size, DECIMAL))),
                ListItem::new(format!("Modified: {}", image.modified.format("%Y-%m-%d %H:%M:%S"))),
                ListItem::new(format!(
                    "Taken: {}",
                    image.taken.map(|t| t.to_string()).unwrap_or_else(|| "unknown".to_string())
                )),
                ListItem::new(Line::from(Span::styled(format!("Label: {}", label), label_style(session.label_of(image))))),
                ListItem::new(""),
                ListItem::new(format!("Undecided in group: {}", session.group().undecided_count())),
                ListItem::new(format!("Remaining: {}", session.pending().len())),
                ListItem::new(format!("Undo available: {}", if session.can_undo() { "yes" } else { "no" })),
            ]
        }
        None => vec![ListItem::new("No image focused")],
    };
    let details_list = List::new(details).block(Block::default().borders(Borders::ALL).title("Focused image"));
    frame.render_widget(details_list, main_chunks[1]);

    // Status bar
    let status_text = app
        .status_message
        .clone()
        .unwrap_or_else(|| "?:help | Space:group | s:keep d:delete | C:save group | u:undo | q:quit".to_string());
    let status_bar = Paragraph::new(status_text)
        .style(Style::default().fg(Color::LightCyan))
        .alignment(Alignment::Left);
    frame.render_widget(status_bar, chunks[2]);

    if app.show_help {
        let area = centered_rect(60, 70, frame.size());
        let items: Vec<ListItem> = app
            .keymap
            .help_lines()
            .into_iter()
            .map(|(keys, description)| {
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{:<16}", keys), Style::default().fg(Color::Yellow)),
                    Span::raw(description),
                ]))
            })
            .collect();
        let help = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Keys (any other key closes)")
                .border_style(Style::default().fg(Color::Yellow)),
        );
        frame.render_widget(Clear, area);
        frame.render_widget(help, area);
    }

    app.cell_areas = cell_areas;
}
