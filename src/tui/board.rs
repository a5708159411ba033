//! Kanban board interface.
//!
//! Tasks of the active project are shown in five lanes (or as a sortable list). Cards
//! move between lanes by keyboard (pick up with Space, drop on the selected lane) or by
//! mouse (press on a card, drag, release over a lane). Every move goes through the
//! board engine, which asks the task store to change the status.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table, Wrap},
    Frame, Terminal,
};

use crate::board::{default_resolver, Board, BoardEngine, ContainerMetadata, DragState, DropEvent, DropOutcome, LANES};
use crate::db::{format_due_relative, format_minutes, format_relative_time, truncate, user_label, Database};
use crate::error::{AppError, Result};
use crate::fields::{AssigneeFilter, Choice, SortKey, TaskPriority, TaskStatus, ViewMode};
use crate::filter::{filter_tasks, sort_tasks, TaskFilter};
use crate::project::{Project, User};
use crate::store::{StoreContext, TaskStore};
use crate::task::Task;
use crate::tui::colors::{priority_color, status_color, text_on, CARD_BG};
use crate::tui::enums::AppState;
use crate::tui::input::InputField;
use crate::tui::task_form::{self, TaskForm};
use crate::tui::utils::{centered_rect, wrap_words};

const CARD_HEIGHT: u16 = 5;

const SORT_KEYS: [SortKey; 5] = [SortKey::Updated, SortKey::Created, SortKey::Priority, SortKey::Due, SortKey::Title];

/// Board application state.
pub struct BoardApp {
    db: Database,
    db_path: Option<PathBuf>,
    store: TaskStore,
    project: Project,
    filter: TaskFilter,
    view: ViewMode,
    sort: SortKey,
    engine: BoardEngine,
    state: AppState,
    selected_column: usize,
    selected_card: usize,
    selected_row: usize,
    query: InputField,
    comment: InputField,
    form: Option<TaskForm>,
    detail_task: Option<String>,
    /// Card under the mouse button, before the pointer has moved.
    pressed_card: Option<String>,
    status_message: String,
    lane_bounds: Vec<(TaskStatus, Rect)>,
    card_bounds: Vec<(String, Rect)>,
    quit: bool,
}

impl BoardApp {
    /// Open the board of `context.project_id`. With `db_path` set, every change is saved.
    pub fn new(db: Database, db_path: Option<PathBuf>, context: StoreContext, view: ViewMode) -> Result<Self> {
        let project = db
            .project(&context.project_id)
            .cloned()
            .ok_or_else(|| AppError::UnknownProject(context.project_id.clone()))?;
        let store = TaskStore::new(db.tasks.clone()).with_context(context);
        Ok(BoardApp {
            filter: TaskFilter::for_project(project.id.clone()),
            db,
            db_path,
            store,
            project,
            view,
            sort: SortKey::Updated,
            engine: BoardEngine::new(),
            state: AppState::Board,
            selected_column: 0,
            selected_card: 0,
            selected_row: 0,
            query: InputField::new(),
            comment: InputField::new(),
            form: None,
            detail_task: None,
            pressed_card: None,
            status_message: String::new(),
            lane_bounds: Vec::new(),
            card_bounds: Vec::new(),
            quit: false,
        })
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    fn visible(&self) -> Vec<&Task> {
        filter_tasks(self.store.tasks(), &self.filter)
    }

    fn list_rows(&self) -> Vec<&Task> {
        let mut rows = self.visible();
        sort_tasks(&mut rows, self.sort);
        rows
    }

    fn selected_status(&self) -> TaskStatus {
        LANES[self.selected_column.min(LANES.len() - 1)].status
    }

    fn selected_task_id(&self) -> Option<String> {
        match self.view {
            ViewMode::Board => Board::partition(self.visible())
                .lane(self.selected_status())
                .get(self.selected_card)
                .map(|t| t.id.clone()),
            ViewMode::List => self.list_rows().get(self.selected_row).map(|t| t.id.clone()),
        }
    }

    fn clamp_selection(&mut self) {
        let lane_len = Board::partition(self.visible()).lane(self.selected_status()).len();
        self.selected_card = self.selected_card.min(lane_len.saturating_sub(1));
        let rows = self.visible().len();
        self.selected_row = self.selected_row.min(rows.saturating_sub(1));
    }

    /// Put the selection on `task_id` if it is visible.
    fn select_task(&mut self, task_id: &str) {
        if let Some((status, row)) = Board::partition(self.visible()).locate(task_id) {
            self.selected_column = status.index();
            self.selected_card = row;
        }
        if let Some(row) = self.list_rows().iter().position(|t| t.id == task_id) {
            self.selected_row = row;
        }
    }

    fn task_key(&self, task: &Task) -> String {
        task.display_key(&self.project.key)
    }

    fn members(&self) -> Vec<&User> {
        self.project.members.iter().filter_map(|id| self.db.user(id)).collect()
    }

    /// Write the store back to disk.
    fn persist(&mut self) {
        self.db.tasks = self.store.tasks().to_vec();
        if let Some(path) = &self.db_path {
            if let Err(e) = self.db.save(path) {
                tracing::error!(path = %path.display(), error = %e, "failed to save database");
                self.status_message = format!("Error saving: {e}");
            }
        }
    }

    fn apply_drop(&mut self, outcome: DropOutcome) {
        match outcome {
            DropOutcome::Moved { task_id, from, to } => {
                self.persist();
                let key = self.store.get(&task_id).map(|t| self.task_key(t)).unwrap_or_default();
                self.status_message = if from == to {
                    format!("{key} stays in {}", to.label())
                } else {
                    format!("Moved {key} to {}", to.label())
                };
                self.selected_column = to.index();
                self.select_task(&task_id);
                self.clamp_selection();
            }
            DropOutcome::NoTarget { .. } => {
                self.status_message = "Dropped outside the board; nothing changed".to_string();
            }
            DropOutcome::Missing { .. } => {
                self.status_message = "That task no longer exists".to_string();
                self.clamp_selection();
            }
            DropOutcome::NotDragging => {}
        }
    }

    fn pick_up_selected(&mut self) {
        let Some(task) = self.selected_task_id().and_then(|id| self.store.get(&id).cloned()) else {
            self.status_message = "No task selected".to_string();
            return;
        };
        self.engine.start_drag(&task);
        self.status_message = format!(
            "Moving {}: choose a lane with ←/→, Space to drop, Esc to cancel",
            self.task_key(&task)
        );
    }

    fn drop_on_selected_lane(&mut self) {
        let event = DropEvent::on_container(self.selected_status());
        let outcome = self.engine.end_drag(&event, &ContainerMetadata, &mut self.store);
        self.apply_drop(outcome);
    }

    /// Move the selected task one lane left or right.
    fn shift_selected(&mut self, right: bool) {
        let Some(task) = self.selected_task_id().and_then(|id| self.store.get(&id).cloned()) else {
            return;
        };
        let target = if right { task.status.next() } else { task.status.previous() };
        let Some(target) = target else {
            return;
        };
        self.engine.start_drag(&task);
        let outcome = self
            .engine
            .end_drag(&DropEvent::on_container(target), &ContainerMetadata, &mut self.store);
        self.apply_drop(outcome);
    }

    fn open_form(&mut self) {
        self.form = Some(TaskForm::new(&self.members()));
        self.state = AppState::AddTask;
    }

    fn submit_form(&mut self) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        let input = match form.to_new_task(Local::now().date_naive()) {
            Ok(input) => input,
            Err(e) => {
                form.error = Some(e.to_string());
                return;
            }
        };
        match self.store.create_task(input) {
            Ok(task) => {
                self.form = None;
                self.state = AppState::Board;
                self.persist();
                self.status_message = format!("Created {}", self.task_key(&task));
                self.select_task(&task.id);
            }
            Err(e) => {
                if let Some(form) = self.form.as_mut() {
                    form.error = Some(e.to_string());
                }
            }
        }
    }

    fn submit_comment(&mut self) {
        let Some(task_id) = self.detail_task.clone() else {
            self.state = AppState::Board;
            return;
        };
        match self.store.add_comment(&task_id, &self.comment.value) {
            Ok(Some(_)) => {
                self.comment.clear();
                self.state = AppState::TaskDetail;
                self.persist();
                self.status_message = "Comment added".to_string();
            }
            Ok(None) => {
                self.state = AppState::Board;
                self.status_message = "Task no longer exists".to_string();
            }
            Err(e) => self.status_message = e.to_string(),
        }
    }

    fn cycle_assignee(&mut self) {
        let ids = self.project.members.clone();
        self.filter.assignee = self.filter.assignee.cycle(&ids);
    }

    fn after_filter_change(&mut self) {
        self.clamp_selection();
        self.status_message = format!("Filter: {} ({} tasks shown)", self.filter.describe(), self.visible().len());
    }

    /// Process one key press.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        match self.state {
            AppState::Query => self.handle_query_key(key),
            AppState::AddTask => self.handle_form_key(key),
            AppState::TaskDetail => match key.code {
                KeyCode::Char('c') => {
                    self.comment.clear();
                    self.comment.active = true;
                    self.state = AppState::Comment;
                }
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => {
                    self.detail_task = None;
                    self.state = AppState::Board;
                }
                _ => {}
            },
            AppState::Comment => match key.code {
                KeyCode::Esc => self.state = AppState::TaskDetail,
                KeyCode::Enter => self.submit_comment(),
                KeyCode::Backspace => self.comment.handle_backspace(),
                KeyCode::Delete => self.comment.handle_delete(),
                KeyCode::Left => self.comment.move_cursor_left(),
                KeyCode::Right => self.comment.move_cursor_right(),
                KeyCode::Home => self.comment.move_home(),
                KeyCode::End => self.comment.move_end(),
                KeyCode::Char(c) => self.comment.handle_char(c),
                _ => {}
            },
            AppState::Help => self.state = AppState::Board,
            AppState::Board => self.handle_board_key(key),
        }
    }

    fn handle_query_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.query.clear();
                self.query.active = false;
                self.filter.query.clear();
                self.state = AppState::Board;
                self.after_filter_change();
            }
            KeyCode::Enter => {
                self.query.active = false;
                self.state = AppState::Board;
                self.after_filter_change();
            }
            KeyCode::Backspace => {
                self.query.handle_backspace();
                self.filter.query = self.query.value.clone();
                self.clamp_selection();
            }
            KeyCode::Delete => {
                self.query.handle_delete();
                self.filter.query = self.query.value.clone();
                self.clamp_selection();
            }
            KeyCode::Left => self.query.move_cursor_left(),
            KeyCode::Right => self.query.move_cursor_right(),
            KeyCode::Home => self.query.move_home(),
            KeyCode::End => self.query.move_end(),
            KeyCode::Char(c) => {
                self.query.handle_char(c);
                self.filter.query = self.query.value.clone();
                self.clamp_selection();
            }
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc {
            self.form = None;
            self.state = AppState::Board;
            return;
        }
        if key.code == KeyCode::Enter {
            self.submit_form();
            return;
        }
        let Some(form) = self.form.as_mut() else {
            self.state = AppState::Board;
            return;
        };
        match key.code {
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            KeyCode::Left => form.handle_left_right(false),
            KeyCode::Right => form.handle_left_right(true),
            KeyCode::Backspace => form.handle_backspace(),
            KeyCode::Char(c) => form.handle_char(c),
            _ => {}
        }
    }

    fn handle_board_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        self.status_message.clear();

        if self.engine.is_dragging() {
            match key.code {
                KeyCode::Esc => {
                    self.engine.cancel_drag();
                    self.status_message = "Move cancelled".to_string();
                }
                KeyCode::Left => self.selected_column = self.selected_column.saturating_sub(1),
                KeyCode::Right => self.selected_column = (self.selected_column + 1).min(LANES.len() - 1),
                KeyCode::Char(' ') | KeyCode::Enter => self.drop_on_selected_lane(),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('c') if ctrl => self.quit = true,
            KeyCode::Char('q') | KeyCode::Esc => self.quit = true,

            KeyCode::Left if ctrl => self.shift_selected(false),
            KeyCode::Right if ctrl => self.shift_selected(true),

            KeyCode::Left => {
                self.selected_column = self.selected_column.saturating_sub(1);
                self.clamp_selection();
            }
            KeyCode::Right => {
                self.selected_column = (self.selected_column + 1).min(LANES.len() - 1);
                self.clamp_selection();
            }
            KeyCode::Up => match self.view {
                ViewMode::Board => self.selected_card = self.selected_card.saturating_sub(1),
                ViewMode::List => self.selected_row = self.selected_row.saturating_sub(1),
            },
            KeyCode::Down => {
                match self.view {
                    ViewMode::Board => self.selected_card += 1,
                    ViewMode::List => self.selected_row += 1,
                }
                self.clamp_selection();
            }

            KeyCode::Char(' ') => match self.view {
                ViewMode::Board => self.pick_up_selected(),
                ViewMode::List => {
                    self.status_message = "Switch to the board (v) to move cards, or use Ctrl+←/→".to_string();
                }
            },
            KeyCode::Enter => {
                if let Some(id) = self.selected_task_id() {
                    self.detail_task = Some(id);
                    self.state = AppState::TaskDetail;
                }
            }
            KeyCode::Char('n') => self.open_form(),
            KeyCode::Char('/') => {
                self.query = InputField::with_value(&self.filter.query);
                self.query.active = true;
                self.state = AppState::Query;
            }
            KeyCode::Char('s') => {
                self.filter.status = self.filter.status.cycle(&TaskStatus::ALL);
                self.after_filter_change();
            }
            KeyCode::Char('p') => {
                self.filter.priority = self.filter.priority.cycle(&TaskPriority::ALL);
                self.after_filter_change();
            }
            KeyCode::Char('a') => {
                self.cycle_assignee();
                self.after_filter_change();
            }
            KeyCode::Char('x') => {
                self.filter.clear();
                self.query.clear();
                self.after_filter_change();
            }
            KeyCode::Char('v') => {
                self.view = self.view.toggled();
                self.clamp_selection();
            }
            KeyCode::Char('o') => {
                let i = SORT_KEYS.iter().position(|k| *k == self.sort).unwrap_or(0);
                self.sort = SORT_KEYS[(i + 1) % SORT_KEYS.len()];
                self.status_message = format!("Sorted by {:?}", self.sort).to_lowercase();
            }
            KeyCode::Char('?') | KeyCode::Char('h') => self.state = AppState::Help,
            _ => {}
        }
    }

    /// Process one mouse event. Card and lane positions come from the last render.
    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.state != AppState::Board || self.view != ViewMode::Board {
            return;
        }
        let pointer = Position::new(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let card = self
                    .card_bounds
                    .iter()
                    .find(|(_, rect)| rect.contains(pointer))
                    .map(|(id, _)| id.clone());
                if let Some(id) = &card {
                    self.select_task(id);
                } else if let Some((status, _)) = self.lane_bounds.iter().find(|(_, rect)| rect.contains(pointer)) {
                    self.selected_column = status.index();
                    self.clamp_selection();
                }
                self.pressed_card = card;
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if self.engine.is_dragging() {
                    return;
                }
                if let Some(task) = self.pressed_card.take().and_then(|id| self.store.get(&id).cloned()) {
                    self.engine.start_drag(&task);
                    self.status_message = format!("Dragging {}", self.task_key(&task));
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                self.pressed_card = None;
                if self.engine.is_dragging() {
                    let resolver = default_resolver(self.lane_bounds.clone());
                    let outcome = self.engine.end_drag(&DropEvent::at(mouse.column, mouse.row), &resolver, &mut self.store);
                    self.apply_drop(outcome);
                }
            }
            _ => {}
        }
    }

    /// Draw the whole screen and record lane and card positions for hit testing.
    pub fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Length(1), // Toolbar
                Constraint::Min(0),    // Board or list
                Constraint::Length(1), // Status bar
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);
        self.render_toolbar(f, chunks[1]);
        match self.view {
            ViewMode::Board => {
                let (lanes, cards) = self.render_board(f, chunks[2]);
                self.lane_bounds = lanes;
                self.card_bounds = cards;
            }
            ViewMode::List => {
                self.render_list(f, chunks[2]);
                self.lane_bounds.clear();
                self.card_bounds.clear();
            }
        }
        self.render_status_bar(f, chunks[3]);

        match self.state {
            AppState::TaskDetail | AppState::Comment => self.render_detail_popup(f),
            AppState::AddTask => self.render_form_popup(f),
            AppState::Help => self.render_help_popup(f),
            AppState::Board | AppState::Query => {}
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let user = self
            .store
            .context()
            .map(|c| user_label(&self.db, Some(&c.user_id)))
            .unwrap_or_default();
        let view = match self.view {
            ViewMode::Board => "Board",
            ViewMode::List => "List",
        };
        let header = Paragraph::new(Line::from(vec![
            Span::styled("TASKBOARD", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(
                format!("{} ({})  View: {}  Signed in as {}", self.project.name, self.project.key, view, user),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
            ),
        ]))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
        f.render_widget(header, area);
    }

    fn render_toolbar(&self, f: &mut Frame, area: Rect) {
        let status = match self.filter.status {
            Choice::All => "All",
            Choice::Exactly(s) => s.label(),
        };
        let priority = match self.filter.priority {
            Choice::All => "All",
            Choice::Exactly(p) => p.label(),
        };
        let assignee = match &self.filter.assignee {
            AssigneeFilter::All => "All".to_string(),
            AssigneeFilter::Unassigned => "Unassigned".to_string(),
            AssigneeFilter::User(id) => user_label(&self.db, Some(id)),
        };
        let query = if self.state == AppState::Query {
            self.query.display()
        } else if self.filter.query.is_empty() {
            "-".to_string()
        } else {
            self.filter.query.clone()
        };
        let mut spans = vec![
            Span::styled(" Status ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("{status}  ")),
            Span::styled("Priority ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("{priority}  ")),
            Span::styled("Assignee ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("{assignee}  ")),
            Span::styled("Search ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(query),
        ];
        if self.view == ViewMode::List {
            spans.push(Span::styled("  Sort ", Style::default().add_modifier(Modifier::BOLD)));
            spans.push(Span::raw(format!("{:?}", self.sort).to_lowercase()));
        }
        f.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_board(&self, f: &mut Frame, area: Rect) -> (Vec<(TaskStatus, Rect)>, Vec<(String, Rect)>) {
        let visible = self.visible();
        let board = Board::partition(visible);
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 5); 5])
            .split(area);

        let mut lanes = Vec::with_capacity(LANES.len());
        let mut cards = Vec::new();
        for (i, ((lane, tasks), &column)) in board.iter().zip(columns.iter()).enumerate() {
            lanes.push((lane.status, column));
            let is_selected = i == self.selected_column;
            let color = status_color(lane.status);
            let border_style = if is_selected {
                Style::default().fg(color).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let title = if is_selected && self.engine.is_dragging() {
                format!("▶ {} ({}) ◀", lane.title, tasks.len())
            } else {
                format!("{} ({})", lane.title, tasks.len())
            };
            let block = Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(border_style);
            let inner = block.inner(column);
            f.render_widget(block, column);

            let visible_cards = (inner.height / CARD_HEIGHT) as usize;
            let offset = if is_selected && visible_cards > 0 && self.selected_card >= visible_cards {
                self.selected_card + 1 - visible_cards
            } else {
                0
            };
            for (row, task) in tasks.iter().enumerate().skip(offset).take(visible_cards) {
                let card_area = Rect {
                    x: inner.x,
                    y: inner.y + ((row - offset) as u16) * CARD_HEIGHT,
                    width: inner.width,
                    height: CARD_HEIGHT,
                };
                let selected = is_selected && row == self.selected_card;
                self.render_card(f, card_area, task, selected);
                cards.push((task.id.clone(), card_area));
            }

            let remaining = tasks.len().saturating_sub(offset + visible_cards);
            if remaining > 0 && inner.height > 0 {
                let indicator = Paragraph::new(format!("▼ +{remaining} below")).style(Style::default().fg(Color::Cyan));
                f.render_widget(indicator, Rect { y: inner.bottom() - 1, height: 1, ..inner });
            }
        }
        (lanes, cards)
    }

    fn render_card(&self, f: &mut Frame, area: Rect, task: &Task, is_selected: bool) {
        let dragged = self.engine.dragged_task() == Some(task.id.as_str());
        let accent = status_color(task.status);
        let style = if dragged {
            Style::default().bg(Color::Yellow).fg(Color::Black).add_modifier(Modifier::BOLD)
        } else if is_selected {
            Style::default().bg(accent).fg(text_on(accent)).add_modifier(Modifier::BOLD)
        } else {
            Style::default().bg(CARD_BG)
        };

        let width = area.width.saturating_sub(2) as usize;
        let mut lines = vec![Line::from(vec![
            Span::raw(self.task_key(task)),
            Span::raw(" "),
            Span::styled(task.priority.label(), Style::default().fg(priority_color(task.priority))),
        ])];
        for line in wrap_words(&task.title, width, 1) {
            lines.push(Line::from(truncate(&line, width)));
        }
        let assignee = task
            .assignee_id
            .as_deref()
            .and_then(|id| self.db.user(id))
            .map_or_else(|| "--".to_string(), User::initials);
        let due = match task.due_date {
            Some(_) => format_due_relative(task.due_date, Local::now().date_naive()),
            None => String::new(),
        };
        lines.push(Line::from(format!("{assignee}  {due}")));

        let card = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL))
            .style(style);
        f.render_widget(card, area);
    }

    fn render_list(&self, f: &mut Frame, area: Rect) {
        let now = Utc::now();
        let today = Local::now().date_naive();
        let rows: Vec<Row> = self
            .list_rows()
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let style = if i == self.selected_row {
                    Style::default().bg(status_color(t.status)).fg(text_on(status_color(t.status)))
                } else {
                    Style::default()
                };
                Row::new(vec![
                    self.task_key(t),
                    t.title.clone(),
                    t.status.label().to_string(),
                    t.priority.label().to_string(),
                    user_label(&self.db, t.assignee_id.as_deref()),
                    format_due_relative(t.due_date, today),
                    format_relative_time(t.updated_at, now),
                ])
                .style(style)
            })
            .collect();
        let widths = [
            Constraint::Length(14),
            Constraint::Min(20),
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Length(16),
            Constraint::Length(10),
            Constraint::Length(10),
        ];
        let table = Table::new(rows, widths)
            .header(
                Row::new(vec!["Key", "Title", "Status", "Priority", "Assignee", "Due", "Updated"])
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .block(Block::default().borders(Borders::ALL).title("Tasks"));
        f.render_widget(table, area);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let text = if self.state == AppState::Query {
            "Search: type to filter title/description, Enter to apply, Esc to clear".to_string()
        } else if !self.status_message.is_empty() {
            self.status_message.clone()
        } else if let DragState::Dragging { task_id, origin } = self.engine.state() {
            let key = self.store.get(task_id).map(|t| self.task_key(t)).unwrap_or_default();
            format!("Moving {key} from {}: Space to drop, Esc to cancel", origin.label())
        } else {
            format!(
                "Tasks: {} | Space: Move | Enter: Details | n: New | /: Search | s/p/a: Filters | x: Clear | v: View | ?: Help",
                self.visible().len()
            )
        };
        let bg = status_color(self.selected_status());
        f.render_widget(Paragraph::new(text).style(Style::default().bg(bg).fg(text_on(bg))), area);
    }

    fn render_detail_popup(&self, f: &mut Frame) {
        let Some(task) = self.detail_task.as_deref().and_then(|id| self.store.get(id)) else {
            return;
        };
        let area = centered_rect(80, 80, f.area());
        f.render_widget(Clear, area);

        let now = Utc::now();
        let today = Local::now().date_naive();
        let mut lines = vec![
            Line::from(Span::styled(
                format!("{}: {}", self.task_key(task), task.title),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(format!("Status:    {}", task.status.label())),
            Line::from(format!("Priority:  {}", task.priority.label())),
            Line::from(format!("Assignee:  {}", user_label(&self.db, task.assignee_id.as_deref()))),
            Line::from(format!("Reporter:  {}", user_label(&self.db, Some(&task.reporter_id)))),
            Line::from(format!("Tags:      {}", if task.tags.is_empty() { "-".to_string() } else { task.tags.join(", ") })),
            Line::from(format!(
                "Due:       {}",
                match task.due_date {
                    Some(d) => format!("{d} ({})", format_due_relative(Some(d), today)),
                    None => "-".to_string(),
                }
            )),
            Line::from(format!(
                "Time:      {} estimated, {} spent",
                format_minutes(task.time_estimate),
                format_minutes(task.time_spent)
            )),
            Line::from(format!("Created:   {}", format_relative_time(task.created_at, now))),
            Line::from(format!("Updated:   {}", format_relative_time(task.updated_at, now))),
            Line::from(""),
            Line::from(if task.description.is_empty() { "-".to_string() } else { task.description.clone() }),
            Line::from(""),
            Line::from(Span::styled(
                format!("Comments ({})", task.comments.len()),
                Style::default().add_modifier(Modifier::BOLD),
            )),
        ];
        for comment in &task.comments {
            lines.push(Line::from(Span::styled(
                format!(
                    "{} · {}",
                    user_label(&self.db, Some(&comment.author_id)),
                    format_relative_time(comment.created_at, now)
                ),
                Style::default().fg(Color::Cyan),
            )));
            lines.push(Line::from(format!("  {}", comment.content)));
        }
        if self.state == AppState::Comment {
            lines.push(Line::from(""));
            lines.push(Line::from(format!("> {}", self.comment.display())));
        }

        let title = if self.state == AppState::Comment {
            "Add comment (Enter to post, Esc to cancel)"
        } else {
            "Task details (c: Comment, Esc: Close)"
        };
        let popup = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .title_alignment(Alignment::Center)
                    .border_style(Style::default().fg(status_color(task.status)).add_modifier(Modifier::BOLD)),
            )
            .wrap(Wrap { trim: false })
            .style(Style::default().bg(Color::Black));
        f.render_widget(popup, area);
    }

    fn render_form_popup(&self, f: &mut Frame) {
        let Some(form) = &self.form else {
            return;
        };
        let area = centered_rect(70, 70, f.area());
        f.render_widget(Clear, area);

        let label_style = |order: usize| {
            if form.current_field == order {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            }
        };
        let text_row = |order: usize, label: &str, field: &InputField| {
            Line::from(vec![Span::styled(format!("{label:<12}"), label_style(order)), Span::raw(field.display())])
        };
        let selector_row = |order: usize, label: &str, value: &str| {
            Line::from(vec![
                Span::styled(format!("{label:<12}"), label_style(order)),
                Span::raw(format!("< {value} >")),
            ])
        };

        let mut lines = vec![
            text_row(task_form::TITLE_ORDER, "Title", &form.title),
            text_row(task_form::DESCRIPTION_ORDER, "Description", &form.description),
            text_row(task_form::TAGS_ORDER, "Tags", &form.tags),
            text_row(task_form::DUE_ORDER, "Due", &form.due),
            text_row(task_form::ESTIMATE_ORDER, "Estimate", &form.estimate),
            selector_row(task_form::ASSIGNEE_ORDER, "Assignee", form.selected_assignee()),
            selector_row(task_form::STATUS_ORDER, "Status", form.selected_status().label()),
            selector_row(task_form::PRIORITY_ORDER, "Priority", form.selected_priority().label()),
            Line::from(""),
            Line::from("Tab/↑↓: Field  ←/→: Change  Enter: Create  Esc: Cancel"),
        ];
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
        }
        let popup = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("New task in {}", self.project.key))
                    .title_alignment(Alignment::Center),
            )
            .style(Style::default().bg(Color::Black));
        f.render_widget(popup, area);
    }

    fn render_help_popup(&self, f: &mut Frame) {
        let area = centered_rect(60, 70, f.area());
        f.render_widget(Clear, area);
        let help = [
            "←/→ ↑/↓      Select lane / card",
            "Space        Pick up card, then Space again to drop",
            "Ctrl+←/→     Move card one lane",
            "Mouse drag   Drop a card on any lane",
            "Enter        Task details and comments",
            "n            New task",
            "/            Search title and description",
            "s / p / a    Cycle status / priority / assignee filter",
            "x            Clear filters",
            "v            Toggle board / list",
            "o            Change list sort order",
            "q / Esc      Quit",
        ];
        let popup = Paragraph::new(help.iter().map(|l| Line::from(*l)).collect::<Vec<_>>())
            .block(Block::default().borders(Borders::ALL).title("Keys (any key to close)"))
            .style(Style::default().bg(Color::Black));
        f.render_widget(popup, area);
    }

    /// Main event loop.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        while !self.should_quit() {
            terminal.draw(|f| self.render(f))?;
            if event::poll(Duration::from_millis(100))? {
                match event::read()? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::demo_data;
    use ratatui::backend::TestBackend;

    fn app() -> BoardApp {
        let data = demo_data(3, Utc::now());
        let db = Database {
            users: data.users,
            projects: data.projects,
            tasks: data.tasks,
        };
        let context = StoreContext {
            user_id: "u1".into(),
            project_id: "p1".into(),
        };
        BoardApp::new(db, None, context, ViewMode::Board).unwrap()
    }

    fn press(app: &mut BoardApp, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn ctrl(app: &mut BoardApp, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::CONTROL));
    }

    fn type_text(app: &mut BoardApp, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn mouse(app: &mut BoardApp, kind: MouseEventKind, at: (u16, u16)) {
        app.handle_mouse(MouseEvent {
            kind,
            column: at.0,
            row: at.1,
            modifiers: KeyModifiers::NONE,
        });
    }

    fn draw(app: &mut BoardApp) -> String {
        let mut terminal = Terminal::new(TestBackend::new(150, 40)).unwrap();
        terminal.draw(|f| app.render(f)).unwrap();
        terminal.backend().buffer().content().iter().map(|c| c.symbol()).collect()
    }

    fn center(rect: Rect) -> (u16, u16) {
        (rect.x + rect.width / 2, rect.y + rect.height / 2)
    }

    fn status_of(app: &BoardApp, id: &str) -> TaskStatus {
        app.store.get(id).unwrap().status
    }

    #[test]
    fn test_new_rejects_unknown_project() {
        let context = StoreContext {
            user_id: "u1".into(),
            project_id: "nope".into(),
        };
        assert!(matches!(
            BoardApp::new(Database::default(), None, context, ViewMode::Board),
            Err(AppError::UnknownProject(_))
        ));
    }

    #[test]
    fn test_render_shows_lanes_and_project_tasks_only() {
        let mut app = app();
        let screen = draw(&mut app);
        for lane in LANES {
            assert!(screen.contains(lane.title), "missing lane {}", lane.title);
        }
        assert!(screen.contains("Design homepage mockup"));
        assert!(!screen.contains("Beta testing"));
        assert_eq!(app.lane_bounds.len(), 5);
        assert_eq!(app.card_bounds.len(), 4);
    }

    #[test]
    fn test_keyboard_pick_up_and_drop() {
        let mut app = app();
        press(&mut app, KeyCode::Right); // To Do lane holds t3
        press(&mut app, KeyCode::Char(' '));
        assert!(app.engine.is_dragging());
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Char(' '));

        assert_eq!(status_of(&app, "t3"), TaskStatus::InReview);
        assert!(!app.engine.is_dragging());
        assert_eq!(app.selected_task_id().as_deref(), Some("t3"));
    }

    #[test]
    fn test_drop_of_vanished_task_is_reported() {
        let mut app = app();
        let before = app.store.tasks().to_vec();
        app.apply_drop(DropOutcome::Missing { task_id: "gone".into() });
        assert_eq!(app.status_message, "That task no longer exists");
        assert_eq!(app.store.tasks(), before.as_slice());
    }

    #[test]
    fn test_escape_cancels_drag_without_moving() {
        let mut app = app();
        press(&mut app, KeyCode::Char(' ')); // t4 in Backlog
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Esc);

        assert_eq!(status_of(&app, "t4"), TaskStatus::Backlog);
        assert!(!app.engine.is_dragging());
        assert!(!app.should_quit());
    }

    #[test]
    fn test_ctrl_arrows_move_one_lane() {
        let mut app = app();
        ctrl(&mut app, KeyCode::Right);
        assert_eq!(status_of(&app, "t4"), TaskStatus::Todo);
        ctrl(&mut app, KeyCode::Left);
        ctrl(&mut app, KeyCode::Left);
        assert_eq!(status_of(&app, "t4"), TaskStatus::Backlog);
    }

    #[test]
    fn test_mouse_drag_drops_on_lane_under_pointer() {
        let mut app = app();
        draw(&mut app);
        let card = app.card_bounds.iter().find(|(id, _)| id == "t4").unwrap().1;
        let done = app.lane_bounds.iter().find(|(s, _)| *s == TaskStatus::Done).unwrap().1;

        mouse(&mut app, MouseEventKind::Down(MouseButton::Left), center(card));
        mouse(&mut app, MouseEventKind::Drag(MouseButton::Left), center(card));
        mouse(&mut app, MouseEventKind::Up(MouseButton::Left), center(done));
        assert_eq!(status_of(&app, "t4"), TaskStatus::Done);
    }

    #[test]
    fn test_mouse_release_outside_lanes_changes_nothing() {
        let mut app = app();
        draw(&mut app);
        let card = app.card_bounds.iter().find(|(id, _)| id == "t4").unwrap().1;
        let before = app.store.get("t4").unwrap().clone();

        mouse(&mut app, MouseEventKind::Down(MouseButton::Left), center(card));
        mouse(&mut app, MouseEventKind::Drag(MouseButton::Left), (2, 1));
        mouse(&mut app, MouseEventKind::Up(MouseButton::Left), (2, 1));
        assert_eq!(app.store.get("t4").unwrap(), &before);
        assert!(!app.engine.is_dragging());
    }

    #[test]
    fn test_click_without_drag_only_selects() {
        let mut app = app();
        draw(&mut app);
        let card = app.card_bounds.iter().find(|(id, _)| id == "t1").unwrap().1;
        let before = app.store.get("t1").unwrap().updated_at;

        mouse(&mut app, MouseEventKind::Down(MouseButton::Left), center(card));
        mouse(&mut app, MouseEventKind::Up(MouseButton::Left), center(card));
        assert_eq!(app.selected_task_id().as_deref(), Some("t1"));
        assert_eq!(app.store.get("t1").unwrap().updated_at, before);
    }

    #[test]
    fn test_toolbar_filters() {
        let mut app = app();
        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.filter.status, Choice::Exactly(TaskStatus::Backlog));
        assert_eq!(app.visible().len(), 1);

        press(&mut app, KeyCode::Char('x'));
        press(&mut app, KeyCode::Char('/'));
        type_text(&mut app, "MOCK");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.filter.query, "MOCK");
        let ids: Vec<&str> = app.visible().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1"]);

        press(&mut app, KeyCode::Char('x'));
        assert!(app.filter.is_unfiltered());
        assert_eq!(app.filter.project_id, "p1");
    }

    #[test]
    fn test_assignee_filter_cycles_through_members() {
        let mut app = app();
        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.visible().len(), 1); // unassigned: t4
        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.filter.assignee, AssigneeFilter::User("u1".into()));
        assert!(app.visible().is_empty());
    }

    #[test]
    fn test_create_task_from_form() {
        let mut app = app();
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.state, AppState::AddTask);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state, AppState::AddTask);
        assert!(app.form.as_ref().unwrap().error.is_some());

        type_text(&mut app, "Write release notes");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state, AppState::Board);

        let created = app.store.tasks().last().unwrap();
        assert_eq!(created.title, "Write release notes");
        assert_eq!(created.project_id, "p1");
        assert_eq!(created.reporter_id, "u1");
        assert_eq!(created.status, TaskStatus::Todo);
        assert_eq!(created.priority, TaskPriority::Medium);
    }

    #[test]
    fn test_comment_from_detail_view() {
        let mut app = app();
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state, AppState::TaskDetail);
        press(&mut app, KeyCode::Char('c'));
        type_text(&mut app, "Waiting on GA account");
        press(&mut app, KeyCode::Enter);

        let task = app.store.get("t4").unwrap();
        assert_eq!(task.comments.len(), 1);
        assert_eq!(task.comments[0].author_id, "u1");
        assert_eq!(app.state, AppState::TaskDetail);
        assert!(draw(&mut app).contains("Waiting on GA account"));
    }

    #[test]
    fn test_list_view_toggle() {
        let mut app = app();
        press(&mut app, KeyCode::Char('v'));
        assert_eq!(app.view_mode(), ViewMode::List);
        let screen = draw(&mut app);
        assert!(screen.contains("Priority"));
        assert!(screen.contains("Optimize images for web"));
        assert!(app.card_bounds.is_empty());

        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit());
    }
}
