use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::{debug, warn};

use crate::board::Dashboard;
use crate::io::project_io::{discover_project, load_project};
use crate::io::state::{UiState, read_ui_state, write_ui_state};
use crate::io::watcher::{BoardWatcher, FileEvent};
use crate::io::logging;
use crate::model::{Order, OrderId, Project, Route, RouteId};
use crate::ops::reorder::DragReorderEngine;
use crate::store::{SelectionMeta, SelectionOrigin};
use crate::sync::FileBackend;
use crate::view::DataTransfer;

use super::input;
use super::render;
use super::theme::Theme;

/// How long info and error notices stay in the status row
const NOTICE_TTL_SECS: i64 = 6;

/// Current interaction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Navigate,
    /// Dragging a stop within its route
    Move,
    /// Choosing another route for the selected stop
    Transfer,
    /// Choosing a day on the calendar panel
    Calendar,
    /// Several routes run on the dropped-on day; pick one
    Picker,
    /// Typing a name into the route form
    Form,
    Search,
}

/// Which list the cursor is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Routes,
    Stops,
}

/// A keyboard-driven drag of one stop
#[derive(Debug, Clone)]
pub struct MoveState {
    pub engine: DragReorderEngine,
    pub transfer: DataTransfer,
    /// Index of the card the dragged stop hovers over
    pub target: usize,
    /// Where the stop started
    pub origin: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferState {
    pub order_id: OrderId,
    pub source_route_id: RouteId,
    /// Index into the route list
    pub target: usize,
}

/// What a calendar day pick will drop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarCarry {
    /// Just browsing
    Nothing,
    Order { order_id: OrderId, route_id: RouteId },
    Route { route_id: RouteId },
}

/// Main application state
pub struct App {
    pub dash: Dashboard<FileBackend>,
    pub board_dir: PathBuf,
    pub project_name: String,
    pub theme: Theme,
    pub mode: Mode,
    pub focus: Focus,
    pub should_quit: bool,
    pub show_key_hints: bool,
    pub route_cursor: usize,
    pub stop_cursor: usize,
    pub move_state: Option<MoveState>,
    pub transfer_state: Option<TransferState>,
    pub picker_cursor: usize,
    pub calendar_cursor: NaiveDate,
    pub calendar_carry: CalendarCarry,
    pub form_input: String,
    pub search_input: String,
    pub last_search: Option<String>,
    /// Current search match index (for n cycling)
    pub search_match_idx: usize,
}

impl App {
    pub fn new(project: &Project) -> Self {
        let backend = FileBackend::new(&project.board_dir, &project.dataset_path());
        let dash = Dashboard::new(backend, project.config.sync.on_failure);
        App {
            dash,
            board_dir: project.board_dir.clone(),
            project_name: project.config.project.name.clone(),
            theme: Theme::from_config(&project.config.ui),
            mode: Mode::Navigate,
            focus: Focus::Routes,
            should_quit: false,
            show_key_hints: project.config.ui.show_key_hints,
            route_cursor: 0,
            stop_cursor: 0,
            move_state: None,
            transfer_state: None,
            picker_cursor: 0,
            calendar_cursor: Local::now().date_naive(),
            calendar_carry: CalendarCarry::Nothing,
            form_input: String::new(),
            search_input: String::new(),
            last_search: None,
            search_match_idx: 0,
        }
    }

    pub fn routes(&self) -> &[Route] {
        self.dash.store.routes()
    }

    pub fn cursor_route(&self) -> Option<&Route> {
        self.routes().get(self.route_cursor)
    }

    pub fn cursor_order(&self) -> Option<&Order> {
        self.cursor_route()?.delivery_orders.get(self.stop_cursor)
    }

    /// Order ids of the route under the cursor, in stop order
    pub fn cursor_stop_ids(&self) -> Vec<OrderId> {
        self.cursor_route()
            .map(|r| r.delivery_orders.iter().map(|o| o.id).collect())
            .unwrap_or_default()
    }

    /// Select the route under the cursor; its first stop follows
    pub fn select_cursor_route(&mut self, open_panel: bool) {
        let Some(route_id) = self.cursor_route().map(|r| r.id) else {
            return;
        };
        let meta = SelectionMeta {
            origin: SelectionOrigin::List,
            open_panel,
        };
        self.dash.select_route(route_id, meta);
        self.stop_cursor = 0;
    }

    pub fn select_cursor_order(&mut self, open_panel: bool) {
        let Some(order_id) = self.cursor_order().map(|o| o.id) else {
            return;
        };
        let meta = SelectionMeta {
            origin: SelectionOrigin::List,
            open_panel,
        };
        self.dash.select_order(order_id, meta);
    }

    /// Put the cursors on whatever the store has selected, clamping them
    /// when the lists shrank underneath
    pub fn follow_store(&mut self) {
        if let Some(route_id) = self.dash.store.selected_route_id()
            && let Some(pos) = self.routes().iter().position(|r| r.id == route_id)
        {
            self.route_cursor = pos;
        }
        let route_count = self.routes().len();
        self.route_cursor = self.route_cursor.min(route_count.saturating_sub(1));

        if let Some(order_id) = self.dash.store.selected_order_id()
            && let Some(pos) = self.cursor_stop_ids().iter().position(|id| *id == order_id)
        {
            self.stop_cursor = pos;
        }
        let stop_count = self.cursor_stop_ids().len();
        self.stop_cursor = self.stop_cursor.min(stop_count.saturating_sub(1));
    }

    /// The dataset changed on disk: refetch, and let a drag in progress hold
    /// the new order back until it ends
    pub fn on_files_changed(&mut self) {
        if !self.dash.refetch() {
            return;
        }
        if let Some(ms) = &mut self.move_state {
            let route_id = ms.engine.route_id();
            let ids: Vec<OrderId> = self
                .dash
                .store
                .find_route_by_id(route_id)
                .map(|r| r.delivery_orders.iter().map(|o| o.id).collect())
                .unwrap_or_default();
            ms.engine.sync_input(&ids);
        }
        self.follow_store();
    }

    /// One event-loop turn after input: deferred panel opens run, pending
    /// background writes get their responses, stale notices go away
    pub fn pump(&mut self) {
        self.dash.tick();
        let outcomes = self.dash.flush_sync();
        if !outcomes.is_empty() {
            debug!(count = outcomes.len(), "background writes resolved");
            self.follow_store();
        }
        self.dash
            .notices
            .expire(Local::now(), chrono::Duration::seconds(NOTICE_TTL_SECS));
    }
}

/// Restore selections and panels from .state.json
pub fn restore_ui_state(app: &mut App) {
    let Some(state) = read_ui_state(&app.board_dir) else {
        return;
    };
    app.dash.restore_ui_state(&state);
    if let Some(month) = state.calendar_month {
        app.calendar_cursor = month;
    }
    app.last_search = state.last_search;
    app.follow_store();
}

/// Save selections and panels to .state.json
pub fn save_ui_state(app: &App) {
    let state = UiState {
        last_search: app.last_search.clone(),
        ..app.dash.ui_state()
    };
    if let Err(e) = write_ui_state(&app.board_dir, &state) {
        warn!(error = %e, "could not save ui state");
    }
}

fn project_root(project_dir: Option<&str>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let start = match project_dir {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    Ok(discover_project(&start)?)
}

fn start_watcher(board_dir: &Path) -> Option<BoardWatcher> {
    match BoardWatcher::start(board_dir) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!(error = %e, "file watcher unavailable; external edits need a restart");
            None
        }
    }
}

/// Run the TUI application
pub fn run(project_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let root = project_root(project_dir)?;
    let project = load_project(&root)?;
    logging::init(&project.board_dir, &project.config.log);

    let mut app = App::new(&project);
    if !app.dash.refetch() {
        let reason = app
            .dash
            .notices
            .latest()
            .map(|n| n.text.clone())
            .unwrap_or_else(|| "could not load dataset".to_string());
        return Err(reason.into());
    }
    restore_ui_state(&mut app);
    if app.dash.store.selected_route_id().is_none() {
        app.select_cursor_route(false);
    }
    let watcher = start_watcher(&project.board_dir);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Install panic hook to restore terminal on panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let result = run_event_loop(&mut terminal, &mut app, watcher.as_ref());

    save_ui_state(&app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    watcher: Option<&BoardWatcher>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut save_counter = 0u32;
    loop {
        terminal.draw(|frame| render::render(frame, app))?;

        if event::poll(Duration::from_millis(250))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            input::handle_key(app, key);
            // Debounced state save: every ~5 key presses
            save_counter += 1;
            if save_counter >= 5 {
                save_ui_state(app);
                save_counter = 0;
            }
        }

        app.pump();

        if let Some(w) = watcher {
            let changed = w
                .poll()
                .into_iter()
                .any(|FileEvent::Changed(paths)| !paths.is_empty());
            if changed {
                app.on_files_changed();
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::render::test_helpers::seeded_app;
    use pretty_assertions::assert_eq;

    #[test]
    fn follow_store_tracks_selection() {
        let (_tmp, mut app) = seeded_app();
        app.dash
            .select_order(20, SelectionMeta::new(SelectionOrigin::Search));
        app.follow_store();
        assert_eq!(app.cursor_route().map(|r| r.id), Some(2));
        assert_eq!(app.cursor_order().map(|o| o.id), Some(20));
    }

    #[test]
    fn external_change_is_held_during_drag() {
        let (_tmp, mut app) = seeded_app();
        input::begin_move(&mut app);
        assert_eq!(app.mode, Mode::Move);

        // Someone else swaps the stops of route 1 on disk
        let path = app.dash.backend().dataset_path().to_path_buf();
        let mut dataset = crate::io::dataset_io::read_dataset(&path).unwrap();
        dataset.routes[0].delivery_orders.reverse();
        crate::ops::arrangement::renumber(&mut dataset.routes[0].delivery_orders);
        crate::io::dataset_io::write_dataset(&path, &dataset).unwrap();
        app.on_files_changed();

        let ms = app.move_state.as_ref().unwrap();
        assert_eq!(ms.engine.orders(), &[10, 11]);
        input::cancel_move(&mut app);
        assert_eq!(app.cursor_stop_ids(), vec![11, 10]);
    }

    #[test]
    fn state_round_trip_through_disk() {
        let (_tmp, mut app) = seeded_app();
        app.route_cursor = 1;
        app.select_cursor_route(true);
        app.last_search = Some("acme".into());
        save_ui_state(&app);

        let (_tmp2, mut fresh) = seeded_app();
        fresh.board_dir = app.board_dir.clone();
        restore_ui_state(&mut fresh);
        assert_eq!(fresh.route_cursor, 1);
        assert_eq!(fresh.last_search.as_deref(), Some("acme"));
    }
}
