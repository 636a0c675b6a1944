use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::layout::Rect;
use tempfile::TempDir;

use crate::board::tests::seeded;
use crate::io::dataset_io::write_dataset;
use crate::io::project_io::{init_project, load_project};
use crate::tui::app::App;

pub const TERM_W: u16 = 100;
pub const TERM_H: u16 = 24;

/// Render into an in-memory buffer and return plain text (no styles).
pub fn render_to_string<F>(w: u16, h: u16, f: F) -> String
where
    F: FnOnce(&mut ratatui::Frame, Rect),
{
    let backend = TestBackend::new(w, h);
    let mut terminal = Terminal::new(backend).unwrap();
    terminal
        .draw(|frame| {
            let area = frame.area();
            f(frame, area);
        })
        .unwrap();

    let buf = terminal.backend().buffer().clone();
    let w = buf.area.width as usize;
    let lines: Vec<String> = buf
        .content
        .chunks(w)
        .map(|row| {
            let s: String = row.iter().map(|cell| cell.symbol()).collect();
            s.trim_end().to_string()
        })
        .collect();

    // Trim trailing blank lines
    let end = lines
        .iter()
        .rposition(|l| !l.is_empty())
        .map_or(0, |i| i + 1);
    lines[..end].join("\n")
}

/// Render the whole screen
pub fn render_app(app: &mut App, w: u16, h: u16) -> String {
    let backend = TestBackend::new(w, h);
    let mut terminal = Terminal::new(backend).unwrap();
    terminal.draw(|frame| super::render(frame, app)).unwrap();
    let buf = terminal.backend().buffer().clone();
    buf.content
        .chunks(buf.area.width as usize)
        .map(|row| {
            let s: String = row.iter().map(|cell| cell.symbol()).collect();
            s.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A project on disk holding North, South and West, loaded into an app
/// with North selected. Keep the TempDir alive for the test's duration.
pub fn seeded_app() -> (TempDir, App) {
    let tmp = TempDir::new().unwrap();
    let board_dir = init_project(tmp.path(), "Test").unwrap();
    write_dataset(&board_dir.join("dataset.json"), &seeded()).unwrap();
    let project = load_project(tmp.path()).unwrap();
    let mut app = App::new(&project);
    assert!(app.dash.refetch());
    app.select_cursor_route(false);
    (tmp, app)
}
