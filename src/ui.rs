use crate::app::{AppState, ElementKind};
use crate::client::{ClientConfig, ClientSession};
use crate::markdown::{self, Segment};
use crate::render;
use crate::stream::StreamError;
use crate::transcript::{Entry, Role};
use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, size};
use ratatui::backend::CrosstermBackend;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Widget, Wrap};
use ratatui::{Frame, Terminal, TerminalOptions, Viewport};
use std::io;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

type TuiTerminal = Terminal<CrosstermBackend<io::Stdout>>;
type UiResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const INPUT_HEIGHT: u16 = 6;

// Restores terminal settings even if the loop exits early.
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = io::stdout().flush();
    }
}

#[derive(Debug, Clone)]
struct LineSpec {
    text: String,
    style: Style,
}

impl LineSpec {
    fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

fn stage_color(entry: &Entry) -> Color {
    match (entry.role, entry.stage.as_deref()) {
        (Role::User, _) => Color::Blue,
        (_, Some("planner")) => Color::Magenta,
        (_, Some("coder")) => Color::Green,
        (_, Some("reviewer")) => Color::Cyan,
        (_, Some("summary")) => Color::Yellow,
        (_, Some("error")) => Color::Red,
        _ => Color::Gray,
    }
}

/// Terminal projection of one entry; fenced code keeps its own styling.
fn line_specs(entry: &Entry) -> Vec<LineSpec> {
    let color = stage_color(entry);
    let header_style = Style::default().fg(color).add_modifier(Modifier::BOLD);
    let body_style = Style::default().fg(color);
    let code_style = Style::default().fg(Color::White).bg(Color::Black);
    let lang_style = Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::ITALIC);

    let mut lines = vec![LineSpec::new(format!("{}:", entry.label()), header_style)];
    if !markdown::has_fence(&entry.content) {
        for line in entry.content.lines() {
            lines.push(LineSpec::new(format!("  {}", line), body_style));
        }
        return lines;
    }

    for segment in markdown::segments(&entry.content) {
        match segment {
            Segment::Prose(prose) => {
                for line in prose.lines() {
                    lines.push(LineSpec::new(format!("  {}", line), body_style));
                }
            }
            Segment::Code { code, .. } => {
                lines.push(LineSpec::new(
                    format!("  ┌ {}", segment.lang_or_default()),
                    lang_style,
                ));
                for line in code.lines() {
                    lines.push(LineSpec::new(format!("  │ {}", line), code_style));
                }
                lines.push(LineSpec::new("  └", lang_style));
            }
        }
    }
    lines
}

fn to_text(entry: &Entry) -> Text<'static> {
    let lines = line_specs(entry)
        .into_iter()
        .map(|spec| Line::from(Span::styled(spec.text, spec.style)))
        .collect::<Vec<_>>();
    Text::from(lines)
}

/// The entry as inserted into scrollback, trailing blank line included.
fn entry_paragraph(entry: &Entry) -> Paragraph<'static> {
    let mut text = to_text(entry);
    text.extend(Text::raw("\n"));
    Paragraph::new(text).wrap(Wrap { trim: false })
}

/// Rows `entry_paragraph` needs at `width`, measured with the same wrapping
/// it is rendered with so wide characters are never clipped.
fn rendered_height(entry: &Entry, width: u16) -> u16 {
    let rows = entry_paragraph(entry).line_count(width.max(1));
    rows.min(u16::MAX as usize) as u16
}

#[derive(Debug)]
pub enum UiEvent {
    SessionReady(ClientSession),
    SessionFailed(String),
    Entry(Entry),
    Settled(Result<(), StreamError>),
}

pub struct App {
    state: AppState,
    session: Option<Arc<ClientSession>>,
    html: Option<PathBuf>,
    should_quit: bool,
    sender: mpsc::Sender<UiEvent>,
    receiver: mpsc::Receiver<UiEvent>,
}

impl App {
    pub fn new(html: Option<PathBuf>) -> Self {
        let (sender, receiver) = mpsc::channel(100);

        Self {
            state: AppState::new(),
            session: None,
            html,
            should_quit: false,
            sender,
            receiver,
        }
    }

    fn bootstrap(&self, config: ClientConfig) {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let event = match ClientSession::connect(&config).await {
                Ok(session) => UiEvent::SessionReady(session),
                Err(err) => UiEvent::SessionFailed(err.to_string()),
            };
            let _ = sender.send(event).await;
        });
    }

    fn title(&self) -> String {
        let status = self.state.status().text();
        match self.state.engine() {
            Some(engine) if !self.state.is_busy() => {
                format!(" Prompt (Enter to send, Esc to quit) [{} · {}] ", status, engine)
            }
            _ => format!(" Prompt (Enter to send, Esc to quit) [{}] ", status),
        }
    }

    fn draw(&mut self, f: &mut Frame) {
        let area = f.area();
        let prompt = self.state.form().prompt();
        let body = if prompt.is_empty() {
            let hint = if self.state.is_busy() {
                "Waiting for the agent..."
            } else if self.state.transcript().is_empty() {
                "No conversation yet. Enter a requirement to get started."
            } else {
                "Describe what you need..."
            };
            Text::from(Span::styled(hint, Style::default().fg(Color::DarkGray)))
        } else {
            Text::from(
                prompt
                    .lines()
                    .iter()
                    .map(|l| Line::from(l.clone()))
                    .collect::<Vec<_>>(),
            )
        };
        let border = if self.state.form().elements().iter().any(|e| e.disabled) {
            Color::Yellow
        } else {
            Color::DarkGray
        };

        let input_paragraph = Paragraph::new(body)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(self.title())
                    .border_style(Style::default().fg(border)),
            )
            .wrap(Wrap { trim: false });

        f.render_widget(input_paragraph, area);

        let (cursor_x, cursor_y) = prompt.cursor();
        let x = (area.x + cursor_x as u16 + 1).min(area.x + area.width.saturating_sub(2));
        let y = (area.y + 1 + cursor_y as u16).min(area.y + area.height.saturating_sub(2));
        f.set_cursor_position((x, y));
    }

    fn append_entry(&mut self, terminal: &mut TuiTerminal, entry: Entry) -> UiResult<()> {
        insert_entry(terminal, &entry)?;
        self.state.apply(entry);
        self.snapshot();
        Ok(())
    }

    fn snapshot(&self) {
        if let Some(path) = &self.html {
            if let Err(err) = render::write_snapshot(path, &self.state.render_html()) {
                tracing::warn!(%err, path = %path.display(), "failed to write transcript html");
            }
        }
    }

    fn submit(&mut self, terminal: &mut TuiTerminal) -> UiResult<()> {
        let Some(session) = self.session.clone() else {
            return Ok(());
        };
        let Some(submission) = self.state.submit() else {
            return Ok(());
        };

        // `submit` already recorded the user turn; mirror it to scrollback.
        if let Some(user) = self.state.transcript().last() {
            insert_entry(terminal, user)?;
        }
        self.snapshot();
        tracing::debug!(session_id = %submission.session_id, "prompt submitted");

        let sender = self.sender.clone();
        tokio::spawn(async move {
            let outcome = match session.open_stream(&submission.message) {
                Ok(subscription) => {
                    let entries = sender.clone();
                    subscription
                        .run(move |entry| {
                            let entries = entries.clone();
                            async move {
                                let _ = entries.send(UiEvent::Entry(entry)).await;
                            }
                        })
                        .await
                }
                Err(err) => {
                    tracing::warn!(%err, "could not open agent stream");
                    Err(StreamError::Interrupted)
                }
            };
            let _ = sender.send(UiEvent::Settled(outcome)).await;
        });

        Ok(())
    }

    fn handle_ui_event(&mut self, terminal: &mut TuiTerminal, event: UiEvent) -> UiResult<()> {
        match event {
            UiEvent::SessionReady(session) => {
                tracing::debug!(engines = ?session.available_engines(), "engines offered");
                self.state.session_ready(
                    session.session_id().to_string(),
                    session.engine().map(String::from),
                );
                self.session = Some(Arc::new(session));
            }
            UiEvent::SessionFailed(err) => {
                tracing::warn!(%err, "session bootstrap failed");
                self.state.session_failed();
            }
            UiEvent::Entry(entry) => self.append_entry(terminal, entry)?,
            UiEvent::Settled(outcome) => {
                let before = self.state.transcript().len();
                self.state.settle(&outcome);
                if self.state.transcript().len() > before {
                    if let Some(failure) = self.state.transcript().last() {
                        insert_entry(terminal, failure)?;
                    }
                }
                self.snapshot();
            }
        }
        Ok(())
    }

    fn handle_events(&mut self, terminal: &mut TuiTerminal) -> UiResult<bool> {
        while let Ok(event) = self.receiver.try_recv() {
            self.handle_ui_event(terminal, event)?;
        }

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
                {
                    self.should_quit = true;
                    return Ok(false);
                }

                if key.code == KeyCode::Esc {
                    self.should_quit = true;
                    return Ok(false);
                }

                if key.code == KeyCode::Enter && !key.modifiers.contains(KeyModifiers::SHIFT) {
                    let submit_enabled = self
                        .state
                        .form()
                        .elements()
                        .iter()
                        .any(|e| e.kind == ElementKind::Submit && !e.disabled);
                    if submit_enabled {
                        self.submit(terminal)?;
                    }
                    return Ok(true);
                }

                // Disabled form: keystrokes go nowhere.
                let Some(prompt) = self.state.form_mut().prompt_mut() else {
                    return Ok(true);
                };
                match key.code {
                    KeyCode::Enter => prompt.new_line(),
                    KeyCode::Char(c) => prompt.insert_char(c),
                    KeyCode::Backspace => prompt.delete_char(),
                    KeyCode::Left => prompt.move_left(),
                    KeyCode::Right => prompt.move_right(),
                    KeyCode::Up => prompt.move_up(),
                    KeyCode::Down => prompt.move_down(),
                    KeyCode::Home => prompt.move_home(),
                    KeyCode::End => prompt.move_end(),
                    _ => {}
                }
            }
        }

        Ok(true)
    }
}

fn insert_entry(terminal: &mut TuiTerminal, entry: &Entry) -> UiResult<()> {
    let width = terminal.size()?.width;
    let height = rendered_height(entry, width);
    let paragraph = entry_paragraph(entry);
    // Insert above the inline viewport so the transcript stays in scrollback.
    terminal.insert_before(height, |buf| {
        paragraph.render(buf.area, buf);
    })?;
    Ok(())
}

pub fn run_tui(config: ClientConfig, html: Option<PathBuf>) -> UiResult<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    let (_, rows) = size()?;
    if rows > 0 {
        // Push existing screen content into scrollback without clearing it.
        for _ in 0..rows {
            writeln!(stdout)?;
        }
        stdout.flush()?;
    }
    execute!(stdout, MoveTo(0, 0))?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::with_options(
        backend,
        TerminalOptions {
            viewport: Viewport::Inline(INPUT_HEIGHT),
        },
    )?;

    let _guard = TerminalGuard;

    let mut app = App::new(html);
    app.snapshot();
    app.bootstrap(config);

    terminal.draw(|f| app.draw(f))?;

    while !app.should_quit {
        if !app.handle_events(&mut terminal)? {
            break;
        }

        terminal.draw(|f| app.draw(f))?;

        std::thread::sleep(Duration::from_millis(10));
    }

    disable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::buffer::Buffer;
    use ratatui::layout::Rect;

    fn texts(entry: &Entry) -> Vec<String> {
        line_specs(entry).into_iter().map(|spec| spec.text).collect()
    }

    #[test]
    fn plain_entries_are_indented_under_their_label() {
        let entry = Entry::user("first line\nsecond line");
        assert_eq!(texts(&entry), ["You:", "  first line", "  second line"]);
    }

    #[test]
    fn fenced_code_is_framed_with_its_language() {
        let entry = Entry::assistant("Done:\n```rust\nfn main() {}\n```", "summary");
        assert_eq!(
            texts(&entry),
            ["Agent · Summary:", "  Done:", "  ┌ rust", "  │ fn main() {}", "  └"]
        );
    }

    #[test]
    fn stages_get_distinct_colors() {
        assert_eq!(stage_color(&Entry::assistant("x", "error")), Color::Red);
        assert_eq!(stage_color(&Entry::assistant("x", "coder1")), Color::Gray);
        assert_eq!(stage_color(&Entry::user("x")), Color::Blue);
    }

    fn shown(entry: &Entry, width: u16, symbol: &str) -> usize {
        let height = rendered_height(entry, width);
        let mut buf = Buffer::empty(Rect::new(0, 0, width, height));
        entry_paragraph(entry).render(buf.area, &mut buf);
        buf.content().iter().filter(|cell| cell.symbol() == symbol).count()
    }

    #[test]
    fn height_fits_wrapped_ascii() {
        let entry = Entry::assistant("x".repeat(25), "planner");
        assert_eq!(shown(&entry, 10, "x"), 25);
    }

    #[test]
    fn height_fits_double_width_characters() {
        let entry = Entry::assistant("가".repeat(10), "planner");
        assert_eq!(shown(&entry, 10, "가"), 10);

        let entry = Entry::user("漢字かな交じり文".repeat(3));
        assert_eq!(shown(&entry, 7, "字"), 3);
    }

    #[test]
    fn height_includes_the_trailing_blank_line() {
        let entry = Entry::user("hi");
        assert_eq!(rendered_height(&entry, 80), 3);
    }
}
