// Terminal browser: lays the element tree out as text lines, moves focus
// between interactive elements and feeds wall-clock time into the host.

use anyhow::Result;
use crossterm::{
    event::{self, Event as TermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use cu_data::components::header::ACTIVE_CLASS;
use cu_data::dom::{ElementRef, Node};
use cu_data::runtime::Host;
use cu_data::App;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};
use tracing::debug;

const TICK: Duration = Duration::from_millis(16);

/// Fixed width of one table cell
const CELL_WIDTH: usize = 22;

/// Elements that start and end their own line
const BLOCK_TAGS: [&str; 16] = [
    "body", "header", "main", "footer", "nav", "section", "div", "p", "pre", "h1", "h2", "h3",
    "table", "thead", "tbody", "tr",
];

/// Classes that read as "selected" in the page's own markup
const HIGHLIGHT_CLASSES: [&str; 4] = [ACTIVE_CLASS, "pill--active", "pagination__btn--active", "sorted"];

// ============================================================================
// LAYOUT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub style: Style,
    /// Index into `Screen::focusables`
    pub focus: Option<usize>,
}

/// The element tree flattened into styled lines
pub struct Screen {
    pub lines: Vec<Vec<Segment>>,
    pub focusables: Vec<ElementRef>,
}

impl Screen {
    pub fn line_of(&self, focus: usize) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.iter().any(|s| s.focus == Some(focus)))
    }

    pub fn plain_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(|line| line.iter().map(|s| s.text.as_str()).collect::<String>())
            .collect()
    }
}

pub fn layout(root: &ElementRef) -> Screen {
    let mut builder = ScreenBuilder {
        lines: Vec::new(),
        current: Vec::new(),
        focusables: Vec::new(),
    };
    builder.walk(root, Style::default(), None);
    builder.break_line();
    Screen {
        lines: builder.lines,
        focusables: builder.focusables,
    }
}

fn is_focusable(element: &ElementRef) -> bool {
    match element.tag().as_str() {
        "a" => element.attr("href").is_some(),
        "button" => element.attr("disabled").is_none(),
        "input" | "select" => true,
        _ => element.has_listener("click"),
    }
}

/// Elements the terminal never shows
fn is_hidden(element: &ElementRef) -> bool {
    element.tag() == "option" || element.has_class("browse-cards") || element.has_class("skeleton")
}

fn style_for(element: &ElementRef, inherited: Style) -> Style {
    let tag = element.tag();
    let mut style = inherited;

    if matches!(tag.as_str(), "h1" | "h2" | "th") || element.has_class("not-found__code") {
        style = style.add_modifier(Modifier::BOLD);
    }
    if tag == "a" {
        style = style.fg(Color::Cyan);
    }
    if element.class_name().contains("apy") {
        style = style.fg(Color::Green).add_modifier(Modifier::BOLD);
    }
    if element.has_class("text-muted") || element.attr("disabled").is_some() {
        style = style.fg(Color::DarkGray);
    }
    if HIGHLIGHT_CLASSES.iter().any(|c| element.has_class(c)) {
        style = style.fg(Color::Yellow).add_modifier(Modifier::BOLD);
    }
    style
}

fn selected_option(select: &ElementRef) -> String {
    let value = select.value();
    let options = select.find_by_tag("option");
    options
        .iter()
        .find(|o| o.value() == value)
        .or_else(|| options.first())
        .map(|o| o.text_content())
        .unwrap_or_default()
}

struct ScreenBuilder {
    lines: Vec<Vec<Segment>>,
    current: Vec<Segment>,
    focusables: Vec<ElementRef>,
}

impl ScreenBuilder {
    fn push(&mut self, text: impl Into<String>, style: Style, focus: Option<usize>) {
        let text = text.into();
        if !text.is_empty() {
            self.current.push(Segment { text, style, focus });
        }
    }

    fn break_line(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(std::mem::take(&mut self.current));
        }
    }

    fn width(&self) -> usize {
        self.current.iter().map(|s| s.text.chars().count()).sum()
    }

    fn walk(&mut self, element: &ElementRef, inherited: Style, focus: Option<usize>) {
        if is_hidden(element) {
            return;
        }

        let tag = element.tag();
        let block = BLOCK_TAGS.contains(&tag.as_str());
        if block {
            self.break_line();
        }

        let focus = match focus {
            None if is_focusable(element) => {
                self.focusables.push(element.clone());
                Some(self.focusables.len() - 1)
            }
            other => other,
        };
        let style = style_for(element, inherited);

        match tag.as_str() {
            "input" => {
                let value = element.value();
                let shown = if value.is_empty() {
                    element.attr("placeholder").unwrap_or_default()
                } else {
                    value
                };
                self.push(format!("[{}_]", shown), style, focus);
            }
            "select" => self.push(format!("[{} ▾]", selected_option(element)), style, focus),
            "button" => {
                self.push("[", style, focus);
                self.walk_children(element, style, focus);
                self.push("]", style, focus);
                self.push(" ", inherited, None);
            }
            "span" if element.has_class("dot") => {
                let mark = if element.has_class("dot--active") { "●" } else { "○" };
                self.push(mark, style, focus);
            }
            "td" | "th" => {
                let start = self.width();
                self.walk_children(element, style, focus);
                let used = self.width() - start;
                self.push(" ".repeat(CELL_WIDTH.saturating_sub(used).max(1)), inherited, None);
            }
            _ => self.walk_children(element, style, focus),
        }

        if block {
            self.break_line();
        } else if tag == "a" {
            self.push(" ", inherited, None);
        }
    }

    fn walk_children(&mut self, element: &ElementRef, style: Style, focus: Option<usize>) {
        for child in element.children() {
            match child {
                Node::Text(text) => self.push(text, style, focus),
                Node::Element(child) => self.walk(&child, style, focus),
            }
        }
    }
}

// ============================================================================
// BROWSER STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Browse,
    /// Keystrokes go into the focused input
    Editing,
    /// Typing a fragment into the address bar
    Address(String),
}

pub struct Browser {
    app: App,
    pub focus: usize,
    pub mode: Mode,
    pub scroll: u16,
    pub status: String,
    route: String,
}

fn route_of(hash: &str) -> String {
    hash.split('?').next().unwrap_or_default().to_string()
}

impl Browser {
    pub fn new(app: App) -> Self {
        let route = route_of(&app.host().hash());
        Self {
            app,
            focus: 0,
            mode: Mode::Browse,
            scroll: 0,
            status: String::new(),
            route,
        }
    }

    pub fn host(&self) -> &Host {
        self.app.host()
    }

    pub fn screen(&self) -> Screen {
        layout(self.host().document().body())
    }

    fn focused(&self) -> Option<ElementRef> {
        self.screen().focusables.get(self.focus).cloned()
    }

    /// Advance the virtual clock by real elapsed time
    pub fn tick(&mut self, elapsed_ms: f64) {
        self.host().advance(elapsed_ms);

        let route = route_of(&self.host().hash());
        if route != self.route {
            debug!(from = %self.route, to = %route, "route changed");
            self.route = route;
            self.focus = 0;
            self.scroll = 0;
            self.mode = Mode::Browse;
        }
    }

    /// Returns false when the user asked to quit
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self.mode.clone() {
            Mode::Address(buffer) => self.handle_address_key(key, buffer),
            Mode::Editing => self.handle_edit_key(key),
            Mode::Browse => return self.handle_browse_key(key),
        }
        true
    }

    fn handle_browse_key(&mut self, key: KeyEvent) -> bool {
        let count = self.screen().focusables.len().max(1);
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return false,
            KeyCode::Tab => self.focus = (self.focus + 1) % count,
            KeyCode::BackTab => self.focus = (self.focus + count - 1) % count,
            KeyCode::Enter => self.activate(),
            KeyCode::Char('g') => self.mode = Mode::Address(self.host().hash()),
            KeyCode::Backspace | KeyCode::Left => {
                if !self.host().back() {
                    self.status = "No earlier page".to_string();
                }
            }
            KeyCode::Right => {
                self.host().forward();
            }
            KeyCode::Down | KeyCode::Char('j') => self.scroll = self.scroll.saturating_add(1),
            KeyCode::Up | KeyCode::Char('k') => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::PageDown => self.scroll = self.scroll.saturating_add(10),
            KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(10),
            KeyCode::Home => self.scroll = 0,
            _ => {}
        }
        true
    }

    fn handle_address_key(&mut self, key: KeyEvent, mut buffer: String) {
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Browse;
                return;
            }
            KeyCode::Enter => {
                self.host().set_hash(&buffer);
                self.mode = Mode::Browse;
                return;
            }
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(c) => buffer.push(c),
            _ => {}
        }
        self.mode = Mode::Address(buffer);
    }

    fn handle_edit_key(&mut self, key: KeyEvent) {
        let Some(input) = self.focused().filter(|e| e.tag() == "input") else {
            self.mode = Mode::Browse;
            return;
        };

        let mut value = input.value();
        match key.code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Tab => {
                self.mode = Mode::Browse;
                return;
            }
            KeyCode::Backspace => {
                if value.pop().is_none() {
                    return;
                }
            }
            KeyCode::Char(c) => value.push(c),
            _ => return,
        }
        input.set_value(&value);
        input.dispatch("input");
    }

    /// Enter on the focused element
    pub fn activate(&mut self) {
        let Some(target) = self.focused() else {
            return;
        };

        match target.tag().as_str() {
            "input" => self.mode = Mode::Editing,
            "select" => {
                let options = target.find_by_tag("option");
                if options.is_empty() {
                    return;
                }
                let current = options
                    .iter()
                    .position(|o| o.value() == target.value())
                    .unwrap_or(0);
                let next = &options[(current + 1) % options.len()];
                target.set_value(&next.value());
                target.dispatch("change");
            }
            _ if target.has_listener("click") => {
                target.dispatch("click");
            }
            "a" => match target.attr("href") {
                Some(href) if href.starts_with('#') => self.host().set_hash(&href),
                Some(href) => self.status = format!("External link: {}", href),
                None => {}
            },
            _ => {}
        }
    }
}

// ============================================================================
// TERMINAL LOOP
// ============================================================================

pub fn run_ui(browser: &mut Browser) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, browser);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, browser: &mut Browser) -> io::Result<()> {
    let mut last = Instant::now();
    loop {
        let now = Instant::now();
        browser.tick(now.duration_since(last).as_secs_f64() * 1000.0);
        last = now;

        terminal.draw(|f| draw(f, browser))?;

        if event::poll(TICK)? {
            if let TermEvent::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && !browser.handle_key(key) {
                    return Ok(());
                }
            }
        }
    }
}

fn draw(f: &mut Frame, browser: &mut Browser) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Address bar
            Constraint::Min(0),    // Page
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_address_bar(f, chunks[0], browser);
    render_page(f, chunks[1], browser);
    render_status_bar(f, chunks[2], browser);
}

fn render_address_bar(f: &mut Frame, area: Rect, browser: &Browser) {
    let (text, border) = match &browser.mode {
        Mode::Address(buffer) => (format!("#{}_", buffer.trim_start_matches('#')), Color::Yellow),
        _ => (format!("#{}", browser.host().hash()), Color::Cyan),
    };

    let bar = Paragraph::new(Line::from(Span::styled(text, Style::default().fg(Color::White)))).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(" Credit Union Data "),
    );
    f.render_widget(bar, area);
}

fn render_page(f: &mut Frame, area: Rect, browser: &mut Browser) {
    let screen = browser.screen();
    if browser.focus >= screen.focusables.len() {
        browser.focus = 0;
    }

    // Keep the focused line on screen
    let visible = area.height.saturating_sub(2);
    if let Some(line) = screen.line_of(browser.focus).map(|l| l as u16) {
        if line < browser.scroll {
            browser.scroll = line;
        } else if visible > 0 && line >= browser.scroll + visible {
            browser.scroll = line + 1 - visible;
        }
    }

    let focus_style = Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD);
    let lines: Vec<Line> = screen
        .lines
        .iter()
        .map(|line| {
            Line::from(
                line.iter()
                    .map(|seg| {
                        let style = if seg.focus == Some(browser.focus) {
                            seg.style.patch(focus_style)
                        } else {
                            seg.style
                        };
                        Span::styled(seg.text.clone(), style)
                    })
                    .collect::<Vec<_>>(),
            )
        })
        .collect();

    let page = Paragraph::new(lines)
        .scroll((browser.scroll, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White)),
        );
    f.render_widget(page, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, browser: &Browser) {
    let hints: &[(&str, &str)] = match browser.mode {
        Mode::Browse => &[
            ("Tab", " Focus | "),
            ("Enter", " Open | "),
            ("g", " Go to | "),
            ("Bksp", " Back | "),
            ("↑/↓", " Scroll | "),
        ],
        Mode::Editing => &[("type", " Edit | "), ("Enter/Esc", " Done | ")],
        Mode::Address(_) => &[("Enter", " Go | "), ("Esc", " Cancel | ")],
    };

    let mut status_spans = vec![];
    if !browser.status.is_empty() {
        status_spans.push(Span::styled(
            format!(" {} ", browser.status),
            Style::default().fg(Color::Green),
        ));
        status_spans.push(Span::raw("| "));
    }
    for (key, label) in hints {
        status_spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(*label));
    }
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(Line::from(status_spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );
    f.render_widget(status_bar, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cu_data::children;
    use cu_data::db::{setup_snapshot_schema, Database};
    use cu_data::dom::{el, Attr};
    use rusqlite::Connection;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn database() -> Database {
        let conn = Connection::open_in_memory().unwrap();
        setup_snapshot_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO institutions VALUES (1, 'GOLDEN 1 CREDIT UNION', 'SACRAMENTO', 'CA');
             INSERT INTO institutions VALUES (2, 'ALLIANT CREDIT UNION', 'CHICAGO', 'IL');
             INSERT INTO savings_products VALUES (1, 'Ultimate Savings', 'https://g1.example', '4.25%', '$0', NULL, '2025-01-15');
             INSERT INTO web_presence VALUES (2, 'https://alliant.example', '2025-01-01');",
        )
        .unwrap();
        Database::from_connection(conn)
    }

    fn browser(hash: &str) -> Browser {
        let host = Host::with_hash(hash);
        let mut browser = Browser::new(App::start(&host, database()));
        browser.tick(2_000.0);
        browser
    }

    fn focus_on(browser: &mut Browser, pred: impl Fn(&ElementRef) -> bool) {
        let index = browser
            .screen()
            .focusables
            .iter()
            .position(|e| pred(e))
            .expect("no matching focusable");
        browser.focus = index;
    }

    #[test]
    fn test_layout_lines_and_focus() {
        let root = el(
            "div",
            vec![],
            children![
                el("h1", vec![Attr::text("Title")], vec![]),
                el(
                    "p",
                    vec![],
                    children![
                        "See ",
                        el("a", vec![Attr::attr("href", "#/browse"), Attr::text("Browse")], vec![]),
                    ],
                ),
                el("button", vec![Attr::text("Next"), Attr::attr("disabled", "true")], vec![]),
                el("select", vec![], children![el("option", vec![Attr::text("All States")], vec![])]),
            ],
        );

        let screen = layout(&root);
        let lines = screen.plain_lines();
        assert_eq!(lines[0], "Title");
        assert_eq!(lines[1], "See Browse ");
        assert_eq!(screen.focusables.len(), 2);
        assert_eq!(screen.focusables[0].tag(), "a");
        assert_eq!(screen.line_of(1), Some(2));
        assert!(lines[2].contains("[All States ▾]"));
    }

    #[test]
    fn test_dashboard_renders_as_text() {
        let browser = browser("/hysa");
        let text = browser.screen().plain_lines().join("\n");

        assert!(text.contains("Golden 1 Credit Union"));
        assert!(text.contains("4.25%"));
        assert!(text.contains("NCUA"));
    }

    #[test]
    fn test_enter_on_nav_link_navigates() {
        let mut browser = browser("/hysa");
        focus_on(&mut browser, |e| e.attr("href").as_deref() == Some("#/browse"));

        browser.handle_key(key(KeyCode::Enter));
        browser.tick(1_000.0);

        assert_eq!(browser.host().hash(), "/browse");
        assert_eq!(browser.focus, 0);
        assert!(browser.screen().plain_lines().join("\n").contains("Showing 1–2 of 2"));
    }

    #[test]
    fn test_typing_into_search_filters_results() {
        let mut browser = browser("/browse");
        focus_on(&mut browser, |e| e.tag() == "input");

        browser.handle_key(key(KeyCode::Enter));
        assert_eq!(browser.mode, Mode::Editing);
        for c in "alliant".chars() {
            browser.handle_key(key(KeyCode::Char(c)));
        }
        browser.handle_key(key(KeyCode::Enter));
        browser.tick(1_000.0);

        assert_eq!(browser.mode, Mode::Browse);
        assert_eq!(browser.host().hash(), "/browse?q=alliant");
        assert!(browser.screen().plain_lines().join("\n").contains("Showing 1–1 of 1"));
    }

    #[test]
    fn test_select_cycles_states() {
        let mut browser = browser("/browse");
        focus_on(&mut browser, |e| e.tag() == "select");

        browser.activate();
        browser.tick(0.0);
        assert_eq!(browser.host().hash(), "/browse?state=CA");
    }

    #[test]
    fn test_address_bar_and_back() {
        let mut browser = browser("/hysa");

        browser.handle_key(key(KeyCode::Char('g')));
        for _ in 0.."/hysa".len() {
            browser.handle_key(key(KeyCode::Backspace));
        }
        for c in "/detail/2".chars() {
            browser.handle_key(key(KeyCode::Char(c)));
        }
        browser.handle_key(key(KeyCode::Enter));
        browser.tick(1_000.0);
        assert!(browser.screen().plain_lines().join("\n").contains("CHARTER #2"));

        browser.handle_key(key(KeyCode::Backspace));
        browser.tick(1_000.0);
        assert_eq!(browser.host().hash(), "/hysa");
    }

    #[test]
    fn test_quit_keys() {
        let mut browser = browser("/hysa");
        assert!(browser.handle_key(key(KeyCode::Tab)));
        assert!(!browser.handle_key(key(KeyCode::Char('q'))));
    }
}
