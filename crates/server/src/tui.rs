use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, Paragraph};
use ratatui::Frame;

use crate::server::ServerStats;

/// Connection summary for the TUI's players pane (`list`/`players`).
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub session_id: u32,
    pub player_id: u32,
    pub player_name: String,
    pub addr: String,
    pub ping_ms: f32,
    pub admin: bool,
}

const MAX_LOG_LINES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Info,
    Warn,
    Error,
}

struct LogLine {
    level: LogLevel,
    text: String,
}

/// Operator console state: scrollback log plus an editable command line,
/// pared down to what the headless/TUI split in `main.rs` actually drives
/// and extended with the admin command input.
pub struct TuiState {
    log: Vec<LogLine>,
    input: String,
    last_result: Option<String>,
}

impl TuiState {
    pub fn new() -> Self {
        Self { log: Vec::new(), input: String::new(), last_result: None }
    }

    fn push(&mut self, level: LogLevel, text: String) {
        self.log.push(LogLine { level, text });
        if self.log.len() > MAX_LOG_LINES {
            self.log.remove(0);
        }
    }

    pub fn log_info(&mut self, text: impl Into<String>) {
        self.push(LogLevel::Info, text.into());
    }

    pub fn log_warn(&mut self, text: impl Into<String>) {
        self.push(LogLevel::Warn, text.into());
    }

    pub fn log_error(&mut self, text: impl Into<String>) {
        self.push(LogLevel::Error, text.into());
    }

    pub fn push_char(&mut self, c: char) {
        self.input.push(c);
    }

    pub fn pop_char(&mut self) {
        self.input.pop();
    }

    /// Takes the current input line, clearing it, for the caller to run
    /// through `admin::parse_command`/`GameServer::run_admin_command`.
    pub fn take_submitted_line(&mut self) -> Option<String> {
        if self.input.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.input))
    }

    pub fn set_result(&mut self, result: String) {
        self.last_result = Some(result.clone());
        self.log_info(result);
    }
}

impl Default for TuiState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn render(frame: &mut Frame, state: &TuiState, stats: &ServerStats, clients: &[ClientInfo]) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], stats);
    render_status(frame, chunks[1], stats);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[2]);
    render_log(frame, body[0], state);
    render_players(frame, body[1], clients);

    render_input(frame, chunks[3], state);
}

fn render_header(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let uptime = format_duration(stats.uptime_secs);
    let title = format!(" worldsim-server — uptime {} ", uptime);
    let block = Block::default().title(title).borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan));
    let mode = if stats.paused { "PAUSED" } else { "running" };
    let text = format!(
        "tick {}  |  {}  |  speed {:.2}x  |  entities {}",
        stats.tick, mode, stats.game_speed, stats.entity_count
    );
    frame.render_widget(Paragraph::new(text).block(block), area);
}

fn render_status(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let block = Block::default().title(" Players ").borders(Borders::ALL).border_style(Style::default().fg(Color::Green));
    let ratio = stats.client_count as f64 / stats.max_clients.max(1) as f64;
    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(ratio.min(1.0))
        .label(format!("{}/{}", stats.client_count, stats.max_clients));
    frame.render_widget(gauge, area);
}

fn render_log(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default().title(" Log ").borders(Borders::ALL).border_style(Style::default().fg(Color::Yellow));
    let items: Vec<Line> = state
        .log
        .iter()
        .rev()
        .take(area.height.saturating_sub(2) as usize)
        .rev()
        .map(|line| {
            let color = match line.level {
                LogLevel::Info => Color::White,
                LogLevel::Warn => Color::Yellow,
                LogLevel::Error => Color::Red,
            };
            Line::from(Span::styled(line.text.clone(), Style::default().fg(color)))
        })
        .collect();
    frame.render_widget(Paragraph::new(items).block(block), area);
}

fn render_players(frame: &mut Frame, area: Rect, clients: &[ClientInfo]) {
    let block = Block::default().title(" Connections ").borders(Borders::ALL).border_style(Style::default().fg(Color::Blue));
    let items: Vec<ListItem> = clients
        .iter()
        .map(|c| {
            let admin = if c.admin { "*" } else { " " };
            ListItem::new(format!("{admin}{} {} {} {:.0}ms", c.player_id, c.player_name, c.addr, c.ping_ms))
        })
        .collect();
    frame.render_widget(List::new(items).block(block), area);
}

fn render_input(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .title(" Command (Enter to run, Esc to quit) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let text = Paragraph::new(format!("> {}", state.input))
        .block(block)
        .style(Style::default().add_modifier(Modifier::BOLD));
    frame.render_widget(text, area);
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}
