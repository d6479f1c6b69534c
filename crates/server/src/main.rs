mod config;
mod events;
mod server;
mod tui;

use std::io;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use config::CliOverrides;
use events::ServerEvent;
use server::GameServer;
use tui::TuiState;
use worldsim_core::net::PacketLossSimulation;

/// Operator CLI: every flag overrides the matching config-file key; the
/// config file overrides built-in defaults.
#[derive(Parser)]
#[command(name = "worldsim-server")]
#[command(about = "Authoritative world simulation server")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long)]
    port: Option<u16>,

    #[arg(short, long, default_value = "worldsim.toml")]
    config: PathBuf,

    #[arg(short, long)]
    tick_rate: Option<u32>,

    #[arg(short = 'm', long)]
    max_clients: Option<usize>,

    #[arg(long)]
    no_pvp: bool,

    #[arg(long)]
    headless: bool,

    #[arg(long, help = "Enable the packet-loss/latency test harness")]
    simulate_packet_loss: bool,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 0, help = "Extra one-way latency in ms")]
    extra_latency: u32,

    #[arg(long, default_value_t = 0, help = "Latency jitter in ms")]
    jitter: u32,
}

fn main() {
    let args = Args::parse();

    let config = match config::load(
        &args.config,
        CliOverrides {
            port: args.port,
            tick_rate: args.tick_rate,
            max_clients: args.max_clients,
            pvp: args.no_pvp.then_some(false),
        },
    ) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            std::process::exit(2);
        }
    };

    let bind_addr = config::bind_addr(&args.bind, config.port);

    let mut server = match GameServer::new(&bind_addr, config) {
        Ok(server) => server,
        Err(err) => {
            eprintln!("failed to bind {bind_addr}: {err}");
            std::process::exit(1);
        }
    };

    if args.simulate_packet_loss {
        server = server.with_packet_loss(PacketLossSimulation::new(
            args.loss_percent / 100.0,
            args.extra_latency,
            args.jitter,
        ));
    }

    let exit_code = if args.headless {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        log::info!("server listening on {}", server.local_addr());
        server.run();
        log::info!("server shut down");
        0
    } else {
        match run_with_tui(&mut server) {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("tui error: {err}");
                1
            }
        }
    };

    std::process::exit(exit_code);
}

fn run_with_tui(server: &mut GameServer) -> io::Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let running = server.running();
    let mut tui_state = TuiState::new();
    tui_state.log_info(format!("server listening on {}", server.local_addr()));

    while running.load(Ordering::SeqCst) {
        server.tick_once();

        for event in server.drain_events() {
            match event {
                ServerEvent::ClientConnecting { addr } => {
                    tui_state.log_info(format!("connection request from {addr}"));
                }
                ServerEvent::ClientConnected { session_id, addr, player_id } => {
                    tui_state.log_info(format!("session {session_id} ({addr}) authenticated as player {player_id}"));
                }
                ServerEvent::ClientDisconnected { session_id, reason } => {
                    tui_state.log_info(format!("session {session_id} {}", reason.as_str()));
                }
                ServerEvent::ConnectionDenied { addr, reason } => {
                    tui_state.log_warn(format!("connection denied to {addr}: {reason}"));
                }
                ServerEvent::Error { message } => {
                    tui_state.log_error(message);
                }
            }
        }

        if event::poll(Duration::from_millis(1))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Esc => running.store(false, Ordering::SeqCst),
                        KeyCode::Enter => {
                            if let Some(line) = tui_state.take_submitted_line() {
                                if line.eq_ignore_ascii_case("stop") || line.eq_ignore_ascii_case("quit") {
                                    running.store(false, Ordering::SeqCst);
                                } else if line.eq_ignore_ascii_case("status") {
                                    let stats = server.stats();
                                    tui_state.set_result(format!(
                                        "tick={} players={}/{} entities={}",
                                        stats.tick, stats.client_count, stats.max_clients, stats.entity_count
                                    ));
                                } else if line.eq_ignore_ascii_case("players") {
                                    let names: Vec<String> =
                                        server.client_infos().iter().map(|c| c.player_name.clone()).collect();
                                    tui_state.set_result(names.join(", "));
                                } else {
                                    let result = server.run_admin_command(&line);
                                    tui_state.set_result(result);
                                }
                            }
                        }
                        KeyCode::Backspace => tui_state.pop_char(),
                        KeyCode::Char(c) => tui_state.push_char(c),
                        _ => {}
                    }
                }
            }
        }

        let stats = server.stats();
        let clients = server.client_infos();
        terminal.draw(|frame| {
            tui::render(frame, &tui_state, &stats, &clients);
        })?;
    }

    tui_state.log_info("shutting down");
    server.shutdown_connections();

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;

    Ok(())
}
