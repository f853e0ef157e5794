//! DALAIGON - a falling-block matching puzzle for the terminal
//!
//! Match three or more of a color in a row, column or diagonal; diagonal
//! erases feed the dalaigon score multiplier.

mod field;
mod input;
mod lines;
mod menu;
mod piece;
mod player;
mod ranking;
mod round;
mod settings;
mod ui;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use input::KeySet;
use menu::{HelpScreen, RankingScreen, ScreenAction, TitleScreen};
use ratatui::{backend::CrosstermBackend, Terminal};
use round::{Round, TickClock};
use settings::Settings;
use std::{
    io::{self, stdout},
    time::{Duration, Instant},
};
use ui::ScoreFx;

/// Render frame rate; game logic runs on its own 60 Hz tick clock
const TARGET_FPS: u64 = 60;
const FRAME_DURATION: Duration = Duration::from_micros(1_000_000 / TARGET_FPS);

/// Application state
enum AppState {
    Title(TitleScreen),
    Help(HelpScreen),
    Ranking(RankingScreen),
    Playing(Round),
}

/// Get the dalaigon temp directory for logs, creating it if needed
fn dalaigon_temp_dir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join("dalaigon");
    let _ = std::fs::create_dir_all(&dir);
    dir
}

fn main() -> io::Result<()> {
    // Generate a session ID for this instance
    let session_id: u32 = rand::random();

    let log_dir = dalaigon_temp_dir();
    let log_file = format!("{:08x}.log", session_id);

    // Setup tracing to a log file; stdout belongs to the TUI
    let file_appender = tracing_appender::rolling::never(&log_dir, &log_file);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dalaigon=debug".parse().unwrap()),
        )
        .with_ansi(false)
        .init();

    tracing::info!(
        "dalaigon starting up, session={:08x}, log={}",
        session_id,
        log_dir.join(&log_file).display()
    );

    let mut settings = Settings::load();

    // Setup terminal
    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(&mut terminal, &mut settings);

    // Restore terminal
    disable_raw_mode()?;
    execute!(stdout(), LeaveAlternateScreen)?;

    // Save settings (including any new ranking entries)
    if let Err(e) = settings.save() {
        eprintln!("Warning: Could not save settings: {}", e);
    }

    if result.is_ok() {
        println!("\nThanks for playing dalaigon!");
        println!("High score: {}", ui::group_digits(settings.ranking.top_score()));
    }

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    settings: &mut Settings,
) -> io::Result<()> {
    let mut state = AppState::Title(TitleScreen::new(0));
    let mut keyset = KeySet::from_config(&settings.keys);
    let mut clock = TickClock::new();
    let mut fx = ScoreFx::default();
    let mut start_level = 0u32;
    let mut last_frame = Instant::now();

    loop {
        terminal.draw(|frame| match &state {
            AppState::Title(title) => ui::render_title(frame, title, settings.ranking.top_score()),
            AppState::Help(_) => ui::render_help(frame),
            AppState::Ranking(screen) => ui::render_ranking(frame, screen, &settings.ranking),
            AppState::Playing(round) => ui::render_game(frame, round, &fx),
        })?;

        // Drain terminal events into the key adapter
        if event::poll(FRAME_DURATION)? {
            while event::poll(Duration::ZERO)? {
                if let Event::Key(key) = event::read()? {
                    if key.modifiers.contains(KeyModifiers::CONTROL)
                        && key.code == KeyCode::Char('c')
                    {
                        return Ok(());
                    }
                    match key.kind {
                        KeyEventKind::Press | KeyEventKind::Repeat => {
                            if key.code == KeyCode::Esc && key.kind == KeyEventKind::Press {
                                match &mut state {
                                    AppState::Title(_) => return Ok(()),
                                    AppState::Playing(_) => {
                                        // Abandon the round, nothing to clean up
                                        tracing::info!("round abandoned");
                                        keyset.clear();
                                        state = AppState::Title(TitleScreen::new(start_level));
                                    }
                                    _ => {
                                        keyset.clear();
                                        settings.ranking.clear_last_rank();
                                        state = AppState::Title(TitleScreen::new(start_level));
                                    }
                                }
                                continue;
                            }
                            keyset.key_down(key);
                        }
                        KeyEventKind::Release => keyset.key_up(key),
                    }
                }
            }
        }

        // Convert elapsed wall time into logical ticks, capped for catch-up
        let now = Instant::now();
        let ticks = clock.advance(now.duration_since(last_frame));
        last_frame = now;
        let controls = keyset.snapshot();

        for _ in 0..ticks {
            match &mut state {
                AppState::Title(title) => {
                    if let Some(action) = title.tick(controls) {
                        start_level = title.start_level;
                        keyset.clear();
                        state = match action {
                            ScreenAction::StartRound => {
                                tracing::info!(start_level, "round started");
                                AppState::Playing(Round::new(
                                    start_level,
                                    settings.ranking.top_score(),
                                ))
                            }
                            ScreenAction::ShowHelp => AppState::Help(HelpScreen::new()),
                            ScreenAction::ShowRanking => AppState::Ranking(RankingScreen::new()),
                            ScreenAction::BackToTitle => AppState::Title(TitleScreen::new(start_level)),
                        };
                        break;
                    }
                }
                AppState::Help(help) => {
                    if help.tick(controls).is_some() {
                        keyset.clear();
                        state = AppState::Title(TitleScreen::new(start_level));
                        break;
                    }
                }
                AppState::Ranking(screen) => {
                    if screen.tick(controls).is_some() {
                        keyset.clear();
                        settings.ranking.clear_last_rank();
                        state = AppState::Title(TitleScreen::new(start_level));
                        break;
                    }
                }
                AppState::Playing(round) => {
                    if let Some(outcome) = round.tick(controls) {
                        let rank = settings.ranking.record_result(
                            outcome.score,
                            outcome.level,
                            outcome.erase,
                        );
                        tracing::info!(
                            score = outcome.score,
                            level = outcome.level,
                            erase = outcome.erase,
                            ?rank,
                            "round finished"
                        );
                        if let Err(e) = settings.save() {
                            tracing::warn!("could not save settings: {}", e);
                        }
                        keyset.clear();
                        state = AppState::Ranking(RankingScreen::new());
                        break;
                    }
                }
            }
        }

        if let AppState::Playing(round) = &state {
            fx.update([
                round.player.top_score,
                round.player.score,
                round.player.level as u64,
                round.player.erase as u64,
            ]);
        }
    }
}
