//! Terminal UI rendering with ratatui

use crate::field::{Cell, BOTTOM, LEFT, RIGHT, TOP};
use crate::menu::{RankingScreen, TitleScreen};
use crate::ranking::RankingTable;
use crate::round::{Round, RoundState};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const BLOCK: &str = "██";
const EMPTY: &str = "  ";

/// Playable columns * 2 chars + border
const FIELD_WIDTH: u16 = (RIGHT - LEFT + 1) as u16 * 2 + 2;
/// Visible rows + border
const FIELD_HEIGHT: u16 = (BOTTOM - TOP + 1) as u16 + 2;
const PANEL_WIDTH: u16 = 26;
const GAME_WIDTH: u16 = FIELD_WIDTH + PANEL_WIDTH;

/// Block color per cell color index 1..=5
fn block_color(color: u8) -> Color {
    match color {
        1 => Color::Red,
        2 => Color::Yellow,
        3 => Color::Green,
        4 => Color::Blue,
        5 => Color::Magenta,
        _ => Color::DarkGray,
    }
}

/// Change-flash timers for the score panel rows
#[derive(Debug, Default)]
pub struct ScoreFx {
    last: [u64; 4],
    timer: [u8; 4],
}

impl ScoreFx {
    /// Advance one frame; a changed value starts a 32-frame highlight
    pub fn update(&mut self, values: [u64; 4]) {
        for i in 0..4 {
            if self.last[i] != values[i] {
                self.last[i] = values[i];
                self.timer[i] = 32;
            } else {
                self.timer[i] = self.timer[i].saturating_sub(1);
            }
        }
    }

    fn style(&self, i: usize) -> Style {
        if self.timer[i] > 0 {
            Style::default().fg(Color::Rgb(96 + self.timer[i] * 3, 64, 255))
        } else {
            Style::default().fg(Color::White)
        }
    }
}

/// Decimal with `,` thousands separators
pub fn group_digits(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn center_rect(area: Rect, width: u16, height: u16) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

/// Render the game screen: field, falling piece, preview and score panel
pub fn render_game(frame: &mut Frame, round: &Round, fx: &ScoreFx) {
    let area = center_rect(frame.area(), GAME_WIDTH, FIELD_HEIGHT.max(16));
    let layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(FIELD_WIDTH), Constraint::Length(PANEL_WIDTH)])
        .split(area);

    render_field(frame, round, layout[0]);
    render_panel(frame, round, fx, layout[1]);

    if let Some(message) = round.message() {
        if !message.is_empty() {
            let inner = Rect::new(
                layout[0].x + 1,
                layout[0].y + FIELD_HEIGHT / 2,
                FIELD_WIDTH - 2,
                1,
            );
            let style = match round.state {
                RoundState::Over3 => Style::default().fg(Color::Red).bold(),
                _ => Style::default().fg(Color::Cyan).bold(),
            };
            frame.render_widget(Clear, inner);
            frame.render_widget(
                Paragraph::new(Line::styled(message, style)).alignment(Alignment::Center),
                inner,
            );
        }
    }
}

fn render_field(frame: &mut Frame, round: &Round, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Piece cells, drawn over the field; the previous rotation state leaves
    // a one-tick trail after a spin
    let piece_cells = round.piece.cells();
    let trail_cells = if round.piece.last_rotate != round.piece.rotate {
        Some(round.piece.cells_at(round.piece.last_rotate))
    } else {
        None
    };
    let piece_visible = round.piece.is_visible()
        && matches!(round.state, RoundState::Main | RoundState::Lock);

    let mut rows = Vec::new();
    for y in TOP..=BOTTOM {
        let mut spans = Vec::new();
        for x in LEFT..=RIGHT {
            let piece_here = piece_visible
                .then(|| piece_cells.iter().find(|&&(px, py, _)| (px, py) == (x, y)))
                .flatten();
            let span = if let Some(&(_, _, color)) = piece_here {
                let style = if round.lock_tint() {
                    Style::default().fg(Color::White).bold()
                } else {
                    Style::default().fg(block_color(color))
                };
                Span::styled(BLOCK, style)
            } else if piece_visible
                && trail_cells
                    .map(|cells| cells.iter().any(|&(px, py, _)| (px, py) == (x, y)))
                    .unwrap_or(false)
            {
                Span::styled(BLOCK, Style::default().fg(Color::DarkGray))
            } else {
                render_cell(round, x, y)
            };
            spans.push(span);
        }
        rows.push(Line::from(spans));
    }
    frame.render_widget(Paragraph::new(rows), inner);
}

fn render_cell(round: &Round, x: i32, y: i32) -> Span<'static> {
    match round.field.get(x, y) {
        Cell::Empty => Span::raw(EMPTY),
        Cell::Block(c) => Span::styled(BLOCK, Style::default().fg(block_color(c))),
        Cell::Gray => Span::styled(BLOCK, Style::default().fg(Color::DarkGray)),
        Cell::Marked => {
            // Flash marked cells; diagonal runs flash warm, orthogonal cold,
            // following the original's line-effect colors
            let diagonal = round
                .erase_lines
                .iter()
                .filter(|l| l.is_diagonal())
                .any(|l| (0..l.len as i32).any(|k| (l.x + l.dx * k, l.y + l.dy * k) == (x, y)));
            let color = if round.timer % 4 < 2 {
                Color::White
            } else if diagonal {
                Color::Rgb(0xc0, 0x60, 0x00)
            } else {
                Color::Rgb(0x00, 0x60, 0xc0)
            };
            Span::styled(BLOCK, Style::default().fg(color).bold())
        }
        Cell::Wall => Span::styled(BLOCK, Style::default().fg(Color::Gray)),
    }
}

fn render_panel(frame: &mut Frame, round: &Round, fx: &ScoreFx, area: Rect) {
    let player = &round.player;
    let mut lines = vec![Line::raw("")];

    // Next-piece preview in spawn orientation: vertical tail above the
    // pivot, horizontal tail to its right
    let next = player.next_colors;
    lines.push(Line::styled("NEXT", Style::default().fg(Color::Gray)));
    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled(BLOCK, Style::default().fg(block_color(next[1]))),
    ]));
    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled(BLOCK, Style::default().fg(block_color(next[0]))),
        Span::styled(BLOCK, Style::default().fg(block_color(next[2]))),
    ]));
    lines.push(Line::raw(""));

    lines.push(Line::styled("A/D: move  J/K: rotate", Style::default().fg(Color::DarkGray)));
    lines.push(Line::styled("S: drop    Esc: quit", Style::default().fg(Color::DarkGray)));
    lines.push(Line::raw(""));

    lines.push(Line::from(vec![
        Span::styled("High-Score: ", Style::default().fg(Color::Gray)),
        Span::styled(group_digits(player.top_score), fx.style(0)),
    ]));
    lines.push(Line::from(vec![
        Span::styled("Score:      ", Style::default().fg(Color::Gray)),
        Span::styled(group_digits(player.score), fx.style(1)),
    ]));
    lines.push(dalaigon_line(round));
    lines.push(Line::from(vec![
        Span::styled("Level:      ", Style::default().fg(Color::Gray)),
        Span::styled(player.level.to_string(), fx.style(2)),
    ]));
    lines.push(Line::from(vec![
        Span::styled("Erase:      ", Style::default().fg(Color::Gray)),
        Span::styled(group_digits(player.erase as u64), fx.style(3)),
    ]));

    frame.render_widget(Paragraph::new(lines), area);
}

/// The multiplier readout: normally the current dalaigon factor; during an
/// erase flash, the scored base, then the awarded points
fn dalaigon_line(round: &Round) -> Line<'static> {
    let player = &round.player;
    let text = match round.state {
        RoundState::Erase if round.timer > 15 => {
            format!("{} x {}", group_digits(round.last_base), player.diag_value())
        }
        RoundState::Erase => format!("+{}", group_digits(player.increased_score)),
        _ => format!("dalaigon x {}", player.diag_value()),
    };
    Line::styled(text, Style::default().fg(Color::Magenta))
}

/// Render the title screen
pub fn render_title(frame: &mut Frame, title: &TitleScreen, top_score: u64) {
    let area = center_rect(frame.area(), 44, 14);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = vec![
        Line::raw(""),
        Line::styled("D A L A I G O N", Style::default().fg(Color::Cyan).bold()),
        Line::styled("falling-block puzzle", Style::default().fg(Color::Gray)),
        Line::raw(""),
        Line::from(vec![
            Span::styled("HIGH SCORE:  ", Style::default().fg(Color::Gray)),
            Span::styled(group_digits(top_score), Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::styled("START LEVEL: ", Style::default().fg(Color::Gray)),
            Span::styled(title.start_level.to_string(), Style::default().fg(Color::White)),
            Span::raw("  "),
            Span::styled(title.indicator(), Style::default().fg(Color::Yellow)),
        ]),
        Line::raw(""),
        Line::styled("A/D: start level -/+", Style::default().fg(Color::DarkGray)),
        Line::styled("H: help  R: ranking  J: start", Style::default().fg(Color::DarkGray)),
        Line::styled("Esc: quit", Style::default().fg(Color::DarkGray)),
    ];
    frame.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center),
        inner,
    );
}

/// Render the help screen
pub fn render_help(frame: &mut Frame) {
    let area = center_rect(frame.area(), 48, 16);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = vec![
        Line::raw(""),
        Line::styled("dalaigon is a falling-block puzzle game.", Style::default()),
        Line::raw(""),
        Line::raw("Press A/D to move blocks left/right, K/J"),
        Line::raw("to rotate them, and S to drop them."),
        Line::raw(""),
        Line::raw("When 3 or more blocks of the same kind"),
        Line::raw("are connected horizontally, vertically,"),
        Line::raw("or diagonally, they will disappear."),
        Line::raw(""),
        Line::raw("To earn more points, keep the dalaigon"),
        Line::raw("score multiplier high. It rises with"),
        Line::raw("diagonal erases (up to x20) and falls"),
        Line::raw("with horizontal or vertical ones."),
        Line::styled("[[Press J key]]", Style::default().fg(Color::DarkGray)),
    ];
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), inner);
}

/// Render the ranking screen; the freshly earned row flashes
pub fn render_ranking(frame: &mut Frame, screen: &RankingScreen, table: &RankingTable) {
    let area = center_rect(frame.area(), 40, 14);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray))
        .title(" TOP 7 ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = vec![
        Line::raw(""),
        Line::styled(
            format!("{:<3}{:>12}  {:>3}  {:>7}", "#", "SCORE", "LV", "BLOCK"),
            Style::default().fg(Color::Gray),
        ),
    ];
    for (i, entry) in table.entries().iter().enumerate() {
        let style = if table.last_rank == Some(i) {
            let c = screen.flash_time as u8;
            Style::default().fg(Color::Rgb(c.saturating_mul(5), 0, c)).bold()
        } else {
            Style::default().fg(Color::White)
        };
        lines.push(Line::styled(
            format!(
                "{:<3}{:>12}  {:>3}  {:>7}",
                i + 1,
                group_digits(entry.score),
                entry.level,
                group_digits(entry.erase as u64),
            ),
            style,
        ));
    }
    lines.push(Line::raw(""));
    lines.push(Line::styled("[[Press J key]]", Style::default().fg(Color::DarkGray)));
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), inner);
}
