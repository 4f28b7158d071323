use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Caret, Dialog};
use crate::document::CellStyle;
use crate::models::HighlightColor;
use crate::session::NoticeLevel;
use crate::tui::InputMode;

const FOOTER_ROWS: u16 = 2;

/// Width and height available for article text inside `area`.
pub fn article_viewport(area: Rect) -> (usize, usize) {
    let width = area.width.saturating_sub(2);
    let height = area.height.saturating_sub(FOOTER_ROWS + 2);
    (usize::from(width), usize::from(height).max(1))
}

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Article
            Constraint::Length(1), // Progress bar
            Constraint::Length(1), // Timer, color, storage, notice
        ])
        .split(frame.area());

    render_article(frame, app, chunks[0]);
    render_progress(frame, app, chunks[1]);
    render_status(frame, app, chunks[2]);

    match app.dialog {
        Some(Dialog::Resume(position)) => render_resume_prompt(frame, position),
        Some(Dialog::Completion) => render_completion_prompt(frame, app),
        None => {}
    }
    if app.pending_removal.is_some() {
        render_confirm_removal(frame);
    }
    if app.show_help {
        render_help(frame);
    }
}

fn render_article(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(format!(" {} ", app.title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let caret = app.caret();
    let lines: Vec<Line> = app
        .layout
        .lines
        .iter()
        .enumerate()
        .skip(app.scroll)
        .take(usize::from(inner.height))
        .map(|(row, line)| {
            let mut spans = vec![Span::styled(line.prefix, Style::default().fg(Color::DarkGray))];
            let mut run = String::new();
            let mut run_style = Style::default();
            for (col, cell) in line.cells.iter().enumerate() {
                let mut style = cell_style(&cell.style);
                if app.is_selected(row, col) {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                if caret == Some(Caret { row, col }) {
                    style = style.bg(Color::LightCyan).fg(Color::Black);
                }
                if style != run_style && !run.is_empty() {
                    spans.push(Span::styled(std::mem::take(&mut run), run_style));
                }
                run_style = style;
                run.push(cell.ch);
            }
            if !run.is_empty() {
                spans.push(Span::styled(run, run_style));
            }
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_progress(frame: &mut Frame, app: &App, area: Rect) {
    let percentage = app.percentage();
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
        .ratio((percentage / 100.0).clamp(0.0, 1.0))
        .label(format!("{percentage:.1}%"));
    frame.render_widget(gauge, area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let timer = format_time(app.time_spent());
    let paused = if app.is_paused() { " ⏸" } else { "" };
    let color = app.color();

    let mut spans = vec![
        Span::styled(format!(" ⏱ {timer}{paused} "), Style::default().fg(Color::White)),
        Span::raw("| "),
        Span::styled("●", Style::default().fg(highlight_color(color))),
        Span::raw(format!(" {color} | {} | ", app.storage_type())),
    ];

    match &app.notice {
        Some((notice, _)) => {
            let fg = match notice.level {
                NoticeLevel::Info => Color::Cyan,
                NoticeLevel::Success => Color::Green,
                NoticeLevel::Error => Color::Red,
            };
            spans.push(Span::styled(notice.message.clone(), Style::default().fg(fg)));
        }
        None => spans.push(Span::styled(
            key_hints(app.input_mode()),
            Style::default().fg(Color::DarkGray),
        )),
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn key_hints(mode: InputMode) -> &'static str {
    match mode {
        InputMode::Selecting => "hjkl/wb:move  m:anchor  Enter:highlight  x:remove  Esc:done",
        _ => "j/k:scroll  v:select  1-4:color  p:pause  e:export  ?:help  q:quit",
    }
}

fn render_resume_prompt(frame: &mut Frame, position: f64) {
    let text = format!(
        "\nYou stopped reading at row {position:.0}.\n\n r  Resume   s  Start over   a  Always resume"
    );
    render_popup(frame, " Welcome back ", &text, Color::Yellow, 60, 25);
}

fn render_completion_prompt(frame: &mut Frame, app: &App) {
    let text = format!(
        "\nYou reached {:.0}% in {}.\n\n c  Continue reading   r  Revise from the top",
        app.percentage(),
        format_time(app.time_spent())
    );
    render_popup(frame, " Article complete ", &text, Color::Green, 60, 25);
}

fn render_confirm_removal(frame: &mut Frame) {
    render_popup(
        frame,
        " Remove highlight ",
        "\nRemove this highlight?\n\n y  Remove   any other key  Keep",
        Color::Red,
        50,
        25,
    );
}

fn render_popup(frame: &mut Frame, title: &str, text: &str, accent: Color, x: u16, y: u16) {
    let area = centered_rect(x, y, frame.area());
    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent));
    let paragraph = Paragraph::new(text.to_string())
        .block(block)
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: false });

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame) {
    let area = centered_rect(50, 70, frame.area());

    let help_text = vec![
        "",
        " Reading:",
        "   j / ↓        Scroll down",
        "   k / ↑        Scroll up",
        "   Space/PgDn   Page down",
        "   PgUp         Page up",
        "   g / G        Top / bottom",
        "",
        " Highlighting:",
        "   v            Start selecting",
        "   h j k l      Move caret",
        "   w / b        Next / previous word",
        "   m / Space    Drop anchor at caret",
        "   Enter        Highlight selection",
        "   x            Remove highlight under caret",
        "   1 2 3 4      Yellow, green, pink, blue",
        "",
        " Session:",
        "   p            Pause / resume timer",
        "   e            Export highlights",
        "   ?            Toggle this help",
        "   q            Quit",
        "",
        " Press any key to close",
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(help_text.join("\n"))
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn cell_style(style: &CellStyle) -> Style {
    let mut out = Style::default();
    if style.heading {
        out = out.fg(Color::Cyan).add_modifier(Modifier::BOLD);
    }
    if style.quote {
        out = out.fg(Color::Gray);
    }
    if style.code {
        out = out.fg(Color::LightYellow);
    }
    if style.link {
        out = out.fg(Color::Blue).add_modifier(Modifier::UNDERLINED);
    }
    if style.emphasis {
        out = out.add_modifier(Modifier::ITALIC);
    }
    if style.strong {
        out = out.add_modifier(Modifier::BOLD);
    }
    if let Some(color) = style.highlight {
        out = out.bg(highlight_color(color)).fg(Color::Black);
    }
    out
}

fn highlight_color(color: HighlightColor) -> Color {
    match color {
        HighlightColor::Yellow => Color::Yellow,
        HighlightColor::Green => Color::Green,
        HighlightColor::Pink => Color::Magenta,
        HighlightColor::Blue => Color::LightBlue,
    }
}

pub fn format_time(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_is_minutes_and_seconds() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(75), "01:15");
        assert_eq!(format_time(3600), "60:00");
    }

    #[test]
    fn viewport_leaves_room_for_border_and_footer() {
        assert_eq!(article_viewport(Rect::new(0, 0, 80, 24)), (78, 20));
        assert_eq!(article_viewport(Rect::new(0, 0, 10, 3)), (8, 1));
    }

    #[test]
    fn highlighted_text_is_dark_on_its_color() {
        let style = cell_style(&CellStyle {
            highlight: Some(HighlightColor::Pink),
            emphasis: true,
            ..CellStyle::default()
        });
        assert_eq!(style.bg, Some(Color::Magenta));
        assert_eq!(style.fg, Some(Color::Black));
        assert!(style.add_modifier.contains(Modifier::ITALIC));
    }
}
