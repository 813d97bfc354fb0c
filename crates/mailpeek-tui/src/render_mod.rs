use ratatui::layout::{Constraint, Direction, Layout as Split, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Row, Table, TableState, Wrap};
use unicode_width::{UnicodeWidthChar as _, UnicodeWidthStr as _};

use mailpeek_core::{INBOX, Message};

use crate::browse_mod::{Browser, DetailView, Mode};
use crate::layout_mod::{DETAIL_HEADER_HEIGHT, HELP_BAR_HEIGHT, SEARCH_BAR_HEIGHT, TITLE_HEIGHT};

const HEADER_STYLE: Style = Style::new().fg(Color::Cyan).add_modifier(Modifier::BOLD);
const LABEL_STYLE: Style = Style::new().fg(Color::DarkGray);
const CURSOR_STYLE: Style = Style::new().bg(Color::Blue).fg(Color::White);
const BORDER_STYLE: Style = Style::new().fg(Color::DarkGray);
const HELP_WRAP_SLACK: usize = 12;

/// Draws the whole screen for the current state.
pub(crate) fn draw(frame: &mut ratatui::Frame, browser: &Browser) {
    let area = frame.area();
    let show_search = browser.shows_search_bar();
    let chunks = Split::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(TITLE_HEIGHT),
            Constraint::Length(if show_search { SEARCH_BAR_HEIGHT } else { 0 }),
            Constraint::Min(1),
            Constraint::Length(HELP_BAR_HEIGHT),
        ])
        .split(area);

    render_title(frame, chunks[0], browser);
    if show_search {
        render_search_bar(frame, chunks[1], browser);
    }
    match browser.mode() {
        Mode::Detail(view) => render_detail(frame, chunks[2], browser, view),
        Mode::List | Mode::Searching => render_message_list(frame, chunks[2], browser),
    }
    render_help_bar(frame, chunks[3], browser);
}

fn render_title(frame: &mut ratatui::Frame, area: Rect, browser: &Browser) {
    let total = browser.messages().len();
    let shown = browser.visible_indices().len();
    let counts = if browser.is_filtered() {
        format!("{shown}/{total} messages")
    } else {
        format!("{total} messages")
    };
    let line = Line::from(vec![
        Span::styled("mailpeek", HEADER_STYLE),
        Span::raw(format!("  {INBOX}  ")),
        Span::styled(counts, LABEL_STYLE),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_search_bar(frame: &mut ratatui::Frame, area: Rect, browser: &Browser) {
    let input = browser.input();
    let block = Block::default()
        .borders(Borders::ALL)
        .title("SEARCH")
        .border_style(if input.is_focused() {
            HEADER_STYLE
        } else {
            BORDER_STYLE
        });
    let inner = block.inner(area);
    let label = "Query: ";
    let line = Line::from(vec![
        Span::styled(label, LABEL_STYLE),
        Span::raw(browser.query()),
    ]);
    frame.render_widget(Paragraph::new(line).block(block), area);

    if input.is_focused() {
        let before: String = input.value().chars().take(input.cursor()).collect();
        let x = inner.x + (label.width() + before.width()) as u16;
        if x < inner.x + inner.width {
            frame.set_cursor_position((x, inner.y));
        }
    }
}

fn render_message_list(frame: &mut ratatui::Frame, area: Rect, browser: &Browser) {
    let layout = browser.layout();
    let area = Rect {
        height: area.height.min(layout.list_height + 3),
        ..area
    };
    let header = Row::new(vec!["Sender", "Date", "Time", "Message"]).style(HEADER_STYLE);

    let visible = browser.visible_indices();
    let rows_visible = (layout.list_height as usize).min(area.height.saturating_sub(3) as usize);
    let start = browser.list_cursor().window_start(visible.len(), rows_visible);
    let end = (start + rows_visible).min(visible.len());
    let cols = layout.columns;
    let rows: Vec<Row> = visible[start..end]
        .iter()
        .enumerate()
        .filter_map(|(offset, &idx)| {
            let message = browser.messages().get(idx)?;
            let style = if start + offset == browser.cursor() {
                CURSOR_STYLE
            } else {
                Style::default()
            };
            Some(message_row(message, cols.sender, cols.message).style(style))
        })
        .collect();

    let table = Table::new(rows, cols.as_array().map(Constraint::Length))
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("MESSAGES")
                .border_style(BORDER_STYLE),
        )
        .column_spacing(1);
    frame.render_stateful_widget(table, area, &mut TableState::default());

    if visible.is_empty() && area.height > 3 {
        let msg = if browser.is_filtered() {
            "No matches"
        } else {
            "No messages"
        };
        let hint_area = Rect {
            x: area.x + 2,
            y: area.y + 2,
            width: area.width.saturating_sub(4),
            height: 1,
        };
        frame.render_widget(Paragraph::new(msg).style(LABEL_STYLE), hint_area);
    }
}

fn message_row(message: &Message, sender_width: u16, message_width: u16) -> Row<'static> {
    Row::new(vec![
        truncate_label(&message.from, sender_width as usize),
        message.date_part().to_string(),
        message.time_part().to_string(),
        truncate_label(&message.subject, message_width as usize),
    ])
}

fn render_detail(frame: &mut ratatui::Frame, area: Rect, browser: &Browser, view: &DetailView) {
    let Some(message) = browser.messages().get(view.message) else {
        return;
    };
    let layout = browser.layout();
    let block = Block::default()
        .borders(Borders::ALL)
        .title("MESSAGE")
        .border_style(BORDER_STYLE);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // The body gets its full viewport height; the header gives up rows first.
    let (_, body_height) = view.viewport.size();
    let header_height = inner
        .height
        .saturating_sub(body_height)
        .min(DETAIL_HEADER_HEIGHT);
    let chunks = Split::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(header_height), Constraint::Min(1)])
        .split(inner);

    let field = |name: &'static str, value: &str| {
        Line::from(vec![
            Span::styled(format!("{name:<9}"), LABEL_STYLE),
            Span::raw(truncate_label(value, layout.detail_width as usize)),
        ])
    };
    let header = vec![
        field("From:", &message.from),
        field("Date:", message.date_part()),
        field("Time:", message.time_part()),
        field("Subject:", &message.subject),
    ];
    frame.render_widget(
        Paragraph::new(header).block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(BORDER_STYLE),
        ),
        chunks[0],
    );

    let body: Vec<Line> = view
        .viewport
        .visible_lines()
        .iter()
        .map(|line| Line::raw(line.as_str()))
        .collect();
    frame.render_widget(Paragraph::new(body), chunks[1]);

    let total = view.viewport.total_lines();
    let height = body_height;
    if total > height as usize {
        let pos = format!(
            " {}-{}/{} ",
            view.viewport.offset() + 1,
            (view.viewport.offset() + height as usize).min(total),
            total
        );
        let pos_width = (pos.width() as u16).min(area.width);
        let x = area.x + area.width.saturating_sub(pos_width + 1);
        let y = area.y + area.height.saturating_sub(1);
        frame.render_widget(
            Paragraph::new(pos).style(LABEL_STYLE),
            Rect::new(x, y, pos_width, 1),
        );
    }
}

fn render_help_bar(frame: &mut ratatui::Frame, area: Rect, browser: &Browser) {
    let suffix = match browser.mode() {
        Mode::Searching => "  enter keep filter  esc clear",
        Mode::List if browser.is_filtered() => "  esc clear filter",
        _ => "",
    };
    let lines = HELP_BAR_HEIGHT.saturating_sub(1) as usize;
    let full = format!("{}{suffix}", browser.keys().help_line(false));
    // Word wrap can leave up to one long label's worth of slack per line.
    let help = if full.width() + HELP_WRAP_SLACK * lines <= area.width as usize * lines {
        full
    } else {
        format!("{}{suffix}", browser.keys().help_line(true))
    };
    frame.render_widget(
        Paragraph::new(help)
            .style(LABEL_STYLE)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(BORDER_STYLE),
            ),
        area,
    );
}

/// Fits `label` on one line of `max_width` columns, marking cuts with "...".
fn truncate_label(label: &str, max_width: usize) -> String {
    let text = label.replace(['\n', '\r'], " ");
    if text.width() <= max_width {
        return text;
    }
    let budget = if max_width <= 3 { max_width } else { max_width - 3 };
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        out.push(ch);
        used += w;
    }
    if max_width > 3 {
        out.push_str("...");
    }
    out
}
