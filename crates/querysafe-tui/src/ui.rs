use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, BorderType, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState,
    },
};
use querysafe_core::{Author, EntryView, FormattedLine, SpanStyle};
use querysafe_core::widget::TYPING_TEXT;
use crate::app::App;

const BRAND: Color = Color::Rgb(0x4b, 0x1a, 0x86);
const PANEL_MAX_WIDTH: u16 = 64;
const PANEL_MAX_HEIGHT: u16 = 32;
const MARGIN: u16 = 1;
const CREDIT: &str = "Made with ❤ by Metric Vibes";

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    render_backdrop(app, frame, area);

    if app.is_open() {
        render_panel(app, frame, area);
    } else {
        app.chat_area = None;
        render_launcher(app, frame, area);
    }
}

/// The "host page" behind the widget.
fn render_backdrop(app: &App, frame: &mut Frame, area: Rect) {
    let config = app.controller.widget().config();
    let hint = if app.is_open() {
        "Esc to minimize the chat"
    } else {
        "Enter to chat, q to quit"
    };

    let lines = vec![
        Line::from(Span::styled(
            format!(" querySafe v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray).bold(),
        )),
        Line::from(Span::styled(
            format!(" {} ", config.base_url),
            Style::default().fg(Color::DarkGray),
        )),
        Line::default(),
        Line::from(Span::styled(format!(" {} ", hint), Style::default().fg(Color::DarkGray))),
    ];

    frame.render_widget(Paragraph::new(lines), area);
}

/// Anchor a `width` x `height` box to the bottom-right corner of `area`.
fn bottom_right(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + area.width.saturating_sub(width + MARGIN);
    let y = area.y + area.height.saturating_sub(height + MARGIN);
    Rect::new(x, y, width.min(area.right() - x), height.min(area.bottom() - y))
}

fn badge(initials: &str) -> Span<'static> {
    Span::styled(
        format!(" {} ", initials),
        Style::default().bg(BRAND).fg(Color::White).add_modifier(Modifier::BOLD),
    )
}

fn render_launcher(app: &App, frame: &mut Frame, area: Rect) {
    let view = app.controller.widget().view();
    let label = Line::from(vec![
        badge(&view.header.initials),
        Span::raw(" "),
        Span::styled(view.header.display_name.to_string(), Style::default().bold()),
        Span::raw(" "),
    ]);

    let width = label.width() as u16 + 2;
    let rect = bottom_right(area, width, 3);

    let launcher = Paragraph::new(label).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(BRAND)),
    );

    frame.render_widget(Clear, rect);
    frame.render_widget(launcher, rect);
}

fn render_panel(app: &mut App, frame: &mut Frame, area: Rect) {
    let panel = bottom_right(area, PANEL_MAX_WIDTH, PANEL_MAX_HEIGHT);
    frame.render_widget(Clear, panel);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BRAND));
    let inner = block.inner(panel);
    frame.render_widget(block, panel);

    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(1),
        Constraint::Length(app.input_line_count() + 2),
        Constraint::Length(2),
    ])
    .areas(inner);

    render_header(app, frame, header_area);
    render_messages(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let view = app.controller.widget().view();
    let header = view.header;

    let mut subtitle = vec![
        Span::raw(" ".repeat(header.initials.chars().count() + 3)),
        Span::styled(header.subtitle, Style::default().fg(Color::Gray)),
    ];
    if let Some(logo) = header.logo_url {
        subtitle.push(Span::styled(format!("  {}", logo), Style::default().fg(Color::DarkGray)));
    }

    let lines = vec![
        Line::from(vec![
            Span::raw(" "),
            badge(&header.initials),
            Span::raw(" "),
            Span::styled(header.display_name.to_string(), Style::default().bold()),
        ]),
        Line::from(subtitle),
    ];

    frame.render_widget(Paragraph::new(lines), area);
}

fn span_style(style: SpanStyle) -> Style {
    let mut out = Style::default();
    if style.bold {
        out = out.add_modifier(Modifier::BOLD);
    }
    if style.italic {
        out = out.add_modifier(Modifier::ITALIC);
    }
    if style.strikethrough {
        out = out.add_modifier(Modifier::CROSSED_OUT);
    }
    if style.code {
        out = out.fg(Color::Magenta);
    }
    out
}

fn body_line(line: &FormattedLine, base: Style, alignment: Alignment) -> Line<'static> {
    let mut spans = Vec::with_capacity(line.spans.len() + 1);
    if !line.prefix.is_empty() {
        spans.push(Span::styled(line.prefix.clone(), base));
    }
    for span in &line.spans {
        spans.push(Span::styled(span.text.clone(), base.patch(span_style(span.style))));
    }
    Line::from(spans).alignment(alignment)
}

/// Build the log as owned lines so the view borrow ends before scrolling
/// state is updated.
fn chat_lines(app: &App) -> Vec<Line<'static>> {
    let view = app.controller.widget().view();
    let bot_label = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    let user_label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let time_style = Style::default().fg(Color::DarkGray);

    let mut lines: Vec<Line<'static>> = Vec::new();
    for entry in &view.entries {
        match entry {
            EntryView::Message { author: Author::User, label, body, time } => {
                lines.push(
                    Line::from(vec![
                        Span::styled(time.clone(), time_style),
                        Span::raw("  "),
                        Span::styled(label.to_string(), user_label),
                    ])
                    .alignment(Alignment::Right),
                );
                let base = Style::default().fg(Color::Cyan);
                for line in &body.lines {
                    lines.push(body_line(line, base, Alignment::Right));
                }
            }
            EntryView::Message { author: Author::Bot, label, body, time } => {
                lines.push(Line::from(vec![
                    Span::styled(label.to_string(), bot_label),
                    Span::raw("  "),
                    Span::styled(time.clone(), time_style),
                ]));
                for line in &body.lines {
                    lines.push(body_line(line, Style::default(), Alignment::Left));
                }
            }
            EntryView::Typing { .. } => {
                lines.push(Line::from(Span::styled(view.header.display_name.to_string(), bot_label)));
                // One dot lit per frame: "●··", "·●·", "··●"
                let dots: String = (0..3)
                    .map(|i| if i == app.animation_frame { '●' } else { '·' })
                    .collect();
                lines.push(Line::from(vec![
                    Span::styled(dots, Style::default().fg(BRAND)),
                    Span::raw(" "),
                    Span::styled(
                        TYPING_TEXT,
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                    ),
                ]));
            }
        }
        lines.push(Line::default());
    }
    lines
}

/// Split text into alternating runs of whitespace and non-whitespace.
fn tokens(text: &str) -> Vec<(bool, &str)> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut last: Option<bool> = None;
    for (i, c) in text.char_indices() {
        let space = c.is_whitespace();
        if let Some(prev) = last {
            if prev != space {
                out.push((prev, &text[start..i]));
                start = i;
            }
        }
        last = Some(space);
    }
    if let Some(prev) = last {
        out.push((prev, &text[start..]));
    }
    out
}

fn push_text(row: &mut Vec<Span<'static>>, text: &str, style: Style) {
    if let Some(last) = row.last_mut() {
        if last.style == style {
            last.content.to_mut().push_str(text);
            return;
        }
    }
    row.push(Span::styled(text.to_string(), style));
}

fn finish_row(spans: Vec<Span<'static>>, line: &Line<'static>) -> Line<'static> {
    let mut row = Line::from(spans).style(line.style);
    row.alignment = line.alignment;
    row
}

/// Break a line into rows of at most `width` chars, at word boundaries where
/// possible. Words longer than a row are split. Whitespace at a break is
/// dropped, leading whitespace of the first row is kept.
fn wrap_line(line: &Line<'static>, width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut rows = Vec::new();
    let mut row: Vec<Span<'static>> = Vec::new();
    let mut row_len = 0;
    let mut pending: Vec<(String, Style)> = Vec::new();
    let mut pending_len = 0;

    for span in &line.spans {
        for (is_space, token) in tokens(&span.content) {
            let len = token.chars().count();
            if is_space {
                pending.push((token.to_string(), span.style));
                pending_len += len;
                continue;
            }

            if row_len > 0 && row_len + pending_len + len > width {
                rows.push(finish_row(std::mem::take(&mut row), line));
                row_len = 0;
                pending.clear();
                pending_len = 0;
            }
            if row_len + pending_len + len > width {
                pending.clear();
                pending_len = 0;
            }
            for (text, style) in pending.drain(..) {
                push_text(&mut row, &text, style);
            }
            row_len += pending_len;
            pending_len = 0;

            let mut rest = token;
            loop {
                let room = width - row_len;
                let rest_len = rest.chars().count();
                if rest_len <= room {
                    push_text(&mut row, rest, span.style);
                    row_len += rest_len;
                    break;
                }
                let split = rest.char_indices().nth(room).map(|(i, _)| i).unwrap_or(rest.len());
                push_text(&mut row, &rest[..split], span.style);
                rows.push(finish_row(std::mem::take(&mut row), line));
                row_len = 0;
                rest = &rest[split..];
            }
        }
    }

    if !row.is_empty() || rows.is_empty() {
        rows.push(finish_row(row, line));
    }
    rows
}

fn wrap_lines(lines: &[Line<'static>], width: u16) -> Vec<Line<'static>> {
    lines
        .iter()
        .flat_map(|line| wrap_line(line, width as usize))
        .collect()
}

fn render_messages(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);

    // Leave a column for the scrollbar
    let text_width = area.width.saturating_sub(1);
    let rows = wrap_lines(&chat_lines(app), text_width);
    let total = rows.len().min(u16::MAX as usize) as u16;
    app.update_scroll_bounds(total, area.height);

    let chat = Paragraph::new(Text::from(rows)).scroll((app.scroll, 0));
    frame.render_widget(chat, Rect { width: text_width, ..area });

    if app.max_scroll() > 0 {
        let mut state = ScrollbarState::new(app.max_scroll() as usize).position(app.scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(None)
                .end_symbol(None),
            area,
            &mut state,
        );
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let enabled = app.input_enabled();
    let (title, border_color) = if enabled {
        (" Message ", Color::Yellow)
    } else {
        (" Input disabled (F2) ", Color::DarkGray)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;
    let (cursor_line, cursor_col) = app.cursor_line_col();

    // Keep the cursor in view in both directions
    let line_offset = cursor_line.saturating_sub(inner_height.saturating_sub(1));
    let col_offset = if inner_width == 0 || cursor_col < inner_width {
        0
    } else {
        cursor_col - inner_width + 1
    };

    let input = if app.input.is_empty() {
        Paragraph::new(Span::styled(
            "Type your message...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let visible: Vec<Line> = app
            .input
            .split('\n')
            .skip(line_offset)
            .take(inner_height)
            .map(|line| Line::from(line.chars().skip(col_offset).take(inner_width).collect::<String>()))
            .collect();
        let color = if enabled { Color::Cyan } else { Color::DarkGray };
        Paragraph::new(visible).style(Style::default().fg(color))
    };

    frame.render_widget(input.block(block), area);

    if enabled {
        let x = (cursor_col - col_offset) as u16;
        let y = (cursor_line - line_offset) as u16;
        frame.set_cursor_position((area.x + 1 + x, area.y + 1 + y));
    }
}

fn render_footer(frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().fg(Color::Gray);

    let hints = Line::from(vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" Alt+Enter ", key_style),
        Span::styled(" newline ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" F2 ", key_style),
        Span::styled(" lock ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" close ", label_style),
    ]);
    let credit = Line::from(Span::styled(CREDIT, Style::default().fg(Color::DarkGray)))
        .alignment(Alignment::Center);

    frame.render_widget(Paragraph::new(vec![hints, credit]), area);
}
