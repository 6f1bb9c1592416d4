//! UI rendering with ratatui.
//!
//! Two columns under a header bar: the execution timeline on the left, the
//! chat transcript with the streaming answer and the input line on the right.

use optimus_core::{ChatEntry, Role};
use optimus_stream::{SessionSnapshot, SessionState, Step, StepStatus, TimelinePanel};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
};
use ratatui::Frame;

use crate::app::App;

/// Horizontal padding for chat content.
const CHAT_PADDING: u16 = 2;

/// Longest message excerpt shown under an expanded step.
const EXCERPT_CHARS: usize = 160;

/// Render the UI.
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),                                  // Header bar
            Constraint::Min(5),                                     // Main content
            Constraint::Length(u16::from(app.error_message.is_some())), // Error line
            Constraint::Length(1),                                  // Status bar
        ])
        .split(area);

    render_header_bar(frame, app, main_layout[0]);

    let content_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(35), // Left: execution timeline
            Constraint::Percentage(65), // Right: chat + input
        ])
        .split(main_layout[1]);

    render_timeline_panel(frame, app, content_layout[0]);
    render_chat_column(frame, app, content_layout[1]);
    render_error_line(frame, app, main_layout[2]);
    render_status_bar(frame, app, main_layout[3]);
}

/// Truncate a string in the middle with ellipsis if it exceeds `max_len` characters.
fn truncate_middle(s: &str, max_len: usize) -> String {
    let len = s.chars().count();
    if len <= max_len {
        return s.to_string();
    }
    if max_len < 5 {
        return s.chars().take(max_len).collect();
    }
    let keep = (max_len - 3) / 2;
    let start: String = s.chars().take(keep).collect();
    let end: String = s.chars().skip(len - keep).collect();
    format!("{start}...{end}")
}

/// First line of `s`, cut to `max` characters.
fn excerpt(s: &str, max: usize) -> String {
    let line = s.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if line.chars().count() <= max {
        line.to_string()
    } else {
        let cut: String = line.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

/// Render the header bar with app name, model and backend status.
fn render_header_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (status_text, status_style) = match app.connected {
        Some(true) => ("connected", Style::default().fg(Color::Green)),
        Some(false) => ("disconnected", Style::default().fg(Color::Red)),
        None => ("checking", Style::default().fg(Color::Yellow)),
    };

    let title = "OPTIMUS";
    let model = format!("{} · ", app.model.label);
    let max_url_width = (area.width as usize / 2).saturating_sub(15);
    let display_url = truncate_middle(app.api_base(), max_url_width);

    let right = Line::from(vec![
        Span::styled(model, Style::default().fg(Color::Cyan)),
        Span::raw(display_url),
        Span::raw(" ["),
        Span::styled(status_text, status_style),
        Span::raw("]"),
    ]);
    let padding = (area.width as usize).saturating_sub(title.len() + right.width());

    let mut spans = vec![
        Span::styled(title, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" ".repeat(padding)),
    ];
    spans.extend(right.spans);

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn status_color(status: StepStatus) -> Color {
    match status {
        StepStatus::Pending => Color::DarkGray,
        StepStatus::InProgress => Color::Yellow,
        StepStatus::Done => Color::Green,
        StepStatus::Error => Color::Red,
    }
}

fn legend_line() -> Line<'static> {
    let mut spans = Vec::new();
    for status in StepStatus::ALL {
        spans.push(Span::styled(
            format!("{} ", status.icon()),
            Style::default().fg(status_color(status)),
        ));
        spans.push(Span::styled(
            format!("{}  ", status.label()),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

fn step_lines(step: &Step, status: StepStatus, expanded: bool, lines: &mut Vec<Line<'static>>) {
    let color = status_color(status);
    let dim = Style::default().fg(Color::DarkGray);

    let mut header = vec![
        Span::styled(format!("{} ", status.icon()), Style::default().fg(color)),
        Span::styled(step.kind.label(), Style::default().fg(color).add_modifier(Modifier::BOLD)),
    ];
    if !step.label.is_empty() {
        header.push(Span::raw(format!(" · {}", step.label)));
    }
    lines.push(Line::from(header));

    let mut meta = vec![Span::styled(format!("  node: {}", step.source_node), dim)];
    if let Some(tool) = &step.tool_name {
        meta.push(Span::styled(format!(" · tool: {tool}"), dim));
    }
    lines.push(Line::from(meta));
    if !expanded {
        return;
    }
    if let Some(preview) = &step.preview {
        lines.push(Line::styled(
            format!("  ↳ {}", excerpt(preview, EXCERPT_CHARS)),
            Style::default().fg(Color::Gray),
        ));
    }
    for message in &step.messages {
        let text = excerpt(&message.content, EXCERPT_CHARS);
        if text.is_empty() {
            continue;
        }
        let speaker = match &message.tool_name {
            Some(name) => format!("  {} ({name}): ", message.role.as_str()),
            None => format!("  {}: ", message.role.as_str()),
        };
        lines.push(Line::from(vec![
            Span::styled(speaker, Style::default().fg(Color::Blue)),
            Span::styled(text, Style::default().fg(Color::Gray)),
        ]));
    }
}

fn timeline_lines(session: Option<&SessionSnapshot>, panel: &TimelinePanel) -> Vec<Line<'static>> {
    let mut lines = vec![legend_line(), Line::default()];
    let dim = Style::default().fg(Color::DarkGray);

    let Some(session) = session else {
        lines.push(Line::styled("Ask a question to watch the agent work.", dim));
        return lines;
    };
    let timeline = &session.timeline;
    let active = session.is_active();

    if timeline.is_empty() {
        let text = if active {
            "Waiting for the first agent step..."
        } else {
            "No steps recorded."
        };
        lines.push(Line::styled(text, dim));
        return lines;
    }

    if panel.is_collapsed(timeline) {
        let errors = (0..timeline.len())
            .filter(|&i| timeline.display_status(i, active) == Some(StepStatus::Error))
            .count();
        let summary = match errors {
            0 => format!("{} steps", timeline.len()),
            n => format!("{} steps · {n} failed", timeline.len()),
        };
        lines.push(Line::from(summary));
        lines.push(Line::styled("Ctrl-T to expand", dim));
        return lines;
    }

    for (i, step) in timeline.steps().iter().enumerate() {
        let status = timeline
            .display_status(i, active)
            .unwrap_or(StepStatus::Pending);
        let expanded = TimelinePanel::is_expanded_by_default(timeline, i);
        step_lines(step, status, expanded, &mut lines);
    }
    lines
}

/// Render the execution timeline column.
fn render_timeline_panel(frame: &mut Frame, app: &App, area: Rect) {
    let session = app.session();
    let title = match session.as_deref() {
        Some(s) if s.is_active() => format!(" Execution timeline {} ", app.spinner_char()),
        Some(s) => format!(" Execution timeline ({}) ", s.timeline.len()),
        None => " Execution timeline ".to_string(),
    };
    let lines = timeline_lines(session.as_deref(), &app.panel);
    drop(session);

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Newest steps stay visible when the column overflows.
    let paragraph = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
    let offset = paragraph
        .line_count(inner.width)
        .saturating_sub(inner.height as usize);
    let paragraph = paragraph.scroll((u16::try_from(offset).unwrap_or(u16::MAX), 0));
    frame.render_widget(paragraph, inner);
}

fn entry_header(entry: &ChatEntry) -> Line<'static> {
    let role = entry.role();
    let color = match role {
        Role::User => Color::Cyan,
        Role::Assistant => Color::Green,
    };
    let label = format!("[{}]", role.as_str());
    let time = entry
        .created_at()
        .with_timezone(&chrono::Local)
        .format("%H:%M")
        .to_string();
    Line::from(vec![
        Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(format!(" {time}"), Style::default().fg(Color::DarkGray)),
    ])
}

fn chat_lines(app: &App, width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for entry in app.controller().transcript().entries() {
        lines.push(entry_header(entry));
        if entry.is_user() {
            for line in entry.content().lines() {
                lines.push(Line::styled(line.to_string(), Style::default().fg(Color::White)));
            }
        } else {
            lines.extend(app.markdown.render(entry.content(), width));
        }
        lines.push(Line::default());
    }

    let Some(session) = app.session() else {
        return lines;
    };
    let answer = session.timeline.streaming_answer();
    let agent = Style::default().fg(Color::Green).add_modifier(Modifier::BOLD);
    let agent_label = format!("[{}] ", Role::Assistant.as_str());

    match session.state {
        SessionState::Active => {
            lines.push(Line::from(vec![
                Span::styled(agent_label.clone(), agent),
                Span::styled(app.spinner_char(), Style::default().fg(Color::Yellow)),
                Span::styled(" streaming", Style::default().fg(Color::DarkGray)),
            ]));
            if answer.is_empty() {
                lines.push(Line::styled("thinking...", Style::default().fg(Color::DarkGray)));
            } else {
                lines.extend(app.markdown.render(answer, width));
            }
        }
        SessionState::Failed | SessionState::Aborted if !answer.is_empty() => {
            lines.push(Line::from(vec![
                Span::styled(agent_label.clone(), agent),
                Span::styled("(incomplete)", Style::default().fg(Color::DarkGray)),
            ]));
            for line in app.markdown.render(answer, width) {
                lines.push(line.patch_style(Style::default().add_modifier(Modifier::DIM)));
            }
        }
        _ => {}
    }
    lines
}

/// Render the right column containing chat and input as one unit.
fn render_chat_column(frame: &mut Frame, app: &mut App, area: Rect) {
    let title = if app.is_streaming() {
        " Chat (streaming) "
    } else {
        " Chat "
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let inner_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Chat messages
            Constraint::Length(1), // Separator line
            Constraint::Length(1), // Input line
        ])
        .split(inner_area);

    let chat_area_full = inner_layout[0];
    let chat_area = Rect::new(
        chat_area_full.x + CHAT_PADDING,
        chat_area_full.y,
        chat_area_full.width.saturating_sub(CHAT_PADDING * 2 + 1), // +1 for scrollbar
        chat_area_full.height,
    );
    let content_width = chat_area.width as usize;

    let lines = chat_lines(app, content_width);
    if lines.is_empty() {
        let help = Paragraph::new(
            "Ask about orders, returns or policies and press Enter. F3 inserts an example question.",
        )
        .style(Style::default().fg(Color::DarkGray))
        .wrap(Wrap { trim: true });
        frame.render_widget(help, chat_area);
    } else {
        let paragraph = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
        let visible_lines = chat_area.height as usize;
        // Row count as the renderer wraps it, so the bottom offset is exact.
        let total_wrapped_lines = paragraph.line_count(chat_area.width);

        let offset = app.layout_chat(
            u32::try_from(total_wrapped_lines).unwrap_or(u32::MAX),
            u32::from(chat_area.height),
        );

        let paragraph = paragraph.scroll((u16::try_from(offset).unwrap_or(u16::MAX), 0));
        frame.render_widget(paragraph, chat_area);

        if total_wrapped_lines > visible_lines {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("▲"))
                .end_symbol(Some("▼"));
            let mut scrollbar_state = ScrollbarState::new(total_wrapped_lines)
                .position(offset as usize)
                .viewport_content_length(visible_lines);
            frame.render_stateful_widget(scrollbar, chat_area_full, &mut scrollbar_state);
        }

        if app.follow.shows_jump_to_latest() && chat_area.height > 0 {
            render_jump_hint(frame, chat_area);
        }
    }

    render_input_line(frame, app, inner_layout[1], inner_layout[2]);
}

/// Render the jump-to-latest affordance over the last chat row.
fn render_jump_hint(frame: &mut Frame, chat_area: Rect) {
    let hint = " ↓ New content below · End to jump to latest ";
    let width = u16::try_from(Line::from(hint).width())
        .unwrap_or(u16::MAX)
        .min(chat_area.width);
    let hint_area = Rect::new(
        chat_area.x + (chat_area.width - width) / 2,
        chat_area.y + chat_area.height - 1,
        width,
        1,
    );
    frame.render_widget(Clear, hint_area);
    frame.render_widget(
        Paragraph::new(hint).style(Style::default().fg(Color::Black).bg(Color::Yellow)),
        hint_area,
    );
}

/// Render the input line at the bottom of the chat column.
fn render_input_line(frame: &mut Frame, app: &App, separator_area: Rect, input_area: Rect) {
    let separator = Paragraph::new("─".repeat(separator_area.width as usize))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(separator, separator_area);

    let prompt = "> ";
    let room = (input_area.width as usize).saturating_sub(prompt.len() + 1);
    // Keep the cursor on screen by dropping leading characters.
    let skip = app.cursor_position.saturating_sub(room);
    let visible: String = app.input.chars().skip(skip).collect();
    let before_cursor: String = app
        .input
        .chars()
        .skip(skip)
        .take(app.cursor_position - skip)
        .collect();

    let input_line = Line::from(vec![
        Span::styled(prompt, Style::default().fg(Color::Cyan)),
        Span::styled(visible, Style::default().fg(Color::White)),
    ]);
    frame.render_widget(Paragraph::new(input_line), input_area);

    let cursor_x = prompt.len() + Line::from(before_cursor).width();
    frame.set_cursor_position((
        input_area.x + u16::try_from(cursor_x).unwrap_or(u16::MAX),
        input_area.y,
    ));
}

/// Render the transport error line, when there is one.
fn render_error_line(frame: &mut Frame, app: &App, area: Rect) {
    let Some(error) = app.error_message.as_deref() else {
        return;
    };
    let line = Line::from(vec![
        Span::styled(" ERROR: ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        Span::styled(error.to_string(), Style::default().fg(Color::Red)),
        Span::styled("  (Esc to dismiss)", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

/// Render the status bar.
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mode_indicator = match app.controller().handle() {
        Some(handle) if app.is_streaming() => Span::styled(
            format!(" STREAMING {} ", handle.id().short()),
            Style::default().fg(Color::Black).bg(Color::Yellow),
        ),
        _ => Span::styled(" READY ", Style::default().fg(Color::Black).bg(Color::Green)),
    };

    let status = if let Some(status) = &app.status_message {
        Line::from(vec![
            mode_indicator,
            Span::styled(format!(" {status}"), Style::default().fg(Color::Green)),
        ])
    } else {
        let key = Style::default().fg(Color::Yellow);
        Line::from(vec![
            mode_indicator,
            Span::raw(" "),
            Span::styled("Enter", key),
            Span::raw(":send "),
            Span::styled("Esc", key),
            Span::raw(":cancel "),
            Span::styled("PgUp/PgDn", key),
            Span::raw(":scroll "),
            Span::styled("End", key),
            Span::raw(":latest "),
            Span::styled("^T", key),
            Span::raw(":timeline "),
            Span::styled("F2", key),
            Span::raw(":model "),
            Span::styled("F3", key),
            Span::raw(":example "),
            Span::styled("^Q", key),
            Span::raw(":quit"),
        ])
    };

    let status_bar = Paragraph::new(status).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}
