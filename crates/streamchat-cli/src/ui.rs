//! UI rendering with ratatui.
//!
//! Two screens: the login/registration form, and the two-column chat layout with
//! conversations on the left and the transcript on the right.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Clear, List, ListItem, ListState, Paragraph, Scrollbar, ScrollbarOrientation,
    ScrollbarState, Wrap,
};
use ratatui::Frame;

use streamchat_core::Role;
use streamchat_stream::{ConnectionStatus, Dialer, EntryKind, EntryState};

use crate::app::{App, Focus, InputMode, Screen};
use crate::auth_form::{AuthForm, AuthMode};

/// Render the UI.
pub fn render<D: Dialer>(frame: &mut Frame, app: &App<D>) {
    match &app.screen {
        Screen::Auth(form) => render_auth(frame, form),
        Screen::Chat => render_chat_screen(frame, app),
    }
}

// =============================================================================
// Auth screen
// =============================================================================

fn render_auth(frame: &mut Frame, form: &AuthForm) {
    let area = frame.area();
    let fields = form.fields();
    let height = u16::try_from(fields.len() * 3 + 6).unwrap_or(u16::MAX);
    let dialog_area = centered_fixed(56, height, area);

    frame.render_widget(Clear, dialog_area);

    let title = match form.mode() {
        AuthMode::Login => " Log in ",
        AuthMode::Register => " Create an account ",
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(dialog_area);
    frame.render_widget(block, dialog_area);

    let mut constraints: Vec<Constraint> = fields.iter().map(|_| Constraint::Length(3)).collect();
    constraints.push(Constraint::Length(1)); // message
    constraints.push(Constraint::Length(1)); // spacer
    constraints.push(Constraint::Length(1)); // help
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(inner);

    for (i, field) in fields.iter().enumerate() {
        let focused = *field == form.focused();
        let editor = form.editor(*field);
        let shown = if field.is_secret() {
            "•".repeat(editor.as_str().chars().count())
        } else {
            editor.as_str().to_string()
        };

        let input = Paragraph::new(shown)
            .style(Style::default().fg(Color::White))
            .block(
                Block::default()
                    .title(format!(" {} ", field.label()))
                    .borders(Borders::ALL)
                    .border_style(if focused {
                        Style::default().fg(Color::Yellow)
                    } else {
                        Style::default().fg(Color::DarkGray)
                    }),
            );
        frame.render_widget(input, rows[i]);

        if focused {
            frame.set_cursor_position((
                rows[i].x + 1 + to_u16(editor.cursor()),
                rows[i].y + 1,
            ));
        }
    }

    if let Some(message) = &form.message {
        let message = Paragraph::new(message.as_str()).style(Style::default().fg(Color::Yellow));
        frame.render_widget(message, rows[fields.len()]);
    }

    let switch_hint = match form.mode() {
        AuthMode::Login => ":create account ",
        AuthMode::Register => ":back to login ",
    };
    let help = Paragraph::new(Line::from(vec![
        Span::styled("Enter", Style::default().fg(Color::Yellow)),
        Span::raw(":submit "),
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(":next field "),
        Span::styled("F2", Style::default().fg(Color::Yellow)),
        Span::raw(switch_hint),
        Span::styled("Esc", Style::default().fg(Color::Yellow)),
        Span::raw(":quit"),
    ]))
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, rows[fields.len() + 2]);
}

// =============================================================================
// Chat screen
// =============================================================================

fn render_chat_screen<D: Dialer>(frame: &mut Frame, app: &App<D>) {
    let area = frame.area();

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header bar
            Constraint::Min(5),    // Columns
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_header_bar(frame, app, main_layout[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(28), Constraint::Percentage(72)])
        .split(main_layout[1]);

    render_conversations_panel(frame, app, columns[0]);
    render_chat_column(frame, app, columns[1]);
    render_status_bar(frame, app, main_layout[2]);

    match app.input_mode {
        InputMode::Normal => {}
        InputMode::NewConversation => render_prompt_dialog(
            frame,
            app,
            area,
            " New Conversation ",
            "Title (empty for default):",
        ),
        InputMode::Upload => render_prompt_dialog(frame, app, area, " Upload PDF ", "Path to file:"),
        InputMode::ConfirmDelete => render_confirm_delete_dialog(frame, app, area),
    }
}

/// Connectivity pill text and color.
fn connection_pill(status: ConnectionStatus) -> (&'static str, Color) {
    match status {
        ConnectionStatus::Open => ("online", Color::Green),
        ConnectionStatus::Connecting => ("connecting", Color::Yellow),
        ConnectionStatus::Closed => ("offline", Color::Red),
    }
}

fn render_header_bar<D: Dialer>(frame: &mut Frame, app: &App<D>, area: Rect) {
    let (pill, pill_color) = connection_pill(app.connection_status());
    let title = "STREAMCHAT";
    let user = app.user_email.as_deref().unwrap_or_default();
    let right_len = user.chars().count() + pill.len() + 4;
    let padding = usize::from(area.width).saturating_sub(title.len() + right_len);

    let line = Line::from(vec![
        Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::raw(user),
        Span::raw(" ["),
        Span::styled(pill, Style::default().fg(pill_color)),
        Span::raw("]"),
    ]);

    let header = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_conversations_panel<D: Dialer>(frame: &mut Frame, app: &App<D>, area: Rect) {
    let is_focused = app.focus == Focus::Conversations;
    let current = app.controller().conversation();

    let block = Block::default()
        .title(format!(" Conversations ({}) ", app.conversations.len()))
        .borders(Borders::ALL)
        .border_style(if is_focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        });

    let items: Vec<ListItem> = app
        .conversations
        .iter()
        .map(|conversation| {
            let marker = if current == Some(&conversation.id) {
                Span::styled("● ", Style::default().fg(Color::Green))
            } else {
                Span::raw("  ")
            };
            ListItem::new(Line::from(vec![
                marker,
                Span::raw(conversation.display_title().to_string()),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.selected);
    frame.render_stateful_widget(list, area, &mut state);
}

/// Horizontal padding for chat content.
const CHAT_PADDING: u16 = 2;

fn render_chat_column<D: Dialer>(frame: &mut Frame, app: &App<D>, area: Rect) {
    let is_focused = app.focus == Focus::Chat;

    let title = app.current_conversation().map_or_else(
        || " Chat ".to_string(),
        |c| format!(" {} ", c.display_title()),
    );

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(if is_focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        });
    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let inner_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Transcript
            Constraint::Length(1), // Separator
            Constraint::Length(1), // Input
        ])
        .split(inner_area);

    let chat_area_full = inner_layout[0];
    let chat_area = Rect::new(
        chat_area_full.x + CHAT_PADDING,
        chat_area_full.y,
        chat_area_full.width.saturating_sub(CHAT_PADDING * 2 + 1),
        chat_area_full.height,
    );

    if app.transcript.is_empty() {
        let help = if app.controller().conversation().is_some() {
            "Loading…"
        } else {
            "Select or create a conversation"
        };
        let text = Paragraph::new(help)
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true });
        frame.render_widget(text, chat_area);
    } else {
        render_transcript(frame, app, chat_area, chat_area_full);
    }

    render_input_line(frame, app, inner_layout[1], inner_layout[2], is_focused);
}

fn render_transcript<D: Dialer>(frame: &mut Frame, app: &App<D>, area: Rect, full: Rect) {
    let mut lines: Vec<Line> = Vec::new();

    for entry in app.transcript.entries() {
        match entry.kind {
            EntryKind::Message(Role::User) => {
                lines.push(Line::from(vec![
                    Span::styled(
                        "[You] ",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(entry.text.as_str(), Style::default().fg(Color::White)),
                ]));
            }
            EntryKind::Message(Role::Assistant) => {
                lines.push(Line::from(Span::styled(
                    "[Assistant]",
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                )));
                if entry.state == EntryState::Pending {
                    lines.push(Line::from(vec![
                        Span::styled(app.spinner_char(), Style::default().fg(Color::Yellow)),
                        Span::styled(" thinking...", Style::default().fg(Color::DarkGray)),
                    ]));
                } else {
                    lines.extend(entry.text.lines().map(|l| Line::from(l.to_string())));
                    if entry.state == EntryState::Streaming {
                        lines.push(Line::from(Span::styled(
                            app.spinner_char(),
                            Style::default().fg(Color::Yellow),
                        )));
                    }
                }
            }
            EntryKind::Notice => {
                lines.push(Line::from(Span::styled(
                    entry.text.as_str(),
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                )));
            }
        }
        lines.push(Line::from(""));
    }

    let text = Text::from(lines);
    let visible_lines = usize::from(area.height);
    let total_lines = wrapped_line_count(&text, usize::from(area.width));

    // chat_scroll counts lines up from the bottom.
    let max_scroll = total_lines.saturating_sub(visible_lines);
    let effective_scroll = app.chat_scroll.min(max_scroll);
    let offset = max_scroll.saturating_sub(effective_scroll);

    let paragraph = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .scroll((to_u16(offset), 0));
    frame.render_widget(paragraph, area);

    if total_lines > visible_lines {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("▲"))
            .end_symbol(Some("▼"));
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .position(offset)
            .viewport_content_length(visible_lines);
        frame.render_stateful_widget(scrollbar, full, &mut scrollbar_state);
    }
}

fn render_input_line<D: Dialer>(
    frame: &mut Frame,
    app: &App<D>,
    separator_area: Rect,
    input_area: Rect,
    is_focused: bool,
) {
    let separator = Paragraph::new("─".repeat(usize::from(separator_area.width)))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(separator, separator_area);

    let typing = is_focused && !app.command_mode;
    let prompt = if typing { "> " } else { ": " };

    let input_line = Line::from(vec![
        Span::styled(
            prompt,
            Style::default().fg(if typing { Color::Cyan } else { Color::DarkGray }),
        ),
        Span::styled(app.input.as_str(), Style::default().fg(Color::White)),
    ]);
    frame.render_widget(Paragraph::new(input_line), input_area);

    if typing && app.input_mode == InputMode::Normal {
        frame.set_cursor_position((
            input_area.x + to_u16(prompt.len() + app.input.cursor()),
            input_area.y,
        ));
    }
}

fn render_status_bar<D: Dialer>(frame: &mut Frame, app: &App<D>, area: Rect) {
    let mode_indicator = if app.command_mode {
        Span::styled(" COMMAND ", Style::default().fg(Color::Black).bg(Color::Blue))
    } else {
        Span::styled(" INSERT ", Style::default().fg(Color::Black).bg(Color::Green))
    };

    let status = if let Some(error) = &app.error_message {
        Line::from(vec![
            mode_indicator,
            Span::styled(" ERROR: ", Style::default().fg(Color::Red).bold()),
            Span::styled(error.as_str(), Style::default().fg(Color::Red)),
        ])
    } else if let Some(status) = &app.status_message {
        Line::from(vec![
            mode_indicator,
            Span::styled(format!(" {status}"), Style::default().fg(Color::Green)),
        ])
    } else if app.command_mode {
        Line::from(vec![
            mode_indicator,
            Span::raw(" "),
            Span::styled("n", Style::default().fg(Color::Yellow)),
            Span::raw(":new "),
            Span::styled("d", Style::default().fg(Color::Yellow)),
            Span::raw(":delete "),
            Span::styled("u", Style::default().fg(Color::Yellow)),
            Span::raw(":upload "),
            Span::styled("r", Style::default().fg(Color::Yellow)),
            Span::raw(":reconnect "),
            Span::styled("l", Style::default().fg(Color::Yellow)),
            Span::raw(":logout "),
            Span::styled("q", Style::default().fg(Color::Yellow)),
            Span::raw(":quit"),
        ])
    } else {
        Line::from(vec![
            mode_indicator,
            Span::raw(" "),
            Span::styled("Enter", Style::default().fg(Color::Yellow)),
            Span::raw(":send "),
            Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
            Span::raw(":browse "),
            Span::styled("Tab", Style::default().fg(Color::Yellow)),
            Span::raw(":switch "),
            Span::styled("Esc", Style::default().fg(Color::Yellow)),
            Span::raw(":commands"),
        ])
    };

    let status_bar = Paragraph::new(status).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}

// =============================================================================
// Dialogs
// =============================================================================

fn render_prompt_dialog<D: Dialer>(
    frame: &mut Frame,
    app: &App<D>,
    area: Rect,
    title: &str,
    label: &str,
) {
    let dialog_area = centered_fixed(50, 9, area);
    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(dialog_area);
    frame.render_widget(block, dialog_area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Label
            Constraint::Length(1), // Spacer
            Constraint::Length(3), // Input box
            Constraint::Length(1), // Help
        ])
        .split(inner);

    frame.render_widget(
        Paragraph::new(label).style(Style::default().fg(Color::White)),
        layout[0],
    );

    let input = Paragraph::new(app.dialog.as_str())
        .style(Style::default().fg(Color::Yellow))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
    frame.render_widget(input, layout[2]);

    frame.render_widget(
        Paragraph::new("Press Enter to confirm, Esc to cancel")
            .style(Style::default().fg(Color::DarkGray)),
        layout[3],
    );

    frame.set_cursor_position((
        layout[2].x + 1 + to_u16(app.dialog.cursor()),
        layout[2].y + 1,
    ));
}

fn render_confirm_delete_dialog<D: Dialer>(frame: &mut Frame, app: &App<D>, area: Rect) {
    let dialog_area = centered_fixed(50, 8, area);
    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .title(" Confirm Delete ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));
    let inner = block.inner(dialog_area);
    frame.render_widget(block, dialog_area);

    let title = app
        .selected_conversation()
        .map_or("?", |c| c.display_title());

    let text = Text::from(vec![
        Line::from(format!("Delete conversation '{title}'?")),
        Line::from(""),
        Line::from("Its messages are deleted too."),
        Line::from(""),
        Line::from(vec![
            Span::styled("[y]", Style::default().fg(Color::Red).bold()),
            Span::raw(" Yes  "),
            Span::styled("[n]", Style::default().fg(Color::Green).bold()),
            Span::raw(" No"),
        ]),
    ]);

    frame.render_widget(
        Paragraph::new(text)
            .style(Style::default().fg(Color::White))
            .wrap(Wrap { trim: true }),
        inner,
    );
}

// =============================================================================
// Helpers
// =============================================================================

/// Number of visual lines after wrapping to `width`.
fn wrapped_line_count(text: &Text, width: usize) -> usize {
    if width == 0 {
        return text.lines.len();
    }
    text.lines
        .iter()
        .map(|line| line.width().div_ceil(width).max(1))
        .sum()
}

/// A rectangle of fixed size centered in `area`, clamped to fit.
fn centered_fixed(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    Rect::new(
        area.x + area.width.saturating_sub(width) / 2,
        area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    )
}

fn to_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}
