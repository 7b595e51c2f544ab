use super::input::{str_delete_back, str_delete_forward, str_insert_char};
use super::layout;
use super::state::{App, AppEvent, AppMode, SettingsItem};
use super::theme::{BLUE, BRIGHT_WHITE, DIM, PINK, SEL_BG};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::{Margin, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use tokio::sync::mpsc;
use unicode_width::UnicodeWidthStr;

/// 处理设置模式按键
pub fn handle_settings_key(key: KeyEvent, app: &mut App, tx: &mpsc::Sender<AppEvent>) -> bool {
    if app.settings.editing {
        handle_editing_key(key, app)
    } else {
        handle_browsing_key(key, app, tx)
    }
}

fn handle_browsing_key(key: KeyEvent, app: &mut App, tx: &mpsc::Sender<AppEvent>) -> bool {
    let total = app.settings_focusable_count();
    match key.code {
        KeyCode::Esc => {
            app.mode = AppMode::Dashboard;
            // 解释器或分类规则变了，重新探测并扫描
            if app.settings.dirty {
                app.settings.dirty = false;
                super::spawn_detect(app, tx);
            }
        }
        KeyCode::Up => {
            app.settings.selected = app.settings.selected.saturating_sub(1);
            app.settings.message = None;
        }
        KeyCode::Down => {
            if app.settings.selected + 1 < total {
                app.settings.selected += 1;
            }
            app.settings.message = None;
        }
        KeyCode::Enter | KeyCode::Char(' ') => {
            match app.focused_item() {
                Some(SettingsItem::Toggle { .. }) => app.toggle_settings_item(),
                Some(SettingsItem::TextEdit { .. }) => app.start_settings_edit(),
                _ => {}
            }
            app.settings.message = None;
        }
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.save_settings();
        }
        _ => return false,
    }
    true
}

fn handle_editing_key(key: KeyEvent, app: &mut App) -> bool {
    if key.code == KeyCode::Enter {
        app.confirm_settings_edit();
        return true;
    }
    let s = &mut app.settings;
    match key.code {
        KeyCode::Esc => s.editing = false,
        KeyCode::Backspace => str_delete_back(&mut s.edit_buffer, &mut s.edit_cursor),
        KeyCode::Delete => str_delete_forward(&mut s.edit_buffer, &mut s.edit_cursor),
        KeyCode::Left => s.edit_cursor = s.edit_cursor.saturating_sub(1),
        KeyCode::Right => {
            if s.edit_cursor < s.edit_buffer.chars().count() {
                s.edit_cursor += 1;
            }
        }
        KeyCode::Home => s.edit_cursor = 0,
        KeyCode::End => s.edit_cursor = s.edit_buffer.chars().count(),
        KeyCode::Char(c) => str_insert_char(&mut s.edit_buffer, &mut s.edit_cursor, c),
        _ => return false,
    }
    true
}

/// 渲染设置视图
pub fn render_settings(f: &mut Frame, app: &App) {
    let chunks = layout::main_layout(f.area());
    layout::render_header(f, "⚙  设置", chunks[0]);

    let content_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    let content_inner = content_block.inner(chunks[1]);
    f.render_widget(content_block, chunks[1]);

    let padded = content_inner.inner(Margin {
        horizontal: 2,
        vertical: 1,
    });
    if padded.height < 3 {
        return;
    }

    render_items(f, app, padded);

    let footer_text = if app.settings.editing {
        "输入新值 | Enter 确认 | Esc 取消"
    } else {
        "↑↓ 选择 | Enter/Space 切换/编辑 | Ctrl+S 保存 | Esc 返回"
    };

    match &app.settings.message {
        Some(msg) => {
            let color = if msg.starts_with('✓') { Color::Green } else { Color::Red };
            layout::render_footer_styled(f, &format!("{} | {}", msg, footer_text), color, chunks[2]);
        }
        None => layout::render_footer(f, footer_text, chunks[2]),
    }
}

fn render_items(f: &mut Frame, app: &App, area: Rect) {
    let max_label_width = app
        .settings
        .items
        .iter()
        .filter_map(|item| match item {
            SettingsItem::TextEdit { label, .. } => Some(UnicodeWidthStr::width(label.as_str())),
            _ => None,
        })
        .max()
        .unwrap_or(10);

    let mut lines: Vec<Line> = Vec::new();
    let mut focusable_idx = 0;

    for (i, item) in app.settings.items.iter().enumerate() {
        match item {
            SettingsItem::Section(title) => {
                if i > 0 {
                    lines.push(Line::from(""));
                }
                lines.push(Line::from(Span::styled(
                    format!("── {} ──", title),
                    Style::default().fg(PINK).add_modifier(Modifier::BOLD),
                )));
            }
            SettingsItem::Toggle { label, value, .. } => {
                let is_selected = focusable_idx == app.settings.selected;
                let checkbox = if *value { "[✓]" } else { "[ ]" };
                let checkbox_color = if *value { BLUE } else { DIM };
                let base = if is_selected {
                    Style::default().bg(SEL_BG).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                let label_color = if is_selected { BRIGHT_WHITE } else { Color::White };
                lines.push(Line::from(vec![
                    Span::styled(format!(" {} ", checkbox), base.fg(checkbox_color)),
                    Span::styled(format!(" {}", label), base.fg(label_color)),
                ]));
                focusable_idx += 1;
            }
            SettingsItem::TextEdit { label, value, .. } => {
                let is_selected = focusable_idx == app.settings.selected;
                let padding = max_label_width.saturating_sub(UnicodeWidthStr::width(label.as_str()));
                let label_padded = format!(" {}:{} ", label, " ".repeat(padding));
                let bg = Style::default().bg(SEL_BG);

                if is_selected && app.settings.editing {
                    let buf = &app.settings.edit_buffer;
                    let cursor_pos = app.settings.edit_cursor;
                    let before: String = buf.chars().take(cursor_pos).collect();
                    let cursor_char: String = buf.chars().skip(cursor_pos).take(1).collect();
                    let after: String = buf.chars().skip(cursor_pos + 1).collect();
                    let cursor_display = if cursor_char.is_empty() { " ".to_string() } else { cursor_char };

                    lines.push(Line::from(vec![
                        Span::styled(label_padded, bg.fg(BLUE).add_modifier(Modifier::BOLD)),
                        Span::styled(before, bg.fg(BRIGHT_WHITE)),
                        Span::styled(cursor_display, Style::default().fg(Color::Black).bg(Color::Yellow)),
                        Span::styled(after, bg.fg(BRIGHT_WHITE)),
                    ]));
                } else {
                    let display_value = if value.is_empty() { "(自动)".to_string() } else { value.clone() };
                    if is_selected {
                        lines.push(Line::from(vec![
                            Span::styled(label_padded, bg.fg(BLUE).add_modifier(Modifier::BOLD)),
                            Span::styled(display_value, bg.fg(BRIGHT_WHITE).add_modifier(Modifier::BOLD)),
                        ]));
                    } else {
                        let value_color = if value.is_empty() { DIM } else { Color::White };
                        lines.push(Line::from(vec![
                            Span::styled(label_padded, Style::default().fg(BLUE)),
                            Span::styled(display_value, Style::default().fg(value_color)),
                        ]));
                    }
                }
                focusable_idx += 1;
            }
        }
    }

    let visible: Vec<Line> = lines.into_iter().take(area.height as usize).collect();
    f.render_widget(Paragraph::new(visible), area);
}
