use super::input::{render_input_line, str_delete_back, str_delete_forward, str_insert_char};
use super::layout;
use super::state::{App, AppEvent, AppMode, BrowsePhase};
use super::theme::{BLUE, BRIGHT_WHITE, DESC_DIM, DIM, PINK, SEL_BG, STD_GREEN};
use crate::catalog::{Catalog, SortOrder};
use crate::environment::{Category, PackageRecord};
use crate::snapshot::SnapshotSaver;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};
use tokio::sync::mpsc;
use unicode_width::UnicodeWidthStr;

const PAGE: usize = 10;

/// 处理浏览模式按键
pub fn handle_browse_key(
    key: KeyEvent,
    app: &mut App,
    tx: &mpsc::Sender<AppEvent>,
    term_height: u16,
) -> bool {
    match app.browse.phase {
        BrowsePhase::Browsing => handle_browsing_key(key, app, tx),
        BrowsePhase::PreviewingRemove => handle_preview_key(key, app, tx),
        BrowsePhase::Removing => handle_output_key(key, app, term_height),
        BrowsePhase::RemoveComplete | BrowsePhase::Error => handle_done_key(key, app, term_height),
    }
}

fn move_selection(app: &mut App, delta: isize) {
    let max = app.browse.filtered.len().saturating_sub(1);
    let next = app.browse.selected as isize + delta;
    app.browse.selected = next.clamp(0, max as isize) as usize;
}

fn handle_browsing_key(key: KeyEvent, app: &mut App, tx: &mpsc::Sender<AppEvent>) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('r') => {
                super::spawn_scan(app, tx);
                true
            }
            KeyCode::Char('e') => {
                export_snapshot(app, tx);
                true
            }
            KeyCode::Char('s') => {
                if app.toggle_sort() {
                    super::spawn_scan(app, tx);
                }
                true
            }
            _ => false,
        };
    }

    app.browse.message = None;
    match key.code {
        KeyCode::Esc => {
            app.mode = AppMode::Dashboard;
            app.reset_browse_state();
        }
        KeyCode::Up => move_selection(app, -1),
        KeyCode::Down => move_selection(app, 1),
        KeyCode::PageUp => move_selection(app, -(PAGE as isize)),
        KeyCode::PageDown => move_selection(app, PAGE as isize),
        KeyCode::Tab => {
            app.browse.view = app.browse.view.next();
            app.apply_filter();
        }
        KeyCode::F(5) => super::spawn_scan(app, tx),
        KeyCode::Enter => open_preview(app, tx),
        KeyCode::Backspace => {
            str_delete_back(&mut app.browse.input, &mut app.browse.cursor);
            app.apply_filter();
        }
        KeyCode::Delete => {
            str_delete_forward(&mut app.browse.input, &mut app.browse.cursor);
            app.apply_filter();
        }
        KeyCode::Left => app.browse.cursor = app.browse.cursor.saturating_sub(1),
        KeyCode::Right => {
            if app.browse.cursor < app.browse.input.chars().count() {
                app.browse.cursor += 1;
            }
        }
        KeyCode::Home => app.browse.cursor = 0,
        KeyCode::End => app.browse.cursor = app.browse.input.chars().count(),
        KeyCode::Char(c) => {
            str_insert_char(&mut app.browse.input, &mut app.browse.cursor, c);
            app.apply_filter();
        }
        _ => return false,
    }
    true
}

fn handle_preview_key(key: KeyEvent, app: &mut App, tx: &mpsc::Sender<AppEvent>) -> bool {
    match key.code {
        KeyCode::Esc => {
            app.browse.back_to_list();
            true
        }
        KeyCode::Enter => {
            // 预览加载完成后才允许确认
            if app.browse.preview.len() > 1 {
                spawn_remove_task(app, tx);
            }
            true
        }
        KeyCode::Up => {
            app.browse.scroll = app.browse.scroll.saturating_sub(1);
            true
        }
        KeyCode::Down => {
            app.browse.scroll += 1;
            true
        }
        _ => false,
    }
}

fn handle_output_key(key: KeyEvent, app: &mut App, term_height: u16) -> bool {
    let visible = layout::visible_content_height(term_height);
    let max_scroll = app.browse.get_content().len().saturating_sub(visible);
    match key.code {
        KeyCode::Esc if app.browse.phase == BrowsePhase::Removing => {
            crate::environment::cancel_operation();
            app.browse.add_line("正在取消...".to_string());
        }
        KeyCode::Up => app.browse.scroll = app.browse.scroll.saturating_sub(1),
        KeyCode::Down => {
            if app.browse.scroll < max_scroll {
                app.browse.scroll += 1;
            }
        }
        KeyCode::PageUp => app.browse.scroll = app.browse.scroll.saturating_sub(PAGE),
        KeyCode::PageDown => app.browse.scroll = (app.browse.scroll + PAGE).min(max_scroll),
        _ => return false,
    }
    true
}

fn handle_done_key(key: KeyEvent, app: &mut App, term_height: u16) -> bool {
    match key.code {
        KeyCode::Esc | KeyCode::Enter => {
            app.browse.back_to_list();
            app.error_message = None;
            true
        }
        _ => handle_output_key(key, app, term_height),
    }
}

/// 打开所选包的卸载预览（对应确认对话框）
fn open_preview(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    let Some(env) = app.env.clone() else {
        return;
    };
    let Some(record) = app.selected_record().cloned() else {
        return;
    };
    if !record.is_removable() {
        app.browse.message = Some(format!("'{}' 属于标准库，无法卸载", record.name));
        return;
    }

    app.browse.target = Some(record.name.clone());
    app.browse.phase = BrowsePhase::PreviewingRemove;
    app.browse.preview = vec!["正在获取卸载预览...".to_string()];
    app.browse.scroll = 0;

    let tx_clone = tx.clone();
    tokio::spawn(async move {
        let preview = tokio::task::spawn_blocking(move || env.preview_remove(&record))
            .await
            .unwrap_or_default();
        let _ = tx_clone.send(AppEvent::RemovePreviewReady(preview)).await;
    });
}

/// 启动卸载任务：确认可卸载 → 可选快照 → pip uninstall → 重新扫描
pub fn spawn_remove_task(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    let Some(env) = app.env.clone() else {
        return;
    };
    let Some(name) = app.browse.target.clone() else {
        return;
    };

    crate::environment::streaming::reset_cancel();

    let opts = app.config.scan_options();
    let saver = app
        .config
        .snapshot_before_remove
        .then(|| SnapshotSaver::new(app.config.snapshot_dir.clone()));

    app.browse.phase = BrowsePhase::Removing;
    app.browse.lines.clear();
    app.browse.output = None;
    app.browse.add_line(format!("正在卸载: {} ...", name));
    app.browse.scroll = 0;

    let tx_clone = tx.clone();
    std::thread::spawn(move || {
        let (output_tx, mut output_rx) = mpsc::unbounded_channel();
        let tx_for_lines = tx_clone.clone();
        let forwarder = std::thread::spawn(move || {
            while let Some(line) = output_rx.blocking_recv() {
                let _ = tx_for_lines.blocking_send(AppEvent::RemoveLine(line));
            }
        });

        // 确认可卸载后再保存快照，内容取自这次重新扫描的结果
        let tx_for_snapshot = tx_clone.clone();
        let reason = format!("卸载 {} 前", name);
        let result = env.remove_package(&name, &opts, output_tx, |before| {
            let Some(saver) = saver else {
                return;
            };
            match saver.save(&before.catalog.freeze_lines(), &before.env.version, &reason) {
                Ok(path) => {
                    let _ = tx_for_snapshot.blocking_send(AppEvent::SnapshotSaved(path.display().to_string()));
                }
                Err(e) => log::error!("保存快照失败: {}", e),
            }
        });
        // 确保所有输出行先于完成事件到达
        let _ = forwarder.join();

        let event = match result {
            Ok((output, snapshot)) => AppEvent::RemoveComplete {
                name,
                output,
                snapshot,
            },
            Err(e) => {
                log::warn!("卸载 {} 失败: {}", name, e);
                AppEvent::RemoveFailed(e.to_string())
            }
        };
        let _ = tx_clone.blocking_send(event);
    });
}

/// Ctrl+E 手动导出用户安装包清单
fn export_snapshot(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    let Some(snapshot) = &app.snapshot else {
        return;
    };
    let lines = snapshot.catalog.freeze_lines();
    let version = snapshot.env.version.clone();
    let saver = SnapshotSaver::new(app.config.snapshot_dir.clone());
    let tx_clone = tx.clone();
    tokio::spawn(async move {
        let result = tokio::task::spawn_blocking(move || saver.save(&lines, &version, "手动导出")).await;
        let event = match result {
            Ok(Ok(path)) => AppEvent::SnapshotSaved(path.display().to_string()),
            Ok(Err(e)) => AppEvent::Error(format!("导出失败: {}", e)),
            Err(e) => AppEvent::Error(format!("导出失败: {}", e)),
        };
        let _ = tx_clone.send(event).await;
    });
}

// ===== 渲染 =====

pub fn render_browse(f: &mut Frame, app: &App) {
    match app.browse.phase {
        BrowsePhase::Browsing => render_browse_view(f, app),
        BrowsePhase::PreviewingRemove => render_preview_view(f, app),
        _ => render_output_view(f, app),
    }
}

fn header_title(app: &App, prefix: &str) -> String {
    match (&app.env, &app.snapshot) {
        (Some(env), Some(snap)) => format!("{} | {} {}", prefix, env.name(), snap.env.version),
        (Some(env), None) => format!("{} | {}", prefix, env.name()),
        _ => prefix.to_string(),
    }
}

fn render_browse_view(f: &mut Frame, app: &App) {
    let chunks = layout::main_layout(f.area());
    layout::render_header(f, &header_title(app, "📦 Python 包"), chunks[0]);

    let content_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    let content_inner = content_block.inner(chunks[1]);
    f.render_widget(content_block, chunks[1]);

    let padded = content_inner.inner(Margin {
        horizontal: 1,
        vertical: 0,
    });
    if padded.height < 3 {
        return;
    }

    let Some(catalog) = app.catalog() else {
        let text = if let Some(err) = &app.error_message {
            err.as_str()
        } else {
            "正在扫描已安装包..."
        };
        f.render_widget(Paragraph::new(text).style(Style::default().fg(Color::Yellow)), padded);
        layout::render_footer(f, "扫描中... | Esc 返回", chunks[2]);
        return;
    };

    let inner_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // 搜索框
            Constraint::Length(1), // 统计
            Constraint::Min(0),    // 包列表
        ])
        .split(padded);

    render_input_line(f, &app.browse.input, app.browse.cursor, "> 筛选:", true, inner_chunks[0]);

    let stat_text = format!(
        "共 {} 个匹配 / 内置 {} 个 · 用户安装 {} 个 | 视图: {}{}",
        app.browse.filtered.len(),
        catalog.count(Category::Default),
        catalog.count(Category::UserInstalled),
        app.effective_view().label(),
        if app.scanning { " | 刷新中..." } else { "" },
    );
    f.render_widget(
        Paragraph::new(stat_text).style(Style::default().fg(Color::DarkGray)),
        inner_chunks[1],
    );

    render_package_list(f, app, catalog, inner_chunks[2]);

    if let Some(msg) = &app.browse.message {
        layout::render_footer_styled(f, msg, PINK, chunks[2]);
    } else if let Some(err) = &app.error_message {
        layout::render_footer_styled(f, err, Color::Red, chunks[2]);
    } else {
        layout::render_footer(
            f,
            "↑↓ 选择 | Tab 切换分类 | Enter 卸载 | F5 刷新 | Ctrl+S 排序 | Ctrl+E 导出清单 | Esc 返回",
            chunks[2],
        );
    }
}

enum Row {
    Header(Category, usize),
    Item(usize),
}

/// 按名称排序时插入分类标题行
fn build_rows(app: &App, catalog: &Catalog) -> Vec<Row> {
    let grouped = app.config.sort == SortOrder::Name;
    let count_in = |cat: Category| {
        app.browse
            .filtered
            .iter()
            .filter(|&&i| catalog.records[i].category == cat)
            .count()
    };

    let mut rows = Vec::with_capacity(app.browse.filtered.len() + 2);
    let mut last: Option<Category> = None;
    for (display_idx, &real_idx) in app.browse.filtered.iter().enumerate() {
        let cat = catalog.records[real_idx].category;
        if grouped && last != Some(cat) {
            rows.push(Row::Header(cat, count_in(cat)));
            last = Some(cat);
        }
        rows.push(Row::Item(display_idx));
    }
    rows
}

fn size_column(app: &App, pkg: &PackageRecord) -> String {
    if !pkg.is_removable() {
        "标准库".to_string()
    } else if app.config.show_sizes {
        pkg.display_size()
    } else {
        String::new()
    }
}

fn render_package_list(f: &mut Frame, app: &App, catalog: &Catalog, area: Rect) {
    if app.browse.filtered.is_empty() {
        let hint = if catalog.is_empty() {
            "  环境中没有任何包"
        } else if app.browse.input.is_empty() {
            "  当前分类没有包"
        } else {
            "  未找到匹配的包"
        };
        f.render_widget(Paragraph::new(hint).style(Style::default().fg(Color::DarkGray)), area);
        return;
    }

    let rows = build_rows(app, catalog);
    let visible_height = area.height as usize;
    let selected_line = rows
        .iter()
        .position(|r| matches!(r, Row::Item(i) if *i == app.browse.selected))
        .unwrap_or(0);
    let scroll = layout::scroll_for_selection(selected_line, visible_height);
    let grouped = app.config.sort == SortOrder::Name;

    let max_name_width = rows
        .iter()
        .skip(scroll)
        .take(visible_height)
        .filter_map(|r| match r {
            Row::Item(i) => catalog.records.get(app.browse.filtered[*i]),
            Row::Header(..) => None,
        })
        .map(|pkg| UnicodeWidthStr::width(format!("{} {}", pkg.name, pkg.display_version()).as_str()))
        .max()
        .unwrap_or(20);

    let lines: Vec<Line> = rows
        .iter()
        .skip(scroll)
        .take(visible_height)
        .map(|row| match row {
            Row::Header(cat, count) => Line::from(Span::styled(
                format!("── {} ({}) ──", cat.label(), count),
                Style::default().fg(PINK).add_modifier(Modifier::BOLD),
            )),
            Row::Item(display_idx) => {
                let pkg = &catalog.records[app.browse.filtered[*display_idx]];
                let is_selected = *display_idx == app.browse.selected;
                let cursor = if is_selected { "> " } else { "  " };
                let tag = if grouped {
                    String::new()
                } else {
                    format!("[{}] ", pkg.category.label())
                };
                let name_color = match pkg.category {
                    Category::Default => STD_GREEN,
                    Category::UserInstalled => BLUE,
                };
                let name_ver_width =
                    UnicodeWidthStr::width(pkg.name.as_str()) + 1 + UnicodeWidthStr::width(pkg.display_version());
                let padding = max_name_width.saturating_sub(name_ver_width) + 2;
                let size = size_column(app, pkg);

                if is_selected {
                    let bg = Style::default().bg(SEL_BG);
                    Line::from(vec![
                        Span::styled(format!("{}{}", cursor, tag), bg.fg(BRIGHT_WHITE).add_modifier(Modifier::BOLD)),
                        Span::styled(pkg.name.clone(), bg.fg(BRIGHT_WHITE).add_modifier(Modifier::BOLD)),
                        Span::styled(format!(" {}", pkg.display_version()), bg.fg(name_color)),
                        Span::styled(format!("{}{}", " ".repeat(padding), size), bg.fg(DESC_DIM)),
                    ])
                } else {
                    Line::from(vec![
                        Span::styled(format!("{}{}", cursor, tag), Style::default().fg(DIM)),
                        Span::styled(pkg.name.clone(), Style::default().fg(name_color)),
                        Span::styled(format!(" {}", pkg.display_version()), Style::default().fg(Color::White)),
                        Span::styled(format!("{}{}", " ".repeat(padding), size), Style::default().fg(DIM)),
                    ])
                }
            }
        })
        .collect();

    f.render_widget(Paragraph::new(lines), area);

    if rows.len() > visible_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"));
        let mut state = ScrollbarState::new(rows.len()).position(scroll);
        f.render_stateful_widget(scrollbar, area, &mut state);
    }
}

fn render_preview_view(f: &mut Frame, app: &App) {
    let chunks = layout::main_layout(f.area());
    let target = app.browse.target.as_deref().unwrap_or("");
    layout::render_header(f, &format!("🗑️  确认卸载 '{}'?", target), chunks[0]);

    layout::render_scrollable_content(
        f,
        "卸载预览",
        &app.browse.preview,
        app.browse.scroll,
        chunks[1],
    );

    let footer = if app.browse.preview.len() <= 1 {
        "正在获取卸载预览..."
    } else {
        "Enter 确认卸载 | Esc 取消 | ↑↓ 滚动"
    };
    layout::render_footer(f, footer, chunks[2]);
}

fn render_output_view(f: &mut Frame, app: &App) {
    let chunks = layout::main_layout(f.area());

    let title = match app.browse.phase {
        BrowsePhase::Removing => "⚙️  正在卸载...",
        BrowsePhase::RemoveComplete => "✅ 卸载完成",
        BrowsePhase::Error => "❌ 卸载失败",
        _ => "🗑️  卸载",
    };
    layout::render_header(f, &header_title(app, title), chunks[0]);

    let content = app.browse.get_content();
    layout::render_scrollable_content(f, "pip 输出", &content, app.browse.scroll, chunks[1]);

    match app.browse.phase {
        BrowsePhase::Removing => layout::render_footer(f, "卸载进行中 | Esc 取消", chunks[2]),
        BrowsePhase::RemoveComplete => {
            let text = match &app.browse.message {
                Some(msg) => format!("{} | Enter/Esc 返回列表", msg),
                None => "列表已刷新 | ↑↓ 滚动 | Enter/Esc 返回列表".to_string(),
            };
            layout::render_footer(f, &text, chunks[2]);
        }
        _ => {
            let msg = app.error_message.as_deref().unwrap_or("发生错误");
            layout::render_footer_styled(f, &format!("{} | Esc 返回列表", msg), Color::Red, chunks[2]);
        }
    }
}
