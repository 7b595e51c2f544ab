mod browse;
mod dashboard;
pub mod input;
mod layout;
mod settings;
pub mod state;
mod theme;

use crate::config::Config;
use crate::environment::PythonEnv;
use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Frame, Terminal};
use state::{App, AppEvent, AppMode, BrowsePhase};
use std::io;
use tokio::sync::mpsc;

pub async fn run(config: Config) -> Result<()> {
    // 终端初始化
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config);

    let (tx, mut rx) = mpsc::channel(32);

    // 探测解释器，成功后自动扫描
    spawn_detect(&mut app, &tx);

    // 主循环
    loop {
        // 输出 / 预览阶段 clamp scroll
        if app.mode == AppMode::Browse && app.browse.phase != BrowsePhase::Browsing {
            let total = if app.browse.phase == BrowsePhase::PreviewingRemove {
                app.browse.preview.len()
            } else {
                app.browse.get_content().len()
            };
            let term_size = terminal.size()?;
            let visible = layout::visible_content_height(term_size.height);
            app.browse.scroll = app.browse.scroll.min(total.saturating_sub(visible));
        }

        terminal.draw(|f| ui(f, &app))?;

        // 处理事件
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                let term_size = terminal.size()?;

                match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        if app.browse.phase == BrowsePhase::Removing {
                            crate::environment::cancel_operation();
                        }
                        app.should_quit = true;
                    }
                    // 浏览模式下字母都是筛选输入
                    _ if app.mode == AppMode::Browse => {
                        browse::handle_browse_key(key, &mut app, &tx, term_size.height);
                    }
                    _ if app.mode == AppMode::Settings => {
                        settings::handle_settings_key(key, &mut app, &tx);
                    }
                    KeyCode::Char('q') => app.should_quit = true,
                    KeyCode::Char('L') => {
                        app.mode = AppMode::Browse;
                        app.reset_browse_state();
                    }
                    KeyCode::Char('C') => {
                        app.mode = AppMode::Settings;
                        app.build_settings_items();
                    }
                    KeyCode::Char('r') => {
                        if app.env.is_some() {
                            spawn_scan(&mut app, &tx);
                        } else {
                            spawn_detect(&mut app, &tx);
                        }
                    }
                    _ => {}
                }
            }
        }

        // 处理异步事件
        while let Ok(event) = rx.try_recv() {
            match event {
                AppEvent::EnvDetected(env) => {
                    app.env = Some(env);
                    spawn_scan(&mut app, &tx);
                }
                AppEvent::ScanComplete(snapshot) => {
                    app.error_message = None;
                    app.replace_snapshot(snapshot);
                    if app.rescan_pending {
                        app.rescan_pending = false;
                        spawn_scan(&mut app, &tx);
                    }
                }
                AppEvent::RemovePreviewReady(preview) => {
                    app.browse.preview = preview;
                    app.browse.scroll = 0;
                }
                AppEvent::RemoveLine(line) => {
                    app.browse.add_line(line);
                }
                AppEvent::RemoveComplete {
                    name,
                    output,
                    snapshot,
                } => {
                    app.browse.output = Some(output);
                    app.browse.phase = BrowsePhase::RemoveComplete;
                    app.browse.message = Some(format!("已卸载 {}", name));
                    app.replace_snapshot(snapshot);
                }
                AppEvent::RemoveFailed(msg) => {
                    // 列表保持原样
                    app.error_message = Some(msg);
                    app.browse.phase = BrowsePhase::Error;
                }
                AppEvent::SnapshotSaved(path) => {
                    let msg = format!("📄 快照已保存: {}", path);
                    if app.browse.phase == BrowsePhase::Removing {
                        app.browse.add_line(msg);
                    } else {
                        app.browse.message = Some(msg);
                    }
                }
                AppEvent::Error(msg) => {
                    log::error!("{}", msg);
                    app.error_message = Some(msg);
                    app.scanning = false;
                    app.rescan_pending = false;
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    // 清理残留的 pip 子进程
    crate::environment::cleanup_child_processes();

    // 恢复终端
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    Ok(())
}

/// 按当前配置重新探测解释器；结果通过 EnvDetected 回到主循环
fn spawn_detect(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    let configured = app.config.python.clone();
    app.env = None;
    app.snapshot = None;
    app.scanning = true;
    app.error_message = None;
    app.apply_filter();

    let tx_clone = tx.clone();
    tokio::spawn(async move {
        let result = tokio::task::spawn_blocking(move || PythonEnv::detect(configured.as_deref())).await;
        let event = match result {
            Ok(Ok(env)) => AppEvent::EnvDetected(env),
            Ok(Err(e)) => AppEvent::Error(format!("检测 Python 失败: {}", e)),
            Err(e) => AppEvent::Error(format!("检测 Python 失败: {}", e)),
        };
        let _ = tx_clone.send(event).await;
    });
}

/// 重新扫描环境；扫描期间旧列表保持可见
fn spawn_scan(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    let Some(env) = app.env.clone() else {
        return;
    };
    if app.scanning && app.snapshot.is_some() {
        app.rescan_pending = true;
        return;
    }
    app.scanning = true;
    let opts = app.config.scan_options();

    let tx_clone = tx.clone();
    tokio::spawn(async move {
        let result = tokio::task::spawn_blocking(move || env.scan(&opts)).await;
        let event = match result {
            Ok(Ok(snapshot)) => AppEvent::ScanComplete(snapshot),
            Ok(Err(e)) => AppEvent::Error(format!("扫描失败: {}", e)),
            Err(e) => AppEvent::Error(format!("扫描失败: {}", e)),
        };
        let _ = tx_clone.send(event).await;
    });
}

fn ui(f: &mut Frame, app: &App) {
    match app.mode {
        AppMode::Dashboard => dashboard::render_dashboard(f, app),
        AppMode::Browse => browse::render_browse(f, app),
        AppMode::Settings => settings::render_settings(f, app),
    }
}
