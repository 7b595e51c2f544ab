use super::state::App;
use crate::environment::Category;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Margin},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

const LOGO: &str = r#"
 _ _                    _
| (_) __ _ _ __    _ __(_)_ __
| | |/ _` | '_ \  | '_ \ | '_ \
| | | (_| | | | | | |_) || |_) |
|_|_|\__,_|_| |_| | .__/_|| .__/
                  |_|     |_|"#;

pub fn render_dashboard(f: &mut Frame, app: &App) {
    let area = f.area();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    f.render_widget(block, area);

    let mut lines: Vec<Line> = vec![Line::from("")];

    for logo_line in LOGO.lines() {
        lines.push(Line::from(Span::styled(
            logo_line.to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(""));
    lines.push(section_title("── Python 环境 ──"));
    lines.push(Line::from(""));

    match (&app.env, &app.snapshot) {
        // 虚拟环境里 sys.executable 比 PATH 上找到的路径更准确
        (_, Some(snap)) => lines.push(info_line("解释器  ", &snap.env.executable.display().to_string())),
        (Some(env), None) => lines.push(info_line("解释器  ", &env.interpreter.display().to_string())),
        (None, None) => lines.push(info_line("解释器  ", "检测中...")),
    }

    match &app.snapshot {
        Some(snap) => {
            lines.push(info_line("版本  ", &snap.env.version));
            let dirs = snap
                .env
                .site_dirs
                .iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>()
                .join("; ");
            lines.push(info_line("site 目录  ", &dirs));
            let (defaults, users) = snap.catalog.partition();
            lines.push(info_line(
                Category::Default.label(),
                &format!("{} 个", defaults.len()),
            ));
            lines.push(info_line(
                Category::UserInstalled.label(),
                &format!("{} 个", users.len()),
            ));
        }
        None if app.error_message.is_some() => {
            lines.push(info_line("状态  ", app.error_message.as_deref().unwrap_or("")));
        }
        None => lines.push(info_line("已安装包  ", "扫描中...")),
    }

    lines.push(Line::from(""));
    lines.push(Line::from(""));
    lines.push(section_title("── 快捷键 ──"));
    lines.push(Line::from(""));
    lines.push(shortcut_line("L", " 浏览 / 卸载包   "));
    lines.push(shortcut_line("C", " 设置             "));
    lines.push(shortcut_line("r", " 重新扫描         "));
    lines.push(shortcut_line("q", " 退出             "));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("lian-pip v{}  ", env!("CARGO_PKG_VERSION")),
        Style::default().fg(Color::DarkGray),
    )));

    let content_height = lines.len() as u16;
    let paragraph = Paragraph::new(lines).alignment(Alignment::Center);

    let inner = area.inner(Margin {
        horizontal: 1,
        vertical: 1,
    });
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(content_height),
            Constraint::Min(0),
        ])
        .split(inner);

    f.render_widget(paragraph, vertical[1]);
}

fn section_title(text: &str) -> Line<'_> {
    Line::from(Span::styled(
        text,
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    ))
}

/// "标签: 值"
fn info_line(label: &str, value: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("{label}: "),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::styled(value.to_string(), Style::default().fg(Color::White)),
    ])
}

fn shortcut_line<'a>(key: &'a str, desc: &'a str) -> Line<'a> {
    Line::from(vec![
        Span::styled(
            format!("  {key}"),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::styled(desc.to_string(), Style::default().fg(Color::White)),
    ])
}
