use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

/// 单行输入框：label + 内容 + 光标（按字符计数，支持中文）
pub fn render_input_line(
    f: &mut Frame,
    content: &str,
    cursor_pos: usize,
    label: &str,
    focused: bool,
    area: Rect,
) {
    let chars: Vec<char> = content.chars().collect();
    let cursor_pos = cursor_pos.min(chars.len());
    let before: String = chars[..cursor_pos].iter().collect();
    let cursor_char = chars
        .get(cursor_pos)
        .map(|c| c.to_string())
        .unwrap_or_else(|| " ".to_string());
    let after: String = chars.iter().skip(cursor_pos + 1).collect();

    let cursor_style = if focused {
        Style::default().fg(Color::Black).bg(Color::White)
    } else {
        Style::default().fg(Color::White)
    };

    let spans = vec![
        Span::styled(
            format!("{label} "),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(before, Style::default().fg(Color::White)),
        Span::styled(cursor_char, cursor_style),
        Span::styled(after, Style::default().fg(Color::White)),
    ];

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

// ===== 共享文本编辑工具函数 =====

/// UTF-8 安全的字符位置转字节位置
pub fn char_to_byte(s: &str, char_pos: usize) -> usize {
    s.char_indices()
        .nth(char_pos)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// 在光标处插入字符并右移光标
pub fn str_insert_char(s: &mut String, cursor: &mut usize, c: char) {
    let byte_pos = char_to_byte(s, *cursor);
    s.insert(byte_pos, c);
    *cursor += 1;
}

/// Backspace: 删除光标前的字符
pub fn str_delete_back(s: &mut String, cursor: &mut usize) {
    if *cursor > 0 {
        *cursor -= 1;
        let byte_pos = char_to_byte(s, *cursor);
        let next_byte_pos = char_to_byte(s, *cursor + 1);
        s.drain(byte_pos..next_byte_pos);
    }
}

/// Delete: 删除光标后的字符
pub fn str_delete_forward(s: &mut String, cursor: &mut usize) {
    let char_count = s.chars().count();
    if *cursor < char_count {
        let byte_pos = char_to_byte(s, *cursor);
        let next_byte_pos = char_to_byte(s, *cursor + 1);
        s.drain(byte_pos..next_byte_pos);
    }
}
