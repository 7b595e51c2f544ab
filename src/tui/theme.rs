//! 主题色定义，全局统一使用

use ratatui::style::Color;

/// 粉色：标记 / 警告
pub const PINK: Color = Color::Rgb(245, 169, 184);
/// 蓝色：用户安装的包名
pub const BLUE: Color = Color::Rgb(91, 206, 250);
/// 内置包名
pub const STD_GREEN: Color = Color::Rgb(152, 195, 121);
/// 选中行背景色
pub const SEL_BG: Color = Color::Rgb(45, 35, 55);
pub const BRIGHT_WHITE: Color = Color::Rgb(255, 255, 255);
/// 次要信息
pub const DIM: Color = Color::Rgb(130, 130, 140);
/// 选中行内的次要信息
pub const DESC_DIM: Color = Color::Rgb(180, 180, 190);
