//! 环境与包记录的数据类型定义

use serde::Deserialize;
use std::path::PathBuf;

/// 包分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// 随解释器分发的标准库
    Default,
    /// 用户自行安装
    UserInstalled,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Default => "内置",
            Category::UserInstalled => "用户安装",
        }
    }
}

/// 一条已安装包记录
#[derive(Debug, Clone, PartialEq)]
pub struct PackageRecord {
    pub name: String,
    pub version: Option<String>,
    pub category: Category,
    pub summary: String,
    /// 字节数，None 表示无法统计
    pub size: Option<u64>,
    /// 元数据目录；标准库模块为 None
    pub location: Option<PathBuf>,
}

impl PackageRecord {
    /// 只有带元数据的发行包才能交给 pip 卸载
    pub fn is_removable(&self) -> bool {
        self.location.is_some()
    }

    pub fn display_version(&self) -> &str {
        self.version.as_deref().unwrap_or("")
    }

    pub fn display_size(&self) -> String {
        match self.size {
            Some(bytes) => format_size(bytes),
            None => "N/A".to_string(),
        }
    }
}

/// 元数据扫描得到的单个发行包（尚未分类）
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub name: String,
    pub version: String,
    pub summary: String,
    pub size: Option<u64>,
    pub location: PathBuf,
}

/// 解释器探测结果
#[derive(Debug, Clone, Deserialize)]
pub struct EnvInfo {
    pub version: String,
    pub executable: PathBuf,
    pub site_dirs: Vec<PathBuf>,
    pub stdlib: Vec<String>,
}

/// 命令输出结果
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn combined_output(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    /// stderr 最后一行非空内容，用作错误提示
    pub fn last_error_line(&self) -> String {
        self.stderr
            .lines()
            .rev()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .unwrap_or("")
            .to_string()
    }
}

/// 字节数 → "1.23 MB"
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_size_picks_unit() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn last_error_line_skips_trailing_blank_lines() {
        let out = CommandOutput {
            stdout: String::new(),
            stderr: "WARNING: first\nERROR: boom\n\n".to_string(),
            success: false,
            code: Some(1),
        };
        assert_eq!(out.last_error_line(), "ERROR: boom");
    }
}
