use anyhow::Result;
use chrono::Local;
use std::fs;
use std::path::PathBuf;

/// 将用户安装包清单保存为 requirements 格式，便于 `pip install -r` 还原
pub struct SnapshotSaver {
    base_dir: PathBuf,
}

impl SnapshotSaver {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn save(&self, lines: &[String], python_version: &str, reason: &str) -> Result<PathBuf> {
        let now = Local::now();

        // 目录结构: YYYY/MM/DD/
        let dir = self
            .base_dir
            .join(now.format("%Y").to_string())
            .join(now.format("%m").to_string())
            .join(now.format("%d").to_string());
        fs::create_dir_all(&dir)?;

        let filepath = dir.join(now.format("%H-%M-%S.txt").to_string());

        let mut content = format!(
            "# Python {} 用户安装包快照 ({})\n# 生成时间: {}\n",
            python_version,
            reason,
            now.format("%Y-%m-%d %H:%M:%S")
        );
        for line in lines {
            content.push_str(line);
            content.push('\n');
        }

        fs::write(&filepath, content)?;
        log::info!("快照已保存: {}", filepath.display());
        Ok(filepath)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_requirements_file() {
        let dir = tempdir().unwrap();
        let saver = SnapshotSaver::new(dir.path().to_path_buf());
        let path = saver
            .save(&["numpy==1.26.0".to_string()], "3.12.1", "卸载 numpy 前")
            .unwrap();

        assert!(path.starts_with(dir.path()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("txt"));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Python 3.12.1"));
        assert!(content.lines().any(|l| l == "numpy==1.26.0"));
    }
}
