//! site-packages 元数据扫描与输出解析

use super::types::Distribution;
use crate::error::{PipError, PipResult};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// PEP 503 名称规范化：小写，连续的 `-` `_` `.` 合并为单个 `-`
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_sep = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_sep {
                out.push('-');
                in_sep = true;
            }
        } else {
            out.extend(c.to_lowercase());
            in_sep = false;
        }
    }
    out
}

/// METADATA / PKG-INFO 头部字段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataHeaders {
    pub name: Option<String>,
    pub version: Option<String>,
    pub summary: Option<String>,
}

/// 解析 RFC 822 风格的头部，遇到第一个空行（正文开始）即停止
pub fn parse_metadata_headers(content: &str) -> MetadataHeaders {
    let mut headers = MetadataHeaders::default();
    for line in content.lines() {
        if line.trim().is_empty() {
            break;
        }
        // 续行
        if line.starts_with(' ') || line.starts_with('\t') {
            continue;
        }
        if let Some(colon) = line.find(':') {
            let key = line[..colon].trim();
            let val = line[colon + 1..].trim().to_string();
            let slot = match key {
                "Name" => &mut headers.name,
                "Version" => &mut headers.version,
                "Summary" => &mut headers.summary,
                _ => continue,
            };
            if slot.is_none() && !val.is_empty() {
                *slot = Some(val);
            }
        }
    }
    headers
}

/// 从 `foo_bar-1.2.dist-info` 这样的目录名拆出 (名称, 版本)
fn split_stem(file_name: &str) -> (String, String) {
    let stem = file_name
        .trim_end_matches(".dist-info")
        .trim_end_matches(".egg-info");
    match stem.split_once('-') {
        Some((name, rest)) => {
            // egg-info 可能带 -py3.11 后缀
            let version = rest.split('-').next().unwrap_or(rest);
            (name.to_string(), version.to_string())
        }
        None => (stem.to_string(), String::new()),
    }
}

/// RECORD 每行 `path,hash,size`，累加 size 列
pub fn parse_record_size(content: &str) -> Option<u64> {
    let mut total = 0u64;
    let mut any = false;
    for line in content.lines() {
        let mut cols = line.rsplitn(3, ',');
        if let Some(size) = cols.next() {
            if let Ok(n) = size.trim().parse::<u64>() {
                total += n;
                any = true;
            }
        }
    }
    any.then_some(total)
}

fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// 包占用空间：优先 RECORD，否则按 top_level.txt 遍历顶层目录
fn package_size(site_dir: &Path, meta_dir: &Path) -> Option<u64> {
    if let Ok(record) = fs::read_to_string(meta_dir.join("RECORD")) {
        if let Some(size) = parse_record_size(&record) {
            return Some(size);
        }
    }

    let top_level = fs::read_to_string(meta_dir.join("top_level.txt")).ok()?;
    let mut total = 0u64;
    let mut found = false;
    for module in top_level.lines().map(str::trim).filter(|m| !m.is_empty()) {
        let pkg_dir = site_dir.join(module);
        let single = site_dir.join(format!("{module}.py"));
        if pkg_dir.is_dir() {
            total += dir_size(&pkg_dir);
            found = true;
        } else if let Ok(meta) = fs::metadata(&single) {
            total += meta.len();
            found = true;
        }
    }
    found.then_some(total)
}

/// 定位元数据文件：dist-info/METADATA、egg-info/PKG-INFO 或单文件 egg-info
fn metadata_file(entry_path: &Path, file_name: &str) -> Option<PathBuf> {
    if file_name.ends_with(".dist-info") && entry_path.is_dir() {
        Some(entry_path.join("METADATA"))
    } else if file_name.ends_with(".egg-info") {
        if entry_path.is_dir() {
            Some(entry_path.join("PKG-INFO"))
        } else {
            Some(entry_path.to_path_buf())
        }
    } else {
        None
    }
}

/// 扫描单个 site 目录下的所有发行包
///
/// 目录不存在视为空；目录不可读返回 `ScanFailed`。
/// 单个元数据文件损坏只记录警告并跳过。
pub fn scan_site_dir(dir: &Path) -> PipResult<Vec<Distribution>> {
    if !dir.exists() {
        log::debug!("site 目录不存在，跳过: {}", dir.display());
        return Ok(Vec::new());
    }

    let read_dir = fs::read_dir(dir).map_err(|source| PipError::ScanFailed {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut entries: Vec<(String, PathBuf)> = read_dir
        .filter_map(|e| e.ok())
        .map(|e| (e.file_name().to_string_lossy().to_string(), e.path()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut dists = Vec::new();
    for (file_name, path) in entries {
        let Some(meta_path) = metadata_file(&path, &file_name) else {
            continue;
        };
        let content = match fs::read_to_string(&meta_path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("读取元数据失败 {}: {}", meta_path.display(), e);
                continue;
            }
        };

        let headers = parse_metadata_headers(&content);
        let (stem_name, stem_version) = split_stem(&file_name);
        let meta_dir = if path.is_dir() { path.clone() } else { dir.to_path_buf() };

        dists.push(Distribution {
            name: headers.name.unwrap_or(stem_name),
            version: headers.version.unwrap_or(stem_version),
            summary: headers.summary.unwrap_or_default(),
            size: if path.is_dir() { package_size(dir, &meta_dir) } else { None },
            location: path,
        });
    }

    Ok(dists)
}

/// 按 sys.path 顺序扫描多个 site 目录；同名（规范化后）以先出现者为准
pub fn scan_site_dirs(dirs: &[PathBuf]) -> PipResult<Vec<Distribution>> {
    let mut seen = std::collections::HashSet::new();
    let mut all = Vec::new();
    for dir in dirs {
        for dist in scan_site_dir(dir)? {
            if seen.insert(normalize_name(&dist.name)) {
                all.push(dist);
            } else {
                log::debug!("{} 被更靠前的 site 目录遮蔽: {}", dist.name, dist.location.display());
            }
        }
    }
    Ok(all)
}

/// 清理终端输出中的 ANSI 转义序列和控制字符
pub fn clean_terminal_output(input: &str) -> String {
    let mut result = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\x1b' => {
                if chars.peek() == Some(&'[') {
                    chars.next();
                    while let Some(&next) = chars.peek() {
                        chars.next();
                        if next.is_ascii_alphabetic() {
                            break;
                        }
                    }
                }
            }
            c if c.is_control() && c != '\n' && c != '\t' => {}
            _ => result.push(c),
        }
    }

    result
}

/// 解析 `pip show` 的 `Key: value` 输出
pub fn parse_pip_show(output: &str) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();
    for line in output.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = fields.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
            continue;
        }
        if let Some((key, val)) = line.split_once(':') {
            let key = key.trim();
            if !key.is_empty() {
                fields.push((key.to_string(), val.trim().to_string()));
            }
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_dist(site: &Path, dir_name: &str, metadata: &str, record: Option<&str>) {
        let d = site.join(dir_name);
        fs::create_dir_all(&d).unwrap();
        fs::write(d.join("METADATA"), metadata).unwrap();
        if let Some(r) = record {
            fs::write(d.join("RECORD"), r).unwrap();
        }
    }

    #[test]
    fn normalize_collapses_separators() {
        assert_eq!(normalize_name("Foo_Bar"), "foo-bar");
        assert_eq!(normalize_name("zope.interface"), "zope-interface");
        assert_eq!(normalize_name("a-_.b"), "a-b");
        assert_eq!(normalize_name("requests"), "requests");
    }

    #[test]
    fn headers_stop_at_body() {
        let content = "Metadata-Version: 2.1\nName: requests\nVersion: 2.31.0\nSummary: HTTP for Humans.\n\nName: not-me\n";
        let h = parse_metadata_headers(content);
        assert_eq!(h.name.as_deref(), Some("requests"));
        assert_eq!(h.version.as_deref(), Some("2.31.0"));
        assert_eq!(h.summary.as_deref(), Some("HTTP for Humans."));
    }

    #[test]
    fn record_size_sums_last_column() {
        let record = "pkg/__init__.py,sha256=abc,100\npkg/a,b.py,sha256=def,50\npkg-1.0.dist-info/RECORD,,\n";
        assert_eq!(parse_record_size(record), Some(150));
        assert_eq!(parse_record_size("a,,\n"), None);
    }

    #[test]
    fn split_stem_handles_egg_suffix() {
        assert_eq!(split_stem("six-1.16.0.dist-info"), ("six".into(), "1.16.0".into()));
        assert_eq!(split_stem("foo-2.0-py3.11.egg-info"), ("foo".into(), "2.0".into()));
    }

    #[test]
    fn scans_dist_info_and_egg_info() {
        let site = tempdir().unwrap();
        write_dist(
            site.path(),
            "requests-2.31.0.dist-info",
            "Name: requests\nVersion: 2.31.0\nSummary: HTTP\n",
            Some("requests/__init__.py,sha256=x,1024\n"),
        );
        fs::write(
            site.path().join("legacy-0.1-py3.11.egg-info"),
            "Name: legacy\nVersion: 0.1\n",
        )
        .unwrap();
        fs::create_dir_all(site.path().join("requests")).unwrap();

        let dists = scan_site_dir(site.path()).unwrap();
        assert_eq!(dists.len(), 2);
        let legacy = dists.iter().find(|d| d.name == "legacy").unwrap();
        assert_eq!(legacy.version, "0.1");
        assert_eq!(legacy.size, None);
        let req = dists.iter().find(|d| d.name == "requests").unwrap();
        assert_eq!(req.size, Some(1024));
        assert_eq!(req.summary, "HTTP");
    }

    #[test]
    fn size_falls_back_to_top_level() {
        let site = tempdir().unwrap();
        write_dist(site.path(), "mini-1.0.dist-info", "Name: mini\nVersion: 1.0\n", None);
        fs::write(site.path().join("mini-1.0.dist-info/top_level.txt"), "mini\n").unwrap();
        fs::create_dir_all(site.path().join("mini")).unwrap();
        fs::write(site.path().join("mini/__init__.py"), vec![b'x'; 300]).unwrap();

        let dists = scan_site_dir(site.path()).unwrap();
        assert_eq!(dists[0].size, Some(300));
    }

    #[test]
    fn missing_name_header_uses_directory_stem() {
        let site = tempdir().unwrap();
        write_dist(site.path(), "odd_pkg-3.2.dist-info", "Metadata-Version: 2.1\n", None);
        let dists = scan_site_dir(site.path()).unwrap();
        assert_eq!(dists[0].name, "odd_pkg");
        assert_eq!(dists[0].version, "3.2");
    }

    #[test]
    fn missing_site_dir_is_empty() {
        let site = tempdir().unwrap();
        let dists = scan_site_dir(&site.path().join("nope")).unwrap();
        assert!(dists.is_empty());
    }

    #[test]
    fn unreadable_site_dir_is_a_scan_error() {
        let site = tempdir().unwrap();
        let not_a_dir = site.path().join("site-packages");
        fs::write(&not_a_dir, "").unwrap();

        match scan_site_dir(&not_a_dir) {
            Err(PipError::ScanFailed { path, .. }) => assert_eq!(path, not_a_dir),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            scan_site_dirs(&[not_a_dir.clone()]),
            Err(PipError::ScanFailed { .. })
        ));
    }

    #[test]
    fn earlier_site_dir_shadows_later() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        write_dist(first.path(), "Six-1.16.0.dist-info", "Name: Six\nVersion: 1.16.0\n", None);
        write_dist(second.path(), "six-1.15.0.dist-info", "Name: six\nVersion: 1.15.0\n", None);

        let dists =
            scan_site_dirs(&[first.path().to_path_buf(), second.path().to_path_buf()]).unwrap();
        assert_eq!(dists.len(), 1);
        assert_eq!(dists[0].version, "1.16.0");
    }

    #[test]
    fn clean_strips_ansi() {
        assert_eq!(clean_terminal_output("\x1b[33mWARNING\x1b[0m: x"), "WARNING: x");
    }

    #[test]
    fn pip_show_fields() {
        let out = "Name: requests\nVersion: 2.31.0\nRequires: certifi, idna\nRequired-by: \n";
        let fields = parse_pip_show(out);
        assert_eq!(fields[2], ("Requires".to_string(), "certifi, idna".to_string()));
        assert_eq!(fields[3], ("Required-by".to_string(), String::new()));
    }
}
