//! Python 环境模块：解释器探测、元数据扫描和 pip 调用

pub mod metadata;
pub mod streaming;
pub mod types;

pub use streaming::{cancel_operation, cleanup_child_processes};
pub use types::{Category, CommandOutput, Distribution, EnvInfo, PackageRecord};

use crate::catalog::{Catalog, SortOrder};
use crate::error::{PipError, PipResult};
use metadata::{parse_pip_show, scan_site_dirs};
use std::path::PathBuf;
use std::process::Command;
use tokio::sync::mpsc;

/// 解释器路径环境变量
pub const PYTHON_ENV_VAR: &str = "LIAN_PIP_PYTHON";

/// 在目标解释器中执行，输出环境信息 JSON
const PROBE_SCRIPT: &str = r#"
import json, os, site, sys, sysconfig
dirs = []
for p in sys.path:
    if p and os.path.isdir(p) and os.path.basename(p) in ("site-packages", "dist-packages"):
        if p not in dirs:
            dirs.append(p)
extra = []
try:
    extra.extend(site.getsitepackages())
except AttributeError:
    pass
try:
    extra.append(site.getusersitepackages())
except AttributeError:
    pass
for p in extra:
    if p not in dirs:
        dirs.append(p)
names = getattr(sys, "stdlib_module_names", None)
if names is None:
    import pkgutil
    names = set(sys.builtin_module_names)
    names.update(m.name for m in pkgutil.iter_modules([sysconfig.get_paths()["stdlib"]]))
print(json.dumps({
    "version": sys.version.split()[0],
    "executable": sys.executable,
    "site_dirs": dirs,
    "stdlib": sorted(n for n in names if not n.startswith("_")),
}))
"#;

/// 一次完整扫描的结果
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub env: EnvInfo,
    pub catalog: Catalog,
}

/// 扫描选项（来自配置）
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub extra_defaults: Vec<String>,
    pub sort: SortOrder,
}

#[derive(Debug, Clone)]
pub struct PythonEnv {
    pub interpreter: PathBuf,
}

impl PythonEnv {
    pub fn new(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }

    /// 查找解释器：配置项 > 环境变量 > PATH 中的 python3 / python
    pub fn detect(configured: Option<&str>) -> PipResult<Self> {
        let from_env = std::env::var(PYTHON_ENV_VAR).ok();
        let candidates: Vec<String> = configured
            .map(str::to_string)
            .into_iter()
            .chain(from_env)
            .filter(|c| !c.trim().is_empty())
            .chain(["python3".to_string(), "python".to_string()])
            .collect();
        Self::find_interpreter(&candidates)
    }

    /// 按顺序取第一个可执行的候选
    fn find_interpreter(candidates: &[String]) -> PipResult<Self> {
        for candidate in candidates {
            match which::which(candidate) {
                Ok(path) => {
                    log::info!("使用解释器: {}", path.display());
                    return Ok(Self::new(path));
                }
                Err(e) => log::debug!("{} 不可用: {}", candidate, e),
            }
        }

        Err(PipError::InterpreterNotFound {
            tried: candidates.join(", "),
        })
    }

    pub fn name(&self) -> String {
        self.interpreter
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.interpreter.display().to_string())
    }

    fn pip_command(&self) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.args(["-m", "pip", "--disable-pip-version-check", "--no-color"]);
        cmd
    }

    /// 运行探测脚本获取解释器版本、site 目录和标准库模块名
    pub fn inspect(&self) -> PipResult<EnvInfo> {
        let output = Command::new(&self.interpreter)
            .args(["-c", PROBE_SCRIPT])
            .output()?;
        if !output.status.success() {
            return Err(PipError::Probe(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        serde_json::from_slice(&output.stdout).map_err(|e| PipError::Probe(e.to_string()))
    }

    /// 重新扫描整个环境
    pub fn scan(&self, opts: &ScanOptions) -> PipResult<Snapshot> {
        let env = self.inspect()?;
        let dists = scan_site_dirs(&env.site_dirs)?;
        log::debug!("扫描到 {} 个发行包, {} 个标准库模块", dists.len(), env.stdlib.len());
        let catalog = Catalog::build(&env, dists, &opts.extra_defaults, opts.sort);
        Ok(Snapshot { env, catalog })
    }

    /// `pip show <name>` 字段
    pub fn show(&self, name: &str) -> PipResult<Vec<(String, String)>> {
        let output = self.pip_command().args(["show", name]).output()?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No module named pip") {
            return Err(PipError::PipUnavailable(stderr.trim().to_string()));
        }
        if !output.status.success() {
            return Err(PipError::NotInstalled(name.to_string()));
        }
        Ok(parse_pip_show(&String::from_utf8_lossy(&output.stdout)))
    }

    /// 卸载预览：版本、大小、依赖关系
    pub fn preview_remove(&self, record: &PackageRecord) -> Vec<String> {
        let mut lines = vec![
            format!("  {} {}", record.name, record.display_version()),
            format!("    大小: {}", record.display_size()),
        ];
        if let Some(loc) = &record.location {
            lines.push(format!("    位置: {}", loc.display()));
        }
        if !record.summary.is_empty() {
            lines.push(format!("    简介: {}", record.summary));
        }

        match self.show(&record.name) {
            Ok(fields) => {
                for (key, val) in fields {
                    match key.as_str() {
                        "Requires" if !val.is_empty() => {
                            lines.push(format!("    依赖: {}", val));
                        }
                        "Required-by" if !val.is_empty() => {
                            lines.push(format!("    ⚠ 被依赖: {}", val));
                        }
                        _ => {}
                    }
                }
            }
            Err(e) => {
                log::warn!("pip show {} 失败: {}", record.name, e);
                lines.push(format!("    (无法获取依赖信息: {})", e));
            }
        }
        lines.push(String::new());
        lines
    }

    /// 卸载单个包并返回卸载后的新快照；`before_uninstall` 在确认可卸载之后、调用 pip 之前执行
    ///
    /// 先重新扫描确认包存在且可卸载，否则不调用 pip 也不调用 `before_uninstall`；
    /// pip 成功后再次扫描，仍有可卸载的同名记录则视为失败。
    pub fn remove_package<F>(
        &self,
        name: &str,
        opts: &ScanOptions,
        output_tx: mpsc::UnboundedSender<String>,
        before_uninstall: F,
    ) -> PipResult<(CommandOutput, Snapshot)>
    where
        F: FnOnce(&Snapshot),
    {
        let before = self.scan(opts)?;
        match before.catalog.find(name) {
            None => return Err(PipError::NotInstalled(name.to_string())),
            Some(r) if !r.is_removable() => return Err(PipError::NotRemovable(r.name.clone())),
            Some(_) => {}
        }
        before_uninstall(&before);

        let output = self.uninstall_streaming(name, output_tx)?;
        if !output.success {
            if output.stderr.contains("No module named pip") {
                return Err(PipError::PipUnavailable(output.last_error_line()));
            }
            return Err(PipError::CommandFailed {
                name: name.to_string(),
                code: output.code,
                message: output.last_error_line(),
            });
        }

        // 与标准库同名的发行包卸载后，标准库记录会重新出现，这不算残留
        let after = self.scan(opts)?;
        if after.catalog.find(name).is_some_and(PackageRecord::is_removable) {
            return Err(PipError::StillInstalled(name.to_string()));
        }
        log::info!("已卸载 {}", name);
        Ok((output, after))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::{tempdir, TempDir};

    /// 用 sh 脚本冒充解释器：探测、pip show、pip uninstall 都作用在临时 site 目录
    fn fake_python(site: &Path) -> (TempDir, PythonEnv) {
        let script = format!(
            r#"#!/bin/sh
SITE="{site}"
if [ "$1" = "-c" ]; then
  printf '{{"version":"3.12.0","executable":"%s","site_dirs":["%s"],"stdlib":["os","json"]}}\n' "$0" "$SITE"
  exit 0
fi
shift 4
cmd="$1"
if [ "$cmd" = "show" ]; then
  for d in "$SITE"/"$2"-*.dist-info; do
    if [ -d "$d" ]; then
      echo "Name: $2"
      echo "Requires: "
      echo "Required-by: app"
      exit 0
    fi
  done
  echo "WARNING: Package(s) not found: $2" >&2
  exit 1
fi
if [ "$cmd" = "uninstall" ]; then
  name="$3"
  if [ "$name" = "locked" ]; then
    echo "ERROR: Cannot uninstall locked: permission denied" >&2
    exit 1
  fi
  if [ "$name" = "nopip" ]; then
    echo "$0: No module named pip" >&2
    exit 1
  fi
  for d in "$SITE"/"$name"-*.dist-info; do
    if [ -d "$d" ]; then rm -rf "$d"; fi
  done
  echo "Successfully uninstalled $name"
  exit 0
fi
exit 2
"#,
            site = site.display()
        );
        write_interpreter(&script)
    }

    fn write_interpreter(script: &str) -> (TempDir, PythonEnv) {
        let bin = tempdir().unwrap();
        let path = bin.path().join("python3");
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        let env = PythonEnv::new(path);
        (bin, env)
    }

    fn add_dist(site: &Path, name: &str, version: &str) {
        let d = site.join(format!("{name}-{version}.dist-info"));
        fs::create_dir_all(&d).unwrap();
        fs::write(d.join("METADATA"), format!("Name: {name}\nVersion: {version}\n")).unwrap();
    }

    #[test]
    fn missing_interpreter_reports_every_candidate_tried() {
        let candidates = vec![
            "/definitely/not/python".to_string(),
            "lian-pip-no-such-python".to_string(),
        ];
        match PythonEnv::find_interpreter(&candidates) {
            Err(PipError::InterpreterNotFound { tried }) => {
                assert_eq!(tried, "/definitely/not/python, lian-pip-no-such-python");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn first_executable_candidate_wins() {
        let site = tempdir().unwrap();
        let (_bin, env) = fake_python(site.path());
        let candidates = vec![
            "/definitely/not/python".to_string(),
            env.interpreter.display().to_string(),
        ];
        let found = PythonEnv::find_interpreter(&candidates).unwrap();
        assert_eq!(
            found.interpreter.canonicalize().unwrap(),
            env.interpreter.canonicalize().unwrap()
        );
    }

    #[test]
    fn unusable_interpreter_output_is_reported() {
        let (_bin, env) = write_interpreter("#!/bin/sh\necho 'not json'\n");
        assert!(matches!(env.inspect(), Err(PipError::Probe(_))));

        let (_bin, env) = write_interpreter("#!/bin/sh\necho 'SyntaxError: boom' >&2\nexit 1\n");
        match env.scan(&ScanOptions::default()) {
            Err(PipError::Probe(msg)) => assert!(msg.contains("SyntaxError: boom")),
            other => panic!("unexpected: {:?}", other.map(|s| s.catalog.len())),
        }
    }

    #[test]
    fn scan_lists_distributions_and_stdlib() {
        let site = tempdir().unwrap();
        add_dist(site.path(), "requests", "2.31.0");
        let (_bin, env) = fake_python(site.path());

        let snap = env.scan(&ScanOptions::default()).unwrap();
        assert_eq!(snap.env.version, "3.12.0");
        assert_eq!(snap.catalog.len(), 3);
        assert_eq!(
            snap.catalog.find("requests").unwrap().category,
            Category::UserInstalled
        );
        assert_eq!(snap.catalog.find("os").unwrap().category, Category::Default);
    }

    #[test]
    fn removed_package_is_gone_after_rescan() {
        let site = tempdir().unwrap();
        add_dist(site.path(), "requests", "2.31.0");
        add_dist(site.path(), "numpy", "1.26.0");
        let (_bin, env) = fake_python(site.path());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let (output, after) = env
            .remove_package("requests", &ScanOptions::default(), tx, |_| {})
            .unwrap();
        assert!(output.success);
        assert!(after.catalog.find("requests").is_none());
        assert!(after.catalog.find("numpy").is_some());

        let mut lines = Vec::new();
        while let Ok(l) = rx.try_recv() {
            lines.push(l);
        }
        assert!(lines.iter().any(|l| l.contains("Successfully uninstalled")));
    }

    #[test]
    fn removing_unknown_package_fails_without_touching_anything() {
        let site = tempdir().unwrap();
        add_dist(site.path(), "requests", "2.31.0");
        let (_bin, env) = fake_python(site.path());
        let (tx, _rx) = mpsc::unbounded_channel();

        let before = env.scan(&ScanOptions::default()).unwrap();
        let err = env
            .remove_package("does-not-exist", &ScanOptions::default(), tx, |_| {})
            .unwrap_err();
        assert!(matches!(err, PipError::NotInstalled(_)));

        let after = env.scan(&ScanOptions::default()).unwrap();
        assert_eq!(before.catalog.records, after.catalog.records);
    }

    #[test]
    fn stdlib_module_is_not_removable() {
        let site = tempdir().unwrap();
        let (_bin, env) = fake_python(site.path());
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = env.remove_package("json", &ScanOptions::default(), tx, |_| {}).unwrap_err();
        assert!(matches!(err, PipError::NotRemovable(_)));
    }

    #[test]
    fn failed_uninstall_reports_pip_message() {
        let site = tempdir().unwrap();
        add_dist(site.path(), "locked", "1.0");
        let (_bin, env) = fake_python(site.path());
        let (tx, _rx) = mpsc::unbounded_channel();

        match env.remove_package("locked", &ScanOptions::default(), tx, |_| {}) {
            Err(PipError::CommandFailed { code, message, .. }) => {
                assert_eq!(code, Some(1));
                assert!(message.contains("permission denied"));
            }
            other => panic!("unexpected: {:?}", other.map(|(o, _)| o)),
        }
    }

    #[test]
    fn preview_shows_reverse_dependencies() {
        let site = tempdir().unwrap();
        add_dist(site.path(), "requests", "2.31.0");
        let (_bin, env) = fake_python(site.path());
        let snap = env.scan(&ScanOptions::default()).unwrap();
        let record = snap.catalog.find("requests").unwrap();

        let lines = env.preview_remove(record);
        assert!(lines[0].contains("requests 2.31.0"));
        assert!(lines.iter().any(|l| l.contains("被依赖: app")));
    }

    #[test]
    fn removing_distribution_that_shadows_stdlib_succeeds() {
        let site = tempdir().unwrap();
        add_dist(site.path(), "json", "9.9");
        let (_bin, env) = fake_python(site.path());
        let (tx, _rx) = mpsc::unbounded_channel();

        let before = env.scan(&ScanOptions::default()).unwrap();
        assert!(before.catalog.find("json").unwrap().is_removable());

        let (output, after) = env.remove_package("json", &ScanOptions::default(), tx, |_| {}).unwrap();
        assert!(output.success);
        let json = after.catalog.find("json").unwrap();
        assert!(!json.is_removable());
        assert_eq!(json.category, Category::Default);
    }

    #[test]
    fn missing_pip_is_reported() {
        let site = tempdir().unwrap();
        add_dist(site.path(), "nopip", "1.0");
        let (_bin, env) = fake_python(site.path());
        let (tx, _rx) = mpsc::unbounded_channel();

        match env.remove_package("nopip", &ScanOptions::default(), tx, |_| {}) {
            Err(PipError::PipUnavailable(msg)) => assert!(msg.contains("No module named pip")),
            other => panic!("unexpected: {:?}", other.map(|(o, _)| o)),
        }
    }

    #[test]
    fn before_uninstall_hook_runs_only_for_removable_targets() {
        let site = tempdir().unwrap();
        add_dist(site.path(), "requests", "2.31.0");
        let (_bin, env) = fake_python(site.path());
        let opts = ScanOptions::default();

        for name in ["does-not-exist", "os"] {
            let (tx, _rx) = mpsc::unbounded_channel();
            let mut called = false;
            let result = env.remove_package(name, &opts, tx, |_| called = true);
            assert!(result.is_err());
            assert!(!called, "hook ran for {name}");
        }

        let (tx, _rx) = mpsc::unbounded_channel();
        let mut seen = Vec::new();
        env.remove_package("requests", &opts, tx, |snap| {
            seen = snap.catalog.freeze_lines();
        })
        .unwrap();
        assert_eq!(seen, vec!["requests==2.31.0".to_string()]);
    }
}
