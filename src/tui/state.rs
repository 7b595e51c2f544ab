use crate::catalog::{Catalog, CategoryView, SortOrder};
use crate::config::Config;
use crate::environment::{CommandOutput, PackageRecord, PythonEnv, Snapshot};

// ========== 枚举 ==========

#[derive(Debug, Clone, PartialEq)]
pub enum AppMode {
    Dashboard,
    Browse,   // Shift+L: 浏览 / 筛选 / 卸载
    Settings, // Shift+C: 设置
}

#[derive(Debug, Clone, PartialEq)]
pub enum BrowsePhase {
    Browsing,
    PreviewingRemove,
    Removing,
    RemoveComplete,
    Error,
}

/// 设置页面项目类型
#[derive(Debug, Clone)]
pub enum SettingsItem {
    /// 分组标题（不可选中）
    Section(String),
    Toggle {
        label: String,
        key: String,
        value: bool,
    },
    TextEdit {
        label: String,
        key: String,
        value: String,
    },
}

// ========== 事件 ==========

#[derive(Debug)]
pub enum AppEvent {
    EnvDetected(PythonEnv),
    ScanComplete(Snapshot),
    RemovePreviewReady(Vec<String>),
    RemoveLine(String),
    RemoveComplete {
        name: String,
        output: CommandOutput,
        snapshot: Snapshot,
    },
    RemoveFailed(String),
    SnapshotSaved(String),
    Error(String),
}

// ========== 子状态 ==========

pub struct BrowseModeState {
    pub phase: BrowsePhase,
    pub input: String,
    pub cursor: usize,
    pub view: CategoryView,
    /// catalog.records 的下标
    pub filtered: Vec<usize>,
    pub selected: usize,
    /// 正在预览 / 卸载的包名
    pub target: Option<String>,
    pub preview: Vec<String>,
    pub lines: Vec<String>,
    pub output: Option<CommandOutput>,
    pub scroll: usize,
    pub message: Option<String>,
}

pub struct SettingsModeState {
    pub items: Vec<SettingsItem>,
    pub selected: usize,
    pub editing: bool,
    pub edit_buffer: String,
    pub edit_cursor: usize,
    pub message: Option<String>,
    /// 是否修改过影响扫描结果的配置
    pub dirty: bool,
}

impl BrowseModeState {
    pub fn new() -> Self {
        Self {
            phase: BrowsePhase::Browsing,
            input: String::new(),
            cursor: 0,
            view: CategoryView::All,
            filtered: Vec::new(),
            selected: 0,
            target: None,
            preview: Vec::new(),
            lines: Vec::new(),
            output: None,
            scroll: 0,
            message: None,
        }
    }

    pub fn add_line(&mut self, line: String) {
        self.lines.push(line);
        if self.lines.len() > 1 {
            self.scroll = self.lines.len().saturating_sub(1);
        }
    }

    pub fn get_content(&self) -> Vec<String> {
        if let Some(output) = &self.output {
            output
                .combined_output()
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|s| s.to_string())
                .collect()
        } else if !self.lines.is_empty() {
            self.lines.clone()
        } else {
            vec!["等待卸载...".to_string()]
        }
    }

    /// 回到列表，清掉上一次卸载的输出
    pub fn back_to_list(&mut self) {
        self.phase = BrowsePhase::Browsing;
        self.target = None;
        self.preview.clear();
        self.lines.clear();
        self.output = None;
        self.scroll = 0;
    }
}

impl SettingsModeState {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            selected: 0,
            editing: false,
            edit_buffer: String::new(),
            edit_cursor: 0,
            message: None,
            dirty: false,
        }
    }
}

// ========== App ==========

pub struct App {
    pub mode: AppMode,
    pub config: Config,
    pub env: Option<PythonEnv>,
    pub snapshot: Option<Snapshot>,
    pub scanning: bool,
    /// 扫描进行中又请求了一次扫描，完成后补扫
    pub rescan_pending: bool,
    pub error_message: Option<String>,
    pub should_quit: bool,
    pub browse: BrowseModeState,
    pub settings: SettingsModeState,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self {
            mode: AppMode::Dashboard,
            config,
            env: None,
            snapshot: None,
            scanning: false,
            rescan_pending: false,
            error_message: None,
            should_quit: false,
            browse: BrowseModeState::new(),
            settings: SettingsModeState::new(),
        }
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.snapshot.as_ref().map(|s| &s.catalog)
    }

    /// 用新快照整体替换列表，并保持筛选条件
    pub fn replace_snapshot(&mut self, snapshot: Snapshot) {
        let previous = self.selected_record().map(|r| r.name.clone());
        self.snapshot = Some(snapshot);
        self.scanning = false;
        self.refilter(previous);
    }

    /// 切换排序方式。按名称排序可以就地完成；扫描顺序只能靠重新扫描恢复，返回 true 表示需要重扫
    pub fn toggle_sort(&mut self) -> bool {
        self.config.sort = self.config.sort.toggle();
        if self.config.sort == SortOrder::Name {
            let previous = self.selected_record().map(|r| r.name.clone());
            if let Some(snapshot) = self.snapshot.as_mut() {
                snapshot.catalog.sort(SortOrder::Name);
            }
            self.refilter(previous);
            false
        } else {
            true
        }
    }

    /// 关闭"显示内置包"时，全部视图只显示用户安装的包
    pub fn effective_view(&self) -> CategoryView {
        if !self.config.show_default && self.browse.view == CategoryView::All {
            CategoryView::UserInstalled
        } else {
            self.browse.view
        }
    }

    /// 重新计算筛选结果；尽量保持当前选中的包
    pub fn apply_filter(&mut self) {
        let previous = self.selected_record().map(|r| r.name.clone());
        self.refilter(previous);
    }

    fn refilter(&mut self, previous: Option<String>) {
        let view = self.effective_view();
        self.browse.filtered = match self.catalog() {
            Some(catalog) => catalog.filter(&self.browse.input, view),
            None => Vec::new(),
        };

        let restored = previous.and_then(|name| {
            let catalog = self.catalog()?;
            self.browse
                .filtered
                .iter()
                .position(|&idx| catalog.records[idx].name == name)
        });
        self.browse.selected = restored.unwrap_or(0);
    }

    pub fn selected_record(&self) -> Option<&PackageRecord> {
        let catalog = self.catalog()?;
        let idx = *self.browse.filtered.get(self.browse.selected)?;
        catalog.records.get(idx)
    }

    pub fn reset_browse_state(&mut self) {
        let view = self.browse.view;
        self.browse = BrowseModeState::new();
        self.browse.view = view;
        self.error_message = None;
        self.apply_filter();
    }

    /// 从当前 config 构建设置项列表
    pub fn build_settings_items(&mut self) {
        self.settings.items = vec![
            SettingsItem::Section("环境".to_string()),
            SettingsItem::TextEdit {
                label: "解释器".to_string(),
                key: "python".to_string(),
                value: self.config.python.clone().unwrap_or_default(),
            },
            SettingsItem::TextEdit {
                label: "额外内置包".to_string(),
                key: "extra_defaults".to_string(),
                value: self.config.extra_defaults.join(", "),
            },
            SettingsItem::Section("显示".to_string()),
            SettingsItem::Toggle {
                label: "显示包大小".to_string(),
                key: "show_sizes".to_string(),
                value: self.config.show_sizes,
            },
            SettingsItem::Toggle {
                label: "显示内置包".to_string(),
                key: "show_default".to_string(),
                value: self.config.show_default,
            },
            SettingsItem::Toggle {
                label: "按名称分组排序".to_string(),
                key: "sort".to_string(),
                value: self.config.sort == SortOrder::Name,
            },
            SettingsItem::Section("快照".to_string()),
            SettingsItem::Toggle {
                label: "卸载前保存快照".to_string(),
                key: "snapshot_before_remove".to_string(),
                value: self.config.snapshot_before_remove,
            },
            SettingsItem::TextEdit {
                label: "快照目录".to_string(),
                key: "snapshot_dir".to_string(),
                value: self.config.snapshot_dir.display().to_string(),
            },
        ];
        self.settings.selected = 0;
        self.settings.editing = false;
        self.settings.message = None;
        self.settings.dirty = false;
    }

    fn focused_item_index(&self) -> Option<usize> {
        self.settings
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| !matches!(item, SettingsItem::Section(_)))
            .map(|(i, _)| i)
            .nth(self.settings.selected)
    }

    pub fn focused_item(&self) -> Option<&SettingsItem> {
        self.focused_item_index().map(|i| &self.settings.items[i])
    }

    /// 切换 Toggle 项的值并同步到 config
    pub fn toggle_settings_item(&mut self) {
        let Some(real_idx) = self.focused_item_index() else {
            return;
        };
        let key = match &mut self.settings.items[real_idx] {
            SettingsItem::Toggle { key, value, .. } => {
                *value = !*value;
                Some((key.clone(), *value))
            }
            _ => None,
        };
        if let Some((key, new_val)) = key {
            match key.as_str() {
                "show_sizes" => self.config.show_sizes = new_val,
                "show_default" => {
                    self.config.show_default = new_val;
                    self.apply_filter();
                }
                "sort" => {
                    self.config.sort = if new_val { SortOrder::Name } else { SortOrder::Discovery };
                    self.settings.dirty = true;
                }
                "snapshot_before_remove" => self.config.snapshot_before_remove = new_val,
                _ => {}
            }
        }
    }

    /// 开始编辑 TextEdit 项
    pub fn start_settings_edit(&mut self) {
        let Some(real_idx) = self.focused_item_index() else {
            return;
        };
        if let SettingsItem::TextEdit { value, .. } = &self.settings.items[real_idx] {
            self.settings.edit_buffer = value.clone();
            self.settings.edit_cursor = self.settings.edit_buffer.chars().count();
            self.settings.editing = true;
        }
    }

    /// 确认编辑并写回 config
    pub fn confirm_settings_edit(&mut self) {
        if let Some(real_idx) = self.focused_item_index() {
            let buf = self.settings.edit_buffer.trim().to_string();
            if let SettingsItem::TextEdit { key, value, .. } = &mut self.settings.items[real_idx] {
                *value = buf.clone();
                match key.as_str() {
                    "python" => {
                        self.config.python = if buf.is_empty() { None } else { Some(buf) };
                        self.settings.dirty = true;
                    }
                    "extra_defaults" => {
                        self.config.extra_defaults = buf
                            .split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect();
                        self.settings.dirty = true;
                    }
                    "snapshot_dir" if !buf.is_empty() => {
                        self.config.snapshot_dir = std::path::PathBuf::from(buf);
                    }
                    _ => {}
                }
            }
        }
        self.settings.editing = false;
    }

    /// 保存配置到磁盘
    pub fn save_settings(&mut self) {
        match self.config.save() {
            Ok(()) => {
                self.settings.message = Some(format!(
                    "✓ 已保存到 {}",
                    crate::config::Config::config_path().display()
                ));
            }
            Err(e) => {
                self.settings.message = Some(format!("✗ 保存失败: {}", e));
            }
        }
    }

    pub fn settings_focusable_count(&self) -> usize {
        self.settings
            .items
            .iter()
            .filter(|item| !matches!(item, SettingsItem::Section(_)))
            .count()
    }
}
