//! 包记录的分类、排序与筛选

use crate::environment::metadata::normalize_name;
use crate::environment::{Category, Distribution, EnvInfo, PackageRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 列表排序方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// 按分类分组，组内按名称字母序
    #[default]
    Name,
    /// 保持扫描顺序
    Discovery,
}

impl SortOrder {
    pub fn toggle(self) -> Self {
        match self {
            SortOrder::Name => SortOrder::Discovery,
            SortOrder::Discovery => SortOrder::Name,
        }
    }
}

/// 浏览时的分类视图
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryView {
    All,
    Default,
    UserInstalled,
}

impl CategoryView {
    pub fn next(self) -> Self {
        match self {
            CategoryView::All => CategoryView::UserInstalled,
            CategoryView::UserInstalled => CategoryView::Default,
            CategoryView::Default => CategoryView::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CategoryView::All => "全部",
            CategoryView::Default => "内置",
            CategoryView::UserInstalled => "用户安装",
        }
    }

    fn admits(&self, category: Category) -> bool {
        match self {
            CategoryView::All => true,
            CategoryView::Default => category == Category::Default,
            CategoryView::UserInstalled => category == Category::UserInstalled,
        }
    }
}

/// 规范化后的内置包名集合
pub fn default_name_set(stdlib: &[String], extra: &[String]) -> HashSet<String> {
    stdlib
        .iter()
        .chain(extra.iter())
        .map(|n| normalize_name(n))
        .collect()
}

/// 名称属于内置集合即为 Default，其余均为 UserInstalled
pub fn classify(name: &str, defaults: &HashSet<String>) -> Category {
    if defaults.contains(&normalize_name(name)) {
        Category::Default
    } else {
        Category::UserInstalled
    }
}

/// 一次扫描得到的完整包列表
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub records: Vec<PackageRecord>,
}

impl Catalog {
    /// 由发行包和标准库模块名构建记录；名称按规范化形式去重，发行包优先
    pub fn build(
        env: &EnvInfo,
        dists: Vec<Distribution>,
        extra_defaults: &[String],
        sort: SortOrder,
    ) -> Self {
        let defaults = default_name_set(&env.stdlib, extra_defaults);
        let mut seen: HashSet<String> = HashSet::new();
        let mut records = Vec::with_capacity(dists.len() + env.stdlib.len());

        for dist in dists {
            if !seen.insert(normalize_name(&dist.name)) {
                continue;
            }
            records.push(PackageRecord {
                category: classify(&dist.name, &defaults),
                name: dist.name,
                version: Some(dist.version).filter(|v| !v.is_empty()),
                summary: dist.summary,
                size: dist.size,
                location: Some(dist.location),
            });
        }

        for module in &env.stdlib {
            if module.starts_with('_') || !seen.insert(normalize_name(module)) {
                continue;
            }
            records.push(PackageRecord {
                name: module.clone(),
                version: None,
                category: Category::Default,
                summary: String::new(),
                size: None,
                location: None,
            });
        }

        let mut catalog = Self { records };
        catalog.sort(sort);
        catalog
    }

    pub fn sort(&mut self, order: SortOrder) {
        if order == SortOrder::Name {
            self.records.sort_by(|a, b| {
                let rank = |c: Category| if c == Category::Default { 0 } else { 1 };
                rank(a.category)
                    .cmp(&rank(b.category))
                    .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            });
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// (Default, UserInstalled) 两组，互不相交且覆盖全部记录
    pub fn partition(&self) -> (Vec<&PackageRecord>, Vec<&PackageRecord>) {
        self.records
            .iter()
            .partition(|r| r.category == Category::Default)
    }

    pub fn count(&self, category: Category) -> usize {
        self.records.iter().filter(|r| r.category == category).count()
    }

    /// 名称包含 query（忽略大小写）的记录下标；空 query 返回全部
    pub fn filter(&self, query: &str, view: CategoryView) -> Vec<usize> {
        let keyword = query.to_lowercase();
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| view.admits(r.category))
            .filter(|(_, r)| keyword.is_empty() || r.name.to_lowercase().contains(&keyword))
            .map(|(i, _)| i)
            .collect()
    }

    /// 按规范化名称查找
    pub fn find(&self, name: &str) -> Option<&PackageRecord> {
        let wanted = normalize_name(name);
        self.records.iter().find(|r| normalize_name(&r.name) == wanted)
    }

    /// 导出 `name==version` 形式的用户安装包清单
    pub fn freeze_lines(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.category == Category::UserInstalled && r.is_removable())
            .map(|r| match &r.version {
                Some(v) => format!("{}=={}", r.name, v),
                None => r.name.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn env(stdlib: &[&str]) -> EnvInfo {
        EnvInfo {
            version: "3.12.1".to_string(),
            executable: PathBuf::from("/usr/bin/python3"),
            site_dirs: vec![],
            stdlib: stdlib.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn dist(name: &str, version: &str) -> Distribution {
        Distribution {
            name: name.to_string(),
            version: version.to_string(),
            summary: String::new(),
            size: None,
            location: PathBuf::from(format!("/site/{name}-{version}.dist-info")),
        }
    }

    fn sample() -> Catalog {
        Catalog::build(
            &env(&["os", "json", "asyncio", "_thread", "typing"]),
            vec![
                dist("Requests", "2.31.0"),
                dist("numpy", "1.26.0"),
                dist("pip", "24.0"),
                dist("typing", "3.7.4"),
            ],
            &["pip".to_string()],
            SortOrder::Name,
        )
    }

    #[test]
    fn partition_covers_every_record_exactly_once() {
        let catalog = sample();
        let (defaults, users) = catalog.partition();
        assert_eq!(defaults.len() + users.len(), catalog.len());

        let default_names: HashSet<&str> = defaults.iter().map(|r| r.name.as_str()).collect();
        let user_names: HashSet<&str> = users.iter().map(|r| r.name.as_str()).collect();
        assert!(default_names.is_disjoint(&user_names));
        assert_eq!(default_names.len() + user_names.len(), catalog.len());
    }

    #[test]
    fn classification_uses_stdlib_and_extra_defaults() {
        let catalog = sample();
        assert_eq!(catalog.find("pip").unwrap().category, Category::Default);
        assert_eq!(catalog.find("requests").unwrap().category, Category::UserInstalled);
        assert_eq!(catalog.find("os").unwrap().category, Category::Default);
    }

    #[test]
    fn names_are_unique_and_distribution_wins() {
        let catalog = sample();
        let typing: Vec<_> = catalog.records.iter().filter(|r| r.name == "typing").collect();
        assert_eq!(typing.len(), 1);
        assert!(typing[0].is_removable());
        assert!(catalog.find("_thread").is_none());
    }

    #[test]
    fn sorted_with_default_section_first() {
        let catalog = sample();
        let names: Vec<&str> = catalog.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["asyncio", "json", "os", "pip", "typing", "numpy", "Requests"]
        );
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let catalog = sample();
        let hits = catalog.filter("REQ", CategoryView::All);
        let names: Vec<&str> = hits.iter().map(|&i| catalog.records[i].name.as_str()).collect();
        assert_eq!(names, vec!["Requests"]);

        for (i, r) in catalog.records.iter().enumerate() {
            let expected = r.name.to_lowercase().contains("s");
            assert_eq!(catalog.filter("s", CategoryView::All).contains(&i), expected);
        }
    }

    #[test]
    fn empty_filter_returns_everything() {
        let catalog = sample();
        assert_eq!(catalog.filter("", CategoryView::All).len(), catalog.len());
    }

    #[test]
    fn whitespace_is_part_of_the_query() {
        let catalog = sample();
        assert!(catalog.filter(" ", CategoryView::All).is_empty());
        assert!(catalog.filter(" req", CategoryView::All).is_empty());
    }

    #[test]
    fn category_view_narrows_results() {
        let catalog = sample();
        let users = catalog.filter("", CategoryView::UserInstalled);
        assert_eq!(users.len(), catalog.count(Category::UserInstalled));
        assert!(users
            .iter()
            .all(|&i| catalog.records[i].category == Category::UserInstalled));
    }

    #[test]
    fn discovery_order_is_kept() {
        let catalog = Catalog::build(
            &env(&["os"]),
            vec![dist("zeta", "1"), dist("alpha", "1")],
            &[],
            SortOrder::Discovery,
        );
        let names: Vec<&str> = catalog.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "os"]);
    }

    #[test]
    fn freeze_lists_only_user_packages() {
        let catalog = sample();
        assert_eq!(
            catalog.freeze_lines(),
            vec!["numpy==1.26.0".to_string(), "Requests==2.31.0".to_string()]
        );
    }
}
