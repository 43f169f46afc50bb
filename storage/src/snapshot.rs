use std::collections::hash_set;
use std::collections::HashSet;
use std::path::{Component, Path};

/// 快照 - 某一时刻根目录下文件相对路径的集合
///
/// 路径统一使用 `/` 作为分隔符。快照创建后不可修改。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    paths: HashSet<String>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn iter(&self) -> hash_set::Iter<'_, String> {
        self.paths.iter()
    }

    pub fn as_set(&self) -> &HashSet<String> {
        &self.paths
    }

    /// 排序后的路径列表，便于输出和比较
    pub fn sorted(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.paths.iter().cloned().collect();
        paths.sort();
        paths
    }
}

impl From<HashSet<String>> for Snapshot {
    fn from(paths: HashSet<String>) -> Self {
        Self { paths }
    }
}

impl FromIterator<String> for Snapshot {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<&'a str> for Snapshot {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(String::from).collect()
    }
}

impl IntoIterator for Snapshot {
    type Item = String;
    type IntoIter = hash_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.into_iter()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a String;
    type IntoIter = hash_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

/// 计算 `path` 相对 `root` 的路径，使用 `/` 连接各段
///
/// `path` 不在 `root` 之下、等于 `root` 或包含非UTF-8段时返回 None。
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
