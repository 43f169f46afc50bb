//! 差异计算 - 纯集合减法

use std::collections::HashSet;

use storage::Snapshot;

/// 返回 `source` 中存在而 `other` 中不存在的路径
pub fn diff(source: &Snapshot, other: &Snapshot) -> HashSet<String> {
    diff_excluding(source, &[other.as_set()])
}

/// 从 `source` 中依次减去多个路径集合
pub fn diff_excluding(source: &Snapshot, others: &[&HashSet<String>]) -> HashSet<String> {
    source
        .iter()
        .filter(|path| !others.iter().any(|other| other.contains(*path)))
        .cloned()
        .collect()
}
