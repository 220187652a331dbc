//! # 工作区存储
//!
//! 按名字保存工作区的显式容器，在流水线各阶段之间传递。
//!
//! 同名写入会覆盖旧内容并把版本号加一，不保留历史快照；
//! 需要回溯的中间状态由检查点日志（checkpoint）记录它们被保存时的句柄。
//!
//! ## 依赖关系
//! - 被 `reduction/pipeline.rs`、`inelastic/driver.rs` 使用
//! - 使用 `models/workspace.rs`

use crate::error::{Result, TotscatError};
use crate::models::Workspace;

use std::collections::HashMap;

/// 指向某个工作区某个版本的句柄
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceHandle {
    pub name: String,
    pub version: u64,
}

impl std::fmt::Display for WorkspaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@v{}", self.name, self.version)
    }
}

/// 一次检查点保存
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    /// 保存段的标题
    pub title: String,
    /// 写入的文件名
    pub file: String,
    pub handle: WorkspaceHandle,
}

struct Entry {
    workspace: Workspace,
    version: u64,
}

/// 名字 → 工作区
#[derive(Default)]
pub struct WorkspaceStore {
    entries: HashMap<String, Entry>,
    checkpoints: Vec<Checkpoint>,
}

impl WorkspaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以工作区自身的名字存入；同名时覆盖并递增版本
    pub fn insert(&mut self, workspace: Workspace) -> WorkspaceHandle {
        let name = workspace.name.clone();
        let version = self.entries.get(&name).map_or(1, |e| e.version + 1);
        self.entries.insert(name.clone(), Entry { workspace, version });
        WorkspaceHandle { name, version }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&Workspace> {
        self.entries
            .get(name)
            .map(|e| &e.workspace)
            .ok_or_else(|| TotscatError::WorkspaceNotFound(name.to_string()))
    }

    /// 当前句柄
    pub fn handle(&self, name: &str) -> Result<WorkspaceHandle> {
        self.entries
            .get(name)
            .map(|e| WorkspaceHandle {
                name: name.to_string(),
                version: e.version,
            })
            .ok_or_else(|| TotscatError::WorkspaceNotFound(name.to_string()))
    }

    /// 原地修改并递增版本
    pub fn update<F>(&mut self, name: &str, f: F) -> Result<WorkspaceHandle>
    where
        F: FnOnce(&mut Workspace) -> Result<()>,
    {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| TotscatError::WorkspaceNotFound(name.to_string()))?;
        f(&mut entry.workspace)?;
        entry.version += 1;
        Ok(WorkspaceHandle {
            name: name.to_string(),
            version: entry.version,
        })
    }

    /// 克隆为新名字（CloneWorkspace）
    pub fn clone_as(&mut self, source: &str, target: &str) -> Result<WorkspaceHandle> {
        let ws = self.get(source)?.renamed(target);
        Ok(self.insert(ws))
    }

    /// 记录一次检查点
    pub fn record_checkpoint(&mut self, title: &str, file: &str, handle: WorkspaceHandle) {
        self.checkpoints.push(Checkpoint {
            title: title.to_string(),
            file: file.to_string(),
            handle,
        });
    }

    /// 按保存顺序排列的检查点
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// 所有工作区名（排序后）
    #[cfg(test)]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
