//! リポジトリ登録モジュール

use crate::config::{Config, TrackedRepository};
use crate::error::TrackError;
use git2::Repository;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// `track` の結果
#[derive(Debug, PartialEq, Eq)]
pub enum TrackOutcome {
    Added(TrackedRepository),
    AlreadyTracked(TrackedRepository),
}

/// プロジェクト単位のリポジトリ登録
///
/// 変更はメモリ上のConfigにのみ反映される。保存は呼び出し側の責務。
pub struct RepoTracker<'a> {
    config: &'a mut Config,
    project: String,
}

impl<'a> RepoTracker<'a> {
    /// 新しいRepoTrackerを作成
    pub fn new(config: &'a mut Config, project: &str) -> Self {
        Self {
            config,
            project: project.to_string(),
        }
    }

    /// リポジトリを登録する（登録済みなら何もしない）
    pub fn track(
        &mut self,
        path: &Path,
        name: Option<&str>,
        author: Option<&str>,
    ) -> Result<TrackOutcome, TrackError> {
        let root = resolve_repository(path)?;

        let repos = self.config.projects.entry(self.project.clone()).or_default();
        if let Some(existing) = repos.iter().find(|repo| repo.path == root) {
            debug!("登録済みのリポジトリ: {}", root.display());
            return Ok(TrackOutcome::AlreadyTracked(existing.clone()));
        }

        let name = match name {
            Some(name) => name.to_string(),
            None => default_name(&root),
        };
        let repo = TrackedRepository {
            name,
            path: root,
            author: author.map(str::to_string),
        };
        repos.push(repo.clone());
        info!("リポジトリを登録しました: {} ({})", repo.name, repo.path.display());

        Ok(TrackOutcome::Added(repo))
    }

    /// リポジトリの登録を解除する（未登録なら何もしない）
    ///
    /// パスが存在すればリポジトリのルートで、存在しなければ
    /// 指定されたパスそのものか表示名で照合する。
    pub fn untrack(&mut self, path: &Path) -> bool {
        let resolved = resolve_repository(path).ok();
        let literal = path.to_path_buf();
        let label = path.to_string_lossy();

        let Some(repos) = self.config.projects.get_mut(&self.project) else {
            return false;
        };
        let before = repos.len();
        repos.retain(|repo| {
            let matches = resolved.as_ref() == Some(&repo.path)
                || repo.path == literal
                || repo.name == label;
            !matches
        });

        let removed = repos.len() < before;
        if removed {
            info!("リポジトリの登録を解除しました: {}", path.display());
        }
        removed
    }

    /// 登録済みリポジトリ一覧
    pub fn repositories(&self) -> &[TrackedRepository] {
        self.config.repositories(&self.project)
    }
}

/// パスを含むリポジトリのトップレベルを返す
///
/// 作業ツリーのないbareリポジトリはgitディレクトリを返す。
pub fn resolve_repository(path: &Path) -> Result<PathBuf, TrackError> {
    let absolute = fs::canonicalize(path).map_err(|source| TrackError::PathNotFound {
        path: path.to_path_buf(),
        source,
    })?;

    let repo =
        Repository::discover(&absolute).map_err(|source| TrackError::NotARepository {
            path: absolute.clone(),
            source,
        })?;

    let top = repo.workdir().unwrap_or_else(|| repo.path());
    let root = fs::canonicalize(top).unwrap_or_else(|_| top.to_path_buf());

    if repo.head().and_then(|head| head.peel_to_commit()).is_err() {
        return Err(TrackError::NoHistory(root));
    }

    Ok(root)
}

fn default_name(root: &Path) -> String {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}
