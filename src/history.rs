//! Git履歴モジュール

use crate::error::HistoryError;
use chrono::{DateTime, Local, TimeZone};
use git2::{Repository, Sort};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// 作業記録（1コミット）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub id: String,
    pub time: DateTime<Local>,
    pub author: String,
    pub summary: String,
}

impl ActivityRecord {
    /// マージコミットかどうか
    pub fn is_merge(&self) -> bool {
        self.summary.starts_with("Merge")
    }
}

/// リポジトリ履歴の取得元
pub trait HistoryProvider {
    /// `[start, end)` の作業記録を時刻の昇順で返す
    fn activity(
        &self,
        repo: &Path,
        author: Option<&str>,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> Result<Vec<ActivityRecord>, HistoryError>;
}

/// git2による履歴取得
pub struct GitHistory {
    timeout: Duration,
}

impl GitHistory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl HistoryProvider for GitHistory {
    /// 別スレッドで履歴を取得し、タイムアウトで打ち切る
    fn activity(
        &self,
        repo: &Path,
        author: Option<&str>,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> Result<Vec<ActivityRecord>, HistoryError> {
        let repo = repo.to_path_buf();
        let author = author.map(str::to_string);

        run_with_timeout(self.timeout, move || {
            collect_commits(&repo, author.as_deref(), start, end)
        })
    }
}

/// 処理を別スレッドで実行し、`timeout` を過ぎたら打ち切る
fn run_with_timeout<T, F>(timeout: Duration, job: F) -> Result<T, HistoryError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, HistoryError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        // 受信側がタイムアウト済みなら送信は失敗するが問題ない
        let _ = tx.send(job());
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(HistoryError::Timeout(timeout.as_secs())),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(HistoryError::WorkerLost),
    }
}

/// 全リファレンスとHEADから到達できるコミットを走査する
fn collect_commits(
    path: &Path,
    author: Option<&str>,
    start: DateTime<Local>,
    end: DateTime<Local>,
) -> Result<Vec<ActivityRecord>, HistoryError> {
    let repo = Repository::open(path).map_err(|source| HistoryError::Open {
        path: PathBuf::from(path),
        source,
    })?;

    let mut walk = repo.revwalk()?;
    walk.set_sorting(Sort::TIME)?;
    walk.push_glob("*")?;
    if repo.head().is_ok() {
        walk.push_head()?;
    }

    let needle = author.map(str::to_lowercase);
    let mut records = Vec::new();

    for oid in walk {
        let commit = repo.find_commit(oid?)?;
        let signature = commit.author();

        let Some(time) = Local.timestamp_opt(signature.when().seconds(), 0).single() else {
            continue;
        };
        if time < start || time >= end {
            continue;
        }

        let name = signature.name().unwrap_or_default().to_string();
        if let Some(ref needle) = needle {
            let identity = format!("{} <{}>", name, signature.email().unwrap_or_default());
            if !identity.to_lowercase().contains(needle.as_str()) {
                continue;
            }
        }

        let id = commit.id().to_string();
        records.push(ActivityRecord {
            id: id.chars().take(7).collect(),
            time,
            author: name,
            summary: commit.summary().unwrap_or_default().trim().to_string(),
        });
    }

    records.sort_by(|a, b| a.time.cmp(&b.time));
    debug!("{}: {}件のコミット", path.display(), records.len());

    Ok(records)
}
