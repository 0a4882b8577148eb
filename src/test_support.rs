//! テスト用のgitリポジトリヘルパー

use chrono::{DateTime, Local, TimeZone};
use git2::{Commit, Repository, RepositoryInitOptions, Signature, Time};
use std::path::Path;

/// ローカルタイムの日時を作成
pub fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .earliest()
        .unwrap()
}

/// `main` ブランチで空のリポジトリを作成
pub fn init_repo(path: &Path) -> Repository {
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    Repository::init_opts(path, &opts).unwrap()
}

/// 指定時刻でHEADにコミット
pub fn commit_at(repo: &Repository, message: &str, when: DateTime<Local>) {
    commit_as(repo, message, "Test User", "test@example.com", when);
}

/// 作者と時刻を指定してHEADにコミット
pub fn commit_as(repo: &Repository, message: &str, name: &str, email: &str, when: DateTime<Local>) {
    let time = Time::new(when.timestamp(), when.offset().local_minus_utc() / 60);
    let signature = Signature::new(name, email, &time).unwrap();

    let tree_id = repo.index().unwrap().write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&Commit<'_>> = parent.iter().collect();

    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .unwrap();
}
