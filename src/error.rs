//! エラー型定義モジュール

use chrono::NaiveDate;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 設定エラー
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ファイルを読み書きできません ({path}): {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("設定ファイルの解析に失敗しました ({path}): {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("設定のシリアライズに失敗しました: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("無効な設定値: {0}")]
    Invalid(String),
}

/// リポジトリ登録エラー
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("パスが存在しないか読み取れません: {path}")]
    PathNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("gitリポジトリではありません: {path}")]
    NotARepository {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("リポジトリにコミット履歴がありません: {0}")]
    NoHistory(PathBuf),
}

/// 日付解析エラー
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DateError {
    #[error("日付を解析できません: {0}")]
    Unparseable(String),

    #[error("存在しない日付です: {0}")]
    InvalidDate(String),

    #[error("未来の日付は指定できません: {0}")]
    Future(NaiveDate),
}

/// 履歴取得エラー
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("リポジトリを開けません ({path}): {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("履歴の取得に失敗しました: {0}")]
    Query(#[from] git2::Error),

    #[error("履歴の取得がタイムアウトしました（{0}秒）")]
    Timeout(u64),

    #[error("履歴取得スレッドが応答なしで終了しました")]
    WorkerLost,
}

/// レポートエラー
#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Date(#[from] DateError),

    #[error("日付範囲が不正です: {start} から {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("出力に失敗しました: {0}")]
    Output(#[from] io::Error),
}
