//! 設定モジュール

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// プロジェクト未指定時のプロジェクト名
pub const DEFAULT_PROJECT: &str = "default";

/// 追跡対象リポジトリ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedRepository {
    /// 表示名
    pub name: String,
    /// リポジトリのトップレベル（絶対パス）
    pub path: PathBuf,
    /// リポジトリ単位の作者フィルタ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// アプリケーション設定
///
/// すべての項目にデフォルト値があるため、空のファイルも有効な設定になる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 作者フィルタ（未設定なら全作者）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// 除外するコミットメッセージの接頭辞
    pub ignore: Vec<String>,
    /// 1日分サマリーの最大文字数
    pub limit: usize,
    /// 作業のない日のサマリー
    pub dummy: String,
    /// 出力時の日付フォーマット
    pub date_format: String,
    /// CSV出力の作業時間
    pub hours: u32,
    /// 履歴取得のタイムアウト（秒）
    pub timeout_secs: u64,
    /// プロジェクト名ごとの追跡リポジトリ
    pub projects: BTreeMap<String, Vec<TrackedRepository>>,
}

impl Default for Config {
    fn default() -> Self {
        let mut projects = BTreeMap::new();
        projects.insert(DEFAULT_PROJECT.to_string(), Vec::new());

        Self {
            author: None,
            ignore: vec!["index on".to_string(), "WIP on".to_string()],
            limit: 400,
            dummy: "PR Reviews, non coding work".to_string(),
            date_format: "%Y-%m-%d".to_string(),
            hours: 8,
            timeout_secs: 10,
            projects,
        }
    }
}

/// CLI引数
#[derive(Debug, Default)]
pub struct CliArgs {
    pub author: Option<String>,
    pub limit: Option<usize>,
}

impl Config {
    /// プロジェクトの追跡リポジトリ一覧（未登録なら空）
    pub fn repositories(&self, project: &str) -> &[TrackedRepository] {
        self.projects
            .get(project)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// CLI引数をマージ
    ///
    /// 優先順位: CLI引数 > 設定ファイル > デフォルト値
    pub fn merge_cli_args(&mut self, cli_args: &CliArgs) {
        if let Some(ref author) = cli_args.author {
            self.author = Some(author.clone());
        }
        if let Some(limit) = cli_args.limit {
            self.limit = limit;
        }
    }

    /// 設定値をバリデート
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limit == 0 {
            return Err(ConfigError::Invalid(
                "limit must be greater than 0".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.date_format.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "date_format must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// `config init` の結果
#[derive(Debug, PartialEq, Eq)]
pub enum InitOutcome {
    Created,
    AlreadyInitialized,
}

/// 設定ファイルの読み書き
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// 新しいConfigStoreを作成
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// 設定ファイルの既定パス
    pub fn default_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("codelog").join("codelog.toml")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 設定を読み込む
    ///
    /// ファイルがなければデフォルト設定を返す。ファイルは作成しない。
    pub fn load(&self) -> Result<Config, ConfigError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("設定ファイルがないためデフォルト設定を使用: {}", self.path.display());
                return Ok(Config::default());
            }
            Err(source) => return Err(self.storage_error(source)),
        };

        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        config.validate()?;

        Ok(config)
    }

    /// 設定を保存する
    ///
    /// 同じディレクトリの一時ファイルに書き込んでからリネームで置き換える。
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(config)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.storage_error(e))?;

        let mut temp = NamedTempFile::new_in(&dir).map_err(|e| self.storage_error(e))?;
        temp.write_all(content.as_bytes())
            .map_err(|e| self.storage_error(e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| self.storage_error(e))?;
        temp.persist(&self.path)
            .map_err(|e| self.storage_error(e.error))?;

        debug!("設定ファイルを保存しました: {}", self.path.display());
        Ok(())
    }

    /// 設定ファイルを初期化する
    ///
    /// 既存のファイルは変更しない。壊れたファイルは上書きせずエラーにする。
    pub fn init(&self, author: Option<String>) -> Result<InitOutcome, ConfigError> {
        match fs::metadata(&self.path) {
            Ok(_) => {
                self.load()?;
                return Ok(InitOutcome::AlreadyInitialized);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(self.storage_error(source)),
        }

        let config = Config {
            author,
            ..Config::default()
        };
        self.save(&config)?;
        info!("設定ファイルを作成しました: {}", self.path.display());

        Ok(InitOutcome::Created)
    }

    fn storage_error(&self, source: io::Error) -> ConfigError {
        ConfigError::Storage {
            path: self.path.clone(),
            source,
        }
    }
}
