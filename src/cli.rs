//! CLIモジュール

use crate::config::{CliArgs, ConfigStore, InitOutcome, DEFAULT_PROJECT};
use crate::history::GitHistory;
use crate::report::{self, OutputFormat, ReportGenerator, ReportRequest};
use crate::tracker::{RepoTracker, TrackOutcome};
use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// CodeLog - 複数リポジトリの作業ログ
#[derive(Parser, Debug)]
#[command(name = "codelog")]
#[command(about = "複数リポジトリのコミットから作業レポートを作成", long_about = None)]
pub struct Cli {
    /// 設定ファイルのパス
    #[arg(short, long, global = true, env = "CODELOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// 対象プロジェクト
    #[arg(short, long, global = true, default_value = DEFAULT_PROJECT)]
    pub project: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// サブコマンド
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 設定の管理
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// 作業レポートを表示
    Report {
        /// レポート対象日（例: "Sept 19", "yesterday", "2024-09-19"）。省略時は今日
        date: Vec<String>,

        /// 期間の終了日（指定すると期間のレポートになる）
        #[arg(long)]
        to: Option<String>,

        /// 期間指定時に土日も含める
        #[arg(long)]
        weekends: bool,

        /// 出力形式
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// 作者フィルタ（設定ファイルより優先）
        #[arg(long)]
        author: Option<String>,

        /// 1日分サマリーの最大文字数（設定ファイルより優先）
        #[arg(long)]
        limit: Option<usize>,

        /// 出力先ファイル（"-" または省略時は標準出力）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// `config` のサブコマンド
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// 設定ファイルを作成（既存なら何もしない）
    Init,
    /// リポジトリを追跡対象に登録
    Track {
        /// リポジトリのパス（省略時はカレントディレクトリ）
        paths: Vec<PathBuf>,

        /// 表示名（パスを1つだけ指定した場合のみ）
        #[arg(short, long)]
        name: Option<String>,

        /// このリポジトリ用の作者フィルタ
        #[arg(long)]
        author: Option<String>,
    },
    /// リポジトリを追跡対象から外す
    Untrack {
        /// リポジトリのパスまたは表示名
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// 現在の設定を表示
    Show,
}

/// CLIエントリポイント
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let stdout = io::stdout();
    execute(cli, &mut stdout.lock())
}

/// 解析済みのコマンドを実行する
pub fn execute<W: Write>(cli: Cli, out: &mut W) -> Result<()> {
    let store = ConfigStore::new(cli.config.unwrap_or_else(ConfigStore::default_path));
    debug!("設定ファイル: {}", store.path().display());

    match cli.command {
        Commands::Config { command } => match command {
            ConfigCommands::Init => {
                let outcome = store
                    .init(git_user_name())
                    .context("設定ファイルを初期化できませんでした")?;
                match outcome {
                    InitOutcome::Created => {
                        writeln!(out, "設定ファイルを作成しました: {}", store.path().display())?
                    }
                    InitOutcome::AlreadyInitialized => writeln!(
                        out,
                        "設定ファイルは既に存在します: {}",
                        store.path().display()
                    )?,
                }
            }
            ConfigCommands::Track {
                paths,
                name,
                author,
            } => {
                let paths = if paths.is_empty() {
                    vec![PathBuf::from(".")]
                } else {
                    paths
                };
                if name.is_some() && paths.len() > 1 {
                    bail!("--name はパスを1つだけ指定した場合に使用できます");
                }

                let mut config = store.load().context("設定を読み込めませんでした")?;
                let mut tracker = RepoTracker::new(&mut config, &cli.project);
                let mut messages = Vec::new();
                for path in &paths {
                    let outcome = tracker
                        .track(path, name.as_deref(), author.as_deref())
                        .with_context(|| format!("{} を登録できませんでした", path.display()))?;
                    messages.push(match outcome {
                        TrackOutcome::Added(repo) => {
                            format!("追跡を開始しました: {} ({})", repo.name, repo.path.display())
                        }
                        TrackOutcome::AlreadyTracked(repo) => {
                            format!("既に追跡しています: {} ({})", repo.name, repo.path.display())
                        }
                    });
                }

                debug!("{}件のリポジトリを追跡中", tracker.repositories().len());

                // すべてのパスが有効な場合のみ保存する
                store.save(&config).context("設定を保存できませんでした")?;
                for message in messages {
                    writeln!(out, "{}", message)?;
                }
            }
            ConfigCommands::Untrack { paths } => {
                let mut config = store.load().context("設定を読み込めませんでした")?;
                let mut tracker = RepoTracker::new(&mut config, &cli.project);
                let mut messages = Vec::new();
                let mut removed_any = false;
                for path in &paths {
                    if tracker.untrack(path) {
                        removed_any = true;
                        messages.push(format!("追跡を解除しました: {}", path.display()));
                    } else {
                        messages.push(format!("追跡していません: {}", path.display()));
                    }
                }

                if removed_any {
                    store.save(&config).context("設定を保存できませんでした")?;
                }
                for message in messages {
                    writeln!(out, "{}", message)?;
                }
            }
            ConfigCommands::Show => {
                let config = store.load().context("設定を読み込めませんでした")?;
                let content = toml::to_string_pretty(&config)?;
                writeln!(out, "# {}", store.path().display())?;
                write!(out, "{}", content)?;
            }
        },
        Commands::Report {
            date,
            to,
            weekends,
            format,
            author,
            limit,
            output,
        } => {
            let mut config = store.load().context("設定を読み込めませんでした")?;
            config.merge_cli_args(&CliArgs { author, limit });
            config.validate()?;

            let today = Local::now().date_naive();
            let request = ReportRequest::parse(&date.join(" "), to.as_deref(), weekends, today)?;

            let generator = ReportGenerator::new(GitHistory::new(Duration::from_secs(
                config.timeout_secs,
            )));
            let report = generator.generate(&config, &cli.project, &request);
            if report.has_failures() {
                // 取得できなかったリポジトリがあっても終了コードは0
                warn!("一部のリポジトリを取得できませんでした");
            }

            let mut rendered = Vec::new();
            match format {
                OutputFormat::Text => report::render_text(&report, &config, &mut rendered)?,
                OutputFormat::Csv => report::render_csv(&report, &config, &mut rendered)?,
            }

            match output.filter(|path| path.as_os_str() != "-") {
                Some(path) => report::write_file(&path, &rendered)
                    .with_context(|| format!("{} に書き出せませんでした", path.display()))?,
                None => out.write_all(&rendered)?,
            }
        }
    }

    Ok(())
}

/// gitのグローバル設定から user.name を取得
fn git_user_name() -> Option<String> {
    git2::Config::open_default()
        .and_then(|config| config.get_string("user.name"))
        .ok()
}
