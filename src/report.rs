//! レポートモジュール

use crate::config::Config;
use crate::dates;
use crate::error::ReportError;
use crate::history::{ActivityRecord, HistoryProvider};
use crate::summary;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// レポート対象の期間（両端を含む）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub include_weekends: bool,
}

impl ReportRequest {
    /// 1日分のリクエスト
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
            include_weekends: true,
        }
    }

    /// 期間のリクエスト
    pub fn range(
        start: NaiveDate,
        end: NaiveDate,
        include_weekends: bool,
    ) -> Result<Self, ReportError> {
        if end < start {
            return Err(ReportError::InvalidRange { start, end });
        }
        Ok(Self {
            start,
            end,
            include_weekends,
        })
    }

    /// 日付テキストからリクエストを作成する
    ///
    /// `from` が空なら今日、`to` がなければ1日分になる。
    pub fn parse(
        from: &str,
        to: Option<&str>,
        include_weekends: bool,
        today: NaiveDate,
    ) -> Result<Self, ReportError> {
        let start = dates::resolve_date(from, today)?;
        match to {
            Some(to) => {
                let end = dates::resolve_date(to, today)?;
                Self::range(start, end, include_weekends)
            }
            None => Ok(Self::single(start)),
        }
    }

    /// 対象日の一覧（期間指定では土日を除く）
    pub fn dates(&self) -> Vec<NaiveDate> {
        let single = self.start == self.end;
        let mut dates = Vec::new();
        let mut current = self.start;
        while current <= self.end {
            let weekend = matches!(current.weekday(), Weekday::Sat | Weekday::Sun);
            if single || self.include_weekends || !weekend {
                dates.push(current);
            }
            current += Duration::days(1);
        }
        dates
    }
}

/// リポジトリ単位の取得結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Ok(Vec<ActivityRecord>),
    /// 取得できなかったリポジトリ（レポート全体は継続する）
    Unavailable(String),
}

/// リポジトリ1件分のレポート
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub name: String,
    pub path: PathBuf,
    pub status: EntryStatus,
}

/// 1日分のレポート
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub entries: Vec<ReportEntry>,
}

/// レポート全体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub days: Vec<DailyReport>,
}

impl Report {
    /// 取得できなかったリポジトリがあるかどうか
    pub fn has_failures(&self) -> bool {
        self.days
            .iter()
            .flat_map(|day| &day.entries)
            .any(|entry| matches!(entry.status, EntryStatus::Unavailable(_)))
    }
}

/// 出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Csv,
}

/// レポート生成
pub struct ReportGenerator<H: HistoryProvider> {
    history: H,
}

impl<H: HistoryProvider> ReportGenerator<H> {
    /// 新しいReportGeneratorを作成
    pub fn new(history: H) -> Self {
        Self { history }
    }

    /// プロジェクトの全リポジトリについてレポートを生成する
    ///
    /// エントリの順序は登録順。1件の失敗は `Unavailable` として記録し、
    /// 残りのリポジトリの処理を続ける。
    pub fn generate(&self, config: &Config, project: &str, request: &ReportRequest) -> Report {
        let repos = config.repositories(project);
        let days = request
            .dates()
            .into_iter()
            .map(|date| {
                let (start, end) = dates::day_bounds(date);
                let entries = repos
                    .iter()
                    .map(|repo| {
                        let author = repo.author.as_deref().or(config.author.as_deref());
                        let result = self.history.activity(&repo.path, author, start, end);
                        let status = match result {
                            Ok(mut records) => {
                                records
                                    .retain(|r| !summary::is_ignored(&r.summary, &config.ignore));
                                records.sort_by(|a, b| a.time.cmp(&b.time));
                                debug!("{} {}: {}件", date, repo.name, records.len());
                                EntryStatus::Ok(records)
                            }
                            Err(e) => {
                                warn!("{} の履歴を取得できませんでした: {}", repo.name, e);
                                EntryStatus::Unavailable(e.to_string())
                            }
                        };
                        ReportEntry {
                            name: repo.name.clone(),
                            path: repo.path.clone(),
                            status,
                        }
                    })
                    .collect();
                DailyReport { date, entries }
            })
            .collect();

        Report { days }
    }
}

/// 日付を設定のフォーマットで表示する（不正なフォーマットはISO形式）
fn format_date(date: NaiveDate, format: &str) -> String {
    let mut formatted = String::new();
    if write!(formatted, "{}", date.format(format)).is_err() {
        return date.to_string();
    }
    formatted
}

/// テキスト形式で出力
pub fn render_text<W: Write>(
    report: &Report,
    config: &Config,
    out: &mut W,
) -> Result<(), ReportError> {
    for (index, day) in report.days.iter().enumerate() {
        if index > 0 {
            writeln!(out)?;
        }
        writeln!(
            out,
            "=== {} の作業レポート ===",
            format_date(day.date, &config.date_format)
        )?;

        if day.entries.is_empty() {
            writeln!(out, "追跡中のリポジトリはありません")?;
            continue;
        }

        for entry in &day.entries {
            match &entry.status {
                EntryStatus::Ok(records) if records.is_empty() => {
                    writeln!(out, "[{}] コミットはありません", entry.name)?;
                }
                EntryStatus::Ok(records) => {
                    writeln!(out, "[{}] {}件", entry.name, records.len())?;
                    for record in records {
                        writeln!(
                            out,
                            "  {} {} {} ({})",
                            record.time.format("%H:%M"),
                            record.id,
                            record.summary,
                            record.author
                        )?;
                    }
                }
                EntryStatus::Unavailable(reason) => {
                    writeln!(
                        out,
                        "[{}] 取得できませんでした ({}): {}",
                        entry.name,
                        entry.path.display(),
                        reason
                    )?;
                }
            }
        }
    }
    Ok(())
}

/// CSV形式（date,text,hours）で出力
pub fn render_csv<W: Write>(
    report: &Report,
    config: &Config,
    out: &mut W,
) -> Result<(), ReportError> {
    writeln!(out, "date,text,hours")?;
    for day in &report.days {
        let entries: Vec<String> = day
            .entries
            .iter()
            .filter_map(|entry| match &entry.status {
                EntryStatus::Ok(records) => summary::summarize_entry(&entry.name, records),
                EntryStatus::Unavailable(_) => None,
            })
            .collect();
        let text = summary::day_summary(entries, config.limit, &config.dummy);

        writeln!(
            out,
            "{},{},{}",
            csv_field(&format_date(day.date, &config.date_format)),
            csv_field(&text),
            config.hours
        )?;
    }
    Ok(())
}

/// 出力済みのレポートをファイルに書き出す（既存のファイルは置き換える）
pub fn write_file(path: &Path, content: &[u8]) -> Result<(), ReportError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut temp = NamedTempFile::new_in(&dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    debug!("レポートを書き出しました: {}", path.display());
    Ok(())
}

/// 区切り文字や引用符を含むフィールドを引用符で囲む
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TrackedRepository, DEFAULT_PROJECT};
    use crate::error::HistoryError;
    use crate::history::GitHistory;
    use crate::test_support::{commit_at, init_repo, local};
    use chrono::{DateTime, Local};
    use std::collections::HashMap;
    use std::path::Path;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(summary: &str, time: DateTime<Local>) -> ActivityRecord {
        ActivityRecord {
            id: "abc1234".to_string(),
            time,
            author: "Jane".to_string(),
            summary: summary.to_string(),
        }
    }

    /// パスごとに固定の結果を返す履歴
    struct FakeHistory {
        records: HashMap<PathBuf, Vec<ActivityRecord>>,
    }

    impl HistoryProvider for FakeHistory {
        fn activity(
            &self,
            repo: &Path,
            _author: Option<&str>,
            start: DateTime<Local>,
            end: DateTime<Local>,
        ) -> Result<Vec<ActivityRecord>, HistoryError> {
            match self.records.get(repo) {
                Some(records) => Ok(records
                    .iter()
                    .filter(|r| r.time >= start && r.time < end)
                    .cloned()
                    .collect()),
                None => Err(HistoryError::WorkerLost),
            }
        }
    }

    /// 指定したパスだけタイムアウトする履歴
    struct StalledHistory {
        stalled: PathBuf,
        inner: FakeHistory,
    }

    impl HistoryProvider for StalledHistory {
        fn activity(
            &self,
            repo: &Path,
            author: Option<&str>,
            start: DateTime<Local>,
            end: DateTime<Local>,
        ) -> Result<Vec<ActivityRecord>, HistoryError> {
            if repo == self.stalled {
                return Err(HistoryError::Timeout(10));
            }
            self.inner.activity(repo, author, start, end)
        }
    }

    fn config_with(repos: &[&str]) -> Config {
        let mut config = Config::default();
        config.projects.insert(
            DEFAULT_PROJECT.to_string(),
            repos
                .iter()
                .map(|name| TrackedRepository {
                    name: name.to_string(),
                    path: PathBuf::from(format!("/src/{}", name)),
                    author: None,
                })
                .collect(),
        );
        config
    }

    fn statuses(report: &Report) -> Vec<(String, Option<Vec<String>>)> {
        report.days[0]
            .entries
            .iter()
            .map(|entry| {
                let summaries = match &entry.status {
                    EntryStatus::Ok(records) => {
                        Some(records.iter().map(|r| r.summary.clone()).collect())
                    }
                    EntryStatus::Unavailable(_) => None,
                };
                (entry.name.clone(), summaries)
            })
            .collect()
    }

    #[test]
    fn test_request_dates_single_weekend_day() {
        // 2024-03-16は土曜日
        let request = ReportRequest::single(date(2024, 3, 16));
        assert_eq!(request.dates(), vec![date(2024, 3, 16)]);
    }

    #[test]
    fn test_request_dates_range_skips_weekends() {
        let request = ReportRequest::range(date(2024, 3, 14), date(2024, 3, 18), false).unwrap();
        assert_eq!(
            request.dates(),
            vec![date(2024, 3, 14), date(2024, 3, 15), date(2024, 3, 18)]
        );

        let request = ReportRequest::range(date(2024, 3, 14), date(2024, 3, 18), true).unwrap();
        assert_eq!(request.dates().len(), 5);
    }

    #[test]
    fn test_request_invalid_range() {
        let result = ReportRequest::range(date(2024, 3, 18), date(2024, 3, 14), false);
        assert!(matches!(result, Err(ReportError::InvalidRange { .. })));
    }

    #[test]
    fn test_request_parse() {
        let today = date(2024, 10, 1);
        assert_eq!(
            ReportRequest::parse("", None, false, today).unwrap(),
            ReportRequest::single(today)
        );
        assert_eq!(
            ReportRequest::parse("Sept 19", None, false, today).unwrap(),
            ReportRequest::single(date(2024, 9, 19))
        );
        assert!(matches!(
            ReportRequest::parse("flibbertigibbet", None, false, today),
            Err(ReportError::Date(_))
        ));
    }

    #[test]
    fn test_generate_keeps_tracked_order_and_sorts_records() {
        let config = config_with(&["web", "api"]);
        let mut records = HashMap::new();
        records.insert(
            PathBuf::from("/src/web"),
            vec![
                record("later", local(2024, 3, 14, 15, 0)),
                record("earlier", local(2024, 3, 14, 9, 0)),
            ],
        );
        records.insert(PathBuf::from("/src/api"), Vec::new());
        let generator = ReportGenerator::new(FakeHistory { records });
        let request = ReportRequest::single(date(2024, 3, 14));

        let report = generator.generate(&config, DEFAULT_PROJECT, &request);

        assert_eq!(
            statuses(&report),
            vec![
                ("web".to_string(), Some(vec!["earlier".to_string(), "later".to_string()])),
                ("api".to_string(), Some(Vec::new())),
            ]
        );
        assert!(!report.has_failures());
    }

    #[test]
    fn test_generate_isolates_failures() {
        let config = config_with(&["gone", "api"]);
        let mut records = HashMap::new();
        records.insert(
            PathBuf::from("/src/api"),
            vec![record("work", local(2024, 3, 14, 10, 0))],
        );
        let generator = ReportGenerator::new(FakeHistory { records });
        let request = ReportRequest::single(date(2024, 3, 14));

        let report = generator.generate(&config, DEFAULT_PROJECT, &request);

        assert_eq!(
            statuses(&report),
            vec![
                ("gone".to_string(), None),
                ("api".to_string(), Some(vec!["work".to_string()])),
            ]
        );
        assert!(report.has_failures());
    }

    #[test]
    fn test_generate_records_timeout_and_continues() {
        let config = config_with(&["web", "slow", "api"]);
        let mut records = HashMap::new();
        records.insert(
            PathBuf::from("/src/web"),
            vec![record("Add page", local(2024, 3, 14, 9, 0))],
        );
        records.insert(
            PathBuf::from("/src/api"),
            vec![record("Add endpoint", local(2024, 3, 14, 11, 0))],
        );
        let generator = ReportGenerator::new(StalledHistory {
            stalled: PathBuf::from("/src/slow"),
            inner: FakeHistory { records },
        });
        let request = ReportRequest::range(date(2024, 3, 14), date(2024, 3, 15), false).unwrap();

        let report = generator.generate(&config, DEFAULT_PROJECT, &request);

        assert_eq!(report.days.len(), 2);
        assert_eq!(
            statuses(&report),
            vec![
                ("web".to_string(), Some(vec!["Add page".to_string()])),
                ("slow".to_string(), None),
                ("api".to_string(), Some(vec!["Add endpoint".to_string()])),
            ]
        );
        let EntryStatus::Unavailable(reason) = &report.days[1].entries[1].status else {
            panic!("Expected Unavailable");
        };
        assert!(reason.contains("タイムアウト"));
        assert!(report.has_failures());
    }

    #[test]
    fn test_generate_drops_ignored_messages() {
        let config = config_with(&["api"]);
        let mut records = HashMap::new();
        records.insert(
            PathBuf::from("/src/api"),
            vec![
                record("WIP on main: 123 stash", local(2024, 3, 14, 9, 0)),
                record("Real work", local(2024, 3, 14, 10, 0)),
            ],
        );
        let generator = ReportGenerator::new(FakeHistory { records });
        let request = ReportRequest::single(date(2024, 3, 14));

        let report = generator.generate(&config, DEFAULT_PROJECT, &request);
        assert_eq!(
            statuses(&report),
            vec![("api".to_string(), Some(vec!["Real work".to_string()]))]
        );
    }

    #[test]
    fn test_generate_with_real_repositories() {
        let temp_dir = TempDir::new().unwrap();
        let tracked_path = temp_dir.path().join("tracked");
        let tracked = init_repo(&tracked_path);
        commit_at(&tracked, "Add report", local(2024, 3, 14, 11, 0));
        commit_at(&tracked, "Next day", local(2024, 3, 15, 11, 0));

        // 登録していないリポジトリはレポートに現れない
        let untracked = init_repo(&temp_dir.path().join("untracked"));
        commit_at(&untracked, "Hidden", local(2024, 3, 14, 11, 0));

        let mut config = Config::default();
        config.projects.insert(
            DEFAULT_PROJECT.to_string(),
            vec![
                TrackedRepository {
                    name: "tracked".to_string(),
                    path: tracked_path,
                    author: None,
                },
                TrackedRepository {
                    name: "deleted".to_string(),
                    path: temp_dir.path().join("deleted"),
                    author: None,
                },
            ],
        );

        let generator = ReportGenerator::new(GitHistory::new(std::time::Duration::from_secs(10)));
        let request = ReportRequest::single(date(2024, 3, 14));
        let report = generator.generate(&config, DEFAULT_PROJECT, &request);

        assert_eq!(
            statuses(&report),
            vec![
                ("tracked".to_string(), Some(vec!["Add report".to_string()])),
                ("deleted".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_render_text() {
        let config = config_with(&["web", "api", "gone"]);
        let report = Report {
            days: vec![DailyReport {
                date: date(2024, 3, 14),
                entries: vec![
                    ReportEntry {
                        name: "web".to_string(),
                        path: PathBuf::from("/src/web"),
                        status: EntryStatus::Ok(vec![record("Add page", local(2024, 3, 14, 9, 5))]),
                    },
                    ReportEntry {
                        name: "api".to_string(),
                        path: PathBuf::from("/src/api"),
                        status: EntryStatus::Ok(Vec::new()),
                    },
                    ReportEntry {
                        name: "gone".to_string(),
                        path: PathBuf::from("/src/gone"),
                        status: EntryStatus::Unavailable("missing".to_string()),
                    },
                ],
            }],
        };

        let mut out = Vec::new();
        render_text(&report, &config, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "=== 2024-03-14 の作業レポート ===\n\
             [web] 1件\n  09:05 abc1234 Add page (Jane)\n\
             [api] コミットはありません\n\
             [gone] 取得できませんでした (/src/gone): missing\n"
        );
    }

    #[test]
    fn test_render_csv() {
        let mut config = config_with(&["web"]);
        config.date_format = "%d/%m/%Y".to_string();
        let report = Report {
            days: vec![
                DailyReport {
                    date: date(2024, 3, 14),
                    entries: vec![ReportEntry {
                        name: "web".to_string(),
                        path: PathBuf::from("/src/web"),
                        status: EntryStatus::Ok(vec![
                            record("Add page", local(2024, 3, 14, 9, 0)),
                            record("Fix \"nav\"", local(2024, 3, 14, 10, 0)),
                        ]),
                    }],
                },
                DailyReport {
                    date: date(2024, 3, 15),
                    entries: vec![ReportEntry {
                        name: "web".to_string(),
                        path: PathBuf::from("/src/web"),
                        status: EntryStatus::Ok(Vec::new()),
                    }],
                },
            ],
        };

        let mut out = Vec::new();
        render_csv(&report, &config, &mut out).unwrap();
        let csv = String::from_utf8(out).unwrap();

        assert_eq!(
            csv,
            "date,text,hours\n\
             14/03/2024,\"[web]: Add page, Fix nav\",8\n\
             15/03/2024,\"PR Reviews, non coding work\",8\n"
        );
    }

    #[test]
    fn test_write_file_replaces_existing_report() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out").join("report.csv");

        write_file(&path, b"first\n").unwrap();
        write_file(&path, b"date,text,hours\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "date,text,hours\n");
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_format_date_falls_back_on_invalid_format() {
        assert_eq!(format_date(date(2024, 3, 14), "%Q"), "2024-03-14");
    }
}
