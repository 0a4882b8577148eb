//! サマリーモジュール
//!
//! コミットメッセージを1日1行のサマリーに整形する。

use crate::history::ActivityRecord;
use regex::Regex;
use std::sync::OnceLock;

/// マージコミットをまとめるときの表記
const MERGE_LABEL: &str = "PR Reviews";

fn parenthesized() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(.*\)").expect("括弧書きの正規表現"))
}

/// 引用符と括弧書きを除き、空白を詰める
pub fn clean_message(message: &str) -> String {
    let without_quotes = message.replace('"', "");
    let without_parens = parenthesized().replace_all(&without_quotes, "");
    without_parens.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 除外対象の接頭辞で始まるかどうか
pub fn is_ignored(summary: &str, prefixes: &[String]) -> bool {
    prefixes
        .iter()
        .any(|prefix| summary.starts_with(prefix.as_str()))
}

/// リポジトリ1件分のサマリー（作業がなければNone）
///
/// マージコミットは取り除き、先頭に「PR Reviews」を付ける。
pub fn summarize_entry(name: &str, records: &[ActivityRecord]) -> Option<String> {
    let mut items: Vec<String> = records
        .iter()
        .filter(|record| !record.is_merge())
        .map(|record| clean_message(&record.summary))
        .filter(|line| !line.is_empty())
        .collect();
    if records.iter().any(ActivityRecord::is_merge) {
        items.insert(0, MERGE_LABEL.to_string());
    }
    if items.is_empty() {
        return None;
    }

    Some(format!("[{}]: {}", name, items.join(", ")))
}

/// 合計が `cap` 文字に収まるよう長い項目を切り詰める
///
/// 各項目は均等な取り分に加え、短い項目が使わなかった分を受け取る。
pub fn balance(items: Vec<String>, cap: usize) -> Vec<String> {
    let lengths: Vec<usize> = items.iter().map(|item| item.chars().count()).collect();
    let total: usize = lengths.iter().sum();
    if items.is_empty() || total < cap {
        return items;
    }

    let count = items.len();
    let even = (cap / count).saturating_sub(count);
    let long = lengths.iter().filter(|&&len| len > even).count();
    let spare: usize = lengths
        .iter()
        .filter(|&&len| len < even)
        .map(|len| even - len)
        .sum();
    let share = if long == 0 { 0 } else { spare / long };

    items
        .into_iter()
        .zip(lengths)
        .map(|(item, len)| {
            if len > even + share {
                truncate(&item, even + share)
            } else {
                item
            }
        })
        .collect()
}

fn truncate(item: &str, width: usize) -> String {
    let keep = width.saturating_sub(3);
    let mut truncated: String = item.chars().take(keep).collect();
    truncated.push_str("...");
    truncated
}

/// 1日分のサマリー
pub fn day_summary(entries: Vec<String>, limit: usize, dummy: &str) -> String {
    if entries.is_empty() {
        return dummy.to_string();
    }
    balance(entries, limit).join(" ")
}
