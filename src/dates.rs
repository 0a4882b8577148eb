//! 日付解析モジュール
//!
//! 自由形式の日付テキストを「今日」を基準に1つの暦日へ解決する。
//! 年の省略された日付は、今日以前で最も近い日付になる。

use crate::error::DateError;
use chrono::{DateTime, Datelike, Days, Duration, Local, NaiveDate, TimeZone, Utc, Weekday};

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

/// 日付テキストを暦日に解決する
pub fn resolve_date(text: &str, today: NaiveDate) -> Result<NaiveDate, DateError> {
    let lowered = text.to_lowercase().replace([',', '.'], " ");
    let tokens: Vec<&str> = lowered.split_whitespace().collect();

    let resolved = resolve_tokens(&tokens, text.trim(), today)?;
    if resolved > today {
        return Err(DateError::Future(resolved));
    }
    Ok(resolved)
}

fn resolve_tokens(tokens: &[&str], text: &str, today: NaiveDate) -> Result<NaiveDate, DateError> {
    match tokens {
        [] | ["today"] | ["now"] => return Ok(today),
        ["yesterday"] => return Ok(today - Duration::days(1)),
        [count, unit, "ago"] => {
            return relative(count, unit, today)
                .ok_or_else(|| DateError::Unparseable(text.to_string()));
        }
        [single] => {
            if let Some(date) = parse_iso(single) {
                return Ok(date);
            }
            if let Some(weekday) = parse_weekday(single) {
                return Ok(most_recent_weekday(weekday, today, true));
            }
        }
        ["last", single] => {
            if let Some(weekday) = parse_weekday(single) {
                return Ok(most_recent_weekday(weekday, today, false));
            }
        }
        _ => {}
    }

    match month_day(tokens) {
        Some((month, day, None)) => most_recent_month_day(month, day, today, text),
        Some((month, day, Some(year))) => NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| DateError::InvalidDate(text.to_string())),
        None => fallback(text, today),
    }
}

/// 暦日をローカルタイムの `[開始, 翌日の開始)` に変換する
pub fn day_bounds(date: NaiveDate) -> (DateTime<Local>, DateTime<Local>) {
    let start = start_of_day(date);
    let end = date
        .succ_opt()
        .map(start_of_day)
        .unwrap_or_else(|| start + Duration::days(1));
    (start, end)
}

fn start_of_day(date: NaiveDate) -> DateTime<Local> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    // 夏時間で0時が存在しない日はUTCとして扱う
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&midnight))
}

fn parse_iso(token: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(token, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(token, "%Y/%m/%d"))
        .ok()
}

fn relative(count: &str, unit: &str, today: NaiveDate) -> Option<NaiveDate> {
    let count: u64 = count.parse().ok()?;
    let days = match unit {
        "day" | "days" => count,
        "week" | "weeks" => count.checked_mul(7)?,
        _ => return None,
    };
    today.checked_sub_days(Days::new(days))
}

fn parse_month(token: &str) -> Option<u32> {
    if token.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|name| name.starts_with(token))
        .map(|index| index as u32 + 1)
}

fn parse_day(token: &str) -> Option<u32> {
    let digits = token
        .strip_suffix("st")
        .or_else(|| token.strip_suffix("nd"))
        .or_else(|| token.strip_suffix("rd"))
        .or_else(|| token.strip_suffix("th"))
        .unwrap_or(token);
    if digits.is_empty() || digits.len() > 2 {
        return None;
    }
    digits.parse().ok().filter(|day| (1..=31).contains(day))
}

fn parse_year(token: &str) -> Option<i32> {
    if token.len() != 4 {
        return None;
    }
    token.parse().ok()
}

fn parse_weekday(token: &str) -> Option<Weekday> {
    WEEKDAYS
        .iter()
        .find(|(name, _)| token.len() >= 3 && name.starts_with(token))
        .map(|(_, weekday)| *weekday)
}

/// `Sept 19`, `19 Sept`, `September 19 2023` などを (月, 日, 年) に分解する
fn month_day(tokens: &[&str]) -> Option<(u32, u32, Option<i32>)> {
    let (first, second, year) = match tokens {
        [a, b] => (*a, *b, None),
        [a, b, y] => (*a, *b, Some(parse_year(y)?)),
        _ => return None,
    };

    if let (Some(month), Some(day)) = (parse_month(first), parse_day(second)) {
        return Some((month, day, year));
    }
    if let (Some(day), Some(month)) = (parse_day(first), parse_month(second)) {
        return Some((month, day, year));
    }
    None
}

/// 年の省略された月日を今日以前で最も近い日付に解決する
fn most_recent_month_day(
    month: u32,
    day: u32,
    today: NaiveDate,
    text: &str,
) -> Result<NaiveDate, DateError> {
    // 2月29日は直近のうるう年まで遡る
    for year in (today.year() - 8..=today.year()).rev() {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            if date <= today {
                return Ok(date);
            }
        }
    }
    Err(DateError::InvalidDate(text.to_string()))
}

fn most_recent_weekday(weekday: Weekday, today: NaiveDate, include_today: bool) -> NaiveDate {
    let mut back = (7 + today.weekday().num_days_from_monday()
        - weekday.num_days_from_monday())
        % 7;
    if back == 0 && !include_today {
        back = 7;
    }
    today - Duration::days(i64::from(back))
}

/// それ以外の表現はchrono-englishに任せる
fn fallback(text: &str, today: NaiveDate) -> Result<NaiveDate, DateError> {
    let noon = today
        .and_hms_opt(12, 0, 0)
        .ok_or_else(|| DateError::Unparseable(text.to_string()))?;
    let now = Utc.from_utc_datetime(&noon);

    chrono_english::parse_date_string(text, now, chrono_english::Dialect::Us)
        .map(|parsed| parsed.date_naive())
        .map_err(|_| DateError::Unparseable(text.to_string()))
}
