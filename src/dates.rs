// src/dates.rs
//! 日期都以 `YYYY-MM-DD` 字符串存储, 字典序与时间顺序一致, 因此区间查询直接比较字符串。

use chrono::{NaiveDate, NaiveTime};

use crate::AppError;

pub fn parse_date(raw: &str) -> Result<String, AppError> {
    let raw = raw.trim();
    // chrono 对数字宽度很宽松 ("2024-5-1" 也能解析), 这里先卡住格式
    let well_formed = raw.len() == 10 && raw.as_bytes()[4] == b'-' && raw.as_bytes()[7] == b'-';
    if !well_formed {
        return Err(invalid_date(raw));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| invalid_date(raw))
}

/// 查询参数里的空字符串视为未提供
pub fn parse_optional_date(raw: Option<&str>) -> Result<Option<String>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_date(value).map(Some),
    }
}

/// 提醒时间: 空值存 NULL, 否则必须是 `HH:MM`
pub fn parse_time(raw: Option<&str>) -> Result<Option<String>, AppError> {
    let value = match raw.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(value) => value,
    };
    let well_formed = value.len() == 5 && value.as_bytes()[2] == b':';
    match NaiveTime::parse_from_str(value, "%H:%M") {
        Ok(t) if well_formed => Ok(Some(t.format("%H:%M").to_string())),
        _ => Err(AppError::BadRequest(format!(
            "Invalid time '{value}', expected HH:MM"
        ))),
    }
}

/// 月份的半开区间 `[当月1日, 下月1日)`, 12 月滚到次年 1 月
pub fn month_bounds(year: i32, month: u32) -> Result<(String, String), AppError> {
    if !(1..=12).contains(&month) {
        return Err(AppError::BadRequest(format!("Invalid month {month}")));
    }
    // 五位年份会破坏字符串比较
    if !(1..=9998).contains(&year) {
        return Err(AppError::BadRequest(format!("Invalid year {year}")));
    }

    let start = format!("{year:04}-{month:02}-01");
    let end = if month == 12 {
        format!("{:04}-01-01", year + 1)
    } else {
        format!("{year:04}-{:02}-01", month + 1)
    };
    Ok((start, end))
}

/// 路径参数版本: `/month/:year/:month`
pub fn month_bounds_from_path(year: &str, month: &str) -> Result<(String, String), AppError> {
    let year = year
        .parse::<i32>()
        .map_err(|_| AppError::BadRequest(format!("Invalid year '{year}'")))?;
    let month = month
        .parse::<u32>()
        .map_err(|_| AppError::BadRequest(format!("Invalid month '{month}'")))?;
    month_bounds(year, month)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// 只有 `asc` 升序, 其余一律降序
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// 闭区间 `[start, end]`, 两端都可省略
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl DateRange {
    pub fn from_params(start: Option<&str>, end: Option<&str>) -> Result<Self, AppError> {
        Ok(Self {
            start: parse_optional_date(start)?,
            end: parse_optional_date(end)?,
        })
    }
}

fn invalid_date(raw: &str) -> AppError {
    AppError::BadRequest(format!("Invalid date '{raw}', expected YYYY-MM-DD"))
}
