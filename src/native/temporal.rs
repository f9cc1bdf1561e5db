//! Календарная арифметика для DATE и DATETIME2.
//!
//! DATE хранится как 3-байтовое число дней от 0001-01-01, DATETIME2 как
//! 5-байтовое число тиков по 100 нс от полуночи, за которым следует та же
//! 3-байтовая дата. Все числа little-endian.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Тиков по 100 нс в секунде.
pub const TICKS_PER_SECOND: u64 = 10_000_000;
/// Наибольшее допустимое число дней (9999-12-31).
pub const MAX_DAY_COUNT: u32 = 3_652_058;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Причина, по которой значение не представимо.
pub type TemporalError = String;

/// Число дней от 0001-01-01.
pub fn day_count(date: NaiveDate) -> Result<u32, TemporalError> {
    let year = date.year();
    if !(1..=9999).contains(&year) {
        return Err(format!("year {year} is outside 1..=9999"));
    }
    // num_days_from_ce() для 0001-01-01 равен 1
    Ok((date.num_days_from_ce() - 1) as u32)
}

/// Число тиков по 100 нс от полуночи. Доли меньше 100 нс отбрасываются.
pub fn time_ticks(time: NaiveTime) -> Result<u64, TemporalError> {
    let nanos = time.nanosecond();
    if nanos >= 1_000_000_000 {
        return Err("leap seconds are not representable".to_string());
    }
    Ok(u64::from(time.num_seconds_from_midnight()) * TICKS_PER_SECOND + u64::from(nanos) / 100)
}

/// Обратное преобразование числа дней.
pub fn date_from_day_count(days: u32) -> Option<NaiveDate> {
    if days > MAX_DAY_COUNT {
        return None;
    }
    NaiveDate::from_num_days_from_ce_opt(days as i32 + 1)
}

/// Обратное преобразование тиков.
pub fn time_from_ticks(ticks: u64) -> Option<NaiveTime> {
    let secs = ticks / TICKS_PER_SECOND;
    let nanos = (ticks % TICKS_PER_SECOND) * 100;
    NaiveTime::from_num_seconds_from_midnight_opt(u32::try_from(secs).ok()?, nanos as u32)
}

/// Разбирает текст даты или даты-времени.
///
/// Поддерживаются `YYYY-MM-DD`, `YYYY-MM-DD[T ]HH:MM[:SS[.fffffffff]]` и
/// RFC 3339 со смещением. Для RFC 3339 сохраняется локальное (настенное)
/// время без перевода в UTC.
pub fn parse_datetime_text(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.naive_local())
}
