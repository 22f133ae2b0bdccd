//! Deterministic entity extraction from guest messages.
//!
//! Guests write dates, times and party sizes in a handful of habitual
//! shapes ("12.10.2026", "jutri ob 13:00", "2 odrasla in 2 otroka",
//! "2+2"). These extractors resolve the common shapes without a model
//! call; anything they cannot resolve falls through to the LLM path.

use chrono::{Datelike, Days, NaiveDate, NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

static FULL_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[./](\d{1,2})[./](\d{4})\b").expect("static pattern"));

static SHORT_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})\s*[./]\s*(\d{1,2})\b").expect("static pattern"));

static DATE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})\s*[./]\s*(\d{1,2})(?:\s*[./]\s*(\d{4}))?\.?\s*(?:do|to|[–—-])\s*(\d{1,2})\s*[./]\s*(\d{1,2})(?:\s*[./]\s*(\d{4}))?",
    )
    .expect("static pattern")
});

static COLON_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2}):(\d{2})\b").expect("static pattern"));

static DOT_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})\.(\d{2})\b").expect("static pattern"));

static NIGHTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:nočitev|nočitvi|nočitve|nocitev|nocitvi|nocitve|noči|noci|noč|noc)")
        .expect("static pattern")
});

static PLUS_PARTY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*\+\s*(\d+)").expect("static pattern"));

static ADULTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*odrasl").expect("static pattern"));

static KIDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*otro[kc]").expect("static pattern"));

static TOTAL_PARTY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*(?:oseb|osebe|osbe|people|persons)").expect("static pattern"));

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("static pattern"));

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w.+\-]+@[\w.\-]+\.\w+").expect("static pattern"));

/// First date in the message, normalized. Understands `12.10.2026`,
/// short `12.10` (next occurrence), `danes`/`jutri`/`pojutri`, weekday
/// names and `naslednja sobota`.
pub fn extract_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(captures) = FULL_DATE.captures(text) {
        let day: u32 = captures[1].parse().ok()?;
        let month: u32 = captures[2].parse().ok()?;
        let year: i32 = captures[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(captures) = SHORT_DATE.captures(text) {
        let day: u32 = captures[1].parse().ok()?;
        let month: u32 = captures[2].parse().ok()?;
        if let Some(candidate) = NaiveDate::from_ymd_opt(today.year(), month, day) {
            return if candidate < today {
                NaiveDate::from_ymd_opt(today.year() + 1, month, day)
            } else {
                Some(candidate)
            };
        }
        // Falls through: "13.00" parses as no calendar date.
    }

    let lowered = text.to_lowercase();
    if lowered.contains("pojutri") {
        return today.checked_add_days(Days::new(2));
    }
    if lowered.contains("jutri") {
        return today.checked_add_days(Days::new(1));
    }
    if lowered.contains("danes") {
        return Some(today);
    }

    weekday_mention(&lowered).map(|(weekday, next_week)| {
        let mut days_ahead = (weekday.num_days_from_monday() as i64
            - today.weekday().num_days_from_monday() as i64)
            .rem_euclid(7) as u64;
        if next_week {
            if days_ahead == 0 {
                days_ahead = 7;
            } else {
                days_ahead += 7;
            }
        }
        today.checked_add_days(Days::new(days_ahead)).unwrap_or(today)
    })
}

fn weekday_mention(lowered: &str) -> Option<(Weekday, bool)> {
    const WEEKDAYS: &[(&str, Weekday)] = &[
        ("ponedeljek", Weekday::Mon),
        ("torek", Weekday::Tue),
        ("sredo", Weekday::Wed),
        ("sreda", Weekday::Wed),
        ("četrtek", Weekday::Thu),
        ("cetrtek", Weekday::Thu),
        ("petek", Weekday::Fri),
        ("soboto", Weekday::Sat),
        ("sobota", Weekday::Sat),
        ("nedeljo", Weekday::Sun),
        ("nedelja", Weekday::Sun),
    ];

    for (word, weekday) in WEEKDAYS {
        if let Some(position) = lowered.find(word) {
            let next_week = lowered[..position].contains("naslednj");
            return Some((*weekday, next_week));
        }
    }
    None
}

/// Interval like "23.1. do 26.1." or "23.12.2026-26.12.2026". An end
/// before the start rolls over to the next year.
pub fn extract_date_range(text: &str, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let captures = DATE_RANGE.captures(text)?;

    let day1: u32 = captures[1].parse().ok()?;
    let month1: u32 = captures[2].parse().ok()?;
    let day2: u32 = captures[4].parse().ok()?;
    let month2: u32 = captures[5].parse().ok()?;

    let year2: Option<i32> = captures.get(6).and_then(|m| m.as_str().parse().ok());
    let year1: i32 = captures
        .get(3)
        .and_then(|m| m.as_str().parse().ok())
        .or(year2)
        .unwrap_or_else(|| today.year());
    let year2 = year2.unwrap_or(year1);

    let start = NaiveDate::from_ymd_opt(year1, month1, day1)?;
    let mut end = NaiveDate::from_ymd_opt(year2, month2, day2)?;
    if end <= start {
        end = NaiveDate::from_ymd_opt(year2 + 1, month2, day2)?;
    }
    Some((start, end))
}

pub fn nights_from_range(start: NaiveDate, end: NaiveDate) -> Option<u32> {
    let nights = (end - start).num_days();
    (nights > 0).then_some(nights as u32)
}

/// First plausible clock time: `13:00`, `13.00` (when not part of a
/// dotted date) or a bare `1300`.
pub fn extract_time(text: &str) -> Option<NaiveTime> {
    if let Some(captures) = COLON_TIME.captures(text) {
        if let Some(time) = clock(&captures[1], &captures[2]) {
            return Some(time);
        }
    }

    for captures in DOT_TIME.captures_iter(text) {
        let whole = captures.get(0).expect("match");
        // "12.10.2026" is a date, not a time: skip when another dotted
        // number follows immediately.
        let tail = text[whole.end()..].trim_start();
        if tail.starts_with('.') && tail[1..].trim_start().starts_with(|c: char| c.is_ascii_digit())
        {
            continue;
        }
        if let Some(time) = clock(&captures[1], &captures[2]) {
            return Some(time);
        }
    }

    for raw in DIGITS.find_iter(text) {
        let digits = raw.as_str();
        if digits.len() == 4 {
            let number: u32 = digits.parse().ok()?;
            // Four digits are usually a year; only 1200-style values
            // inside serving hours read as times.
            if (1000..=2359).contains(&number) && !(1900..=2100).contains(&number) {
                if let Some(time) = clock(&digits[..2], &digits[2..]) {
                    return Some(time);
                }
            }
        }
    }

    None
}

fn clock(hours: &str, minutes: &str) -> Option<NaiveTime> {
    let hour: u32 = hours.parse().ok()?;
    let minute: u32 = minutes.parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Number of nights, in labeled form only: "3 nočitve", "dve noči".
/// Dates are blanked out first so "10.10." does not read as ten nights.
/// Bare numbers are deliberately not accepted here; whether "2" means
/// nights or people depends on what the flow is waiting for, so that
/// disambiguation lives with the flow (see `bare_number`).
pub fn extract_nights(text: &str) -> Option<u32> {
    let cleaned = blank_dates_and_times(text);

    if let Some(captures) = NIGHTS.captures(&cleaned) {
        return captures[1].parse().ok();
    }

    const WORDS: &[(&str, u32)] = &[
        ("eno noč", 1),
        ("ena noč", 1),
        ("dve", 2),
        ("dva", 2),
        ("tri", 3),
        ("štiri", 4),
        ("stiri", 4),
        ("pet", 5),
        ("šest", 6),
        ("sest", 6),
        ("sedem", 7),
        ("osem", 8),
        ("devet", 9),
        ("deset", 10),
    ];
    let lowered = cleaned.to_lowercase();
    if lowered.contains("noč") || lowered.contains("noc") {
        for (word, value) in WORDS {
            if lowered.contains(word) {
                return Some(*value);
            }
        }
    }

    None
}

/// A message that is nothing but a small number — the usual answer to
/// "za koliko oseb?" or "koliko nočitev?". The field it fills is the
/// flow's call.
pub fn bare_number(text: &str) -> Option<u32> {
    let stripped = text.trim();
    if stripped.is_empty() || !stripped.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let value: u32 = stripped.parse().ok()?;
    (1..=30).contains(&value).then_some(value)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PartyCount {
    pub total: Option<u32>,
    pub adults: Option<u32>,
    pub kids: Option<u32>,
}

/// Party size in labeled forms only: "2+2", "2 odrasla in 2 otroka",
/// "4 osebe".
pub fn labeled_party_count(text: &str) -> PartyCount {
    let mut result = PartyCount::default();

    if let Some(captures) = PLUS_PARTY.captures(text) {
        let adults: Option<u32> = captures[1].parse().ok();
        let kids: Option<u32> = captures[2].parse().ok();
        if let (Some(adults), Some(kids)) = (adults, kids) {
            result.adults = Some(adults);
            result.kids = Some(kids);
            result.total = Some(adults + kids);
            return result;
        }
    }

    let adults = ADULTS.captures(text).and_then(|c| c[1].parse::<u32>().ok());
    let kids = KIDS.captures(text).and_then(|c| c[1].parse::<u32>().ok());
    if adults.is_some() || kids.is_some() {
        result.adults = adults;
        result.kids = kids;
        result.total = Some(adults.unwrap_or(0) + kids.unwrap_or(0));
        return result;
    }

    let cleaned = blank_dates_and_times(text);
    if let Some(captures) = TOTAL_PARTY.captures(&cleaned) {
        result.total = captures[1].parse().ok();
    }
    result
}

/// Party size in its habitual shapes: the labeled forms plus bare
/// digits once dates and times are blanked out.
pub fn parse_party_count(text: &str) -> PartyCount {
    let mut result = labeled_party_count(text);
    if result.total.is_some() {
        return result;
    }

    let cleaned = blank_dates_and_times(text);
    let digits: Vec<u32> =
        DIGITS.find_iter(&cleaned).filter_map(|m| m.as_str().parse().ok()).collect();
    match digits.as_slice() {
        [total] if *total <= 60 => result.total = Some(*total),
        [adults, kids] if *adults <= 30 && *kids <= 30 => {
            result.adults = Some(*adults);
            result.kids = Some(*kids);
            result.total = Some(adults + kids);
        }
        _ => {}
    }
    result
}

fn blank_dates_and_times(text: &str) -> String {
    let without_full = FULL_DATE.replace_all(text, " ");
    let without_short = SHORT_DATE.replace_all(&without_full, " ");
    COLON_TIME.replace_all(&without_short, " ").into_owned()
}

pub fn extract_email(text: &str) -> Option<String> {
    EMAIL.find(text).map(|m| m.as_str().to_string())
}

/// Phone numbers arrive with arbitrary separators; seven digits or more
/// count as one. Only used when the flow is explicitly waiting for a
/// contact, so date-laden messages never reach this.
pub fn extract_phone(text: &str) -> Option<String> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    (digits.len() >= 7).then_some(digits)
}
