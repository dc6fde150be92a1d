use chrono::{DateTime, FixedOffset, Utc};

/// Calendar date of `now` in the civil timezone `offset`, as `YYYY-MM-DD`.
pub fn civil_date(now: DateTime<Utc>, offset: FixedOffset) -> String {
    now.with_timezone(&offset).format("%Y-%m-%d").to_string()
}

pub fn civil_today(offset: FixedOffset) -> String {
    civil_date(Utc::now(), offset)
}
