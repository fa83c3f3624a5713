//! Timestamp and identifier formats shared by keys, packets and identity claims

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a time as RFC 3339 in UTC with sub-second precision
pub fn format(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse an RFC 3339 timestamp into UTC
pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

/// A fresh unique id of the form `<unixSeconds>-<uuid v4>`
pub fn unique_id() -> String {
    format!("{}-{}", Utc::now().timestamp(), uuid::Uuid::new_v4())
}
