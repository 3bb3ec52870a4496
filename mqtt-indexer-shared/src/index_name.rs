//! Index name template resolution.
//!
//! Index templates are free-form strings. The date placeholders `{Y}`, `{m}`
//! and `{d}` are replaced with the UTC year, month and day of the given
//! instant. Anything else, including unknown placeholders, is kept verbatim.

use chrono::{DateTime, Datelike, Utc};

/// Year placeholder, replaced with the 4-digit year.
pub const YEAR_PLACEHOLDER: &str = "{Y}";

/// Month placeholder, replaced with the 2-digit month.
pub const MONTH_PLACEHOLDER: &str = "{m}";

/// Day placeholder, replaced with the 2-digit day of month.
pub const DAY_PLACEHOLDER: &str = "{d}";

/// Resolve an index name template for the given instant.
///
/// # Arguments
///
/// * `template` - The index name template, e.g. `"logs-{Y}-{m}-{d}"`
/// * `at` - The instant whose UTC date is substituted
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use mqtt_indexer_shared::resolve_index_name;
///
/// let at = Utc.with_ymd_and_hms(2025, 3, 7, 12, 0, 0).unwrap();
/// assert_eq!(resolve_index_name("logs-{Y}-{m}-{d}", at), "logs-2025-03-07");
/// ```
pub fn resolve_index_name(template: &str, at: DateTime<Utc>) -> String {
    if !template.contains('{') {
        return template.to_string();
    }

    template
        .replace(YEAR_PLACEHOLDER, &format!("{:04}", at.year()))
        .replace(MONTH_PLACEHOLDER, &format!("{:02}", at.month()))
        .replace(DAY_PLACEHOLDER, &format!("{:02}", at.day()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 30, 45).unwrap()
    }

    #[test]
    fn test_resolve_full_date() {
        assert_eq!(
            resolve_index_name("logs-{Y}-{m}-{d}", at(2025, 3, 7)),
            "logs-2025-03-07"
        );
    }

    #[test]
    fn test_resolve_month_only() {
        assert_eq!(resolve_index_name("temp-{Y}-{m}", at(2025, 6, 15)), "temp-2025-06");
    }

    #[test]
    fn test_resolve_without_placeholders() {
        assert_eq!(resolve_index_name("static-index", at(2025, 1, 1)), "static-index");
    }

    #[test]
    fn test_unknown_placeholders_are_kept() {
        assert_eq!(
            resolve_index_name("x-{H}-{Y}-{y}-{M}", at(2024, 12, 31)),
            "x-{H}-2024-{y}-{M}"
        );
    }

    #[test]
    fn test_repeated_placeholders() {
        assert_eq!(
            resolve_index_name("{Y}{Y}-{d}.{d}", at(2023, 2, 5)),
            "20232023-05.05"
        );
    }

    #[test]
    fn test_year_is_zero_padded() {
        assert_eq!(resolve_index_name("old-{Y}", at(987, 4, 2)), "old-0987");
    }

    #[test]
    fn test_uses_utc_date() {
        // 23:30 on the 6th at UTC-05:00 is already the 7th in UTC.
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2025, 3, 6, 23, 30, 0).unwrap();
        assert_eq!(
            resolve_index_name("logs-{Y}-{m}-{d}", local.with_timezone(&Utc)),
            "logs-2025-03-07"
        );
    }
}
