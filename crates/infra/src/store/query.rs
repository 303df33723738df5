//! Query parameters shared by the stores and the services.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use pricetrack_core::{DomainError, DomainResult};

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// 1-based page selection. `limit` is capped at [`MAX_PAGE_LIMIT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Pagination {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> DomainResult<Self> {
        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(DomainError::field("page", "must be 1 or greater"));
        }
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if limit < 1 {
            return Err(DomainError::field("limit", "must be 1 or greater"));
        }
        Ok(Self {
            page,
            limit: limit.min(MAX_PAGE_LIMIT),
        })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// One page of results plus totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            limit: pagination.limit,
            total_pages: total.div_ceil(u64::from(pagination.limit)),
        }
    }
}

/// Item filter: case-insensitive substring on serial or name, exact category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemQuery {
    text: Option<String>,
    category: Option<String>,
}

impl ItemQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        let text = text.into().trim().to_lowercase();
        self.text = (!text.is_empty()).then_some(text);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        let category = category.into().trim().to_string();
        self.category = (!category.is_empty()).then_some(category);
        self
    }

    /// Lower-cased search needle, if any.
    pub fn needle(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn category_filter(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn matches(&self, item: &pricetrack_inventory::Item) -> bool {
        let text_ok = match &self.text {
            None => true,
            Some(needle) => {
                item.serial_number.as_str().to_lowercase().contains(needle)
                    || item
                        .item_name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(needle))
            }
        };
        let category_ok = match &self.category {
            None => true,
            Some(c) => item.category.as_deref() == Some(c.as_str()),
        };
        text_ok && category_ok
    }
}

/// Inclusive time range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<Self> {
        if start > end {
            return Err(DomainError::field("start", "start date must be before end date"));
        }
        Ok(Self { start, end })
    }

    /// The whole UTC calendar day containing `at`.
    pub fn day_of(at: DateTime<Utc>) -> Self {
        let day = at.date_naive();
        Self {
            start: start_of_day(day),
            end: end_of_day(day),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }

    /// Parse `start`/`end` query values.
    ///
    /// Accepts RFC 3339 timestamps or `YYYY-MM-DD` dates; a bare end date
    /// covers that whole day.
    pub fn parse(start: &str, end: &str) -> DomainResult<Self> {
        let start = parse_bound(start, "start", start_of_day)?;
        let end = parse_bound(end, "end", end_of_day)?;
        Self::new(start, end)
    }
}

pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    let last = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN);
    day.and_time(last).and_utc()
}

fn parse_bound(
    raw: &str,
    field: &str,
    from_date: fn(NaiveDate) -> DateTime<Utc>,
) -> DomainResult<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DomainError::field(field, "both start and end dates are required"));
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(from_date)
        .map_err(|_| DomainError::field(field, "invalid date format, use YYYY-MM-DD"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_caps_limit_and_rejects_zero() {
        assert_eq!(Pagination::new(None, Some(500)).unwrap().limit, MAX_PAGE_LIMIT);
        assert_eq!(Pagination::new(None, None).unwrap(), Pagination::default());
        assert!(Pagination::new(Some(0), None).is_err());
        assert!(Pagination::new(None, Some(0)).is_err());
        assert_eq!(Pagination::new(Some(3), Some(20)).unwrap().offset(), 40);
    }

    #[test]
    fn page_computes_total_pages() {
        let p = Page::new(vec![1, 2], 101, Pagination::new(Some(1), Some(50)).unwrap());
        assert_eq!(p.total_pages, 3);
        let empty: Page<u8> = Page::new(vec![], 0, Pagination::default());
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn date_range_rejects_inverted_bounds() {
        let err = DateRange::parse("2024-02-01", "2024-01-01").unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn bare_end_date_covers_the_whole_day() {
        let r = DateRange::parse("2024-01-01", "2024-01-01").unwrap();
        let late = DateTime::parse_from_rfc3339("2024-01-01T23:30:00Z").unwrap().with_timezone(&Utc);
        assert!(r.contains(late));
    }

    #[test]
    fn rfc3339_bounds_are_exact() {
        let r = DateRange::parse("2024-01-01T10:00:00Z", "2024-01-01T11:00:00+00:00").unwrap();
        let after = DateTime::parse_from_rfc3339("2024-01-01T11:00:01Z").unwrap().with_timezone(&Utc);
        assert!(!r.contains(after));
    }

    #[test]
    fn garbage_dates_are_validation_errors() {
        assert!(DateRange::parse("yesterday", "2024-01-01").is_err());
        assert!(DateRange::parse("", "2024-01-01").is_err());
    }
}
