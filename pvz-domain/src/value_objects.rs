//! Value Objects for the PVZ Domain
//!
//! Enumerations crossing the API and storage boundaries, plus the validated
//! query parameters used by pickup point listing.
//! All value objects enforce invariants at construction time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// City is not one of the supported cities
    #[error("Invalid city: {0}")]
    InvalidCity(String),

    /// Product type is not one of the supported types
    #[error("Invalid product type: {0}")]
    InvalidProductType(String),

    /// Reception status is not `in_progress` or `closed`
    #[error("Invalid reception status: {0}")]
    InvalidStatus(String),

    /// User role is not `employee` or `moderator`
    #[error("Invalid user role: {0}")]
    InvalidRole(String),

    /// Email is not shaped like an address
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Page size outside of [1, MAX_PAGE_LIMIT]
    #[error("Limit must be between 1 and {max}, got {value}")]
    InvalidLimit {
        /// Requested limit
        value: i64,
        /// Maximum allowed limit
        max: i64,
    },

    /// Page number below one
    #[error("Page must be greater than zero, got {0}")]
    InvalidPage(i64),

    /// End of the interval precedes its start
    #[error("End date cannot be before start date")]
    InvalidDateRange,

    /// Invalid state transition
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
}

// =============================================================================
// City
// =============================================================================

/// City a pickup point is registered in.
///
/// Canonical values are the English names; the Russian names used by the
/// public API contract are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum City {
    #[serde(rename = "Moscow", alias = "Москва")]
    Moscow,
    #[serde(rename = "Saint Petersburg", alias = "Санкт-Петербург")]
    SaintPetersburg,
    #[serde(rename = "Kazan", alias = "Казань")]
    Kazan,
}

impl City {
    /// All supported cities
    pub const ALL: [City; 3] = [City::Moscow, City::SaintPetersburg, City::Kazan];

    /// Canonical string value
    pub fn as_str(&self) -> &'static str {
        match self {
            City::Moscow => "Moscow",
            City::SaintPetersburg => "Saint Petersburg",
            City::Kazan => "Kazan",
        }
    }
}

impl FromStr for City {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Moscow" | "Москва" => Ok(City::Moscow),
            "Saint Petersburg" | "Санкт-Петербург" => Ok(City::SaintPetersburg),
            "Kazan" | "Казань" => Ok(City::Kazan),
            other => Err(DomainError::InvalidCity(other.to_string())),
        }
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ProductType
// =============================================================================

/// Kind of product scanned into a reception
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductType {
    #[serde(rename = "electronics", alias = "электроника")]
    Electronics,
    #[serde(rename = "clothes", alias = "одежда")]
    Clothes,
    #[serde(rename = "shoes", alias = "обувь")]
    Shoes,
}

impl ProductType {
    /// All supported product types
    pub const ALL: [ProductType; 3] =
        [ProductType::Electronics, ProductType::Clothes, ProductType::Shoes];

    /// Canonical string value
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Electronics => "electronics",
            ProductType::Clothes => "clothes",
            ProductType::Shoes => "shoes",
        }
    }
}

impl FromStr for ProductType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "electronics" | "электроника" => Ok(ProductType::Electronics),
            "clothes" | "одежда" => Ok(ProductType::Clothes),
            "shoes" | "обувь" => Ok(ProductType::Shoes),
            other => Err(DomainError::InvalidProductType(other.to_string())),
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ReceptionStatus
// =============================================================================

/// Lifecycle status of a reception.
///
/// `InProgress -> Closed` is the only transition; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceptionStatus {
    InProgress,
    Closed,
}

impl ReceptionStatus {
    /// Canonical string value
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceptionStatus::InProgress => "in_progress",
            ReceptionStatus::Closed => "closed",
        }
    }
}

impl FromStr for ReceptionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(ReceptionStatus::InProgress),
            "closed" => Ok(ReceptionStatus::Closed),
            other => Err(DomainError::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for ReceptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// UserRole
// =============================================================================

/// Role of an authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Employee,
    Moderator,
}

impl UserRole {
    /// Canonical string value
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Employee => "employee",
            UserRole::Moderator => "moderator",
        }
    }
}

impl FromStr for UserRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "employee" => Ok(UserRole::Employee),
            "moderator" => Ok(UserRole::Moderator),
            other => Err(DomainError::InvalidRole(other.to_string())),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Email
// =============================================================================

/// Email address with a minimal shape check (`local@domain.tld`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    /// Parse and validate an email address
    ///
    /// # Errors
    /// Returns `DomainError::InvalidEmail` if the value is not shaped like an address
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let value = value.trim();
        let valid = match value.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !value.chars().any(char::is_whitespace)
            },
            None => false,
        };

        if !valid {
            return Err(DomainError::InvalidEmail(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Get the address as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// Default page size for pickup point listing
pub const DEFAULT_PAGE_LIMIT: i64 = 10;

/// Largest accepted page size
pub const MAX_PAGE_LIMIT: i64 = 30;

/// Validated page request
///
/// # Invariants
/// - 1 <= limit <= MAX_PAGE_LIMIT
/// - page >= 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    limit: i64,
    page: i64,
}

impl PageRequest {
    /// Build a page request, applying defaults for missing values
    ///
    /// # Errors
    /// Returns `DomainError::InvalidLimit` or `DomainError::InvalidPage`
    pub fn new(limit: Option<i64>, page: Option<i64>) -> Result<Self, DomainError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(DomainError::InvalidLimit {
                value: limit,
                max: MAX_PAGE_LIMIT,
            });
        }

        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(DomainError::InvalidPage(page));
        }

        Ok(Self { limit, page })
    }

    /// Page size
    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// One-based page number
    pub fn page(&self) -> i64 {
        self.page
    }

    /// Number of pickup points to skip: (page - 1) * limit
    ///
    /// Saturates at `i64::MAX`, so a page far past the end yields nothing.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            page: 1,
        }
    }
}

// =============================================================================
// DateRange
// =============================================================================

/// Closed interval on reception start time; either bound may be open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Build a range
    ///
    /// # Errors
    /// Returns `DomainError::InvalidDateRange` if end < start
    pub fn new(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, DomainError> {
        if let (Some(s), Some(e)) = (start, end) {
            if e < s {
                return Err(DomainError::InvalidDateRange);
            }
        }
        Ok(Self { start, end })
    }

    /// Unbounded range
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Lower bound (inclusive)
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    /// Upper bound (inclusive)
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// True when neither bound is set
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Check whether a timestamp lies within the range
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at <= e)
    }
}

/// Validated parameters of a composite pickup point listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PickupPointQuery {
    /// Pagination over pickup points (ordered by id)
    pub page: PageRequest,
    /// Filter on reception start time
    pub range: DateRange,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_city_parse_canonical_and_alias() {
        assert_eq!("Moscow".parse::<City>().unwrap(), City::Moscow);
        assert_eq!("Казань".parse::<City>().unwrap(), City::Kazan);
        assert_eq!(
            "Санкт-Петербург".parse::<City>().unwrap(),
            City::SaintPetersburg
        );
        assert!(matches!(
            "Novosibirsk".parse::<City>(),
            Err(DomainError::InvalidCity(_))
        ));
    }

    #[test]
    fn test_city_roundtrips_through_as_str() {
        for city in City::ALL {
            assert_eq!(city.as_str().parse::<City>().unwrap(), city);
        }
    }

    #[test]
    fn test_product_type_parse() {
        assert_eq!("shoes".parse::<ProductType>().unwrap(), ProductType::Shoes);
        assert_eq!("обувь".parse::<ProductType>().unwrap(), ProductType::Shoes);
        assert!(matches!(
            "Shoes".parse::<ProductType>(),
            Err(DomainError::InvalidProductType(_))
        ));
    }

    #[test]
    fn test_status_serde_uses_snake_case() {
        let json = serde_json::to_string(&ReceptionStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");

        let status: ReceptionStatus = serde_json::from_str("\"closed\"").unwrap();
        assert_eq!(status, ReceptionStatus::Closed);
    }

    #[test]
    fn test_city_serde_accepts_alias() {
        let city: City = serde_json::from_str("\"Москва\"").unwrap();
        assert_eq!(city, City::Moscow);
        assert_eq!(serde_json::to_string(&city).unwrap(), "\"Moscow\"");
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("employee".parse::<UserRole>().unwrap(), UserRole::Employee);
        assert!(matches!("admin".parse::<UserRole>(), Err(DomainError::InvalidRole(_))));
    }

    #[test]
    fn test_email_validation() {
        assert!(Email::parse("user@example.com").is_ok());
        assert!(Email::parse("  user@example.com ").is_ok());
        assert!(Email::parse("userexample.com").is_err());
        assert!(Email::parse("@example.com").is_err());
        assert!(Email::parse("user@example").is_err());
        assert!(Email::parse("us er@example.com").is_err());
        assert!(Email::parse("a@b@c.com").is_err());
    }

    #[test]
    fn test_page_request_defaults() {
        let page = PageRequest::new(None, None).unwrap();
        assert_eq!(page.limit(), DEFAULT_PAGE_LIMIT);
        assert_eq!(page.page(), 1);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_page_request_offset() {
        let page = PageRequest::new(Some(5), Some(3)).unwrap();
        assert_eq!(page.offset(), 10);
    }

    #[test]
    fn test_page_request_offset_saturates() {
        let page = PageRequest::new(Some(MAX_PAGE_LIMIT), Some(i64::MAX)).unwrap();
        assert_eq!(page.offset(), i64::MAX);

        let page = PageRequest::new(Some(1), Some(i64::MAX)).unwrap();
        assert_eq!(page.offset(), i64::MAX - 1);
    }

    #[test]
    fn test_page_request_bounds() {
        assert!(PageRequest::new(Some(1), None).is_ok());
        assert!(PageRequest::new(Some(30), None).is_ok());
        assert!(matches!(
            PageRequest::new(Some(0), None),
            Err(DomainError::InvalidLimit { value: 0, .. })
        ));
        assert!(matches!(
            PageRequest::new(Some(31), None),
            Err(DomainError::InvalidLimit { value: 31, .. })
        ));
        assert!(matches!(
            PageRequest::new(None, Some(0)),
            Err(DomainError::InvalidPage(0))
        ));
    }

    #[test]
    fn test_date_range_validation() {
        let now = Utc::now();
        let earlier = now - Duration::hours(1);

        assert!(DateRange::new(Some(earlier), Some(now)).is_ok());
        assert!(DateRange::new(Some(now), Some(now)).is_ok());
        assert!(DateRange::new(None, Some(now)).is_ok());
        assert_eq!(
            DateRange::new(Some(now), Some(earlier)),
            Err(DomainError::InvalidDateRange)
        );
    }

    #[test]
    fn test_date_range_contains() {
        let now = Utc::now();
        let range = DateRange::new(Some(now - Duration::hours(1)), Some(now)).unwrap();

        assert!(range.contains(now));
        assert!(range.contains(now - Duration::minutes(30)));
        assert!(!range.contains(now + Duration::seconds(1)));
        assert!(!range.contains(now - Duration::hours(2)));

        let open = DateRange::new(None, Some(now)).unwrap();
        assert!(open.contains(now - Duration::days(365)));
        assert!(DateRange::unbounded().is_unbounded());
    }
}
