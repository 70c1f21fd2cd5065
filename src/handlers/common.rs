use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::Serialize;
use validator::Validate;

use crate::errors::ServiceError;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|e| ServiceError::Validation(format!("validation failed: {e}")))
}

/// Parses an optional `YYYY-MM-DD` query value to the UTC start of that day.
pub fn parse_query_date(
    name: &str,
    value: &Option<String>,
) -> Result<Option<DateTime<Utc>>, ServiceError> {
    match value.as_deref().filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                ServiceError::Validation(format!("{name} must be a YYYY-MM-DD date"))
            })?;
            let midnight = date
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| ServiceError::Validation(format!("{name} is out of range")))?;
            Ok(Some(DateTime::from_naive_utc_and_offset(midnight, Utc)))
        }
    }
}

/// Parses an inclusive `to` date into an exclusive upper bound (next day).
pub fn parse_query_date_exclusive(
    name: &str,
    value: &Option<String>,
) -> Result<Option<DateTime<Utc>>, ServiceError> {
    Ok(parse_query_date(name, value)?.map(|d| d + ChronoDuration::days(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dates_and_rejects_garbage() {
        let parsed = parse_query_date("from_date", &Some("2024-06-01".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-06-01T00:00:00+00:00");

        assert!(parse_query_date("from_date", &Some("junk".to_string())).is_err());
        assert!(parse_query_date("from_date", &None).unwrap().is_none());
        assert!(parse_query_date("from_date", &Some(String::new()))
            .unwrap()
            .is_none());
    }

    #[test]
    fn exclusive_bound_is_the_next_day() {
        let parsed = parse_query_date_exclusive("to_date", &Some("2024-06-01".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-06-02T00:00:00+00:00");
    }
}
