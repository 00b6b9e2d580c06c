//! Input checks applied before any upstream geocoding call.

use common::Error;

/// Characters that only show up in markup or script injection attempts.
const FORBIDDEN: &[char] = &['<', '>', '"', '`'];

/// Validate a free-text place query and return it trimmed.
pub fn validate_query(raw: &str, max_len: usize) -> Result<&str, Error> {
    let query = raw.trim();
    if query.is_empty() {
        return Err(Error::InvalidInput("query must not be empty".into()));
    }
    if query.chars().count() > max_len {
        return Err(Error::InvalidInput(format!(
            "query must be at most {max_len} characters"
        )));
    }
    if let Some(c) = query.chars().find(|c| FORBIDDEN.contains(c) || c.is_control()) {
        return Err(Error::InvalidInput(format!(
            "query contains a forbidden character: {:?}",
            c
        )));
    }
    Ok(query)
}

/// Validate a latitude/longitude pair.
pub fn validate_coordinates(lat: f64, lng: f64) -> Result<(), Error> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(Error::InvalidInput(format!("latitude out of range: {lat}")));
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err(Error::InvalidInput(format!("longitude out of range: {lng}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_queries_pass_trimmed() {
        assert_eq!(validate_query("  Seattle, WA ", 100).unwrap(), "Seattle, WA");
        assert_eq!(
            validate_query("Lewis & Clark County", 100).unwrap(),
            "Lewis & Clark County"
        );
    }

    #[test]
    fn test_markup_rejected() {
        assert!(validate_query("<script>alert(1)</script>", 100).is_err());
        assert!(validate_query("seattle\"", 100).is_err());
        assert!(validate_query("a`b", 100).is_err());
        assert!(validate_query("line\nbreak", 100).is_err());
    }

    #[test]
    fn test_length_and_empty_bounds() {
        assert!(validate_query("", 100).is_err());
        assert!(validate_query("   ", 100).is_err());
        assert!(validate_query(&"a".repeat(101), 100).is_err());
        assert!(validate_query(&"a".repeat(100), 100).is_ok());
    }

    #[test]
    fn test_coordinates() {
        assert!(validate_coordinates(47.6, -122.3).is_ok());
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, -181.0).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }
}
