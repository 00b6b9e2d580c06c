//! Region identifiers: county FIPS codes and eBird region codes.
//!
//! The map's county boundary layer tags every polygon with a 5-digit FIPS
//! code (2-digit state + 3-digit county). eBird addresses the same county
//! as `US-{state postal}-{county}`.

use crate::Error;

/// State FIPS prefix → USPS postal abbreviation (50 states + DC).
const STATE_POSTAL: &[(&str, &str)] = &[
    ("01", "AL"),
    ("02", "AK"),
    ("04", "AZ"),
    ("05", "AR"),
    ("06", "CA"),
    ("08", "CO"),
    ("09", "CT"),
    ("10", "DE"),
    ("11", "DC"),
    ("12", "FL"),
    ("13", "GA"),
    ("15", "HI"),
    ("16", "ID"),
    ("17", "IL"),
    ("18", "IN"),
    ("19", "IA"),
    ("20", "KS"),
    ("21", "KY"),
    ("22", "LA"),
    ("23", "ME"),
    ("24", "MD"),
    ("25", "MA"),
    ("26", "MI"),
    ("27", "MN"),
    ("28", "MS"),
    ("29", "MO"),
    ("30", "MT"),
    ("31", "NE"),
    ("32", "NV"),
    ("33", "NH"),
    ("34", "NJ"),
    ("35", "NM"),
    ("36", "NY"),
    ("37", "NC"),
    ("38", "ND"),
    ("39", "OH"),
    ("40", "OK"),
    ("41", "OR"),
    ("42", "PA"),
    ("44", "RI"),
    ("45", "SC"),
    ("46", "SD"),
    ("47", "TN"),
    ("48", "TX"),
    ("49", "UT"),
    ("50", "VT"),
    ("51", "VA"),
    ("53", "WA"),
    ("54", "WV"),
    ("55", "WI"),
    ("56", "WY"),
];

/// Look up the postal abbreviation for a 2-digit state FIPS prefix.
pub fn state_postal(state_fips: &str) -> Option<&'static str> {
    STATE_POSTAL
        .iter()
        .find(|(fips, _)| *fips == state_fips)
        .map(|(_, postal)| *postal)
}

/// Normalize a county FIPS attribute to 5 digits.
///
/// Tiles sometimes carry the code as a number, which drops the leading
/// zero for states 01–09 (e.g. `1001` for Autauga County, AL).
pub fn normalize_fips(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > 5 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{:0>5}", trimmed))
}

/// Convert a 5-digit county FIPS code to an eBird county region code.
pub fn ebird_region_from_fips(fips: &str) -> Result<String, Error> {
    let fips = normalize_fips(fips)
        .ok_or_else(|| Error::InvalidInput(format!("not a county FIPS code: {fips:?}")))?;
    let (state, county) = fips.split_at(2);
    let postal = state_postal(state)
        .ok_or_else(|| Error::InvalidInput(format!("unknown state FIPS prefix {state} in {fips}")))?;
    Ok(format!("US-{postal}-{county}"))
}

/// Whether `code` is shaped like an eBird region code:
/// a country (`US`), subnational1 (`US-WA`) or subnational2 (`US-WA-033`).
pub fn is_valid_region_code(code: &str) -> bool {
    let mut parts = code.split('-');
    let Some(country) = parts.next() else {
        return false;
    };
    if country.len() != 2 || !country.bytes().all(|b| b.is_ascii_uppercase()) {
        return false;
    }

    let mut depth = 0;
    for part in parts {
        depth += 1;
        if depth > 2
            || part.is_empty()
            || part.len() > 3
            || !part.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        {
            return false;
        }
    }
    true
}

/// Whether `loc_id` is shaped like an eBird location id (`L` + digits).
pub fn is_valid_location_id(loc_id: &str) -> bool {
    let mut bytes = loc_id.bytes();
    bytes.next() == Some(b'L') && loc_id.len() > 1 && bytes.all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fips_to_region_code() {
        assert_eq!(ebird_region_from_fips("53033").unwrap(), "US-WA-033");
        assert_eq!(ebird_region_from_fips("06037").unwrap(), "US-CA-037");
    }

    #[test]
    fn test_numeric_fips_is_zero_padded() {
        assert_eq!(normalize_fips("1001").as_deref(), Some("01001"));
        assert_eq!(ebird_region_from_fips("1001").unwrap(), "US-AL-001");
    }

    #[test]
    fn test_unknown_state_prefix_rejected() {
        // 03 is a reserved/unused state code.
        assert!(ebird_region_from_fips("03001").is_err());
        assert!(ebird_region_from_fips("abc").is_err());
        assert!(ebird_region_from_fips("").is_err());
    }

    #[test]
    fn test_region_code_shapes() {
        assert!(is_valid_region_code("US"));
        assert!(is_valid_region_code("US-WA"));
        assert!(is_valid_region_code("US-WA-033"));
        assert!(is_valid_region_code("CA-ON"));

        assert!(!is_valid_region_code("us-wa"));
        assert!(!is_valid_region_code("US-WA-033-1"));
        assert!(!is_valid_region_code("US--033"));
        assert!(!is_valid_region_code("US-WA-0333"));
        assert!(!is_valid_region_code("US-WA<"));
    }

    #[test]
    fn test_location_id_shape() {
        assert!(is_valid_location_id("L123456"));
        assert!(!is_valid_location_id("L"));
        assert!(!is_valid_location_id("123456"));
        assert!(!is_valid_location_id("L12a"));
    }
}
