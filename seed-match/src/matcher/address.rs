//! Street address normalization

/// Street suffix and direction abbreviations (USPS style)
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("STREET", "ST"),
    ("AVENUE", "AVE"),
    ("BOULEVARD", "BLVD"),
    ("DRIVE", "DR"),
    ("LANE", "LN"),
    ("ROAD", "RD"),
    ("COURT", "CT"),
    ("PLACE", "PL"),
    ("PARKWAY", "PKWY"),
    ("HIGHWAY", "HWY"),
    ("TERRACE", "TER"),
    ("CIRCLE", "CIR"),
    ("SQUARE", "SQ"),
    ("SUITE", "STE"),
    ("APARTMENT", "APT"),
    ("NORTH", "N"),
    ("SOUTH", "S"),
    ("EAST", "E"),
    ("WEST", "W"),
    ("NORTHEAST", "NE"),
    ("NORTHWEST", "NW"),
    ("SOUTHEAST", "SE"),
    ("SOUTHWEST", "SW"),
];

/// Canonical form of an address line for fuzzy comparison
///
/// Upper-cases, drops punctuation, abbreviates street suffixes and
/// directions, and collapses whitespace.
pub fn normalize_address(address: &str) -> String {
    let cleaned: String = address
        .to_uppercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c.is_whitespace() || c == ',' || c == '/' {
                Some(' ')
            } else {
                None
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .map(|token| {
            ABBREVIATIONS
                .iter()
                .find(|(long, _)| *long == token)
                .map_or(token, |(_, short)| *short)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Five-digit postal code, ignoring any ZIP+4 extension
pub fn normalize_postal_code(postal_code: &str) -> String {
    postal_code
        .trim()
        .split('-')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("555 Database LN."), "555 DATABASE LN");
        assert_eq!(normalize_address("555  database lane"), "555 DATABASE LN");
        assert_eq!(normalize_address("12 N.W. 3rd Avenue, Suite 4"), "12 NW 3RD AVE STE 4");
        assert_eq!(normalize_address("  "), "");
    }

    #[test]
    fn test_normalize_postal_code() {
        assert_eq!(normalize_postal_code("94111-2233"), "94111");
        assert_eq!(normalize_postal_code(" 94111 "), "94111");
    }
}
