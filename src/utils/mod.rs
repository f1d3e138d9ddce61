//! Utility functions and helpers.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}

/// Parse the leading numeric value out of a site-rendered field.
///
/// Listing sites render numbers with units and locale separators
/// ("70 m²", "1.200 €", "2,5 Zimmer"). A `.` or `,` followed by exactly
/// three digits at the end of the number is read as a thousands separator,
/// otherwise as the decimal point.
pub fn parse_number(raw: &str) -> Option<f64> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = NUMBER.get_or_init(|| Regex::new(r"\d+(?:[.,]\d+)*").expect("valid regex"));

    let token = re.find(raw)?.as_str();
    let groups: Vec<&str> = token.split(['.', ',']).collect();

    let normalized = match groups.as_slice() {
        [single] => (*single).to_string(),
        [init @ .., last] if last.len() == 3 => {
            // "1.200" or "12.345.678" style thousands grouping
            let mut s: String = init.concat();
            s.push_str(last);
            s
        }
        [init @ .., last] => {
            let mut s: String = init.concat();
            s.push('.');
            s.push_str(last);
            s
        }
        [] => return None,
    };

    normalized.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/path/").unwrap();
        assert_eq!(
            resolve_url(&base, "page.html"),
            "https://example.com/path/page.html"
        );
        assert_eq!(
            resolve_url(&base, "/root.html"),
            "https://example.com/root.html"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_get_domain() {
        assert_eq!(
            get_domain("https://example.com/path"),
            Some("example.com".to_string())
        );
        assert_eq!(
            get_domain("https://sub.example.com:8080/path"),
            Some("sub.example.com".to_string())
        );
        assert_eq!(get_domain("not a url"), None);
    }

    #[test]
    fn test_parse_number_plain() {
        assert_eq!(parse_number("70 m²"), Some(70.0));
        assert_eq!(parse_number("3 Zimmer"), Some(3.0));
    }

    #[test]
    fn test_parse_number_separators() {
        assert_eq!(parse_number("1.200 €"), Some(1200.0));
        assert_eq!(parse_number("760,50"), Some(760.5));
        assert_eq!(parse_number("70,5 m²"), Some(70.5));
        assert_eq!(parse_number("1.234.567"), Some(1_234_567.0));
    }

    #[test]
    fn test_parse_number_missing() {
        assert_eq!(parse_number("Preis auf Anfrage"), None);
        assert_eq!(parse_number(""), None);
    }
}
