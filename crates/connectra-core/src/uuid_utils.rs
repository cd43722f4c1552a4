//! Deterministic identifier and canonicalization helpers.
//!
//! Company and Contact identity is a pure function of a handful of key
//! fields: two CSV rows with identical key fields MUST collapse onto the
//! same relational row. We derive a name-based UUIDv5 under a fixed
//! namespace for every ingested entity instead of gensym-ing a random
//! UUIDv4, so replaying the same batch is idempotent by construction.

use uuid::Uuid;

/// Fixed namespace all connectra entity UUIDs are derived under.
///
/// Using `NAMESPACE_URL` (rather than minting a private namespace) matches
/// the original system's choice and has no bearing on correctness: any
/// fixed namespace produces the same idempotence guarantee.
pub const NAMESPACE: Uuid = Uuid::NAMESPACE_URL;

/// Derive a company's UUID from its name and LinkedIn URL.
///
/// Both inputs are lowercased before hashing; callers should not
/// pre-lowercase since this function is the single source of truth for the
/// derivation.
pub fn company_uuid(name: &str, linkedin_url: &str) -> Uuid {
    let key = format!("{}{}", name.to_lowercase(), linkedin_url.to_lowercase());
    Uuid::new_v5(&NAMESPACE, key.as_bytes())
}

/// Derive a contact's UUID from first name, last name, and LinkedIn URL.
pub fn contact_uuid(first_name: &str, last_name: &str, linkedin_url: &str) -> Uuid {
    let key = format!(
        "{}{}{}",
        first_name.to_lowercase(),
        last_name.to_lowercase(),
        linkedin_url.to_lowercase()
    );
    Uuid::new_v5(&NAMESPACE, key.as_bytes())
}

/// Derive a `FilterValue`'s UUID from its filter key, service, and value.
///
/// This guarantees idempotent upsert: re-materializing the same
/// `(filter_key, service, value)` triple always yields the same row.
pub fn filter_value_uuid(filter_key: &str, service: &str, value: &str) -> Uuid {
    let key = format!("{filter_key}{service}{value}");
    Uuid::new_v5(&NAMESPACE, key.as_bytes())
}

/// Strip a phone number down to a leading `+` (if present) and digits only.
///
/// `clean_phone_number(clean_phone_number(x)) == clean_phone_number(x)` for
/// all `x`: the function is idempotent. An input with no digits cleans to
/// the empty string.
pub fn clean_phone_number(raw: &str) -> String {
    let mut digits = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        }
    }
    if digits.is_empty() {
        return String::new();
    }
    if raw.trim_start().starts_with('+') {
        digits.insert(0, '+');
    }
    digits
}

/// Canonicalize a CSV header or cell: trim leading/trailing non-alphanumeric
/// characters, then collapse internal whitespace runs to a single space.
pub fn canonicalize_cell(raw: &str) -> String {
    let trimmed = raw.trim_matches(|c: char| !c.is_alphanumeric());
    let mut out = String::with_capacity(trimmed.len());
    let mut last_was_space = false;
    for c in trimmed.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out
}

/// Split a comma-separated multi-valued column (`industries`, `keywords`,
/// `technologies`, `departments`) into trimmed, lowercased, non-empty parts.
pub fn split_multi_valued(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|part| part.trim().to_lowercase())
        .filter(|part| !part.is_empty())
        .collect()
}

/// Derive `normalized_domain` from an email cell (preferred) or a website
/// cell (fallback), stripping the URL scheme and a leading `www.`.
pub fn normalized_domain(email: Option<&str>, website: Option<&str>) -> String {
    if let Some(email) = email {
        if let Some((_, domain)) = email.rsplit_once('@') {
            if !domain.trim().is_empty() {
                return domain.trim().to_lowercase();
            }
        }
    }
    let Some(website) = website else {
        return String::new();
    };
    let mut host = website.trim().to_lowercase();
    for scheme in ["https://", "http://"] {
        if let Some(rest) = host.strip_prefix(scheme) {
            host = rest.to_string();
            break;
        }
    }
    if let Some(rest) = host.strip_prefix("www.") {
        host = rest.to_string();
    }
    host.split('/').next().unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_uuid_is_deterministic() {
        let a = company_uuid("Acme Inc", "https://linkedin.com/acme");
        let b = company_uuid("Acme Inc", "https://linkedin.com/acme");
        assert_eq!(a, b);
    }

    #[test]
    fn test_company_uuid_case_insensitive() {
        let a = company_uuid("Acme Inc", "HTTPS://LINKEDIN.COM/ACME");
        let b = company_uuid("acme inc", "https://linkedin.com/acme");
        assert_eq!(a, b);
    }

    #[test]
    fn test_company_uuid_differs_by_name() {
        let a = company_uuid("Acme Inc", "https://linkedin.com/acme");
        let b = company_uuid("Other Inc", "https://linkedin.com/acme");
        assert_ne!(a, b);
    }

    #[test]
    fn test_contact_uuid_is_deterministic() {
        let a = contact_uuid("Jane", "Doe", "https://linkedin.com/jane");
        let b = contact_uuid("Jane", "Doe", "https://linkedin.com/jane");
        assert_eq!(a, b);
    }

    #[test]
    fn test_filter_value_uuid_is_deterministic() {
        let a = filter_value_uuid("industry", "companies", "fintech");
        let b = filter_value_uuid("industry", "companies", "fintech");
        assert_eq!(a, b);
    }

    #[test]
    fn test_filter_value_uuid_differs_by_service() {
        let a = filter_value_uuid("industry", "companies", "fintech");
        let b = filter_value_uuid("industry", "contacts", "fintech");
        assert_ne!(a, b);
    }

    #[test]
    fn test_clean_phone_number_strips_formatting() {
        assert_eq!(clean_phone_number("+1-234-567-8900"), "+12345678900");
    }

    #[test]
    fn test_clean_phone_number_empty_input() {
        assert_eq!(clean_phone_number(""), "");
    }

    #[test]
    fn test_clean_phone_number_no_digits() {
        assert_eq!(clean_phone_number("+--- ()"), "");
    }

    #[test]
    fn test_clean_phone_number_idempotent() {
        let once = clean_phone_number("+1 (234) 567-8900");
        let twice = clean_phone_number(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_clean_phone_number_no_plus() {
        assert_eq!(clean_phone_number("234.567.8900"), "2345678900");
    }

    #[test]
    fn test_canonicalize_cell_trims_and_collapses() {
        assert_eq!(canonicalize_cell("  *Acme   Inc.* "), "Acme Inc");
    }

    #[test]
    fn test_canonicalize_cell_all_punctuation() {
        assert_eq!(canonicalize_cell("***"), "");
    }

    #[test]
    fn test_split_multi_valued_drops_empties() {
        let parts = split_multi_valued("Fintech, , SaaS,Enterprise ");
        assert_eq!(parts, vec!["fintech", "saas", "enterprise"]);
    }

    #[test]
    fn test_split_multi_valued_empty_input() {
        assert!(split_multi_valued("").is_empty());
    }

    #[test]
    fn test_normalized_domain_from_email() {
        assert_eq!(
            normalized_domain(Some("Jane@Acme.COM"), Some("https://other.com")),
            "acme.com"
        );
    }

    #[test]
    fn test_normalized_domain_from_website_fallback() {
        assert_eq!(
            normalized_domain(None, Some("https://www.Acme.com/about")),
            "acme.com"
        );
    }

    #[test]
    fn test_normalized_domain_no_inputs() {
        assert_eq!(normalized_domain(None, None), "");
    }
}
