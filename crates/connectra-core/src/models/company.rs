//! Company entity: canonical relational record and search-engine projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::uuid_utils;

/// Canonical Company record.
///
/// `uuid` is a pure function of `name` and `linkedin_url` (§3.1): two rows
/// with identical key fields collapse onto one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub uuid: Uuid,
    pub name: String,
    pub normalized_domain: String,

    pub employees_count: Option<i64>,
    pub annual_revenue: Option<f64>,
    pub total_funding: Option<f64>,
    pub latest_funding: Option<String>,
    pub latest_funding_amount: Option<f64>,
    pub last_raised_at: Option<DateTime<Utc>>,

    pub industries: Vec<String>,
    pub keywords: Vec<String>,
    pub technologies: Vec<String>,
    pub departments: Vec<String>,

    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,

    pub website: Option<String>,
    pub linkedin_url: Option<String>,
    pub facebook_url: Option<String>,
    pub twitter_url: Option<String>,

    pub phone: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Company {
    /// True if a field value is the "zero value" for partial-update merge
    /// semantics (§4.5): empty strings and empty collections are zero,
    /// `None` is zero, non-empty values are not.
    pub fn merge_from(&mut self, incoming: &Company) {
        let created_at = self.created_at;

        if !incoming.name.trim().is_empty() {
            self.name = incoming.name.clone();
        }
        if !incoming.normalized_domain.trim().is_empty() {
            self.normalized_domain = incoming.normalized_domain.clone();
        }
        if incoming.employees_count.is_some() {
            self.employees_count = incoming.employees_count;
        }
        if incoming.annual_revenue.is_some() {
            self.annual_revenue = incoming.annual_revenue;
        }
        if incoming.total_funding.is_some() {
            self.total_funding = incoming.total_funding;
        }
        if incoming.latest_funding.is_some() {
            self.latest_funding = incoming.latest_funding.clone();
        }
        if incoming.latest_funding_amount.is_some() {
            self.latest_funding_amount = incoming.latest_funding_amount;
        }
        if incoming.last_raised_at.is_some() {
            self.last_raised_at = incoming.last_raised_at;
        }
        if !incoming.industries.is_empty() {
            self.industries = incoming.industries.clone();
        }
        if !incoming.keywords.is_empty() {
            self.keywords = incoming.keywords.clone();
        }
        if !incoming.technologies.is_empty() {
            self.technologies = incoming.technologies.clone();
        }
        if !incoming.departments.is_empty() {
            self.departments = incoming.departments.clone();
        }
        if incoming.city.is_some() {
            self.city = incoming.city.clone();
        }
        if incoming.state.is_some() {
            self.state = incoming.state.clone();
        }
        if incoming.country.is_some() {
            self.country = incoming.country.clone();
        }
        if incoming.website.is_some() {
            self.website = incoming.website.clone();
        }
        if incoming.linkedin_url.is_some() {
            self.linkedin_url = incoming.linkedin_url.clone();
        }
        if incoming.facebook_url.is_some() {
            self.facebook_url = incoming.facebook_url.clone();
        }
        if incoming.twitter_url.is_some() {
            self.twitter_url = incoming.twitter_url.clone();
        }
        if !incoming.phone.is_empty() {
            self.phone = incoming.phone.clone();
        }

        self.created_at = created_at;
        self.updated_at = Utc::now();
    }
}

/// Raw CSV row fields relevant to deriving a `Company`.
#[derive(Debug, Clone, Default)]
pub struct CompanyRow {
    pub name: String,
    pub email: Option<String>,
    pub website: Option<String>,
    pub linkedin_url: Option<String>,
    pub facebook_url: Option<String>,
    pub twitter_url: Option<String>,
    pub industries: Option<String>,
    pub keywords: Option<String>,
    pub technologies: Option<String>,
    pub departments: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub employees_count: Option<i64>,
    pub annual_revenue: Option<f64>,
    pub total_funding: Option<f64>,
    pub latest_funding: Option<String>,
    pub latest_funding_amount: Option<f64>,
    pub last_raised_at: Option<DateTime<Utc>>,
}

impl CompanyRow {
    /// Derive the canonical `Company` per §4.3's row→entity rules.
    pub fn derive(&self) -> Company {
        let linkedin_url = self.linkedin_url.clone().unwrap_or_default();
        let uuid = uuid_utils::company_uuid(&self.name, &linkedin_url);
        let now = Utc::now();

        Company {
            uuid,
            name: self.name.clone(),
            normalized_domain: uuid_utils::normalized_domain(
                self.email.as_deref(),
                self.website.as_deref(),
            ),
            employees_count: self.employees_count,
            annual_revenue: self.annual_revenue,
            total_funding: self.total_funding,
            latest_funding: self.latest_funding.clone(),
            latest_funding_amount: self.latest_funding_amount,
            last_raised_at: self.last_raised_at,
            industries: self
                .industries
                .as_deref()
                .map(uuid_utils::split_multi_valued)
                .unwrap_or_default(),
            keywords: self
                .keywords
                .as_deref()
                .map(uuid_utils::split_multi_valued)
                .unwrap_or_default(),
            technologies: self
                .technologies
                .as_deref()
                .map(uuid_utils::split_multi_valued)
                .unwrap_or_default(),
            departments: self
                .departments
                .as_deref()
                .map(uuid_utils::split_multi_valued)
                .unwrap_or_default(),
            city: self.city.clone().map(|s| s.to_lowercase()),
            state: self.state.clone().map(|s| s.to_lowercase()),
            country: self.country.clone().map(|s| s.to_lowercase()),
            website: self.website.clone().map(|s| s.to_lowercase()),
            linkedin_url: self.linkedin_url.clone().map(|s| s.to_lowercase()),
            facebook_url: self.facebook_url.clone().map(|s| s.to_lowercase()),
            twitter_url: self.twitter_url.clone().map(|s| s.to_lowercase()),
            phone: uuid_utils::clean_phone_number(self.phone.as_deref().unwrap_or_default()),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// Search-engine projection of a Company document. Identical shape to the
/// relational record for companies (no denormalization needed; contacts are
/// the side that denormalizes company fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyDocument {
    #[serde(flatten)]
    pub company: Company,
}

impl From<Company> for CompanyDocument {
    fn from(company: Company) -> Self {
        CompanyDocument { company }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> CompanyRow {
        CompanyRow {
            name: "Acme Inc".to_string(),
            email: Some("jane@acme.com".to_string()),
            website: Some("https://acme.com".to_string()),
            linkedin_url: Some("https://linkedin.com/acme".to_string()),
            industries: Some("Fintech, SaaS".to_string()),
            phone: Some("+1-234-567-8900".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_derive_uuid_matches_key_fields() {
        let row = sample_row();
        let company = row.derive();
        let expected = uuid_utils::company_uuid("Acme Inc", "https://linkedin.com/acme");
        assert_eq!(company.uuid, expected);
    }

    #[test]
    fn test_derive_replay_is_idempotent() {
        let row = sample_row();
        let a = row.derive();
        let b = row.derive();
        assert_eq!(a.uuid, b.uuid);
        assert_eq!(a.normalized_domain, b.normalized_domain);
    }

    #[test]
    fn test_derive_normalized_domain_from_email() {
        let company = sample_row().derive();
        assert_eq!(company.normalized_domain, "acme.com");
    }

    #[test]
    fn test_derive_industries_split() {
        let company = sample_row().derive();
        assert_eq!(company.industries, vec!["fintech", "saas"]);
    }

    #[test]
    fn test_derive_phone_cleaned() {
        let company = sample_row().derive();
        assert_eq!(company.phone, "+12345678900");
    }

    #[test]
    fn test_merge_from_all_zero_leaves_unchanged() {
        let mut existing = sample_row().derive();
        let original = existing.clone();
        let empty_incoming = Company {
            uuid: existing.uuid,
            name: String::new(),
            normalized_domain: String::new(),
            employees_count: None,
            annual_revenue: None,
            total_funding: None,
            latest_funding: None,
            latest_funding_amount: None,
            last_raised_at: None,
            industries: vec![],
            keywords: vec![],
            technologies: vec![],
            departments: vec![],
            city: None,
            state: None,
            country: None,
            website: None,
            linkedin_url: None,
            facebook_url: None,
            twitter_url: None,
            phone: String::new(),
            created_at: existing.created_at,
            updated_at: existing.updated_at,
            deleted_at: None,
        };

        existing.merge_from(&empty_incoming);

        assert_eq!(existing.name, original.name);
        assert_eq!(existing.industries, original.industries);
        assert_eq!(existing.phone, original.phone);
        assert_eq!(existing.created_at, original.created_at);
    }

    #[test]
    fn test_merge_from_overwrites_non_zero_fields() {
        let mut existing = sample_row().derive();
        let mut incoming = existing.clone();
        incoming.name = "Acme International".to_string();
        incoming.industries = vec!["biotech".to_string()];

        existing.merge_from(&incoming);

        assert_eq!(existing.name, "Acme International");
        assert_eq!(existing.industries, vec!["biotech"]);
    }
}
