//! Contact entity: canonical relational record and search-engine projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::uuid_utils;

/// Canonical Contact record.
///
/// `uuid` is a pure function of `first_name`, `last_name`, and
/// `linkedin_url` (§3.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub uuid: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub company_id: Option<Uuid>,
    pub title: Option<String>,
    pub departments: Vec<String>,

    pub phone_mobile: String,
    pub phone_work_direct: String,
    pub phone_home: String,
    pub phone_other: String,

    pub email_status: Option<String>,
    pub seniority: Option<String>,

    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,

    pub linkedin_url: Option<String>,
    pub facebook_url: Option<String>,
    pub twitter_url: Option<String>,

    pub stage: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Contact {
    /// Merge an incoming record into `self`, keeping zero-valued incoming
    /// fields and overwriting otherwise (§4.5 partial-update semantics).
    /// `created_at` is always preserved.
    pub fn merge_from(&mut self, incoming: &Contact) {
        let created_at = self.created_at;

        if !incoming.first_name.trim().is_empty() {
            self.first_name = incoming.first_name.clone();
        }
        if !incoming.last_name.trim().is_empty() {
            self.last_name = incoming.last_name.clone();
        }
        if !incoming.email.trim().is_empty() {
            self.email = incoming.email.clone();
        }
        if incoming.company_id.is_some() {
            self.company_id = incoming.company_id;
        }
        if incoming.title.is_some() {
            self.title = incoming.title.clone();
        }
        if !incoming.departments.is_empty() {
            self.departments = incoming.departments.clone();
        }
        if !incoming.phone_mobile.is_empty() {
            self.phone_mobile = incoming.phone_mobile.clone();
        }
        if !incoming.phone_work_direct.is_empty() {
            self.phone_work_direct = incoming.phone_work_direct.clone();
        }
        if !incoming.phone_home.is_empty() {
            self.phone_home = incoming.phone_home.clone();
        }
        if !incoming.phone_other.is_empty() {
            self.phone_other = incoming.phone_other.clone();
        }
        if incoming.email_status.is_some() {
            self.email_status = incoming.email_status.clone();
        }
        if incoming.seniority.is_some() {
            self.seniority = incoming.seniority.clone();
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
        if incoming.linkedin_url.is_some() {
            self.linkedin_url = incoming.linkedin_url.clone();
        }
        if incoming.facebook_url.is_some() {
            self.facebook_url = incoming.facebook_url.clone();
        }
        if incoming.twitter_url.is_some() {
            self.twitter_url = incoming.twitter_url.clone();
        }
        if incoming.stage.is_some() {
            self.stage = incoming.stage.clone();
        }

        self.created_at = created_at;
        self.updated_at = Utc::now();
    }

    /// True if `company_id` differs, which requires re-fetching the
    /// company's denormalized fields for the search document (§4.5).
    pub fn company_changed(&self, previous: &Contact) -> bool {
        self.company_id != previous.company_id
    }
}

/// Raw CSV row fields relevant to deriving a `Contact`.
#[derive(Debug, Clone, Default)]
pub struct ContactRow {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub company_linkedin_url: Option<String>,
    pub person_linkedin_url: Option<String>,
    pub title: Option<String>,
    pub departments: Option<String>,
    pub phone_mobile: Option<String>,
    pub phone_work_direct: Option<String>,
    pub phone_home: Option<String>,
    pub phone_other: Option<String>,
    pub email_status: Option<String>,
    pub seniority: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub facebook_url: Option<String>,
    pub twitter_url: Option<String>,
    pub stage: Option<String>,
}

impl ContactRow {
    /// Derive the canonical `Contact` per §4.3's row→entity rules. The
    /// contact's company is linked via `company_linkedin_url` shared with
    /// the paired `CompanyRow`'s key fields; the caller resolves the actual
    /// `company_id` after deriving the sibling `Company`.
    pub fn derive(&self) -> Contact {
        let person_linkedin_url = self.person_linkedin_url.clone().unwrap_or_default();
        let uuid =
            uuid_utils::contact_uuid(&self.first_name, &self.last_name, &person_linkedin_url);
        let now = Utc::now();

        Contact {
            uuid,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone().unwrap_or_default().to_lowercase(),
            company_id: None,
            title: self.title.clone(),
            departments: self
                .departments
                .as_deref()
                .map(uuid_utils::split_multi_valued)
                .unwrap_or_default(),
            phone_mobile: uuid_utils::clean_phone_number(
                self.phone_mobile.as_deref().unwrap_or_default(),
            ),
            phone_work_direct: uuid_utils::clean_phone_number(
                self.phone_work_direct.as_deref().unwrap_or_default(),
            ),
            phone_home: uuid_utils::clean_phone_number(
                self.phone_home.as_deref().unwrap_or_default(),
            ),
            phone_other: uuid_utils::clean_phone_number(
                self.phone_other.as_deref().unwrap_or_default(),
            ),
            email_status: self.email_status.clone(),
            seniority: self.seniority.clone(),
            city: self.city.clone().map(|s| s.to_lowercase()),
            state: self.state.clone().map(|s| s.to_lowercase()),
            country: self.country.clone().map(|s| s.to_lowercase()),
            linkedin_url: self.person_linkedin_url.clone().map(|s| s.to_lowercase()),
            facebook_url: self.facebook_url.clone().map(|s| s.to_lowercase()),
            twitter_url: self.twitter_url.clone().map(|s| s.to_lowercase()),
            stage: self.stage.clone(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// Search-engine projection of a Contact, with company fields denormalized
/// onto the document so filtering never needs a join (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactDocument {
    #[serde(flatten)]
    pub contact: Contact,

    pub company_name: Option<String>,
    pub company_industries: Vec<String>,
    pub company_keywords: Vec<String>,
    pub company_technologies: Vec<String>,
    pub company_departments: Vec<String>,
    pub company_normalized_domain: Option<String>,
}

impl ContactDocument {
    /// Build a document by pairing a `Contact` with its company's
    /// denormalized fields. `company` is `None` when `company_id` is empty.
    pub fn denormalize(contact: Contact, company: Option<&super::company::Company>) -> Self {
        ContactDocument {
            contact,
            company_name: company.map(|c| c.name.clone()),
            company_industries: company.map(|c| c.industries.clone()).unwrap_or_default(),
            company_keywords: company.map(|c| c.keywords.clone()).unwrap_or_default(),
            company_technologies: company.map(|c| c.technologies.clone()).unwrap_or_default(),
            company_departments: company.map(|c| c.departments.clone()).unwrap_or_default(),
            company_normalized_domain: company.map(|c| c.normalized_domain.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::company::CompanyRow;

    fn sample_row() -> ContactRow {
        ContactRow {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: Some("Jane@Acme.com".to_string()),
            person_linkedin_url: Some("https://linkedin.com/jane".to_string()),
            phone_mobile: Some("+1 (234) 567-8900".to_string()),
            departments: Some("Engineering, Sales".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_derive_uuid_matches_key_fields() {
        let contact = sample_row().derive();
        let expected =
            uuid_utils::contact_uuid("Jane", "Doe", "https://linkedin.com/jane");
        assert_eq!(contact.uuid, expected);
    }

    #[test]
    fn test_derive_email_lowercased() {
        let contact = sample_row().derive();
        assert_eq!(contact.email, "jane@acme.com");
    }

    #[test]
    fn test_derive_departments_split() {
        let contact = sample_row().derive();
        assert_eq!(contact.departments, vec!["engineering", "sales"]);
    }

    #[test]
    fn test_derive_phone_cleaned() {
        let contact = sample_row().derive();
        assert_eq!(contact.phone_mobile, "+12345678900");
    }

    #[test]
    fn test_company_changed_detects_diff() {
        let mut a = sample_row().derive();
        let b = a.clone();
        assert!(!a.company_changed(&b));
        a.company_id = Some(Uuid::new_v4());
        assert!(a.company_changed(&b));
    }

    #[test]
    fn test_denormalize_with_company() {
        let contact = sample_row().derive();
        let company = CompanyRow {
            name: "Acme Inc".to_string(),
            industries: Some("fintech".to_string()),
            ..Default::default()
        }
        .derive();

        let doc = ContactDocument::denormalize(contact, Some(&company));
        assert_eq!(doc.company_name.as_deref(), Some("Acme Inc"));
        assert_eq!(doc.company_industries, vec!["fintech"]);
    }

    #[test]
    fn test_denormalize_without_company() {
        let contact = sample_row().derive();
        let doc = ContactDocument::denormalize(contact, None);
        assert!(doc.company_name.is_none());
        assert!(doc.company_industries.is_empty());
    }

    #[test]
    fn test_merge_from_all_zero_leaves_unchanged() {
        let mut existing = sample_row().derive();
        let original = existing.clone();
        let mut empty_incoming = existing.clone();
        empty_incoming.first_name = String::new();
        empty_incoming.departments = vec![];
        empty_incoming.phone_mobile = String::new();

        existing.merge_from(&empty_incoming);

        assert_eq!(existing.first_name, original.first_name);
        assert_eq!(existing.departments, original.departments);
        assert_eq!(existing.phone_mobile, original.phone_mobile);
    }
}
