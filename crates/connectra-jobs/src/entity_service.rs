//! `EntityService`: per-entity CRUD, bulk upsert fan-out, and filter-value
//! derivation (§4.4, §4.5).

use std::collections::HashMap;
use std::sync::Arc;

use connectra_core::{
    Company, CompanyDocument, CompanyRepository, Contact, ContactDocument, ContactRepository,
    Error, FilterDefinition, FilterRepository, FilterValue, IndexOperation, IndexOperationKind,
    Result, Service, VqlQuery,
};
use uuid::Uuid;

use crate::index_queue::IndexQueue;

const COMPANIES_INDEX: &str = "companies";
const CONTACTS_INDEX: &str = "contacts";

/// Dedup a slice by `uuid`, keeping only the **first** occurrence of each
/// UUID (§4.4 step 2 — distinct from the relational adapters' bulk_upsert,
/// which keeps the *last*: the two dedup passes serve different call sites).
fn dedup_keep_first<T: Clone>(items: &[T], uuid_of: impl Fn(&T) -> Uuid) -> Vec<T> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if seen.insert(uuid_of(item)) {
            out.push(item.clone());
        }
    }
    out
}

/// Result of a batch bulk-upsert fan-out: every branch runs regardless of
/// earlier failures, and all errors are collected (§4.4 step 4).
#[derive(Debug, Default)]
pub struct BulkUpsertOutcome {
    pub companies_upserted: usize,
    pub contacts_upserted: usize,
    pub errors: Vec<Error>,
}

impl BulkUpsertOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct EntityService {
    companies: Arc<dyn CompanyRepository>,
    contacts: Arc<dyn ContactRepository>,
    filters: Arc<dyn FilterRepository>,
    search_companies: Arc<dyn connectra_core::SearchIndex>,
    search_contacts: Arc<dyn connectra_core::SearchIndex>,
    index_queue: Arc<IndexQueue>,
}

impl EntityService {
    pub fn new(
        companies: Arc<dyn CompanyRepository>,
        contacts: Arc<dyn ContactRepository>,
        filters: Arc<dyn FilterRepository>,
        search_companies: Arc<dyn connectra_core::SearchIndex>,
        search_contacts: Arc<dyn connectra_core::SearchIndex>,
        index_queue: Arc<IndexQueue>,
    ) -> Self {
        Self {
            companies,
            contacts,
            filters,
            search_companies,
            search_contacts,
            index_queue,
        }
    }

    /// Bulk upsert a batch of derived companies and contacts (§4.4). Runs
    /// four concurrent branches with a wait barrier; errors from every
    /// branch are collected rather than short-circuiting.
    pub async fn bulk_upsert(
        &self,
        companies: Vec<Company>,
        contacts: Vec<Contact>,
    ) -> Result<BulkUpsertOutcome> {
        let pg_companies = dedup_keep_first(&companies, |c| c.uuid);
        let pg_contacts = dedup_keep_first(&contacts, |c| c.uuid);
        let search_companies_batch = dedup_keep_first(&companies, |c| c.uuid);
        let search_contacts_batch = dedup_keep_first(&contacts, |c| c.uuid);

        let filter_values = self.derive_filter_values(&pg_companies, &pg_contacts).await?;

        let company_lookup: HashMap<Uuid, &Company> =
            pg_companies.iter().map(|c| (c.uuid, c)).collect();

        let (companies_result, contacts_result, search_companies_result, search_contacts_result, filters_result) = tokio::join!(
            self.companies.bulk_upsert(&pg_companies),
            self.contacts.bulk_upsert(&pg_contacts),
            self.bulk_index_companies(&search_companies_batch),
            self.bulk_index_contacts(&search_contacts_batch, &company_lookup),
            self.filters.bulk_upsert_values(&filter_values),
        );

        let mut outcome = BulkUpsertOutcome {
            companies_upserted: pg_companies.len(),
            contacts_upserted: pg_contacts.len(),
            errors: Vec::new(),
        };

        for result in [
            companies_result,
            contacts_result,
            search_companies_result,
            search_contacts_result,
            filters_result,
        ] {
            if let Err(err) = result {
                outcome.errors.push(err);
            }
        }

        Ok(outcome)
    }

    async fn bulk_index_companies(&self, companies: &[Company]) -> Result<()> {
        if companies.is_empty() {
            return Ok(());
        }
        let docs: Vec<(Uuid, serde_json::Value)> = companies
            .iter()
            .map(|c| {
                let doc = CompanyDocument::from(c.clone());
                (c.uuid, serde_json::to_value(doc).unwrap_or_default())
            })
            .collect();
        self.search_companies.bulk_index(COMPANIES_INDEX, &docs).await
    }

    async fn bulk_index_contacts(
        &self,
        contacts: &[Contact],
        company_lookup: &HashMap<Uuid, &Company>,
    ) -> Result<()> {
        if contacts.is_empty() {
            return Ok(());
        }
        let docs: Vec<(Uuid, serde_json::Value)> = contacts
            .iter()
            .map(|contact| {
                let company = contact.company_id.and_then(|id| company_lookup.get(&id).copied());
                let doc = ContactDocument::denormalize(contact.clone(), company);
                (contact.uuid, serde_json::to_value(doc).unwrap_or_default())
            })
            .collect();
        self.search_contacts.bulk_index(CONTACTS_INDEX, &docs).await
    }

    /// Materialize `FilterValue`s for every enabled non-direct-derived filter
    /// definition touched by this batch, deduplicated by deterministic UUID
    /// (§4.4 step 3).
    async fn derive_filter_values(
        &self,
        companies: &[Company],
        contacts: &[Contact],
    ) -> Result<Vec<FilterValue>> {
        let company_defs = self.filters.list_definitions("companies").await?;
        let contact_defs = self.filters.list_definitions("contacts").await?;

        let mut values = Vec::new();
        for def in company_defs.iter().filter(|d| !d.direct_derived && d.active) {
            values.extend(derive_values_for_companies(def, companies));
        }
        for def in contact_defs.iter().filter(|d| !d.direct_derived && d.active) {
            values.extend(derive_values_for_contacts(def, contacts));
        }

        Ok(dedup_keep_first(&values, |v| v.uuid))
    }

    /// Resolve one cursor-paginated page of a VQL query against `service`,
    /// returning the matched entities as their search-document JSON
    /// projections plus the next page's cursor, if any (§4.6, §4.9).
    pub async fn list_by_vql(
        &self,
        service: Service,
        vql: &VqlQuery,
    ) -> Result<(Vec<serde_json::Value>, Option<String>)> {
        let body = connectra_search::translate(vql, false)?;

        let page = match service {
            Service::Companies => self.search_companies.search(COMPANIES_INDEX, body).await?,
            Service::Contacts => self.search_contacts.search(CONTACTS_INDEX, body).await?,
        };

        let mut rows = Vec::with_capacity(page.ids.len());
        match service {
            Service::Companies => {
                for company in self.companies.get_many(&page.ids).await? {
                    rows.push(serde_json::to_value(CompanyDocument::from(company))?);
                }
            }
            Service::Contacts => {
                for id in &page.ids {
                    if let Some(contact) = self.contacts.get(*id).await? {
                        let company = match contact.company_id {
                            Some(company_id) => self.companies.get(company_id).await?,
                            None => None,
                        };
                        rows.push(serde_json::to_value(ContactDocument::denormalize(
                            contact,
                            company.as_ref(),
                        ))?);
                    }
                }
            }
        }

        Ok((rows, page.next_cursor))
    }

    /// Count matches for a VQL query against `service`, bypassing pagination
    /// (§4.6).
    pub async fn count_by_vql(&self, service: Service, vql: &VqlQuery) -> Result<i64> {
        let body = connectra_search::translate(vql, true)?;
        match service {
            Service::Companies => self.search_companies.count(COMPANIES_INDEX, body).await,
            Service::Contacts => self.search_contacts.count(CONTACTS_INDEX, body).await,
        }
    }

    /// Fetch a single company (used to hydrate denormalized contact fields).
    pub async fn get_company(&self, uuid: Uuid) -> Result<Option<Company>> {
        self.companies.get(uuid).await
    }

    /// Create or fully overwrite a single company; the search write is
    /// enqueued asynchronously (§4.5).
    pub async fn upsert_company(&self, company: Company) -> Result<()> {
        self.companies.upsert_one(&company).await?;
        let document = serde_json::to_value(CompanyDocument::from(company.clone()))?;
        self.index_queue.enqueue(IndexOperation {
            kind: IndexOperationKind::Update,
            index_name: COMPANIES_INDEX.to_string(),
            doc_id: company.uuid,
            document: Some(document),
        });
        Ok(())
    }

    /// Partial update: merge `incoming` onto the existing record, then
    /// re-enqueue the search document (§4.5). For contacts whose
    /// `company_id` changed, re-fetch the new company to refresh denormalized
    /// fields.
    pub async fn update_company(&self, incoming: Company) -> Result<Company> {
        let mut existing = self
            .companies
            .get(incoming.uuid)
            .await?
            .ok_or_else(|| Error::NotFound(format!("company {} not found", incoming.uuid)))?;
        existing.merge_from(&incoming);
        self.companies.upsert_one(&existing).await?;
        let document = serde_json::to_value(CompanyDocument::from(existing.clone()))?;
        self.index_queue.enqueue(IndexOperation {
            kind: IndexOperationKind::Update,
            index_name: COMPANIES_INDEX.to_string(),
            doc_id: existing.uuid,
            document: Some(document),
        });
        Ok(existing)
    }

    pub async fn delete_company(&self, uuid: Uuid) -> Result<()> {
        self.companies.soft_delete(uuid).await?;
        self.index_queue.enqueue(IndexOperation {
            kind: IndexOperationKind::Delete,
            index_name: COMPANIES_INDEX.to_string(),
            doc_id: uuid,
            document: None,
        });
        Ok(())
    }

    pub async fn get_contact(&self, uuid: Uuid) -> Result<Option<Contact>> {
        self.contacts.get(uuid).await
    }

    pub async fn upsert_contact(&self, contact: Contact) -> Result<()> {
        self.contacts.upsert_one(&contact).await?;
        let company = match contact.company_id {
            Some(id) => self.companies.get(id).await?,
            None => None,
        };
        let document = serde_json::to_value(ContactDocument::denormalize(
            contact.clone(),
            company.as_ref(),
        ))?;
        self.index_queue.enqueue(IndexOperation {
            kind: IndexOperationKind::Update,
            index_name: CONTACTS_INDEX.to_string(),
            doc_id: contact.uuid,
            document: Some(document),
        });
        Ok(())
    }

    /// Merge-update a contact, then re-fetch the current `company_id`'s
    /// denormalized fields for the search document (§4.5: required whenever
    /// `company_id` changed; harmless and idempotent otherwise).
    pub async fn update_contact(&self, incoming: Contact) -> Result<Contact> {
        let mut existing = self
            .contacts
            .get(incoming.uuid)
            .await?
            .ok_or_else(|| Error::NotFound(format!("contact {} not found", incoming.uuid)))?;
        existing.merge_from(&incoming);
        self.contacts.upsert_one(&existing).await?;

        let company = match existing.company_id {
            Some(id) => self.companies.get(id).await?,
            None => None,
        };

        let document = serde_json::to_value(ContactDocument::denormalize(
            existing.clone(),
            company.as_ref(),
        ))?;
        self.index_queue.enqueue(IndexOperation {
            kind: IndexOperationKind::Update,
            index_name: CONTACTS_INDEX.to_string(),
            doc_id: existing.uuid,
            document: Some(document),
        });
        Ok(existing)
    }

    pub async fn delete_contact(&self, uuid: Uuid) -> Result<()> {
        self.contacts.soft_delete(uuid).await?;
        self.index_queue.enqueue(IndexOperation {
            kind: IndexOperationKind::Delete,
            index_name: CONTACTS_INDEX.to_string(),
            doc_id: uuid,
            document: None,
        });
        Ok(())
    }
}

fn derive_values_for_companies(def: &FilterDefinition, companies: &[Company]) -> Vec<FilterValue> {
    companies
        .iter()
        .flat_map(|company| company_field_values(def, company))
        .map(|value| FilterValue::new(Service::Companies, def.key.clone(), value))
        .collect()
}

fn derive_values_for_contacts(def: &FilterDefinition, contacts: &[Contact]) -> Vec<FilterValue> {
    contacts
        .iter()
        .flat_map(|contact| contact_field_values(def, contact))
        .map(|value| FilterValue::new(Service::Contacts, def.key.clone(), value))
        .collect()
}

fn company_field_values(def: &FilterDefinition, company: &Company) -> Vec<String> {
    match def.key.as_str() {
        "industries" => company.industries.clone(),
        "keywords" => company.keywords.clone(),
        "technologies" => company.technologies.clone(),
        "departments" => company.departments.clone(),
        "country" => company.country.iter().cloned().collect(),
        "city" => company.city.iter().cloned().collect(),
        "state" => company.state.iter().cloned().collect(),
        _ => Vec::new(),
    }
}

fn contact_field_values(def: &FilterDefinition, contact: &Contact) -> Vec<String> {
    match def.key.as_str() {
        "departments" => contact.departments.clone(),
        "seniority" => contact.seniority.iter().cloned().collect(),
        "stage" => contact.stage.iter().cloned().collect(),
        "country" => contact.country.iter().cloned().collect(),
        "city" => contact.city.iter().cloned().collect(),
        "state" => contact.state.iter().cloned().collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keep_first_retains_first_occurrence() {
        let uuid = Uuid::new_v4();
        let items = vec![(uuid, "first"), (uuid, "second"), (Uuid::new_v4(), "third")];
        let deduped = dedup_keep_first(&items, |(id, _)| *id);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].1, "first");
    }
}
