//! Canonical entity types shared across every connectra crate.

pub mod company;
pub mod contact;
pub mod filter;
pub mod job;
pub mod vql;

pub use company::{Company, CompanyDocument, CompanyRow};
pub use contact::{Contact, ContactDocument, ContactRow};
pub use filter::{FilterDefinition, FilterValue, FilterValueResponse, Service};
pub use job::{
    DagNode, Edge, ExportCsvFilePayload, InsertCsvFilePayload, Job, JobResponse, JobStatus,
    JobType, RunMode,
};
pub use vql::{
    CompanyConfig, KeywordMatchClause, KeywordValue, OrderBy, OrderDirection, RangeBound,
    RangeQueryClause, SearchType, TextMatch, TextMatchClause, VqlQuery, WhereClause,
};
