//! `JobHandler` implementations for each supported `JobType` (§4.3, §4.9).

pub mod export_csv;
pub mod insert_csv;
