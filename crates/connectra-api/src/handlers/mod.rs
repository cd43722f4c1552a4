pub mod common;
pub mod companies;
pub mod contacts;
pub mod health;
