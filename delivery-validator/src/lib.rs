pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod report;
pub mod source;
pub mod validation;
