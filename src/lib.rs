pub mod config;
pub mod dataset;
pub mod error;
pub mod ident;
pub mod metrics;
pub mod query;
pub mod server;
pub mod storage;
