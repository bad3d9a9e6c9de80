pub mod connection_manager;
pub mod error;
pub mod executor;
pub mod models;
pub mod response_builder;
pub mod retry;
pub mod server;
pub mod service;
pub mod transaction;
pub mod udbc;
#[cfg(feature = "mysql")]
pub mod udbc_mysql;

pub use service::DbService;
