pub mod actions;
pub mod config;
pub mod contract;
pub mod core_service;
pub mod discovery;
pub mod logging;
pub mod matcher;
pub mod model;
pub mod normalizer;
pub mod profile_store;
pub mod query_dsl;
pub mod ranking;
pub mod runtime;
pub mod search;
pub mod session;
pub mod settings;
pub mod transport;
