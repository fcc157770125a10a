pub mod auth;
pub mod chain;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod models;
pub mod retry;
pub mod service;
pub mod spec_filter;
pub mod transport;

pub use crate::config::Config;
pub use crate::error::{AssistantError, Result};
pub use crate::service::AssistantService;
pub use crate::spec_filter::filter_openapi_spec;
