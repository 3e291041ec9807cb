//! Configuration module

pub mod tls_config;

pub use tls_config::TlsConfig;
