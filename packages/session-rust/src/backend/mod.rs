//! [`ListBackend`](crate::traits::ListBackend) implementations.

pub mod config;
pub mod http;
pub mod memory;

pub use config::HttpBackendConfig;
pub use http::HttpBackend;
pub use memory::MemoryBackend;
