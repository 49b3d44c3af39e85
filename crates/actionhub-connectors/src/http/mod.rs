pub mod client_cache;
pub mod transport;

pub use client_cache::{ClientCache, ClientCacheStats, ClientConfig};
pub use transport::ReqwestTransport;
