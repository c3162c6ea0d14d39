pub mod client;
pub mod traits;

#[cfg(feature = "adapter-http")]
pub mod http;
