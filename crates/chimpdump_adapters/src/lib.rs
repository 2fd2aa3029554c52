pub mod configuration;
pub mod credentials;
pub mod fs;
pub mod marketing_api;
pub mod network;
pub mod telemetry;

// Re-exports for convenience
pub use credentials::FileCredentialLoader;
pub use fs::FileExportSink;
pub use marketing_api::HttpMarketingApi;
