//! AWS backend for bucketprobe.
//!
//! [`AwsSessionProvider`] opens the elevated session from the default
//! credential chain and exchanges role ARNs for scoped sessions through STS.
//! Every session is an [`S3ObjectStore`].

mod config;
mod provider;
mod store;

pub use config::AwsBackendConfig;
pub use provider::AwsSessionProvider;
pub use store::S3ObjectStore;
