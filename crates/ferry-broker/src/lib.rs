//! Ferry Broker Library
//!
//! Issues single-use, time-boxed sessions bound to one approval reference.
//! The broker is the leaf dependency of the transfer pipeline: nothing moves
//! without a session, a session cannot be reused, and nothing can extend one.

pub mod broker;
pub mod provider;

pub use broker::{BrokerConfig, SessionBroker};
pub use provider::{
    CredentialProvider, CredentialScope, EnvCredentialProvider, ProviderError,
    StaticCredentialProvider,
};
