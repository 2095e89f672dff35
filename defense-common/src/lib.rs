//! Shared types, configuration, error handling, and state-store client for
//! the anti-scraping defense core: the library every component binary
//! links against.

pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod markov;
pub mod metrics;
pub mod secret;
pub mod state;
pub mod types;

pub use config::DefenseConfig;
pub use error::{DefenseError, Result};
pub use state::StateStore;
pub use types::{Classification, EnforcementRequest, EscalationDecision, RequestMetadata, Severity, Trigger};

#[cfg(test)]
mod tests {
    #[test]
    fn test_library_imports() {
        fn assert_type<T>() {}
        assert_type::<crate::DefenseConfig>();
        assert_type::<crate::DefenseError>();
        assert_type::<crate::StateStore>();
        assert_type::<crate::RequestMetadata>();
        assert_type::<crate::EscalationDecision>();
    }
}
