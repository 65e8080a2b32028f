//! watchdog-probes — the checks a watchdog cycle runs.
//!
//! Every check kind implements the [`Probe`] capability: one `run()`
//! producing zero or more [`Issue`](watchdog_core::Issue)s. Probe-level
//! failures never escape as errors; they are classified into issues.
//! The only early exit is cancellation.
//!
//! # Architecture
//!
//! ```text
//! Probe (trait)
//!   ├── HealthCheckProbe   HTTP request + assertions, RetryPolicy, AttemptHistory
//!   ├── CertificateProbe   TLS handshake, peer chain NotAfter → classify_expiry()
//!   ├── TimestampProbe<S>  stamp + verify via a TimestampService backend
//!   └── SchemeProbe<S>     update() + validate_keys() via a SchemeSource
//!                          (HttpSchemeSource downloads and checks an index)
//! ```
//!
//! # Retries
//!
//! HTTP checks retry every non-clean attempt with exponential backoff.
//! A check that fails and then passes within its budget is reported as
//! an "Unstable health check" warning rather than as clean.

pub mod certificate;
pub mod checker;
pub mod error;
pub mod expiry;
pub mod probe;
pub mod retry;
pub mod scheme;
pub mod timestamp;

pub use certificate::CertificateProbe;
pub use checker::HealthCheckProbe;
pub use error::{CertificateError, SchemeError, TimestampError};
pub use expiry::{Expiry, classify_expiry};
pub use probe::{Cancelled, Probe, ProbeCategory, ProbeOutcome};
pub use retry::{Attempt, AttemptHistory, RetryPolicy};
pub use scheme::{HttpSchemeSource, SchemeProbe, SchemeSource};
pub use timestamp::{TimestampProbe, TimestampService, Verification};
