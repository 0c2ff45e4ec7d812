//! Failure normalization
//!
//! Servers speaking the newer dialect bury the useful part of an error
//! several levels deep (`error` → `innererror` → `internalexception`).
//! This module flattens any failure, with or without an HTTP response, into a
//! single [`ServerFault`] carrying one message plus the status metadata.
//!
//! - `normalizer.rs` - error-chain flattening (FaultNormalizer)
//! - `classifier.rs` - connectivity classification hook

mod classifier;
mod normalizer;

pub use classifier::{ConnectivityClassifier, NO_CONNECTION_MESSAGE, StatusZeroClassifier};
pub use normalizer::{FaultBody, FaultNormalizer, RawFailure, ServerFault};
