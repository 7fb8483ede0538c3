//! Client for the model service.
//!
//! The service hosts the screen/fog detectors, the broken-screen and
//! phosphor-residue classifiers and the cone-residue segmenter behind batched
//! JSON endpoints. This crate wraps it as the oracle traits of
//! `crtscan-media`.

pub mod client;
pub mod error;
pub mod oracles;
pub mod types;

pub use client::{MlClient, MlClientConfig};
pub use error::{MlError, MlResult};
pub use oracles::{http_registry, HttpDetector, HttpScoreOracle, HttpSegmenter};
pub use types::ScoreEndpoint;
