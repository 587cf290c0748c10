//! Core of the chainreactor daemon: pull configured base images, detect
//! which ones actually changed via per-target fingerprints, and fire build
//! triggers only for the affected downstream targets.

pub mod config;
pub mod cycle;
pub mod dispatch;
pub mod engine;
pub mod fingerprint;
pub mod normalize;
pub mod state;
pub mod sync;
