//! Library exports for reuse in the CLI utilities, benchmarks, and tests.
/// Application directory helpers.
pub mod app_dirs;
/// Recorder state machine and observation intake.
pub mod capture;
/// k-NN classification over DTW distances.
pub mod classify;
/// Persisted engine settings.
pub mod config;
/// Dynamic time warping distance engine.
pub mod dtw;
/// Hand landmark types, normalization, and feature extraction.
pub mod landmarks;
/// Logging setup.
pub mod logging;
/// High-level engine API (record / classify / train).
pub mod service;
/// Durable gesture class and sequence storage.
pub mod store;
/// Training and validation orchestration.
pub mod training;
