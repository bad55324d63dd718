//! Copresence Deterministic Simulation Testing (DST) Harness
//!
//! This crate provides a controlled environment where the whole issue/scan
//! pipeline runs deterministically, plus the `copresence` command-line tool.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: Virtual clock advances only when a scenario (or a slow fix) moves it
//! - **Location**: Scripted device position, failures, and fix latency
//! - **Randomness**: All entropy derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                     SimWorld                      │
//! │  ┌─────────────────────────────────────────────┐  │
//! │  │ SimContext (virtual clock + scripted fix)   │  │
//! │  └─────────────────────────────────────────────┘  │
//! │                        │                          │
//! │  ┌─────────────────────▼───────────────────────┐  │
//! │  │ ScanSession (verify → ledger → view)        │  │
//! │  └─────────────────────────────────────────────┘  │
//! │                        ▲                          │
//! │  ┌─────────────────────┴───────────────────────┐  │
//! │  │ Oracle (venue ground truth, GPS noise)      │  │
//! │  └─────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use copresence_sim::{ScenarioId, ScenarioRunner};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::Boundary);
//! assert!(result.passed);
//! ```

pub mod context;
pub mod exporter;
pub mod oracle;
pub mod runner;
pub mod scenarios;
pub mod world;

pub use context::SimContext;
pub use exporter::LedgerExport;
pub use oracle::Oracle;
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
pub use world::{SimConfig, SimWorld};
