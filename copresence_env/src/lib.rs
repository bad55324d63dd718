//! Co-presence Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seam that lets the verification engines
//! run against either the **Production** world (system clock, platform
//! location fix under a tokio timeout) or a **Simulation** (virtual clock,
//! scripted fixes).
//!
//! # Core Concept
//!
//! The verifier never reads ambient state. The only two live readings it
//! needs are intercepted here:
//! - Time (`now_utc()`)
//! - Location (`current_location()`)
//!
//! # Example
//!
//! ```ignore
//! use copresence_env::{PresenceContext, LocateOptions};
//!
//! async fn observe<Ctx: PresenceContext>(ctx: &Ctx) {
//!     let at = ctx.now_utc();
//!     let here = ctx.current_location(&LocateOptions::default()).await?;
//!     // hand `at` and `here` to the verifier
//! }
//! ```

mod context;
mod types;
mod error;
mod tokio_impl;

pub use context::{LocationProvider, PresenceContext};
pub use types::{Coordinate, LocateOptions, COORDINATE_SCALE};
pub use error::LocationError;
pub use tokio_impl::{FixedLocation, NoLocation, TokioContext};
