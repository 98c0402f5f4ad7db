//! Multi-target review orchestration for Precept.
//!
//! The [`Validator`] owns one evaluation client per target domain and
//! exposes the review entry points: it resolves hierarchy metadata into
//! the canonical ancestry path, classifies the resource into a domain,
//! runs that domain's format adaptation, dispatches to the right client,
//! and wraps the raw responses into a [`ReviewResult`] that materializes
//! violations on demand.
//!
//! Expected usage pattern:
//!   - build a `Validator` once from policy configuration
//!   - share it across callers; review calls are read-only and safe to
//!     issue concurrently
//!   - call `review_asset` / `review_json` / `review_tf_resource_change`
//!     per resource

mod result;
mod validator;

pub use result::ReviewResult;
pub use validator::{ReviewError, Validator, ValidatorError};

pub use precept_core::{Asset, Configuration, PolicyFile, Severity, Target, Violation};
pub use precept_engine::EngineOptions;
