//! Policy evaluation client for Precept.
//!
//! A [`Client`] is a long-lived, per-target handle holding compiled
//! constraint templates and constraint instances. It is built once, all
//! or nothing, and is read-only afterwards: review calls accumulate no
//! state and are safe to issue concurrently on a shared handle.

mod client;
mod eval;

pub use client::{Client, EngineClient, EngineError, EngineOptions};
