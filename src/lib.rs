//! punchr - attendance punch scheduling and reconciliation
//!
//! Automates punch-in/punch-out actions against a third-party HR portal:
//! parses the portal's displayed attendance figures, projects when the
//! required hours will be complete, and coordinates alarm-driven deferred
//! actions (auto clock-out, reminder notifications) that survive host
//! process restarts by keeping all cross-invocation state in durable
//! storage.

pub mod alarm;
pub mod config;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod portal;
pub mod store;
pub mod timeparse;

pub use error::{PunchrError, Result};
