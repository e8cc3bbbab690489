//! # Core Module
//!
//! Fundamental concurrency primitives shared by the engine subsystems.
//!
//! ## Key Components
//! - `CancellationToken`: a cloneable, cooperatively polled shutdown flag handed to
//!   every worker and checked between bounded units of work

pub mod cancellation;

pub use cancellation::CancellationToken;
