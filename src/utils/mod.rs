//! Utility modules for zkprice.
//!
//! This module contains shared utilities used across the pipeline:
//! - Cryptographic primitives
//! - Integer price arithmetic
//! - Constants

pub mod constants;
pub mod crypto;
pub mod math;

pub use constants::*;
pub use crypto::*;
pub use math::*;
