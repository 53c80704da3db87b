//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - Math types, fixed-point and matrix convention helpers
//! - Logging utilities

pub mod math;
pub mod logging;
