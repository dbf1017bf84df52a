//! Core type aliases and re-exports

pub use glam::{DVec3, I64Vec3, IVec3};

/// Standard Result type for the crate
pub type Result<T> = std::result::Result<T, crate::core::error::Error>;
