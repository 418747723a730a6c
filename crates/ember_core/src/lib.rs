//! # ember_core - Ember Engine Core
//!
//! Zero-dependency core primitives shared by the rendering crates:
//! - Stable name-hashed identifiers for resources
//! - Typed generational handles with use-after-free detection
//!
//! Generational handles are the backbone of every slot-based registry in
//! the engine (structured buffer records, shadow atlas tiles). A holder of
//! a stale handle finds out by generation mismatch instead of needing a
//! notification callback.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std as alloc;

pub mod error;
pub mod handle;
pub mod id;

pub use error::*;
pub use handle::*;
pub use id::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::HandleError;
    pub use crate::handle::{Handle, SlotAllocator};
    pub use crate::id::Id;
}
