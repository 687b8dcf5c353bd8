// src/config/mod.rs
//! Runtime configuration: selector caps/quotas. The taxonomy has its own loader
//! in `crate::taxonomy`.

pub mod caps;

pub use caps::{load_caps_default, load_caps_from, CapConfig};
