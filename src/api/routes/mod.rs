//! API Routes
//!
//! Route handlers organized by functionality.

pub mod devs;
pub mod health;
pub mod settings;
pub mod tokens;
