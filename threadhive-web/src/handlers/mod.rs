//! HTTP request handlers for the Threadhive web server
//!
//! This module contains all the HTTP request handlers organized by functionality.

pub mod communities;
pub mod health;
pub mod membership;
pub mod types;

pub use communities::*;
pub use health::*;
pub use membership::*;

pub use types::*;
