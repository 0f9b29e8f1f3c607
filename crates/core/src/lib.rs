//! Core business logic for prompthub.

pub mod services;
pub mod views;

pub use services::*;
pub use views::*;
