//! Bookshelf application library
//!
//! Wires the book catalogue module onto the bookshelf kernel and exposes
//! the bootstrapped [`App`].

pub mod app;
pub mod modules;

pub use app::App;
pub use modules::*;
