//! Core traits, settings, and module registry for bookshelf.

pub mod module;
pub mod registry;
pub mod settings;

pub use bookshelf_db::Migration;
pub use module::{InitCtx, Module};
pub use registry::ModuleRegistry;
pub use settings::Settings;
