//! UI module containing all user interface components and signal handlers.

pub mod actions;
pub mod editor;
pub mod file_ops;
pub mod header;
pub mod layout;
pub mod panel;
pub mod settings;
