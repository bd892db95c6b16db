//! # `CCode`
//!
//! `CCode` is a minimalist terminal text editor with syntax highlighting, incremental search,
//! and undo/redo.

pub use crate::{config::Config, editor::Editor, error::Error};

pub mod ansi_escape;
mod config;
mod editor;
mod error;
mod row;
mod syntax;
mod terminal;
mod undo;

#[cfg(windows)] mod windows;
#[cfg(windows)] use windows as sys;

#[cfg(unix)] mod unix;
#[cfg(unix)] use unix as sys;

#[cfg(target_os = "wasi")] mod wasi;
#[cfg(target_os = "wasi")] use wasi as sys;
