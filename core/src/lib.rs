#![deny(unused_must_use)]

pub mod config;
pub mod error;
pub mod page;
pub mod render;
pub mod site;
pub mod store;

use std::io;
use std::path::Path;

pub use error::PageError;

pub type Result<T> = std::result::Result<T, PageError>;

pub fn create_dir_path(path: &Path) -> io::Result<()> {
    std::fs::create_dir_all(path).map_err(|e| io::Error::new(e.kind(), format!("Cannot create {:?}: {}", path, e)))
}
