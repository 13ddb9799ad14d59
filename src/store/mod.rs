//! Flat-file persistence split across logical submodules: the shared file
//! plumbing plus one codec per record type.

mod books;
mod files;
mod members;

pub use books::{load_books, save_books};
pub use files::{FlatFileStore, Loaded, SkippedLine, DEFAULT_BOOKS_FILE, DEFAULT_MEMBERS_FILE};
pub use members::{load_members, save_members};
