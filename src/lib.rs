//! City library manager: books, members, loans, and the two flat files that
//! hold them.
//!
//! [`Library`] is the entry point for both front-ends. The numbered menu
//! lives in [`console`], the full-screen interface in [`ui`].
pub mod catalog;
pub mod config;
pub mod console;
pub mod error;
pub mod library;
pub mod models;
pub mod store;
pub mod ui;

pub use catalog::Catalog;
pub use console::Console;
pub use error::{LibraryError, RecordError, ValidationError};
pub use library::{Applied, Library, LoadReport};
pub use models::{Book, BookField, BookId, Member, MemberId};
pub use store::FlatFileStore;
pub use ui::{run_app, App};
