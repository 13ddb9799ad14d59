//! Full-screen terminal front-end built on Ratatui. The book table is the
//! main view; adding, issuing, returning, and searching open small dialogs
//! over it.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
