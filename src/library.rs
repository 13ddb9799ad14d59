//! The library manager: a [`Catalog`] bound to a [`FlatFileStore`].
//!
//! Every mutating call applies the change in memory first and then rewrites
//! the affected file(s). A failed write does not undo the change; the caller
//! gets the result together with the save error so it can warn the operator,
//! and the next successful save brings the files back in line.

use anyhow::{bail, Context, Error, Result};
use tracing::{info, warn};

use crate::catalog::{Catalog, Reconciliation};
use crate::error::LibraryError;
use crate::models::{Book, BookField, BookId, MemberId};
use crate::store::{FlatFileStore, SkippedLine};

/// Outcome of a mutation that was applied in memory. `save_error` is set when
/// writing the files afterwards failed.
#[derive(Debug)]
pub struct Applied<T> {
    pub value: T,
    pub save_error: Option<Error>,
}

impl<T> Applied<T> {
    fn new(value: T, saved: Result<()>) -> Self {
        Self {
            value,
            save_error: saved.err(),
        }
    }

    pub fn is_saved(&self) -> bool {
        self.save_error.is_none()
    }
}

/// Summary of what happened while opening the files.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub books_loaded: usize,
    pub members_loaded: usize,
    pub skipped_books: Vec<SkippedLine>,
    pub skipped_members: Vec<SkippedLine>,
    pub reconciliation: Reconciliation,
    /// Files that could not be read at all. The library still opens with
    /// whatever was readable.
    pub errors: Vec<Error>,
}

impl LoadReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped_books.len() + self.skipped_members.len()
    }

    /// Lines worth showing the operator: unreadable files first, then the
    /// number of repaired loans. Skipped lines are left to the log.
    pub fn notices(&self) -> Vec<String> {
        let mut notices: Vec<String> = self.errors.iter().map(|err| format!("{err:#}")).collect();
        if !self.reconciliation.is_clean() {
            notices.push(format!(
                "Repaired {} inconsistent loan record(s) while loading.",
                self.reconciliation.repair_count()
            ));
        }
        notices
    }
}

/// Which files a mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dirty {
    Books,
    Members,
    Both,
}

#[derive(Debug)]
pub struct Library {
    catalog: Catalog,
    store: FlatFileStore,
    /// Set when a file existed but could not be read to the end. Writing
    /// would replace the unread rows, so saving is refused for the session.
    load_incomplete: bool,
}

impl Library {
    /// Read both files, drop malformed rows, and reconcile issued flags with
    /// the members' lists. Read failures are collected in the report instead
    /// of aborting; whatever was read before a failure is kept.
    pub fn open(store: FlatFileStore) -> (Self, LoadReport) {
        let mut report = LoadReport::default();
        let mut load_incomplete = false;

        let books = match store.load_books() {
            Ok(loaded) => {
                if let Some(err) = loaded.interrupted {
                    warn!(error = %err, "books file was only partly read");
                    report.errors.push(err.context("Error loading books"));
                    load_incomplete = true;
                }
                report.skipped_books = loaded.skipped;
                loaded.records
            }
            Err(err) => {
                warn!(error = %err, "books file could not be read");
                report.errors.push(err.context("Error loading books"));
                load_incomplete = true;
                Vec::new()
            }
        };
        let members = match store.load_members() {
            Ok(loaded) => {
                if let Some(err) = loaded.interrupted {
                    warn!(error = %err, "members file was only partly read");
                    report.errors.push(err.context("Error loading members"));
                    load_incomplete = true;
                }
                report.skipped_members = loaded.skipped;
                loaded.records
            }
            Err(err) => {
                warn!(error = %err, "members file could not be read");
                report.errors.push(err.context("Error loading members"));
                load_incomplete = true;
                Vec::new()
            }
        };

        let mut catalog = Catalog::from_entities(books, members);
        report.books_loaded = catalog.book_count();
        report.members_loaded = catalog.member_count();
        report.reconciliation = catalog.reconcile();

        info!(
            books = report.books_loaded,
            members = report.members_loaded,
            skipped = report.skipped_count(),
            repairs = report.reconciliation.repair_count(),
            "library opened"
        );

        let library = Self {
            catalog,
            store,
            load_incomplete,
        };
        (library, report)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &FlatFileStore {
        &self.store
    }

    /// False when saving is refused because a file could not be fully read.
    pub fn can_save(&self) -> bool {
        !self.load_incomplete
    }

    pub fn add_book(
        &mut self,
        title: &str,
        author: &str,
        category: &str,
    ) -> Result<Applied<BookId>, LibraryError> {
        let id = self.catalog.add_book(title, author, category)?;
        info!(book_id = id, "book added");
        Ok(Applied::new(id, self.persist(Dirty::Books)))
    }

    pub fn add_member(
        &mut self,
        name: &str,
        email: &str,
    ) -> Result<Applied<MemberId>, LibraryError> {
        let id = self.catalog.add_member(name, email)?;
        info!(member_id = id, "member added");
        Ok(Applied::new(id, self.persist(Dirty::Members)))
    }

    pub fn issue_book(
        &mut self,
        member_id: MemberId,
        book_id: BookId,
    ) -> Result<Applied<()>, LibraryError> {
        self.catalog.issue_book(member_id, book_id)?;
        info!(member_id, book_id, "book issued");
        Ok(Applied::new((), self.persist(Dirty::Both)))
    }

    pub fn return_book(
        &mut self,
        member_id: MemberId,
        book_id: BookId,
    ) -> Result<Applied<()>, LibraryError> {
        self.catalog.return_book(member_id, book_id)?;
        info!(member_id, book_id, "book returned");
        Ok(Applied::new((), self.persist(Dirty::Both)))
    }

    pub fn search_books(&self, field: BookField, keyword: &str) -> Vec<&Book> {
        self.catalog.search_books(field, keyword)
    }

    pub fn sort_books(&self, field: BookField) -> Vec<&Book> {
        self.catalog.sort_books(field)
    }

    /// Rewrite both files from memory. Both writes are attempted even if the
    /// first fails.
    pub fn save(&self) -> Result<()> {
        self.persist(Dirty::Both)
    }

    fn persist(&self, dirty: Dirty) -> Result<()> {
        if self.load_incomplete {
            warn!("not saving over data files that were not fully loaded");
            bail!("Not saved: the data files were not fully loaded at startup, so they were left untouched");
        }
        let books = if matches!(dirty, Dirty::Books | Dirty::Both) {
            self.store
                .save_books(self.catalog.books())
                .context("Error saving books")
        } else {
            Ok(())
        };
        let members = if matches!(dirty, Dirty::Members | Dirty::Both) {
            self.store
                .save_members(self.catalog.members())
                .context("Error saving members")
        } else {
            Ok(())
        };

        let result = books.and(members);
        if let Err(err) = &result {
            warn!(error = %err, "changes kept in memory only");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn open_in(dir: &TempDir) -> Library {
        let (library, report) = Library::open(FlatFileStore::in_dir(dir.path()));
        assert!(report.errors.is_empty());
        library
    }

    #[test]
    fn fresh_directory_opens_empty() {
        let dir = TempDir::new().unwrap();
        let (library, report) = Library::open(FlatFileStore::in_dir(dir.path()));
        assert_eq!(library.catalog().book_count(), 0);
        assert_eq!(report.books_loaded, 0);
        assert!(report.reconciliation.is_clean());
        assert!(!dir.path().join("books.txt").exists());
    }

    #[test]
    fn add_book_persists_only_the_books_file() {
        let dir = TempDir::new().unwrap();
        let mut library = open_in(&dir);
        let applied = library.add_book("Dune", "Frank Herbert", "Sci-Fi").unwrap();
        assert_eq!(applied.value, 101);
        assert!(applied.is_saved());

        let books = fs::read_to_string(dir.path().join("books.txt")).unwrap();
        assert_eq!(books, "101,Dune,Frank Herbert,Sci-Fi,false\n");
        assert!(!dir.path().join("members.txt").exists());
    }

    #[test]
    fn state_survives_a_restart() {
        let dir = TempDir::new().unwrap();
        {
            let mut library = open_in(&dir);
            library.add_book("Dune", "Frank Herbert", "Sci-Fi").unwrap();
            library.add_book("Emma", "Jane Austen", "Classic").unwrap();
            library.add_member("Ada", "ada@example.com").unwrap();
            library.issue_book(201, 102).unwrap();
        }

        let library = open_in(&dir);
        let catalog = library.catalog();
        assert!(catalog.book(102).unwrap().is_issued());
        assert!(!catalog.book(101).unwrap().is_issued());
        assert_eq!(catalog.member(201).unwrap().issued_book_ids(), &[102]);
        assert!(catalog.categories().contains("Classic"));
        assert_eq!(catalog.next_book_id(), Ok(103));
    }

    #[test]
    fn refused_operations_write_nothing() {
        let dir = TempDir::new().unwrap();
        let mut library = open_in(&dir);
        assert!(library.add_book("", "Frank Herbert", "Sci-Fi").is_err());
        assert_eq!(
            library.issue_book(201, 101).unwrap_err(),
            LibraryError::MemberNotFound(201)
        );
        assert!(!dir.path().join("books.txt").exists());
        assert!(!dir.path().join("members.txt").exists());
    }

    #[test]
    fn return_persists_both_files() {
        let dir = TempDir::new().unwrap();
        let mut library = open_in(&dir);
        library.add_book("Dune", "Frank Herbert", "Sci-Fi").unwrap();
        library.add_member("Ada", "ada@example.com").unwrap();
        library.issue_book(201, 101).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("members.txt")).unwrap(),
            "201,Ada,ada@example.com,101\n"
        );

        library.return_book(201, 101).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("members.txt")).unwrap(),
            "201,Ada,ada@example.com,\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("books.txt")).unwrap(),
            "101,Dune,Frank Herbert,Sci-Fi,false\n"
        );
    }

    #[test]
    fn failed_save_keeps_the_change_in_memory() {
        let dir = TempDir::new().unwrap();
        let mut library = open_in(&dir);
        // A directory where the books file should be makes the write fail.
        fs::create_dir(dir.path().join("books.txt")).unwrap();

        let applied = library.add_book("Dune", "Frank Herbert", "Sci-Fi").unwrap();
        assert_eq!(applied.value, 101);
        let message = applied.save_error.expect("save should fail").to_string();
        assert_eq!(message, "Error saving books");
        assert!(library.catalog().book(101).is_some());
    }

    #[test]
    fn unreadable_file_is_never_overwritten() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("books.txt")).unwrap();
        fs::write(dir.path().join("members.txt"), "201,Ada,ada@example.com,101\n").unwrap();

        let (mut library, report) = Library::open(FlatFileStore::in_dir(dir.path()));
        assert_eq!(report.errors.len(), 1);
        assert!(!library.can_save());

        let applied = library.add_member("Grace", "grace@example.com").unwrap();
        let message = applied.save_error.expect("save should be refused").to_string();
        assert!(message.starts_with("Not saved"));
        assert!(library.save().is_err());
        assert_eq!(
            fs::read_to_string(dir.path().join("members.txt")).unwrap(),
            "201,Ada,ada@example.com,101\n"
        );
    }

    #[test]
    fn non_utf8_line_costs_only_that_line() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("books.txt"),
            b"101,Dune,Frank Herbert,Sci-Fi,true\n\
              102,Caf\xe9 Stories,Someone,Misc,false\n\
              103,Emma,Jane Austen,Classic,false\n",
        )
        .unwrap();
        fs::write(dir.path().join("members.txt"), "201,Ada,ada@example.com,101\n").unwrap();

        let (mut library, report) = Library::open(FlatFileStore::in_dir(dir.path()));
        assert!(report.errors.is_empty());
        assert_eq!(report.books_loaded, 2);
        assert_eq!(report.skipped_books.len(), 1);
        assert_eq!(report.skipped_books[0].line_number, 2);
        assert!(report.reconciliation.is_clean());
        assert!(library.catalog().book(101).unwrap().is_issued());

        let applied = library.add_book("New", "Author", "Cat").unwrap();
        assert_eq!(applied.value, 104);
        assert!(applied.is_saved());
        assert_eq!(
            fs::read_to_string(dir.path().join("books.txt")).unwrap(),
            "101,Dune,Frank Herbert,Sci-Fi,true\n\
             103,Emma,Jane Austen,Classic,false\n\
             104,New,Author,Cat,false\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("members.txt")).unwrap(),
            "201,Ada,ada@example.com,101\n"
        );
    }

    #[test]
    fn open_reconciles_and_reports_skips() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("books.txt"),
            "101,Dune,Frank Herbert,Sci-Fi,false\n102,Emma,Jane Austen,Classic,true\nbroken\n",
        )
        .unwrap();
        fs::write(dir.path().join("members.txt"), "201,Ada,ada@example.com,101;777\n").unwrap();

        let (library, report) = Library::open(FlatFileStore::in_dir(dir.path()));
        assert_eq!(report.books_loaded, 2);
        assert_eq!(report.members_loaded, 1);
        assert_eq!(report.skipped_books.len(), 1);
        assert_eq!(report.reconciliation.dangling_references, vec![(201, 777)]);
        assert_eq!(report.reconciliation.marked_issued, vec![101]);
        assert_eq!(report.reconciliation.marked_returned, vec![102]);

        library.save().unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("members.txt")).unwrap(),
            "201,Ada,ada@example.com,101\n"
        );
    }
}
