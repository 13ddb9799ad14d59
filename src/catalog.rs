//! The in-memory catalog: both collections, id assignment, and the issuance
//! rules that tie books to members.
//!
//! Collections are `BTreeMap`s keyed by id so every listing (search results,
//! saved files, sort tie-breaks) comes out in ascending id order from run to
//! run. Nothing here touches the filesystem; [`crate::library::Library`] wraps
//! the catalog and persists after each mutation.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::error::LibraryError;
use crate::models::{Book, BookField, BookId, Member, MemberId};

/// Book ids start right after this value (the first book is 101).
pub const BOOK_ID_BASE: BookId = 100;
/// Member ids start right after this value (the first member is 201).
pub const MEMBER_ID_BASE: MemberId = 200;

/// Owner of every book and member plus the derived category set.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    books: BTreeMap<BookId, Book>,
    members: BTreeMap<MemberId, Member>,
    categories: BTreeSet<String>,
}

/// What the post-load reconciliation pass had to repair.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Member references to books that do not exist, as `(member, book)`.
    pub dangling_references: Vec<(MemberId, BookId)>,
    /// References to a book another member already holds, as `(member, book)`.
    pub duplicate_claims: Vec<(MemberId, BookId)>,
    /// Books referenced by a member but stored as available.
    pub marked_issued: Vec<BookId>,
    /// Books stored as issued that no member holds.
    pub marked_returned: Vec<BookId>,
}

impl Reconciliation {
    pub fn is_clean(&self) -> bool {
        self.repair_count() == 0
    }

    pub fn repair_count(&self) -> usize {
        self.dangling_references.len()
            + self.duplicate_claims.len()
            + self.marked_issued.len()
            + self.marked_returned.len()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from already-decoded entities, e.g. freshly loaded
    /// files. Later duplicates of an id replace earlier ones.
    pub fn from_entities(
        books: impl IntoIterator<Item = Book>,
        members: impl IntoIterator<Item = Member>,
    ) -> Self {
        let mut catalog = Self::default();
        for book in books {
            catalog.books.insert(book.id(), book);
        }
        for member in members {
            catalog.members.insert(member.id(), member);
        }
        // Collected after deduplication so replaced rows leave no category.
        catalog.categories = catalog
            .books
            .values()
            .map(|book| book.category().to_string())
            .collect();
        catalog
    }

    pub fn book(&self, id: BookId) -> Option<&Book> {
        self.books.get(&id)
    }

    pub fn member(&self, id: MemberId) -> Option<&Member> {
        self.members.get(&id)
    }

    /// Every book in ascending id order.
    pub fn books(&self) -> impl Iterator<Item = &Book> {
        self.books.values()
    }

    /// Every member in ascending id order.
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Categories seen on any book, alphabetical. Informational only.
    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    /// Id the next added book will receive.
    pub fn next_book_id(&self) -> Result<BookId, LibraryError> {
        next_id(self.books.keys().next_back().copied(), BOOK_ID_BASE, "book")
    }

    /// Id the next added member will receive.
    pub fn next_member_id(&self) -> Result<MemberId, LibraryError> {
        next_id(
            self.members.keys().next_back().copied(),
            MEMBER_ID_BASE,
            "member",
        )
    }

    /// Validate and insert a new available book, returning its id.
    pub fn add_book(
        &mut self,
        title: &str,
        author: &str,
        category: &str,
    ) -> Result<BookId, LibraryError> {
        let id = self.next_book_id()?;
        let book = Book::new(id, title, author, category)?;
        self.insert_book(book);
        Ok(id)
    }

    /// Validate and insert a new member with no books, returning its id.
    pub fn add_member(&mut self, name: &str, email: &str) -> Result<MemberId, LibraryError> {
        let id = self.next_member_id()?;
        let member = Member::new(id, name, email)?;
        self.members.insert(id, member);
        Ok(id)
    }

    /// Lend `book_id` to `member_id`. The book flag and the member's list are
    /// updated together or not at all.
    pub fn issue_book(&mut self, member_id: MemberId, book_id: BookId) -> Result<(), LibraryError> {
        let member = self
            .members
            .get_mut(&member_id)
            .ok_or(LibraryError::MemberNotFound(member_id))?;
        let book = self
            .books
            .get_mut(&book_id)
            .ok_or(LibraryError::BookNotFound(book_id))?;
        if book.is_issued() {
            return Err(LibraryError::AlreadyIssued(book_id));
        }

        book.mark_issued();
        member.add_issued_book(book_id);
        Ok(())
    }

    /// Take `book_id` back from `member_id`. Fails unless that member is the
    /// one holding it.
    pub fn return_book(&mut self, member_id: MemberId, book_id: BookId) -> Result<(), LibraryError> {
        let member = self
            .members
            .get_mut(&member_id)
            .ok_or(LibraryError::MemberNotFound(member_id))?;
        let book = self
            .books
            .get_mut(&book_id)
            .ok_or(LibraryError::BookNotFound(book_id))?;
        if !member.return_issued_book(book_id) {
            return Err(LibraryError::NotIssuedToMember {
                member: member_id,
                book: book_id,
            });
        }

        book.mark_returned();
        Ok(())
    }

    /// Books whose `field` contains `keyword`, ignoring case, in id order. An
    /// empty keyword matches every book.
    pub fn search_books(&self, field: BookField, keyword: &str) -> Vec<&Book> {
        let needle = keyword.to_lowercase();
        self.books
            .values()
            .filter(|book| field.value(book).to_lowercase().contains(&needle))
            .collect()
    }

    /// Every book ordered by `field`, ignoring case; equal keys keep id order.
    pub fn sort_books(&self, field: BookField) -> Vec<&Book> {
        let mut sorted: Vec<&Book> = self.books.values().collect();
        sorted.sort_by(|a, b| a.cmp_by(b, field));
        sorted
    }

    /// Bring book flags and member lists back in line after a load. Member
    /// lists win: unknown or doubly-claimed references are dropped, then each
    /// book's flag is set from whether anyone still holds it.
    pub fn reconcile(&mut self) -> Reconciliation {
        let mut report = Reconciliation::default();
        let mut holders: BTreeMap<BookId, MemberId> = BTreeMap::new();

        for member in self.members.values_mut() {
            let member_id = member.id();
            for book_id in member.issued_book_ids().to_vec() {
                if !self.books.contains_key(&book_id) {
                    warn!(member_id, book_id, "dropping reference to unknown book");
                    member.return_issued_book(book_id);
                    report.dangling_references.push((member_id, book_id));
                } else if let Some(holder) = holders.get(&book_id) {
                    warn!(
                        member_id,
                        book_id,
                        holder = *holder,
                        "dropping claim on a book another member holds"
                    );
                    member.return_issued_book(book_id);
                    report.duplicate_claims.push((member_id, book_id));
                } else {
                    holders.insert(book_id, member_id);
                }
            }
        }

        for book in self.books.values_mut() {
            let held = holders.contains_key(&book.id());
            if held && !book.is_issued() {
                warn!(book_id = book.id(), "book held by a member was stored as available");
                book.mark_issued();
                report.marked_issued.push(book.id());
            } else if !held && book.is_issued() {
                warn!(book_id = book.id(), "book stored as issued has no holder");
                book.mark_returned();
                report.marked_returned.push(book.id());
            }
        }

        report
    }

    fn insert_book(&mut self, book: Book) {
        self.categories.insert(book.category().to_string());
        self.books.insert(book.id(), book);
    }
}

fn next_id(current_max: Option<u32>, base: u32, kind: &'static str) -> Result<u32, LibraryError> {
    current_max
        .unwrap_or(base)
        .checked_add(1)
        .ok_or(LibraryError::IdsExhausted(kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    fn sample() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.add_book("Dune", "Frank Herbert", "Sci-Fi").unwrap();
        catalog.add_book("emma", "Jane Austen", "Classic").unwrap();
        catalog.add_book("Beloved", "Toni Morrison", "fiction").unwrap();
        catalog.add_member("Ada", "ada@example.com").unwrap();
        catalog.add_member("Grace", "grace@example.com").unwrap();
        catalog
    }

    fn titles(books: &[&Book]) -> Vec<String> {
        books.iter().map(|book| book.title().to_string()).collect()
    }

    #[test]
    fn ids_start_from_fixed_bases() {
        let mut catalog = Catalog::new();
        assert_eq!(catalog.add_book("Dune", "Frank Herbert", "Sci-Fi"), Ok(101));
        assert_eq!(catalog.add_book("Emma", "Jane Austen", "Classic"), Ok(102));
        assert_eq!(catalog.add_member("Ada", "ada@example.com"), Ok(201));
    }

    #[test]
    fn next_id_follows_the_current_maximum() {
        let book = Book::new(150, "Dune", "Frank Herbert", "Sci-Fi").unwrap();
        let older = Book::new(120, "Emma", "Jane Austen", "Classic").unwrap();
        let mut catalog = Catalog::from_entities([book, older], Vec::new());
        assert_eq!(catalog.add_book("Beloved", "Toni Morrison", "Fiction"), Ok(151));
    }

    #[test]
    fn id_exhaustion_is_an_error() {
        let book = Book::new(u32::MAX, "Dune", "Frank Herbert", "Sci-Fi").unwrap();
        let catalog = Catalog::from_entities([book], Vec::new());
        assert_eq!(catalog.next_book_id(), Err(LibraryError::IdsExhausted("book")));
    }

    #[test]
    fn invalid_input_inserts_nothing() {
        let mut catalog = Catalog::new();
        let err = catalog.add_book("Dune", "", "Sci-Fi").unwrap_err();
        assert!(err.is_validation());
        let err = catalog.add_member("Ada", "ada.example.com").unwrap_err();
        assert_eq!(
            err,
            LibraryError::Validation(ValidationError::InvalidEmail("ada.example.com".into()))
        );
        assert_eq!(catalog.book_count(), 0);
        assert_eq!(catalog.member_count(), 0);
        assert_eq!(catalog.next_book_id(), Ok(101));
    }

    #[test]
    fn duplicate_book_rows_leave_no_stale_category() {
        let catalog = Catalog::from_entities(
            vec![
                Book::new(101, "Dune", "Frank Herbert", "Sci-Fi").unwrap(),
                Book::new(101, "Dune", "Frank Herbert", "Classic").unwrap(),
            ],
            Vec::new(),
        );
        assert_eq!(catalog.book_count(), 1);
        assert_eq!(catalog.book(101).unwrap().category(), "Classic");
        assert_eq!(
            catalog.categories().iter().collect::<Vec<_>>(),
            vec!["Classic"]
        );
    }

    #[test]
    fn categories_are_collected_from_books() {
        let catalog = sample();
        let categories: Vec<&str> = catalog.categories().iter().map(String::as_str).collect();
        assert_eq!(categories, vec!["Classic", "Sci-Fi", "fiction"]);
    }

    #[test]
    fn issue_then_return_restores_state() {
        let mut catalog = sample();
        catalog.issue_book(201, 102).unwrap();
        assert!(catalog.book(102).unwrap().is_issued());
        assert_eq!(catalog.member(201).unwrap().issued_book_ids(), &[102]);

        catalog.return_book(201, 102).unwrap();
        assert!(!catalog.book(102).unwrap().is_issued());
        assert!(catalog.member(201).unwrap().issued_book_ids().is_empty());
    }

    #[test]
    fn issue_checks_member_then_book_then_flag() {
        let mut catalog = sample();
        assert_eq!(catalog.issue_book(299, 999), Err(LibraryError::MemberNotFound(299)));
        assert_eq!(catalog.issue_book(201, 999), Err(LibraryError::BookNotFound(999)));

        catalog.issue_book(201, 101).unwrap();
        let before = catalog.clone();
        assert_eq!(catalog.issue_book(202, 101), Err(LibraryError::AlreadyIssued(101)));
        assert_eq!(catalog.issue_book(201, 101), Err(LibraryError::AlreadyIssued(101)));
        assert_eq!(catalog.member(202), before.member(202));
        assert_eq!(catalog.member(201).unwrap().issued_book_ids(), &[101]);
    }

    #[test]
    fn return_by_someone_else_is_rejected() {
        let mut catalog = sample();
        catalog.issue_book(201, 101).unwrap();

        assert_eq!(
            catalog.return_book(202, 101),
            Err(LibraryError::NotIssuedToMember { member: 202, book: 101 })
        );
        assert_eq!(
            catalog.return_book(202, 103),
            Err(LibraryError::NotIssuedToMember { member: 202, book: 103 })
        );
        assert_eq!(catalog.return_book(201, 555), Err(LibraryError::BookNotFound(555)));
        assert!(catalog.book(101).unwrap().is_issued());
        assert_eq!(catalog.member(201).unwrap().issued_book_ids(), &[101]);
    }

    #[test]
    fn search_ignores_case_and_keeps_id_order() {
        let catalog = sample();
        assert_eq!(titles(&catalog.search_books(BookField::Title, "dune")), vec!["Dune"]);
        assert_eq!(
            titles(&catalog.search_books(BookField::Author, "AN")),
            vec!["Dune", "emma"]
        );
        assert!(catalog.search_books(BookField::Category, "horror").is_empty());
    }

    #[test]
    fn empty_keyword_matches_everything() {
        let catalog = sample();
        assert_eq!(catalog.search_books(BookField::Category, "").len(), 3);
    }

    #[test]
    fn sorting_by_different_fields_reorders_the_same_set() {
        let catalog = sample();
        let by_category = catalog.sort_books(BookField::Category);
        assert_eq!(titles(&by_category), vec!["emma", "Beloved", "Dune"]);

        let by_title = catalog.sort_books(BookField::Title);
        assert_eq!(titles(&by_title), vec!["Beloved", "Dune", "emma"]);

        let mut a: Vec<BookId> = by_category.iter().map(|book| book.id()).collect();
        let mut b: Vec<BookId> = by_title.iter().map(|book| book.id()).collect();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn sort_ties_fall_back_to_id_order() {
        let mut catalog = Catalog::new();
        catalog.add_book("Dune", "b", "Sci-Fi").unwrap();
        catalog.add_book("Emma", "a", "sci-fi").unwrap();
        catalog.add_book("Alpha", "c", "SCI-FI").unwrap();
        let ids: Vec<BookId> = catalog
            .sort_books(BookField::Category)
            .iter()
            .map(|book| book.id())
            .collect();
        assert_eq!(ids, vec![101, 102, 103]);
    }

    #[test]
    fn reconcile_repairs_inconsistent_files() {
        let mut stray = Book::new(102, "Emma", "Jane Austen", "Classic").unwrap();
        stray.mark_issued();
        let books = vec![
            Book::new(101, "Dune", "Frank Herbert", "Sci-Fi").unwrap(),
            stray,
            Book::new(103, "Beloved", "Toni Morrison", "Fiction").unwrap(),
        ];
        let mut ada = Member::new(201, "Ada", "ada@example.com").unwrap();
        ada.add_issued_book(101);
        ada.add_issued_book(999);
        let mut grace = Member::new(202, "Grace", "grace@example.com").unwrap();
        grace.add_issued_book(101);
        grace.add_issued_book(103);

        let mut catalog = Catalog::from_entities(books, [ada, grace]);
        let report = catalog.reconcile();

        assert_eq!(report.dangling_references, vec![(201, 999)]);
        assert_eq!(report.duplicate_claims, vec![(202, 101)]);
        assert_eq!(report.marked_issued, vec![101, 103]);
        assert_eq!(report.marked_returned, vec![102]);
        assert_eq!(report.repair_count(), 5);

        assert_eq!(catalog.member(201).unwrap().issued_book_ids(), &[101]);
        assert_eq!(catalog.member(202).unwrap().issued_book_ids(), &[103]);
        assert!(!catalog.book(102).unwrap().is_issued());
        assert!(catalog.reconcile().is_clean());
    }
}
