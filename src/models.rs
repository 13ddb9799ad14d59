//! Domain models for the catalog: books, members, and the fields books can be
//! searched or sorted by. The types stay light-weight so the catalog can focus
//! on the rules that span both collections and the store can focus on the line
//! format.
//!
//! Neither entity knows about the other. Keeping a book's `issued` flag in step
//! with the members' issued lists is the catalog's job.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::ValidationError;

/// Identifier assigned to a book by the catalog.
pub type BookId = u32;
/// Identifier assigned to a member by the catalog.
pub type MemberId = u32;

/// Characters that would split a stored row if they appeared in a text field.
const ROW_BREAKERS: &[char] = &[',', '\n', '\r'];

#[derive(Debug, Clone)]
/// A title held by the library. Identity is the `id`; everything else is
/// descriptive except `issued`, which flips as copies go out and come back.
pub struct Book {
    id: BookId,
    title: String,
    author: String,
    category: String,
    issued: bool,
}

impl Book {
    /// Validate the descriptive fields and build an available book. Fields are
    /// trimmed before they are checked and stored.
    pub fn new(
        id: BookId,
        title: &str,
        author: &str,
        category: &str,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id,
            title: required_text("Title", title)?,
            author: required_text("Author", author)?,
            category: required_text("Category", category)?,
            issued: false,
        })
    }

    /// Rebuild a book from stored fields without re-validating them. Stored
    /// rows are trusted the same way the rest of the file is.
    pub(crate) fn from_parts(
        id: BookId,
        title: String,
        author: String,
        category: String,
        issued: bool,
    ) -> Self {
        Self {
            id,
            title,
            author,
            category,
            issued,
        }
    }

    pub fn id(&self) -> BookId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn is_issued(&self) -> bool {
        self.issued
    }

    /// Flag the book as lent out. Unconditional; the catalog checks legality.
    pub fn mark_issued(&mut self) {
        self.issued = true;
    }

    /// Flag the book as back on the shelf. Unconditional as well.
    pub fn mark_returned(&mut self) {
        self.issued = false;
    }

    /// Human-readable availability used in listings.
    pub fn status_label(&self) -> &'static str {
        if self.issued {
            "Issued"
        } else {
            "Available"
        }
    }

    /// Compare two books on one field, ignoring case.
    pub fn cmp_by(&self, other: &Book, field: BookField) -> Ordering {
        caseless_cmp(field.value(self), field.value(other))
    }
}

impl PartialEq for Book {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Book {}

impl Hash for Book {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Book {
    /// One-line listing shared by the console results and search output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID: {} | {} | {} | {} | {}",
            self.id,
            self.title,
            self.author,
            self.category,
            self.status_label()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A registered borrower. `issued_book_ids` keeps issuance order and never
/// holds the same id twice.
pub struct Member {
    id: MemberId,
    name: String,
    email: String,
    issued_book_ids: Vec<BookId>,
}

impl Member {
    /// Validate name and email and build a member with no books.
    pub fn new(id: MemberId, name: &str, email: &str) -> Result<Self, ValidationError> {
        let name = required_text("Name", name)?;
        let email = required_text("Email", email)?;
        if email.contains(';') {
            return Err(ValidationError::ForbiddenCharacter {
                field: "Email",
                found: ';',
            });
        }
        if !is_valid_email(&email) {
            return Err(ValidationError::InvalidEmail(email));
        }
        Ok(Self {
            id,
            name,
            email,
            issued_book_ids: Vec::new(),
        })
    }

    /// Rebuild a member from stored fields. Issued ids are added afterwards
    /// through [`Member::add_issued_book`] so duplicates collapse.
    pub(crate) fn from_parts(id: MemberId, name: String, email: String) -> Self {
        Self {
            id,
            name,
            email,
            issued_book_ids: Vec::new(),
        }
    }

    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Books currently held, oldest issue first.
    pub fn issued_book_ids(&self) -> &[BookId] {
        &self.issued_book_ids
    }

    pub fn has_issued(&self, book_id: BookId) -> bool {
        self.issued_book_ids.contains(&book_id)
    }

    /// Record a book as held by this member. Adding an id twice is a no-op.
    pub fn add_issued_book(&mut self, book_id: BookId) {
        if !self.has_issued(book_id) {
            self.issued_book_ids.push(book_id);
        }
    }

    /// Drop a held book, reporting whether it was held at all.
    pub fn return_issued_book(&mut self, book_id: BookId) -> bool {
        match self.issued_book_ids.iter().position(|id| *id == book_id) {
            Some(index) => {
                self.issued_book_ids.remove(index);
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ID: {} | {} | {}", self.id, self.name, self.email)?;
        if self.issued_book_ids.is_empty() {
            write!(f, "Issued Books: None")
        } else {
            let ids: Vec<String> = self.issued_book_ids.iter().map(u32::to_string).collect();
            write!(f, "Issued Books: {}", ids.join(" "))
        }
    }
}

/// The descriptive book fields that searching and sorting work on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookField {
    #[default]
    Title,
    Author,
    Category,
}

impl BookField {
    pub const ALL: [BookField; 3] = [BookField::Title, BookField::Author, BookField::Category];

    /// Map the numbered menu answer (`1.Title 2.Author 3.Category`).
    pub fn from_choice(choice: &str) -> Option<Self> {
        match choice.trim() {
            "1" => Some(BookField::Title),
            "2" => Some(BookField::Author),
            "3" => Some(BookField::Category),
            _ => None,
        }
    }

    /// Borrow this field's text from a book.
    pub fn value<'a>(&self, book: &'a Book) -> &'a str {
        match self {
            BookField::Title => book.title(),
            BookField::Author => book.author(),
            BookField::Category => book.category(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookField::Title => "Title",
            BookField::Author => "Author",
            BookField::Category => "Category",
        }
    }

    /// Rotate through the fields; the full-screen UI binds this to a key.
    pub fn next(&self) -> Self {
        match self {
            BookField::Title => BookField::Author,
            BookField::Author => BookField::Category,
            BookField::Category => BookField::Title,
        }
    }
}

impl fmt::Display for BookField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// `local-part@domain`: the part before the first `@` must be non-empty and
/// drawn from letters, digits, and `+_.-`; the rest must be non-empty.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && local
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '_' | '.' | '-'))
}

/// Case-insensitive ordering used for sorting and the title comparator.
pub fn caseless_cmp(left: &str, right: &str) -> Ordering {
    left.to_lowercase().cmp(&right.to_lowercase())
}

/// Trim a required field and make sure it survives the flat-file format.
fn required_text(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    if let Some(found) = value.chars().find(|ch| ROW_BREAKERS.contains(ch)) {
        return Err(ValidationError::ForbiddenCharacter { field, found });
    }
    Ok(value.to_string())
}
