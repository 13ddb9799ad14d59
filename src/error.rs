//! Error types shared by the catalog, the library manager, and the front-ends.
//!
//! Domain failures are typed so the console and the full-screen UI can react to
//! them (and tests can match on them). Persistence problems stay in `anyhow`
//! land because the only thing the front-ends ever do with them is print the
//! message.

use thiserror::Error;

use crate::models::{BookId, MemberId};

/// Rejected input for a new book or member. Nothing is inserted when one of
/// these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required text field was empty after trimming.
    #[error("{field} is required.")]
    EmptyField { field: &'static str },

    /// The email does not look like `local-part@domain`.
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    /// The value would break the flat-file row it gets stored in.
    #[error("{field} must not contain '{found}'.")]
    ForbiddenCharacter { field: &'static str, found: char },
}

/// Every way a catalog operation can be refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibraryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Book {0} not found.")]
    BookNotFound(BookId),

    #[error("Member {0} not found.")]
    MemberNotFound(MemberId),

    #[error("Book {0} is already issued.")]
    AlreadyIssued(BookId),

    #[error("Member {member} does not have book {book} issued.")]
    NotIssuedToMember { member: MemberId, book: BookId },

    /// The id counter reached the top of the id type.
    #[error("No more {0} ids are available.")]
    IdsExhausted(&'static str),
}

impl LibraryError {
    /// True for input problems, as opposed to lookups or issuance conflicts.
    pub fn is_validation(&self) -> bool {
        matches!(self, LibraryError::Validation(_))
    }
}

/// Why a stored line could not be turned back into an entity. These never
/// reach the operator; the loader counts and skips the line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: &'static str, found: usize },

    #[error("invalid {field} '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("line is not valid UTF-8")]
    InvalidEncoding,
}
