use std::path::Path;

use anyhow::Result;

use crate::error::RecordError;
use crate::models::Book;

use super::files::{parse_id, read_records, split_fields, write_records, Loaded};

impl Book {
    /// Encode as `id,title,author,category,issued`. Text fields are written
    /// as-is; validation keeps commas out of them.
    pub fn to_record(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.id(),
            self.title(),
            self.author(),
            self.category(),
            self.is_issued()
        )
    }

    /// Decode one stored row. Rows with a field count other than five or a
    /// non-numeric id are malformed. `issued` is `true` in any letter case;
    /// every other value reads as `false`.
    pub fn from_record(line: &str) -> Result<Self, RecordError> {
        let parts = split_fields(line);
        let [id, title, author, category, issued] = parts.as_slice() else {
            return Err(RecordError::FieldCount {
                expected: "5",
                found: parts.len(),
            });
        };

        Ok(Book::from_parts(
            parse_id("book id", id)?,
            title.to_string(),
            author.to_string(),
            category.to_string(),
            issued.eq_ignore_ascii_case("true"),
        ))
    }
}

/// Read every decodable book from `path`.
pub fn load_books(path: &Path) -> Result<Loaded<Book>> {
    read_records(path, "book", Book::from_record)
}

/// Replace the contents of `path` with `books`, one row each.
pub fn save_books<'a>(path: &Path, books: impl IntoIterator<Item = &'a Book>) -> Result<()> {
    write_records(path, books.into_iter().map(Book::to_record))
}
