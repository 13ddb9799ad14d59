//! Numbered-menu front-end. Each flow is prompt, one line of input,
//! validation, then either an effect plus a confirmation or an error message,
//! after which the menu comes back.
//!
//! Input and output are injected so a whole session can be scripted: the
//! binary hands in locked stdin/stdout, tests hand in byte slices and a `Vec`.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::debug;

use crate::library::{Applied, Library, LoadReport};
use crate::models::{Book, BookField, BookId, MemberId};

const BANNER: &str = "Welcome to City Library Digital Management System";
const MENU: &[&str] = &[
    "1. Add Book",
    "2. Add Member",
    "3. Issue Book",
    "4. Return Book",
    "5. Search Books",
    "6. Sort Books",
    "7. Exit",
];
const FIELD_CHOICES: &str = "1.Title 2.Author 3.Category";

/// One entry of the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    AddBook,
    AddMember,
    IssueBook,
    ReturnBook,
    SearchBooks,
    SortBooks,
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::AddBook),
            "2" => Some(MenuChoice::AddMember),
            "3" => Some(MenuChoice::IssueBook),
            "4" => Some(MenuChoice::ReturnBook),
            "5" => Some(MenuChoice::SearchBooks),
            "6" => Some(MenuChoice::SortBooks),
            "7" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

/// A menu session over a library. Runs until the operator picks Exit or the
/// input ends.
pub struct Console<R, W> {
    library: Library,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(library: Library, input: R, output: W) -> Self {
        Self {
            library,
            input,
            output,
        }
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Tell the operator about files that could not be read and loans that
    /// had to be repaired. Malformed lines are only logged.
    pub fn print_load_report(&mut self, report: &LoadReport) -> Result<()> {
        for notice in report.notices() {
            writeln!(self.output, "{notice}")?;
        }
        Ok(())
    }

    /// Drive the menu loop, then save once more on the way out.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.print_menu()?;
            let Some(line) = self.read_line()? else {
                debug!("input closed, leaving the menu");
                writeln!(self.output)?;
                break;
            };

            match MenuChoice::parse(&line) {
                Some(MenuChoice::AddBook) => self.add_book()?,
                Some(MenuChoice::AddMember) => self.add_member()?,
                Some(MenuChoice::IssueBook) => self.issue_book()?,
                Some(MenuChoice::ReturnBook) => self.return_book()?,
                Some(MenuChoice::SearchBooks) => self.search_books()?,
                Some(MenuChoice::SortBooks) => self.sort_books()?,
                Some(MenuChoice::Exit) => break,
                None => self.say("Invalid choice.")?,
            }
        }

        match self.library.save() {
            Ok(()) => writeln!(self.output, "Exiting. Data saved. Thank you!")?,
            Err(err) => writeln!(self.output, "Exiting. Data could not be saved: {err:#}")?,
        }
        self.output.flush().context("failed to flush output")
    }

    fn print_menu(&mut self) -> Result<()> {
        writeln!(self.output, "{BANNER}")?;
        for entry in MENU {
            writeln!(self.output, "{entry}")?;
        }
        self.prompt_only("Enter your choice: ")
    }

    fn add_book(&mut self) -> Result<()> {
        let Some(title) = self.prompt("Enter Book Title: ")? else {
            return Ok(());
        };
        let Some(author) = self.prompt("Enter Author: ")? else {
            return Ok(());
        };
        let Some(category) = self.prompt("Enter Category: ")? else {
            return Ok(());
        };

        match self.library.add_book(&title, &author, &category) {
            Ok(applied) => {
                let message = format!("Book added successfully with ID: {}", applied.value);
                self.confirm(&message, &applied)
            }
            Err(err) => self.say(&err.to_string()),
        }
    }

    fn add_member(&mut self) -> Result<()> {
        let Some(name) = self.prompt("Enter Member Name: ")? else {
            return Ok(());
        };
        let Some(email) = self.prompt("Enter Email: ")? else {
            return Ok(());
        };

        match self.library.add_member(&name, &email) {
            Ok(applied) => {
                let message = format!("Member added successfully with ID: {}", applied.value);
                self.confirm(&message, &applied)
            }
            Err(err) => self.say(&err.to_string()),
        }
    }

    fn issue_book(&mut self) -> Result<()> {
        let Some(member_id) = self.prompt_member()? else {
            return Ok(());
        };
        let Some(book_id) = self.prompt_id("Enter Book ID to issue: ")? else {
            return Ok(());
        };

        match self.library.issue_book(member_id, book_id) {
            Ok(applied) => self.confirm("Book issued successfully.", &applied),
            Err(err) => self.say(&err.to_string()),
        }
    }

    fn return_book(&mut self) -> Result<()> {
        let Some(member_id) = self.prompt_member()? else {
            return Ok(());
        };
        let Some(book_id) = self.prompt_id("Enter Book ID to return: ")? else {
            return Ok(());
        };

        match self.library.return_book(member_id, book_id) {
            Ok(applied) => self.confirm("Book returned successfully.", &applied),
            Err(err) => self.say(&err.to_string()),
        }
    }

    fn search_books(&mut self) -> Result<()> {
        writeln!(self.output, "Search by: {FIELD_CHOICES}")?;
        let Some(field) = self.prompt_field()? else {
            return Ok(());
        };
        let Some(keyword) = self.prompt("Enter keyword: ")? else {
            return Ok(());
        };

        let results = self.library.search_books(field, &keyword);
        if results.is_empty() {
            writeln!(self.output, "No books found.")?;
        } else {
            writeln!(self.output, "Results:")?;
            write_books(&mut self.output, &results)?;
        }
        writeln!(self.output)?;
        Ok(())
    }

    fn sort_books(&mut self) -> Result<()> {
        writeln!(self.output, "Sort by: {FIELD_CHOICES}")?;
        let Some(field) = self.prompt_field()? else {
            return Ok(());
        };

        let sorted = self.library.sort_books(field);
        if sorted.is_empty() {
            writeln!(self.output, "No books found.")?;
        } else {
            writeln!(self.output, "Sorted list:")?;
            write_books(&mut self.output, &sorted)?;
        }
        writeln!(self.output)?;
        Ok(())
    }

    /// Ask for a member id and make sure the member exists before the book id
    /// is requested.
    fn prompt_member(&mut self) -> Result<Option<MemberId>> {
        let Some(member_id) = self.prompt_id("Enter Member ID: ")? else {
            return Ok(None);
        };
        if self.library.catalog().member(member_id).is_none() {
            self.say("Member not found.")?;
            return Ok(None);
        }
        Ok(Some(member_id))
    }

    fn prompt_field(&mut self) -> Result<Option<BookField>> {
        let Some(choice) = self.prompt("Enter choice: ")? else {
            return Ok(None);
        };
        match BookField::from_choice(&choice) {
            Some(field) => Ok(Some(field)),
            None => {
                self.say("Invalid choice.")?;
                Ok(None)
            }
        }
    }

    /// Read a numeric id. Anything unparsable aborts the flow with a message.
    fn prompt_id(&mut self, label: &str) -> Result<Option<BookId>> {
        let Some(raw) = self.prompt(label)? else {
            return Ok(None);
        };
        match raw.parse::<u32>() {
            Ok(id) => Ok(Some(id)),
            Err(_) => {
                self.say("Invalid number input.")?;
                Ok(None)
            }
        }
    }

    /// Show `label` and return the trimmed answer, or `None` once input ends.
    fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        self.prompt_only(label)?;
        self.read_line()
    }

    fn prompt_only(&mut self, label: &str) -> Result<()> {
        write!(self.output, "{label}")?;
        self.output.flush().context("failed to flush prompt")
    }

    /// Next input line, trimmed. Bytes that are not UTF-8 become U+FFFD so a
    /// stray byte cannot end the session.
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = Vec::new();
        let read = self
            .input
            .read_until(b'\n', &mut line)
            .context("failed to read input")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&line).trim().to_string()))
    }

    /// Print a confirmation, plus a warning when the change did not reach disk.
    fn confirm<T>(&mut self, message: &str, applied: &Applied<T>) -> Result<()> {
        writeln!(self.output, "{message}")?;
        if let Some(err) = &applied.save_error {
            writeln!(self.output, "Warning: change kept in memory only ({err:#}).")?;
        }
        writeln!(self.output)?;
        Ok(())
    }

    fn say(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{message}")?;
        writeln!(self.output)?;
        Ok(())
    }
}

fn write_books(output: &mut impl Write, books: &[&Book]) -> Result<()> {
    for book in books {
        writeln!(output, "{book}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_choices_are_numbered() {
        assert_eq!(MenuChoice::parse("1"), Some(MenuChoice::AddBook));
        assert_eq!(MenuChoice::parse(" 7 "), Some(MenuChoice::Exit));
        assert_eq!(MenuChoice::parse("8"), None);
        assert_eq!(MenuChoice::parse("exit"), None);
    }
}
