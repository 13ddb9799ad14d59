use anyhow::{anyhow, Context, Result};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::{BookId, MemberId};

/// Placeholder shown for an empty field.
const REQUIRED: &str = "<required>";

/// Render one `Label: value` form line, highlighting the focused field.
fn field_line(field_name: &str, value: &str, is_active: bool) -> Line<'static> {
    let display = if value.is_empty() {
        REQUIRED.to_string()
    } else {
        value.to_string()
    };

    let style = if is_active {
        Style::default().fg(Color::Yellow)
    } else if value.is_empty() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };

    Line::from(vec![
        Span::raw(format!("{field_name}: ")),
        Span::styled(display, style),
    ])
}

/// State of the "Add Book" dialog, including category auto-completion.
#[derive(Default, Clone)]
pub(crate) struct BookForm {
    pub(crate) title: String,
    pub(crate) author: String,
    pub(crate) category: String,
    pub(crate) active: BookFormField,
    pub(crate) error: Option<String>,
    pub(crate) suggestion: Option<String>,
    pub(crate) autocomplete_disabled: bool,
}

/// Fields within the book form, in tab order.
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub(crate) enum BookFormField {
    #[default]
    Title,
    Author,
    Category,
}

impl BookFormField {
    pub(crate) const ORDER: [BookFormField; 3] = [
        BookFormField::Title,
        BookFormField::Author,
        BookFormField::Category,
    ];

    pub(crate) fn label(&self) -> &'static str {
        match self {
            BookFormField::Title => "Title",
            BookFormField::Author => "Author",
            BookFormField::Category => "Category",
        }
    }
}

impl BookForm {
    /// Cycle focus across the three fields.
    pub(crate) fn toggle_field(&mut self) {
        self.active = match self.active {
            BookFormField::Title => BookFormField::Author,
            BookFormField::Author => BookFormField::Category,
            BookFormField::Category => BookFormField::Title,
        };
        if self.active != BookFormField::Category {
            self.suggestion = None;
        }
    }

    /// Insert a character into the active field.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        match self.active {
            BookFormField::Title => self.title.push(ch),
            BookFormField::Author => self.author.push(ch),
            BookFormField::Category => {
                self.autocomplete_disabled = false;
                self.category.push(ch);
            }
        }
        true
    }

    pub(crate) fn backspace(&mut self) {
        match self.active {
            BookFormField::Title => {
                self.title.pop();
            }
            BookFormField::Author => {
                self.author.pop();
            }
            BookFormField::Category => {
                self.category.pop();
                self.autocomplete_disabled = false;
            }
        }
    }

    pub(crate) fn value(&self, field: BookFormField) -> &str {
        match field {
            BookFormField::Title => &self.title,
            BookFormField::Author => &self.author,
            BookFormField::Category => &self.category,
        }
    }

    /// Suggest a known category once at least two characters are typed.
    pub(crate) fn update_suggestion<'a>(&mut self, categories: impl IntoIterator<Item = &'a String>) {
        if self.active != BookFormField::Category
            || self.autocomplete_disabled
            || self.category.chars().count() < 2
        {
            self.suggestion = None;
            return;
        }

        let typed = self.category.to_lowercase();
        self.suggestion = categories
            .into_iter()
            .find(|candidate| candidate.to_lowercase().starts_with(&typed))
            .filter(|candidate| candidate.to_lowercase() != typed)
            .cloned();
    }

    /// The part of the suggestion that has not been typed yet.
    pub(crate) fn suggestion_suffix(&self) -> Option<String> {
        let suggestion = self.suggestion.as_ref()?;
        let typed = self.category.chars().count();
        let suffix: String = suggestion.chars().skip(typed).collect();
        if suffix.is_empty() {
            None
        } else {
            Some(suffix)
        }
    }

    /// Replace the category with the suggestion. Returns false when there was
    /// nothing to accept.
    pub(crate) fn accept_suggestion(&mut self) -> bool {
        match self.suggestion.take() {
            Some(candidate) if self.active == BookFormField::Category => {
                self.category = candidate;
                self.autocomplete_disabled = true;
                true
            }
            other => {
                self.suggestion = other;
                false
            }
        }
    }

    pub(crate) fn build_line(&self, field: BookFormField) -> Line<'static> {
        let mut line = field_line(field.label(), self.value(field), self.active == field);
        if field == BookFormField::Category && !self.category.is_empty() {
            if let Some(suffix) = self.suggestion_suffix() {
                line.spans.push(Span::styled(
                    suffix,
                    Style::default().fg(Color::DarkGray),
                ));
            }
        }
        line
    }
}

/// State of the "Add Member" dialog.
#[derive(Default, Clone)]
pub(crate) struct MemberForm {
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) active: MemberFormField,
    pub(crate) error: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub(crate) enum MemberFormField {
    #[default]
    Name,
    Email,
}

impl MemberForm {
    pub(crate) fn toggle_field(&mut self) {
        self.active = match self.active {
            MemberFormField::Name => MemberFormField::Email,
            MemberFormField::Email => MemberFormField::Name,
        };
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        match self.active {
            MemberFormField::Name => self.name.push(ch),
            MemberFormField::Email => self.email.push(ch),
        }
        true
    }

    pub(crate) fn backspace(&mut self) {
        match self.active {
            MemberFormField::Name => {
                self.name.pop();
            }
            MemberFormField::Email => {
                self.email.pop();
            }
        }
    }

    pub(crate) fn build_line(&self, field: MemberFormField) -> Line<'static> {
        match field {
            MemberFormField::Name => {
                field_line("Name", &self.name, self.active == MemberFormField::Name)
            }
            MemberFormField::Email => {
                field_line("Email", &self.email, self.active == MemberFormField::Email)
            }
        }
    }

    pub(crate) fn value_len(&self, field: MemberFormField) -> usize {
        match field {
            MemberFormField::Name => self.name.chars().count(),
            MemberFormField::Email => self.email.chars().count(),
        }
    }
}

/// Member/book id pair used by both the issue and the return dialogs.
#[derive(Default, Clone)]
pub(crate) struct LoanForm {
    pub(crate) member_id: String,
    pub(crate) book_id: String,
    pub(crate) active: LoanField,
    pub(crate) error: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub(crate) enum LoanField {
    #[default]
    Member,
    Book,
}

impl LoanForm {
    /// Pre-fill what the selection already tells us. Focus starts on the
    /// first field still empty.
    pub(crate) fn prefilled(member_id: Option<MemberId>, book_id: Option<BookId>) -> Self {
        let mut form = Self {
            member_id: member_id.map(|id| id.to_string()).unwrap_or_default(),
            book_id: book_id.map(|id| id.to_string()).unwrap_or_default(),
            ..Self::default()
        };
        if !form.member_id.is_empty() && form.book_id.is_empty() {
            form.active = LoanField::Book;
        }
        form
    }

    pub(crate) fn toggle_field(&mut self) {
        self.active = match self.active {
            LoanField::Member => LoanField::Book,
            LoanField::Book => LoanField::Member,
        };
    }

    /// Ids are digits only; anything else is ignored.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if !ch.is_ascii_digit() {
            return false;
        }
        match self.active {
            LoanField::Member => self.member_id.push(ch),
            LoanField::Book => self.book_id.push(ch),
        }
        true
    }

    pub(crate) fn backspace(&mut self) {
        match self.active {
            LoanField::Member => {
                self.member_id.pop();
            }
            LoanField::Book => {
                self.book_id.pop();
            }
        }
    }

    /// Validate both ids and return them typed.
    pub(crate) fn parse_inputs(&self) -> Result<(MemberId, BookId)> {
        let member_raw = self.member_id.trim();
        if member_raw.is_empty() {
            return Err(anyhow!("Member ID is required."));
        }
        let book_raw = self.book_id.trim();
        if book_raw.is_empty() {
            return Err(anyhow!("Book ID is required."));
        }
        let member_id = member_raw
            .parse::<MemberId>()
            .context("Member ID must be a number.")?;
        let book_id = book_raw
            .parse::<BookId>()
            .context("Book ID must be a number.")?;
        Ok((member_id, book_id))
    }

    pub(crate) fn build_line(&self, field: LoanField) -> Line<'static> {
        match field {
            LoanField::Member => {
                field_line("Member ID", &self.member_id, self.active == LoanField::Member)
            }
            LoanField::Book => field_line("Book ID", &self.book_id, self.active == LoanField::Book),
        }
    }

    pub(crate) fn value_len(&self, field: LoanField) -> usize {
        match field {
            LoanField::Member => self.member_id.chars().count(),
            LoanField::Book => self.book_id.chars().count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<String> {
        vec!["Classic".to_string(), "Sci-Fi".to_string()]
    }

    #[test]
    fn category_suggestion_needs_two_characters() {
        let mut form = BookForm {
            active: BookFormField::Category,
            ..BookForm::default()
        };
        form.push_char('s');
        form.update_suggestion(&categories());
        assert_eq!(form.suggestion, None);

        form.push_char('c');
        form.update_suggestion(&categories());
        assert_eq!(form.suggestion.as_deref(), Some("Sci-Fi"));
        assert_eq!(form.suggestion_suffix().as_deref(), Some("i-Fi"));

        assert!(form.accept_suggestion());
        assert_eq!(form.category, "Sci-Fi");
        form.update_suggestion(&categories());
        assert_eq!(form.suggestion, None);
    }

    #[test]
    fn exact_category_needs_no_suggestion() {
        let mut form = BookForm {
            active: BookFormField::Category,
            category: "classic".into(),
            ..BookForm::default()
        };
        form.update_suggestion(&categories());
        assert_eq!(form.suggestion, None);
        assert!(!form.accept_suggestion());
    }

    #[test]
    fn loan_form_accepts_digits_only() {
        let mut form = LoanForm::default();
        assert!(form.push_char('2'));
        assert!(!form.push_char('x'));
        form.push_char('0');
        form.push_char('1');
        form.toggle_field();
        for ch in "101".chars() {
            form.push_char(ch);
        }
        assert_eq!(form.parse_inputs().unwrap(), (201, 101));
    }

    #[test]
    fn loan_form_requires_both_ids() {
        let form = LoanForm::prefilled(Some(201), None);
        assert_eq!(form.active, LoanField::Book);
        let err = form.parse_inputs().unwrap_err();
        assert_eq!(err.to_string(), "Book ID is required.");
    }

    #[test]
    fn oversized_ids_are_reported() {
        let form = LoanForm::prefilled(Some(201), None);
        let form = LoanForm {
            book_id: "99999999999".into(),
            ..form
        };
        let err = form.parse_inputs().unwrap_err();
        assert_eq!(err.to_string(), "Book ID must be a number.");
    }
}
