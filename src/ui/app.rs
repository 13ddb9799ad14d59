use std::mem;

use anyhow::Result;
use crossterm::event::KeyCode;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, TableState, Wrap,
};
use ratatui::Frame;

use crate::library::{Applied, Library, LoadReport};
use crate::models::{BookField, BookId, MemberId};

use super::forms::{BookForm, BookFormField, LoanField, LoanForm, MemberForm, MemberFormField};
use super::helpers::{centered_rect, surface_error, truncate};
use super::screens::{BookListScreen, SearchFilter};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Width of the members/categories column.
const SIDEBAR_WIDTH: u16 = 36;

/// Fine-grained modes layered over the book table.
enum Mode {
    Normal,
    AddingBook(BookForm),
    AddingMember(MemberForm),
    Issuing(LoanForm),
    Returning(LoanForm),
    Searching(SearchState),
}

/// State for an inline search. `previous` is restored on Esc.
struct SearchState {
    filter: SearchFilter,
    previous: Option<SearchFilter>,
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central state for the full-screen interface.
pub struct App {
    library: Library,
    books: BookListScreen,
    search_field: BookField,
    mode: Mode,
    status: Option<StatusMessage>,
}

impl App {
    pub fn new(library: Library) -> Self {
        let books = BookListScreen::new(library.catalog());
        Self {
            library,
            books,
            search_field: BookField::Title,
            mode: Mode::Normal,
            status: None,
        }
    }

    /// Put anything the operator should know about the load in the footer.
    pub fn show_load_report(&mut self, report: &LoadReport) {
        let notices = report.notices();
        if notices.is_empty() {
            return;
        }
        let kind = if report.errors.is_empty() {
            StatusKind::Info
        } else {
            StatusKind::Error
        };
        self.set_status(notices.join(" "), kind);
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Hand the library back once the event loop is over.
    pub fn into_library(self) -> Library {
        self.library
    }

    /// Route a key press to the current mode. Returns true when the user asked
    /// to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit),
            Mode::AddingBook(form) => self.handle_add_book(code, form),
            Mode::AddingMember(form) => self.handle_add_member(code, form),
            Mode::Issuing(form) => self.handle_loan(code, form, LoanAction::Issue),
            Mode::Returning(form) => self.handle_loan(code, form, LoanAction::Return),
            Mode::Searching(state) => self.handle_search(code, state),
        };

        Ok(exit)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Mode {
        match code {
            KeyCode::Char('q') | KeyCode::Char('Q') => *exit = true,
            KeyCode::Esc => {
                if self.books.filter.is_some() {
                    self.books.set_filter(self.library.catalog(), None);
                    self.set_status("Search cleared.", StatusKind::Info);
                } else {
                    *exit = true;
                }
            }
            KeyCode::Up => self.books.move_selection(-1),
            KeyCode::Down => self.books.move_selection(1),
            KeyCode::PageUp => self.books.move_selection(-10),
            KeyCode::PageDown => self.books.move_selection(10),
            KeyCode::Char('b') | KeyCode::Char('B') => {
                self.clear_status();
                return Mode::AddingBook(BookForm::default());
            }
            KeyCode::Char('m') | KeyCode::Char('M') => {
                self.clear_status();
                return Mode::AddingMember(MemberForm::default());
            }
            KeyCode::Char('i') | KeyCode::Char('I') => {
                self.clear_status();
                let book = self
                    .books
                    .current_book()
                    .filter(|id| self.library.catalog().book(*id).is_some_and(|b| !b.is_issued()));
                return Mode::Issuing(LoanForm::prefilled(None, book));
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.clear_status();
                let book = self.books.current_book();
                let holder = book.and_then(|id| self.holder_of(id));
                return Mode::Returning(LoanForm::prefilled(holder, book));
            }
            KeyCode::Char('/') => {
                self.clear_status();
                let previous = self.books.filter.clone();
                let filter = previous.clone().unwrap_or(SearchFilter {
                    field: self.search_field,
                    query: String::new(),
                });
                return Mode::Searching(SearchState { filter, previous });
            }
            KeyCode::Char('f') | KeyCode::Char('F') => {
                self.search_field = self.search_field.next();
                if let Some(mut filter) = self.books.filter.clone() {
                    filter.field = self.search_field;
                    self.books.set_filter(self.library.catalog(), Some(filter));
                }
                let message = format!("Searching by {}.", self.search_field);
                self.set_status(message, StatusKind::Info);
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                let field = self.books.cycle_sort(self.library.catalog());
                self.set_status(format!("Sorted by {field}."), StatusKind::Info);
            }
            _ => {}
        }
        Mode::Normal
    }

    fn handle_add_book(&mut self, code: KeyCode, mut form: BookForm) -> Mode {
        match code {
            KeyCode::Esc => {
                if form.suggestion.is_some() {
                    form.suggestion = None;
                    form.autocomplete_disabled = true;
                } else {
                    self.set_status("Add book cancelled.", StatusKind::Info);
                    return Mode::Normal;
                }
            }
            KeyCode::Tab | KeyCode::BackTab => {
                if !form.accept_suggestion() {
                    form.toggle_field();
                }
            }
            KeyCode::Right => {
                form.accept_suggestion();
            }
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => {
                match self
                    .library
                    .add_book(&form.title, &form.author, &form.category)
                {
                    Ok(applied) => {
                        let id = applied.value;
                        self.books.refresh(self.library.catalog());
                        self.books.focus(id);
                        self.report_applied(format!("Added book {id}."), &applied);
                        return Mode::Normal;
                    }
                    Err(err) => {
                        let message = err.to_string();
                        form.error = Some(message.clone());
                        self.set_status(message, StatusKind::Error);
                    }
                }
            }
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        form.update_suggestion(self.library.catalog().categories());
        Mode::AddingBook(form)
    }

    fn handle_add_member(&mut self, code: KeyCode, mut form: MemberForm) -> Mode {
        match code {
            KeyCode::Esc => {
                self.set_status("Add member cancelled.", StatusKind::Info);
                return Mode::Normal;
            }
            KeyCode::Tab | KeyCode::BackTab => form.toggle_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.library.add_member(&form.name, &form.email) {
                Ok(applied) => {
                    let message = format!("Added member {}.", applied.value);
                    self.report_applied(message, &applied);
                    return Mode::Normal;
                }
                Err(err) => {
                    let message = err.to_string();
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Mode::AddingMember(form)
    }

    fn handle_loan(&mut self, code: KeyCode, mut form: LoanForm, action: LoanAction) -> Mode {
        match code {
            KeyCode::Esc => {
                self.set_status(format!("{} cancelled.", action.title()), StatusKind::Info);
                return Mode::Normal;
            }
            KeyCode::Tab | KeyCode::BackTab => form.toggle_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.submit_loan(&form, action) {
                Ok(()) => return Mode::Normal,
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        action.mode(form)
    }

    fn submit_loan(&mut self, form: &LoanForm, action: LoanAction) -> Result<()> {
        let (member_id, book_id) = form.parse_inputs()?;
        let applied = match action {
            LoanAction::Issue => self.library.issue_book(member_id, book_id)?,
            LoanAction::Return => self.library.return_book(member_id, book_id)?,
        };
        self.books.refresh(self.library.catalog());
        let message = match action {
            LoanAction::Issue => format!("Issued book {book_id} to member {member_id}."),
            LoanAction::Return => format!("Member {member_id} returned book {book_id}."),
        };
        self.report_applied(message, &applied);
        Ok(())
    }

    fn handle_search(&mut self, code: KeyCode, mut state: SearchState) -> Mode {
        match code {
            KeyCode::Esc => {
                self.books
                    .set_filter(self.library.catalog(), state.previous.take());
                return Mode::Normal;
            }
            KeyCode::Enter => {
                let filter = if state.filter.query.trim().is_empty() {
                    None
                } else {
                    Some(state.filter.clone())
                };
                let message = match &filter {
                    Some(filter) => format!(
                        "{} match(es) for {} containing \"{}\".",
                        self.books.rows.len(),
                        filter.field,
                        filter.query.trim()
                    ),
                    None => "Search cleared.".to_string(),
                };
                self.books.set_filter(self.library.catalog(), filter);
                self.set_status(message, StatusKind::Info);
                return Mode::Normal;
            }
            KeyCode::Tab => {
                state.filter.field = state.filter.field.next();
                self.search_field = state.filter.field;
            }
            KeyCode::Backspace => {
                state.filter.query.pop();
            }
            KeyCode::Char(ch) if !ch.is_control() => state.filter.query.push(ch),
            _ => return Mode::Searching(state),
        }
        self.books
            .set_filter(self.library.catalog(), Some(state.filter.clone()));
        Mode::Searching(state)
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(SIDEBAR_WIDTH)])
            .split(content_area);
        self.draw_book_table(frame, columns[0]);
        self.draw_sidebar(frame, columns[1]);

        self.draw_footer(frame, footer_area);

        match &self.mode {
            Mode::AddingBook(form) => self.draw_book_form(frame, area, form),
            Mode::AddingMember(form) => self.draw_member_form(frame, area, form),
            Mode::Issuing(form) => self.draw_loan_form(frame, area, "Issue Book", form),
            Mode::Returning(form) => self.draw_loan_form(frame, area, "Return Book", form),
            Mode::Searching(state) => self.draw_search_bar(frame, area, state),
            Mode::Normal => {}
        }
    }

    fn draw_book_table(&self, frame: &mut Frame, area: Rect) {
        let catalog = self.library.catalog();
        let mut title = format!(
            " Books ({} of {}) - sorted by {} ",
            self.books.rows.len(),
            catalog.book_count(),
            self.books.sort
        );
        if let Some(filter) = &self.books.filter {
            title.push_str(&format!("- {} contains \"{}\" ", filter.field, filter.query));
        }

        let rows: Vec<Row> = self
            .books
            .rows
            .iter()
            .filter_map(|id| catalog.book(*id))
            .map(|book| {
                let status_style = if book.is_issued() {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default().fg(Color::Green)
                };
                Row::new(vec![
                    Cell::from(book.id().to_string()),
                    Cell::from(book.title().to_string()),
                    Cell::from(book.author().to_string()),
                    Cell::from(book.category().to_string()),
                    Cell::from(Span::styled(book.status_label(), status_style)),
                ])
            })
            .collect();

        let header = Row::new(vec!["ID", "Title", "Author", "Category", "Status"])
            .style(Style::default().add_modifier(Modifier::BOLD));
        let widths = [
            Constraint::Length(6),
            Constraint::Percentage(40),
            Constraint::Percentage(30),
            Constraint::Percentage(20),
            Constraint::Length(9),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(title))
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");

        let mut state = TableState::default();
        if !self.books.rows.is_empty() {
            state.select(Some(self.books.selected));
        }
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_sidebar(&self, frame: &mut Frame, area: Rect) {
        let catalog = self.library.catalog();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(area);

        let width = area.width.saturating_sub(4) as usize;
        let members: Vec<ListItem> = catalog
            .members()
            .map(|member| {
                let held = if member.issued_book_ids().is_empty() {
                    "no books".to_string()
                } else {
                    member
                        .issued_book_ids()
                        .iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                ListItem::new(vec![
                    Line::from(Span::styled(
                        truncate(&format!("{} {}", member.id(), member.name()), width),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(truncate(&format!("  {}", member.email()), width)),
                    Line::from(Span::styled(
                        truncate(&format!("  holds: {held}"), width),
                        Style::default().fg(Color::Gray),
                    )),
                ])
            })
            .collect();
        let members_list = List::new(members).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Members ({}) ", catalog.member_count())),
        );
        frame.render_widget(members_list, chunks[0]);

        let categories: Vec<ListItem> = catalog
            .categories()
            .iter()
            .map(|category| ListItem::new(truncate(category, width)))
            .collect();
        let categories_list = List::new(categories)
            .block(Block::default().borders(Borders::ALL).title(" Categories "));
        frame.render_widget(categories_list, chunks[1]);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let paragraph =
            Paragraph::new(vec![status_line, self.footer_instructions()]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let hints: &[(&str, &str)] = match &self.mode {
            Mode::Normal => &[
                ("[b]", " Add book   "),
                ("[m]", " Add member   "),
                ("[i]", " Issue   "),
                ("[r]", " Return   "),
                ("[/]", " Search   "),
                ("[f]", " Search field   "),
                ("[s]", " Sort   "),
                ("[q]", " Quit"),
            ],
            Mode::Searching(_) => &[
                ("[Tab]", " Field   "),
                ("[Enter]", " Keep   "),
                ("[Esc]", " Cancel"),
            ],
            Mode::AddingBook(_) => &[
                ("[Tab]", " Next field / accept   "),
                ("[Enter]", " Save   "),
                ("[Esc]", " Cancel"),
            ],
            _ => &[
                ("[Tab]", " Next field   "),
                ("[Enter]", " Save   "),
                ("[Esc]", " Cancel"),
            ],
        };

        let spans: Vec<Span<'static>> = hints
            .iter()
            .flat_map(|(key, label)| [Span::styled(*key, key_style), Span::raw(*label)])
            .collect();
        Line::from(spans)
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect, state: &SearchState) {
        let height = 3u16.min(area.height);
        let popup_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height,
        };
        frame.render_widget(Clear, popup_area);

        let prefix = format!("{}: ", state.filter.field);
        let block = Block::default().borders(Borders::ALL).title(" Search ");
        let paragraph = Paragraph::new(Span::raw(format!("{prefix}{}", state.filter.query)))
            .block(block.clone())
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x = inner.x
            + prefix.chars().count() as u16
            + state.filter.query.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn draw_book_form(&self, frame: &mut Frame, area: Rect, form: &BookForm) {
        let popup_area = centered_rect(60, 40, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(" Add Book ").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines: Vec<Line> = BookFormField::ORDER
            .iter()
            .map(|field| form.build_line(*field))
            .collect();
        lines.push(Line::from(""));
        lines.push(form_message(form.error.as_deref()));
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);

        let row = BookFormField::ORDER
            .iter()
            .position(|field| *field == form.active)
            .unwrap_or(0) as u16;
        let prefix = format!("{}: ", form.active.label()).len() as u16;
        let typed = form.value(form.active).chars().count() as u16;
        frame.set_cursor_position((inner.x + prefix + typed, inner.y + row));
    }

    fn draw_member_form(&self, frame: &mut Frame, area: Rect, form: &MemberForm) {
        let popup_area = centered_rect(60, 40, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(" Add Member ").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            form.build_line(MemberFormField::Name),
            form.build_line(MemberFormField::Email),
            Line::from(""),
            form_message(form.error.as_deref()),
        ];
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);

        let (prefix, row) = match form.active {
            MemberFormField::Name => ("Name: ".len() as u16, 0),
            MemberFormField::Email => ("Email: ".len() as u16, 1),
        };
        frame.set_cursor_position((
            inner.x + prefix + form.value_len(form.active) as u16,
            inner.y + row,
        ));
    }

    fn draw_loan_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &LoanForm) {
        let popup_area = centered_rect(50, 35, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(format!(" {title} "))
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![
            form.build_line(LoanField::Member),
            form.build_line(LoanField::Book),
        ];
        if let Ok((member_id, book_id)) = form.parse_inputs() {
            lines.push(Line::from(Span::styled(
                self.loan_preview(member_id, book_id),
                Style::default().fg(Color::Gray),
            )));
        } else {
            lines.push(Line::from(""));
        }
        lines.push(form_message(form.error.as_deref()));
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);

        let (prefix, row) = match form.active {
            LoanField::Member => ("Member ID: ".len() as u16, 0),
            LoanField::Book => ("Book ID: ".len() as u16, 1),
        };
        frame.set_cursor_position((
            inner.x + prefix + form.value_len(form.active) as u16,
            inner.y + row,
        ));
    }

    /// Describe who and what the loan form currently points at.
    fn loan_preview(&self, member_id: MemberId, book_id: BookId) -> String {
        let catalog = self.library.catalog();
        let member = catalog
            .member(member_id)
            .map(|member| member.name().to_string())
            .unwrap_or_else(|| "unknown member".to_string());
        let book = catalog
            .book(book_id)
            .map(|book| format!("\"{}\" ({})", book.title(), book.status_label()))
            .unwrap_or_else(|| "unknown book".to_string());
        format!("{member} / {book}")
    }

    fn holder_of(&self, book_id: BookId) -> Option<MemberId> {
        self.library
            .catalog()
            .members()
            .find(|member| member.has_issued(book_id))
            .map(|member| member.id())
    }

    fn report_applied<T>(&mut self, message: String, applied: &Applied<T>) {
        match &applied.save_error {
            None => self.set_status(message, StatusKind::Info),
            Some(err) => self.set_status(
                format!("{message} Not saved: {}", surface_error(err)),
                StatusKind::Error,
            ),
        }
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }
}

/// Issue and return share a form; this tells them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoanAction {
    Issue,
    Return,
}

impl LoanAction {
    fn title(&self) -> &'static str {
        match self {
            LoanAction::Issue => "Issue",
            LoanAction::Return => "Return",
        }
    }

    fn mode(&self, form: LoanForm) -> Mode {
        match self {
            LoanAction::Issue => Mode::Issuing(form),
            LoanAction::Return => Mode::Returning(form),
        }
    }
}

/// Error text when there is one, otherwise the key reminder.
fn form_message(error: Option<&str>) -> Line<'static> {
    match error {
        Some(error) => Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red),
        )),
        None => Line::from(Span::styled(
            "Enter to save • Tab to switch • Esc to cancel",
            Style::default().fg(Color::Gray),
        )),
    }
}
