use crate::catalog::Catalog;
use crate::models::{BookField, BookId};

/// An active search: which field and what text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SearchFilter {
    pub(crate) field: BookField,
    pub(crate) query: String,
}

/// Ordering, filtering, and selection for the main book table. Only ids are
/// kept; rows are looked up in the catalog at draw time so issue/return show
/// up without rebuilding the screen.
pub(crate) struct BookListScreen {
    pub(crate) rows: Vec<BookId>,
    pub(crate) sort: BookField,
    pub(crate) filter: Option<SearchFilter>,
    pub(crate) selected: usize,
}

impl BookListScreen {
    pub(crate) fn new(catalog: &Catalog) -> Self {
        let mut screen = Self {
            rows: Vec::new(),
            sort: BookField::Title,
            filter: None,
            selected: 0,
        };
        screen.refresh(catalog);
        screen
    }

    /// Rebuild the visible rows: search first (when a filter is set), then
    /// sort. Selection stays on the same book when it is still visible.
    pub(crate) fn refresh(&mut self, catalog: &Catalog) {
        let focus = self.current_book();
        let visible: Vec<BookId> = match &self.filter {
            Some(filter) if !filter.query.trim().is_empty() => catalog
                .search_books(filter.field, filter.query.trim())
                .iter()
                .map(|book| book.id())
                .collect(),
            _ => catalog.books().map(|book| book.id()).collect(),
        };

        self.rows = catalog
            .sort_books(self.sort)
            .into_iter()
            .map(|book| book.id())
            .filter(|id| visible.contains(id))
            .collect();

        if let Some(index) = focus.and_then(|id| self.rows.iter().position(|row| *row == id)) {
            self.selected = index;
        }
        self.ensure_in_bounds();
    }

    pub(crate) fn set_filter(&mut self, catalog: &Catalog, filter: Option<SearchFilter>) {
        self.filter = filter;
        self.refresh(catalog);
    }

    pub(crate) fn cycle_sort(&mut self, catalog: &Catalog) -> BookField {
        self.sort = self.sort.next();
        self.refresh(catalog);
        self.sort
    }

    /// Focus a specific book if it is visible.
    pub(crate) fn focus(&mut self, id: BookId) {
        if let Some(index) = self.rows.iter().position(|row| *row == id) {
            self.selected = index;
        }
    }

    pub(crate) fn current_book(&self) -> Option<BookId> {
        self.rows.get(self.selected).copied()
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        if self.rows.is_empty() {
            self.selected = 0;
            return;
        }
        let last = self.rows.len() - 1;
        let next = self.selected as isize + offset;
        self.selected = next.clamp(0, last as isize) as usize;
    }

    fn ensure_in_bounds(&mut self) {
        if self.rows.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.rows.len() {
            self.selected = self.rows.len() - 1;
        }
    }
}
