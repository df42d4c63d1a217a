//! Page-number pagination over counted result sets.
//!
//! The listing pages ask the database for a row count first, pick a page
//! window from the raw `?page=` value, and then fetch only that window with
//! `LIMIT`/`OFFSET`. Bad page values never fail: anything unparsable or below
//! one falls back to the first page, anything past the end to the last page.

use serde::Serialize;

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    count: i64,
    per_page: i64,
}

/// The slice of rows a page covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: i64,
    pub num_pages: i64,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub object_list: Vec<T>,
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<i64>,
    pub previous_page_number: Option<i64>,
    pub page_range: Vec<i64>,
}

impl Paginator {
    pub fn new(count: i64, per_page: i64) -> Self {
        Self {
            count: count.max(0),
            per_page: per_page.max(1),
        }
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    /// An empty result set still has one (empty) page.
    pub fn num_pages(&self) -> i64 {
        if self.count == 0 {
            1
        } else {
            (self.count + self.per_page - 1) / self.per_page
        }
    }

    pub fn get_page(&self, raw: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages();
        let number = raw
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .clamp(1, num_pages);

        PageWindow {
            number,
            num_pages,
            offset: (number - 1) * self.per_page,
            limit: self.per_page,
        }
    }

    pub fn page<T>(&self, window: PageWindow, object_list: Vec<T>) -> Page<T> {
        let has_next = window.number < window.num_pages;
        let has_previous = window.number > 1;
        Page {
            object_list,
            number: window.number,
            num_pages: window.num_pages,
            count: self.count,
            has_next,
            has_previous,
            next_page_number: has_next.then_some(window.number + 1),
            previous_page_number: has_previous.then_some(window.number - 1),
            page_range: (1..=window.num_pages).collect(),
        }
    }
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.object_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_list.is_empty()
    }
}
