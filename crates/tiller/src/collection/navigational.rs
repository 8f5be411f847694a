use serde::{Deserialize, Serialize};

use super::{checked_cursor, Identifiable, OpenCollection, Parts};

/// History-style open collection: the cursor is the current page, elements
/// before it are "back" and elements after it are "forward".
///
/// Inserting a page discards the forward branch, the way a browser does
/// after navigating from a page reached with "back".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Parts<T>")]
pub struct NavigationalArray<T> {
    elements: Vec<T>,
    cursor: Option<usize>,
}

impl<T: Identifiable + PartialEq> NavigationalArray<T> {
    /// A cursor outside `elements` is dropped.
    pub fn new(elements: Vec<T>, cursor: Option<usize>) -> Self {
        let cursor = checked_cursor(&elements, cursor);
        Self { elements, cursor }
    }

    /// Visit `element`: it goes right after the cursor, everything beyond it
    /// is dropped, and it becomes current. Visiting the current element
    /// again does nothing.
    pub fn insert_at_cursor(&mut self, element: T) {
        if self.current() == Some(&element) {
            return;
        }
        let position = self.cursor.map_or(0, |index| index + 1);
        self.elements.truncate(position);
        self.elements.push(element);
        self.cursor = Some(position);
    }

    /// Step back one element. Returns `false` at the start or with no cursor.
    pub fn navigate_back(&mut self) -> bool {
        match self.cursor {
            Some(index) if index > 0 => {
                self.cursor = Some(index - 1);
                true
            }
            _ => false,
        }
    }

    /// Step forward one element. With no cursor, opens the first element.
    pub fn navigate_forward(&mut self) -> bool {
        let next = self.cursor.map_or(0, |index| index + 1);
        if next >= self.elements.len() {
            return false;
        }
        self.cursor = Some(next);
        true
    }

    pub fn can_navigate_back(&self) -> bool {
        self.cursor.is_some_and(|index| index > 0)
    }

    pub fn can_navigate_forward(&self) -> bool {
        self.cursor.map_or(0, |index| index + 1) < self.elements.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elements.iter()
    }
}

impl<T> Default for NavigationalArray<T> {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
            cursor: None,
        }
    }
}

impl<T> From<Parts<T>> for NavigationalArray<T> {
    fn from(parts: Parts<T>) -> Self {
        let cursor = checked_cursor(&parts.elements, parts.cursor);
        Self {
            elements: parts.elements,
            cursor,
        }
    }
}

impl<T: Identifiable> OpenCollection for NavigationalArray<T> {
    type Item = T;

    fn elements(&self) -> &[T] {
        &self.elements
    }

    fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    fn parts_mut(&mut self) -> (&mut Vec<T>, &mut Option<usize>) {
        (&mut self.elements, &mut self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::fixtures::Page;

    fn history(pages: &[u32], cursor: Option<usize>) -> NavigationalArray<Page> {
        NavigationalArray::new(pages.iter().copied().map(Page).collect(), cursor)
    }

    #[test]
    fn browsing_walkthrough() {
        let mut arr = history(&[0, 1], Some(1));
        assert!(arr.navigate_back());
        arr.insert_at_cursor(Page(2));
        assert!(!arr.navigate_forward());
        assert!(!arr.navigate_forward());
        assert_eq!(arr, history(&[0, 2], Some(1)));

        arr.open_by_id(Some(0));
        arr.close_at(0);
        assert_eq!(arr, history(&[2], Some(0)));

        arr.close_by_id(&2);
        assert_eq!(arr, history(&[], None));

        arr.insert_at_cursor(Page(5));
        arr.insert_at_cursor(Page(6));
        assert_eq!(arr, history(&[5, 6], Some(1)));
    }

    #[test]
    fn insert_truncates_the_forward_branch() {
        let mut arr = history(&[1, 2, 3, 4, 5], Some(1));
        arr.insert_at_cursor(Page(0));
        assert_eq!(arr, history(&[1, 2, 0], Some(2)));
    }

    #[test]
    fn revisiting_the_current_page_is_ignored() {
        let mut arr = history(&[1, 2, 3], Some(1));
        arr.insert_at_cursor(Page(2));
        assert_eq!(arr, history(&[1, 2, 3], Some(1)));
    }

    #[test]
    fn insert_without_cursor_starts_over() {
        let mut arr = history(&[1, 2, 3], None);
        arr.insert_at_cursor(Page(9));
        assert_eq!(arr, history(&[9], Some(0)));
    }

    #[test]
    fn navigation_stays_in_bounds() {
        let mut arr = history(&[1, 2], None);
        assert!(!arr.navigate_back());
        assert!(arr.can_navigate_forward());
        assert!(arr.navigate_forward());
        assert_eq!(arr.cursor(), Some(0));
        assert!(arr.navigate_forward());
        assert!(!arr.navigate_forward());
        assert!(!arr.can_navigate_forward());
        assert!(arr.can_navigate_back());
        assert!(arr.navigate_back());
        assert!(!arr.navigate_back());

        let mut empty = NavigationalArray::<Page>::default();
        assert!(!empty.navigate_forward());
        assert!(!empty.navigate_back());
        assert_eq!(empty.iter().count(), 0);
    }
}
