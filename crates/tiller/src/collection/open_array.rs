use serde::{Deserialize, Serialize};

use super::{checked_cursor, Identifiable, OpenCollection, Parts};

/// Tab-style open collection.
///
/// ```ignore
/// let mut tabs = OpenArray::new(vec![Color::Red, Color::Green], Some(1));
/// tabs.insert_at_cursor(Color::Blue);
/// assert_eq!(tabs.current(), Some(&Color::Blue));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Parts<T>")]
pub struct OpenArray<T> {
    elements: Vec<T>,
    cursor: Option<usize>,
}

impl<T: Identifiable> OpenArray<T> {
    /// A cursor outside `elements` is dropped.
    pub fn new(elements: Vec<T>, cursor: Option<usize>) -> Self {
        let cursor = checked_cursor(&elements, cursor);
        Self { elements, cursor }
    }

    /// Insert `element` just after the open element and open it. With no
    /// open element it goes to the front.
    pub fn insert_at_cursor(&mut self, element: T) {
        let position = self.cursor.map_or(0, |index| index + 1);
        self.elements.insert(position, element);
        self.cursor = Some(position);
    }

    /// Insert `element` at `position` (clamped to the end) and open it.
    pub fn insert_at(&mut self, element: T, position: usize) {
        let position = position.min(self.elements.len());
        self.elements.insert(position, element);
        self.cursor = Some(position);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elements.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.elements
    }
}

impl<T> Default for OpenArray<T> {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
            cursor: None,
        }
    }
}

impl<T> From<Vec<T>> for OpenArray<T> {
    fn from(elements: Vec<T>) -> Self {
        Self {
            elements,
            cursor: None,
        }
    }
}

impl<T> From<Parts<T>> for OpenArray<T> {
    fn from(parts: Parts<T>) -> Self {
        let cursor = checked_cursor(&parts.elements, parts.cursor);
        Self {
            elements: parts.elements,
            cursor,
        }
    }
}

impl<T: Identifiable> OpenCollection for OpenArray<T> {
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
