//! Ordered collections with an optional "open" element.
//!
//! An open collection pairs a `Vec<T>` with a cursor: `None`, or the index of
//! the element that is currently open (the selected tab, the visible page).
//! Every operation keeps the cursor valid:
//!
//! ```text
//!   [ a  b  c  d ]      close_at(1)      [ a  c  d ]
//!           ^                               ^
//!        cursor 2                        cursor 1
//! ```
//!
//! Two flavors share the [`OpenCollection`] operations:
//!
//! - [`OpenArray`]: tabs. Inserting opens the new element next to the
//!   current one.
//! - [`NavigationalArray`]: history. Inserting discards everything after
//!   the cursor, and the cursor can step back and forward.

mod navigational;
mod open_array;

pub use navigational::NavigationalArray;
pub use open_array::OpenArray;

use serde::Deserialize;

/// Element with a stable identity inside a collection.
pub trait Identifiable {
    type Id: PartialEq + Clone;

    fn id(&self) -> Self::Id;
}

/// Id type of an [`Identifiable`] element.
pub type ItemId<T> = <T as Identifiable>::Id;

/// Names one element of an open collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Specifier<Id> {
    /// The open element, if any.
    Current,
    /// The first element with this id.
    Id(Id),
    /// The element at this index.
    At(usize),
}

/// Cursor operations shared by [`OpenArray`] and [`NavigationalArray`].
///
/// Implementors supply storage access; the provided methods maintain the
/// cursor invariant.
pub trait OpenCollection {
    type Item: Identifiable;

    fn elements(&self) -> &[Self::Item];

    fn cursor(&self) -> Option<usize>;

    /// Raw storage. Callers must leave the cursor `None` or in bounds.
    fn parts_mut(&mut self) -> (&mut Vec<Self::Item>, &mut Option<usize>);

    fn len(&self) -> usize {
        self.elements().len()
    }

    fn is_empty(&self) -> bool {
        self.elements().is_empty()
    }

    /// The open element.
    fn current(&self) -> Option<&Self::Item> {
        self.get(self.cursor())
    }

    fn current_mut(&mut self) -> Option<&mut Self::Item> {
        let (elements, cursor) = self.parts_mut();
        (*cursor).and_then(|index| elements.get_mut(index))
    }

    /// Element at `index`, if `index` is present and in bounds.
    fn get(&self, index: Option<usize>) -> Option<&Self::Item> {
        index.and_then(|index| self.elements().get(index))
    }

    /// Resolve `specifier` to an in-bounds index.
    fn index_of(&self, specifier: &Specifier<ItemId<Self::Item>>) -> Option<usize> {
        match specifier {
            Specifier::Current => self.cursor(),
            Specifier::Id(id) => self.elements().iter().position(|e| e.id() == *id),
            Specifier::At(index) => (*index < self.len()).then_some(*index),
        }
    }

    /// Id of the element `specifier` names.
    fn id_of(&self, specifier: &Specifier<ItemId<Self::Item>>) -> Option<ItemId<Self::Item>> {
        match specifier {
            Specifier::Id(id) => Some(id.clone()),
            other => self.get(self.index_of(other)).map(Identifiable::id),
        }
    }

    /// Overwrite the element `specifier` names. Returns whether anything
    /// was replaced.
    fn replace(&mut self, specifier: &Specifier<ItemId<Self::Item>>, element: Self::Item) -> bool {
        let Some(index) = self.index_of(specifier) else {
            return false;
        };
        let (elements, _) = self.parts_mut();
        elements[index] = element;
        true
    }

    fn clear(&mut self) {
        let (elements, cursor) = self.parts_mut();
        elements.clear();
        *cursor = None;
    }

    /// Move the cursor to the element `specifier` names, or to `None` when
    /// nothing matches.
    fn open(&mut self, specifier: &Specifier<ItemId<Self::Item>>) {
        let index = self.index_of(specifier);
        *self.parts_mut().1 = index;
    }

    /// Open the first element with `id`; `None` closes the cursor.
    fn open_by_id(&mut self, id: Option<ItemId<Self::Item>>) {
        match id {
            Some(id) => self.open(&Specifier::Id(id)),
            None => *self.parts_mut().1 = None,
        }
    }

    /// Remove the element `specifier` names.
    fn close(&mut self, specifier: &Specifier<ItemId<Self::Item>>) -> Option<Self::Item> {
        let index = self.index_of(specifier)?;
        self.close_at(index)
    }

    fn close_by_id(&mut self, id: &ItemId<Self::Item>) -> Option<Self::Item> {
        let index = self.elements().iter().position(|e| e.id() == *id)?;
        self.close_at(index)
    }

    /// Remove the element at `index`. A cursor at or after it moves back one
    /// place; a cursor at 0 stays while elements remain.
    fn close_at(&mut self, index: usize) -> Option<Self::Item> {
        let (elements, cursor) = self.parts_mut();
        if index >= elements.len() {
            return None;
        }
        let removed = elements.remove(index);
        if let Some(current) = *cursor {
            if current >= index {
                *cursor = match current {
                    0 if elements.is_empty() => None,
                    0 => Some(0),
                    n => Some(n - 1),
                };
            }
        }
        Some(removed)
    }
}

/// Serialized form, validated on the way in.
#[derive(Deserialize)]
struct Parts<T> {
    elements: Vec<T>,
    cursor: Option<usize>,
}

/// Drop a cursor that does not point into `elements`.
fn checked_cursor<T>(elements: &[T], cursor: Option<usize>) -> Option<usize> {
    cursor.filter(|index| *index < elements.len())
}
