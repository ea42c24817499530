use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared, in-place mutable value. [`RenderScope::use_ref`](crate::RenderScope::use_ref)
/// hands back the same cell on every render of the owning node; writes never
/// schedule an update.
///
/// Clones are handles to one value. Borrows are scoped to the closures passed
/// to [`with`](Self::with) and [`update`](Self::update), so a handle captured
/// by a setter or effect cannot hold a borrow across a render.
pub struct MutableCell<T> {
    value: Rc<RefCell<T>>,
}

impl<T> MutableCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Rc::new(RefCell::new(value)),
        }
    }

    pub fn with<R>(&self, read: impl FnOnce(&T) -> R) -> R {
        read(&self.value.borrow())
    }

    pub fn update<R>(&self, write: impl FnOnce(&mut T) -> R) -> R {
        write(&mut self.value.borrow_mut())
    }

    /// Stores `value` and returns the one it displaced.
    pub fn replace(&self, value: T) -> T {
        self.value.replace(value)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.value, &other.value)
    }
}

impl<T: Clone> MutableCell<T> {
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}

impl<T> Clone for MutableCell<T> {
    fn clone(&self) -> Self {
        Self {
            value: Rc::clone(&self.value),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for MutableCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value.try_borrow() {
            Ok(value) => f.debug_tuple("MutableCell").field(&*value).finish(),
            Err(_) => f.write_str("MutableCell(<borrowed>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MutableCell;

    #[test]
    fn clones_share_one_value() {
        let cell = MutableCell::new(1);
        let other = cell.clone();
        assert_eq!(other.replace(2), 1);
        assert_eq!(cell.get(), 2);
        assert!(cell.ptr_eq(&other));
        assert!(!cell.ptr_eq(&MutableCell::new(2)));
    }

    #[test]
    fn debug_does_not_panic_inside_an_update() {
        let cell = MutableCell::new(3);
        let shown = cell.update(|_| format!("{cell:?}"));
        assert_eq!(shown, "MutableCell(<borrowed>)");
        assert_eq!(format!("{cell:?}"), "MutableCell(3)");
    }
}
