use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Typed index into an [`AssetCache`](super::AssetCache).
///
/// The trait impls are written out by hand so they hold for any `T`; a
/// derive would require `T` itself to implement them.
pub struct Handle<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ty = std::any::type_name::<T>();
        let short = ty.rsplit("::").next().unwrap_or(ty);
        write!(f, "Handle<{}>({})", short, self.index)
    }
}

impl<T> Handle<T> {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct NotCloneable;

    #[test]
    fn handles_do_not_need_bounds_on_target() {
        let h1: Handle<NotCloneable> = Handle::new(5);
        let h2 = h1;
        assert_eq!(h1, h2);
        assert!(Handle::<NotCloneable>::new(2) < h1);

        let set: HashSet<_> = [h1, h2, Handle::new(1)].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn debug_names_the_target_type() {
        let h: Handle<String> = Handle::new(3);
        assert_eq!(format!("{:?}", h), "Handle<String>(3)");
    }
}
