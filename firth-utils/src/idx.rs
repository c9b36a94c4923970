//! Typed index arenas used by the IR and the passes.

use std::marker::PhantomData;
use std::ops;

/// A type that can be used as an index into an arena.
pub trait IndexRef: Copy + Eq {
    fn index(&self) -> usize;
    fn new(input: usize) -> Self;
}

#[macro_export]
/// Implement [`IndexRef`](crate::IndexRef) for a tuple struct wrapping a
/// `u32`.
macro_rules! impl_idx {
    ($struct_name: ident) => {
        impl $crate::IndexRef for $struct_name {
            fn index(&self) -> usize {
                self.0 as usize
            }

            fn new(input: usize) -> Self {
                Self(input as u32)
            }
        }

        impl From<usize> for $struct_name {
            fn from(input: usize) -> Self {
                $crate::IndexRef::new(input)
            }
        }
    };
}

/// A dense map from a typed index to a value. Insertion hands out the next
/// index; entries are never removed.
#[derive(Debug, Clone)]
pub struct IndexedMap<K, D>
where
    K: IndexRef,
{
    data: Vec<D>,
    phantom: PhantomData<K>,
}

impl<K, D> Default for IndexedMap<K, D>
where
    K: IndexRef,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, D> IndexedMap<K, D>
where
    K: IndexRef,
{
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            phantom: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Insert a new value and return its index.
    pub fn push(&mut self, item: D) -> K {
        self.data.push(item);
        K::new(self.data.len() - 1)
    }

    /// The index the next [`push`](Self::push) will return.
    pub fn peek_next_idx(&self) -> K {
        K::new(self.data.len())
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &D)> {
        self.data.iter().enumerate().map(|(i, v)| (K::new(i), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        (0..self.data.len()).map(K::new)
    }

    pub fn values(&self) -> impl Iterator<Item = &D> {
        self.data.iter()
    }
}

impl<K, D> ops::Index<K> for IndexedMap<K, D>
where
    K: IndexRef,
{
    type Output = D;

    fn index(&self, index: K) -> &Self::Output {
        &self.data[index.index()]
    }
}

impl<K, D> ops::IndexMut<K> for IndexedMap<K, D>
where
    K: IndexRef,
{
    fn index_mut(&mut self, index: K) -> &mut Self::Output {
        &mut self.data[index.index()]
    }
}
