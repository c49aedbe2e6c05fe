//! # Arena Allocator
//!
//! A push-only arena for records that live until the whole arena is released.

/// Typed index into an [`Arena`].
pub trait ArenaId: Copy {
    /// Wraps a raw slot index.
    fn from_index(index: usize) -> Self;
    /// Returns the raw slot index.
    fn index(self) -> usize;
}

/// Narrows a slot index to a 32-bit id.
///
/// # Panics
///
/// Panics if `index` does not fit in 32 bits.
#[inline]
#[must_use]
pub fn narrow_index(index: usize) -> u32 {
    match u32::try_from(index) {
        Ok(id) => id,
        Err(_) => panic!("arena index {index} exceeds the 32-bit id space"),
    }
}

/// A bump arena of `T` records addressed by typed ids.
///
/// Records are never freed individually. Ids stay valid until
/// [`release`](Self::release) or drop, which frees every record at once.
///
/// # Example
///
/// ```rust,ignore
/// let mut arena: Arena<ChunkId, Chunk> = Arena::new();
/// let id = arena.alloc(chunk);
/// arena.get_mut(id).len += 1;
/// ```
pub struct Arena<I: ArenaId, T> {
    items: Vec<T>,
    _id: std::marker::PhantomData<fn() -> I>,
}

impl<I: ArenaId, T> Arena<I, T> {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            _id: std::marker::PhantomData,
        }
    }

    /// Number of records allocated so far.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Checks if nothing has been allocated.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Id the next call to [`alloc`](Self::alloc) will return.
    #[inline]
    #[must_use]
    pub fn next_id(&self) -> I {
        I::from_index(self.items.len())
    }

    /// Stores a record and returns its id.
    #[inline]
    pub fn alloc(&mut self, item: T) -> I {
        let id = self.next_id();
        self.items.push(item);
        id
    }

    /// Gets a record.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this arena.
    #[inline]
    #[must_use]
    pub fn get(&self, id: I) -> &T {
        &self.items[id.index()]
    }

    /// Gets a record mutably.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this arena.
    #[inline]
    pub fn get_mut(&mut self, id: I) -> &mut T {
        &mut self.items[id.index()]
    }

    /// Gets two distinct records mutably at the same time.
    ///
    /// # Panics
    ///
    /// Panics if `a == b` or either id is out of range.
    pub fn get_pair_mut(&mut self, a: I, b: I) -> (&mut T, &mut T) {
        let (a, b) = (a.index(), b.index());
        assert_ne!(a, b, "get_pair_mut requires two distinct ids");
        if a < b {
            let (left, right) = self.items.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = self.items.split_at_mut(a);
            (&mut right[0], &mut left[b])
        }
    }

    /// Iterates over `(id, record)` in allocation order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (I, &T)> + ExactSizeIterator {
        self.items
            .iter()
            .enumerate()
            .map(|(index, item)| (I::from_index(index), item))
    }

    /// Frees every record. All previously returned ids become invalid.
    pub fn release(&mut self) {
        self.items = Vec::new();
    }
}

impl<I: ArenaId, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}
