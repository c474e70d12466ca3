//! Generic FIFO queue
//!
//! Singly-linked chain of owned nodes with a tail pointer, so both
//! `enqueue` and `dequeue` are O(1). Removal by identity (`delete`) walks
//! the chain and is O(n).
//!
//! Nodes released by `dequeue`/`delete` go to a spare pool instead of the
//! allocator, and `reserve` can pre-fill that pool. The scheduler relies on
//! this: the preemption signal handler re-enqueues the running thread, and
//! that path must never call into `malloc`.
//!
//! Invariants: `len == 0` ⇔ `head` is empty ⇔ `tail` is null; the tail node
//! has no successor; `len` equals the number of nodes reachable from `head`.

use core::borrow::Borrow;
use core::fmt;
use core::ptr;

struct Node<T> {
    /// `Some` for live nodes, `None` for nodes in the spare pool
    data: Option<T>,
    next: Option<Box<Node<T>>>,
}

/// FIFO queue owning its elements
pub struct Queue<T> {
    head: Option<Box<Node<T>>>,
    tail: *mut Node<T>,
    len: usize,

    /// Recycled nodes, reused by `enqueue` before allocating
    spare: Option<Box<Node<T>>>,
    spare_len: usize,
}

// Safety: the raw tail pointer only ever aliases a node owned by `head`.
unsafe impl<T: Send> Send for Queue<T> {}
unsafe impl<T: Sync> Sync for Queue<T> {}

/// Error returned by [`Queue::destroy`] on a non-empty queue
///
/// Carries the queue back to the caller, untouched and still usable.
pub struct DestroyError<T>(pub Queue<T>);

impl<T> fmt::Debug for DestroyError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestroyError").field("len", &self.0.len()).finish()
    }
}

impl<T> fmt::Display for DestroyError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue not empty ({} element(s))", self.0.len())
    }
}

impl<T> std::error::Error for DestroyError<T> {}

impl<T> Queue<T> {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: ptr::null_mut(),
            len: 0,
            spare: None,
            spare_len: 0,
        }
    }

    /// Dispose of the queue
    ///
    /// Fails unless the queue is empty, forcing callers to drain it first.
    pub fn destroy(self) -> Result<(), DestroyError<T>> {
        if self.len != 0 {
            return Err(DestroyError(self));
        }
        Ok(())
    }

    /// Append `item` at the tail
    pub fn enqueue(&mut self, item: T) {
        let mut node = self.take_node(item);
        let raw: *mut Node<T> = &mut *node;
        if self.tail.is_null() {
            self.head = Some(node);
        } else {
            unsafe { (*self.tail).next = Some(node) };
        }
        self.tail = raw;
        self.len += 1;
    }

    /// Insert `item` at the head, ahead of every queued element
    pub fn push_front(&mut self, item: T) {
        let mut node = self.take_node(item);
        node.next = self.head.take();
        if node.next.is_none() {
            self.tail = &mut *node;
        }
        self.head = Some(node);
        self.len += 1;
    }

    /// Remove and return the head element
    pub fn dequeue(&mut self) -> Option<T> {
        let mut node = self.head.take()?;
        self.head = node.next.take();
        if self.head.is_none() {
            self.tail = ptr::null_mut();
        }
        self.len -= 1;

        let data = node.data.take();
        self.recycle(node);
        data
    }

    /// Remove the first element whose address is `item`
    ///
    /// Comparison is by identity, not by value: for `Queue<Box<X>>` this
    /// matches the element whose heap allocation is `item`. Relative order of
    /// the remaining elements is preserved.
    pub fn delete<Q: ?Sized>(&mut self, item: &Q) -> Option<T>
    where
        T: Borrow<Q>,
    {
        self.delete_by(|data| ptr::eq(data.borrow(), item))
    }

    /// Remove the first element matching `pred`
    pub fn delete_by<F>(&mut self, mut pred: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        let mut prev: *mut Node<T> = ptr::null_mut();
        let mut link: *mut Option<Box<Node<T>>> = &mut self.head;

        unsafe {
            while let Some(node) = (*link).as_mut() {
                if node.data.as_ref().map_or(false, &mut pred) {
                    let mut removed = (*link).take()?;
                    *link = removed.next.take();
                    if ptr::eq(self.tail, &*removed) {
                        self.tail = prev;
                    }
                    self.len -= 1;

                    let data = removed.data.take();
                    self.recycle(removed);
                    return data;
                }
                prev = &mut **node;
                link = &mut node.next;
            }
        }
        None
    }

    /// Visit every element head to tail
    pub fn iterate<F>(&self, mut f: F)
    where
        F: FnMut(&T),
    {
        for item in self.iter() {
            f(item);
        }
    }

    /// Iterator over the elements, head to tail
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { next: self.head.as_deref() }
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Make sure the next `additional` enqueues do not allocate
    pub fn reserve(&mut self, additional: usize) {
        while self.spare_len < additional {
            let mut node = Box::new(Node { data: None, next: None });
            node.next = self.spare.take();
            self.spare = Some(node);
            self.spare_len += 1;
        }
    }

    /// Elements the queue can hold without allocating
    #[inline]
    pub fn capacity(&self) -> usize {
        self.len + self.spare_len
    }

    fn take_node(&mut self, item: T) -> Box<Node<T>> {
        match self.spare.take() {
            Some(mut node) => {
                self.spare = node.next.take();
                self.spare_len -= 1;
                node.data = Some(item);
                node
            }
            None => Box::new(Node { data: Some(item), next: None }),
        }
    }

    fn recycle(&mut self, mut node: Box<Node<T>>) {
        node.next = self.spare.take();
        self.spare = Some(node);
        self.spare_len += 1;
    }
}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        // Unlink iteratively; the default recursive drop would overflow
        // small thread stacks on long chains.
        let mut cur = self.head.take();
        while let Some(mut node) = cur {
            cur = node.next.take();
        }
        let mut cur = self.spare.take();
        while let Some(mut node) = cur {
            cur = node.next.take();
        }
        self.tail = ptr::null_mut();
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Extend<T> for Queue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.enqueue(item);
        }
    }
}

impl<T> FromIterator<T> for Queue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut queue = Queue::new();
        queue.extend(iter);
        queue
    }
}

impl<T: fmt::Debug> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Borrowing iterator returned by [`Queue::iter`]
pub struct Iter<'a, T> {
    next: Option<&'a Node<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let node = self.next?;
        self.next = node.next.as_deref();
        node.data.as_ref()
    }
}

impl<'a, T> IntoIterator for &'a Queue<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}
