//! Append-only lock-free lists.

use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{self, AtomicPtr, AtomicUsize};

/// A node of a directory.
struct Node<T> {
    /// The item.
    item: T,
    /// The node inserted before this one.
    ///
    /// This is set once, before the node is published, and never changed afterwards.
    next: *mut Node<T>,
}

/// A lock-free singly-linked list which can only grow.
///
/// Items are never moved or removed while the directory lives, so references handed out by
/// `get` and `iter` stay valid for as long as the directory is borrowed.
///
/// The most recently inserted item comes first: index 0 is the newest item.
pub struct Directory<T> {
    /// The newest node, or null.
    head: AtomicPtr<Node<T>>,
    /// The number of published nodes.
    ///
    /// This is bumped after the node is linked in, so it can briefly lag behind.
    len: AtomicUsize,
    /// The directory owns a list of `T`s.
    _marker: PhantomData<*const T>,
}

unsafe impl<T: Send> Send for Directory<T> {}
unsafe impl<T: Send + Sync> Sync for Directory<T> {}

impl<T> Directory<T> {
    /// Create an empty directory.
    pub fn new() -> Directory<T> {
        Directory {
            head: AtomicPtr::new(ptr::null_mut()),
            len: AtomicUsize::new(0),
            _marker: PhantomData,
        }
    }

    /// Insert an item at the front.
    pub fn insert(&self, item: T) {
        let node = Box::into_raw(Box::new(Node {
            item,
            next: ptr::null_mut(),
        }));

        let mut head = self.head.load(atomic::Ordering::Acquire);
        loop {
            // The node is still private, so its link can be rewritten freely.
            unsafe {
                (*node).next = head;
            }

            match self.head.compare_exchange_weak(
                head,
                node,
                atomic::Ordering::Release,
                atomic::Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => head = actual,
            }
        }

        self.len.fetch_add(1, atomic::Ordering::Release);
    }

    /// Get the item at `index`, counting from the newest.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.iter().nth(index)
    }

    /// The number of items.
    pub fn len(&self) -> usize {
        self.len.load(atomic::Ordering::Acquire)
    }

    /// Is the directory empty?
    pub fn is_empty(&self) -> bool {
        self.head.load(atomic::Ordering::Acquire).is_null()
    }

    /// Iterate over the items, newest first.
    ///
    /// The iterator sees the items present when it was created. Later insertions are not
    /// observed.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            node: self.head.load(atomic::Ordering::Acquire),
            _marker: PhantomData,
        }
    }
}

impl<T: PartialEq> Directory<T> {
    /// Does the directory contain an item equal to `item`?
    pub fn contains(&self, item: &T) -> bool {
        self.iter().any(|x| x == item)
    }
}

impl<T> Default for Directory<T> {
    fn default() -> Directory<T> {
        Directory::new()
    }
}

impl<T> Drop for Directory<T> {
    fn drop(&mut self) {
        let mut node = *self.head.get_mut();

        while !node.is_null() {
            // Having `&mut self`, nobody else can see the nodes anymore.
            let owned = unsafe { Box::from_raw(node) };
            node = owned.next;
        }
    }
}

impl<'a, T> IntoIterator for &'a Directory<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

/// An iterator over the items of a directory, newest first.
pub struct Iter<'a, T> {
    /// The next node, or null.
    node: *const Node<T>,
    _marker: PhantomData<&'a Directory<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        // Nodes live as long as the directory borrowed for `'a`.
        let node = unsafe { self.node.as_ref()? };
        self.node = node.next;

        Some(&node.item)
    }
}

unsafe impl<'a, T: Sync> Send for Iter<'a, T> {}
unsafe impl<'a, T: Sync> Sync for Iter<'a, T> {}
