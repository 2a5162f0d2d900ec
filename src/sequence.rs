//! Persistent sequences.
//!
//! `PersistentSequence<E>` is an immutable vector: `set` and `push` return a new version and
//! leave the receiver untouched, so any version a thread holds on to keeps showing the same
//! content forever.
//!
//! # Design
//!
//! Elements live in the leaves of a 32-way trie, addressed by the bits of their index, five at a
//! time from the top. The last (up to) 32 elements are kept outside the trie in a tail leaf,
//! which makes appends cheap: most of them only copy the tail.
//!
//! Nodes are reference counted and shared between versions. An update copies the path from the
//! root to the changed leaf and nothing else, i.e. `O(log32 n)` nodes.

use std::fmt;
use std::iter::FromIterator;
use std::ops;
use std::sync::Arc;

use crate::Error;

/// The number of index bits consumed per trie level.
const BITS: usize = 5;
/// The fan-out of a trie node.
const WIDTH: usize = 1 << BITS;
/// Mask of the index bits of one level.
const MASK: usize = WIDTH - 1;

/// A trie node.
enum Node<E> {
    /// An inner node.
    Branch(Vec<Arc<Node<E>>>),
    /// A chunk of up to `WIDTH` consecutive elements.
    Leaf(Vec<E>),
}

impl<E> Node<E> {
    fn children(&self) -> &[Arc<Node<E>>] {
        match *self {
            Node::Branch(ref children) => &children[..],
            Node::Leaf(_) => &[],
        }
    }

    fn elements(&self) -> &[E] {
        match *self {
            Node::Leaf(ref elements) => &elements[..],
            Node::Branch(_) => &[],
        }
    }
}

/// Wrap `node` in single-child branches until it sits `level` bits deep.
fn new_path<E>(level: usize, node: Arc<Node<E>>) -> Arc<Node<E>> {
    if level == 0 {
        node
    } else {
        Arc::new(Node::Branch(vec![new_path(level - BITS, node)]))
    }
}

/// Copy the path to `index` below `node`, replacing the element at `index`.
fn assoc<E: Clone>(level: usize, node: &Node<E>, index: usize, element: E) -> Node<E> {
    match *node {
        Node::Leaf(ref elements) => {
            let mut elements = elements.clone();
            elements[index & MASK] = element;
            Node::Leaf(elements)
        }
        Node::Branch(ref children) => {
            let mut children = children.clone();
            let sub = (index >> level) & MASK;
            let child = Arc::new(assoc(level - BITS, &children[sub], index, element));
            children[sub] = child;
            Node::Branch(children)
        }
    }
}

/// An immutable, structurally shared sequence.
pub struct PersistentSequence<E> {
    /// The number of elements.
    len: usize,
    /// The index bits above the root's children, i.e. `BITS` times the trie depth.
    shift: usize,
    /// The trie holding every element before the tail.
    root: Arc<Node<E>>,
    /// The last chunk of elements, always a leaf.
    tail: Arc<Node<E>>,
}

impl<E> PersistentSequence<E> {
    /// Create an empty sequence.
    pub fn new() -> PersistentSequence<E> {
        PersistentSequence {
            len: 0,
            shift: BITS,
            root: Arc::new(Node::Branch(Vec::new())),
            tail: Arc::new(Node::Leaf(Vec::new())),
        }
    }

    /// The number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Is the sequence empty?
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the element at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&E> {
        if index < self.len {
            self.chunk(index).get(index & MASK)
        } else {
            None
        }
    }

    /// Iterate over the elements in index order.
    pub fn iter(&self) -> Iter<'_, E> {
        Iter {
            seq: self,
            index: 0,
            chunk: &[],
        }
    }

    /// The index of the first element in the tail.
    fn tail_offset(&self) -> usize {
        if self.len < WIDTH {
            0
        } else {
            ((self.len - 1) >> BITS) << BITS
        }
    }

    /// The leaf holding `index`, which must be in bounds.
    fn chunk(&self, index: usize) -> &[E] {
        if index >= self.tail_offset() {
            return self.tail.elements();
        }

        let mut node = &*self.root;
        let mut level = self.shift;
        while level > 0 {
            node = &*node.children()[(index >> level) & MASK];
            level -= BITS;
        }

        node.elements()
    }

    /// Hang the full tail `tail` into the trie below `parent`, sitting at `level`.
    fn push_tail(&self, level: usize, parent: &Node<E>, tail: Arc<Node<E>>) -> Node<E> {
        let sub = ((self.len - 1) >> level) & MASK;
        let mut children = parent.children().to_vec();

        let node = if level == BITS {
            tail
        } else if let Some(child) = parent.children().get(sub) {
            Arc::new(self.push_tail(level - BITS, child, tail))
        } else {
            new_path(level - BITS, tail)
        };

        if sub < children.len() {
            children[sub] = node;
        } else {
            children.push(node);
        }

        Node::Branch(children)
    }
}

impl<E: Clone> PersistentSequence<E> {
    /// Return a copy with the element at `index` replaced by `element`.
    ///
    /// Fails with `Error::OutOfBounds` if `index` is not below `len()`.
    pub fn set(&self, index: usize, element: E) -> Result<PersistentSequence<E>, Error> {
        if index >= self.len {
            return Err(Error::OutOfBounds {
                index,
                len: self.len,
            });
        }

        let mut seq = self.clone();
        if index >= self.tail_offset() {
            let mut tail = self.tail.elements().to_vec();
            tail[index & MASK] = element;
            seq.tail = Arc::new(Node::Leaf(tail));
        } else {
            seq.root = Arc::new(assoc(self.shift, &self.root, index, element));
        }

        Ok(seq)
    }

    /// Return a copy with `element` appended.
    pub fn push(&self, element: E) -> PersistentSequence<E> {
        if self.len - self.tail_offset() < WIDTH {
            let mut tail = self.tail.elements().to_vec();
            tail.push(element);

            return PersistentSequence {
                len: self.len + 1,
                shift: self.shift,
                root: self.root.clone(),
                tail: Arc::new(Node::Leaf(tail)),
            };
        }

        // The tail is full and moves into the trie. If the trie is full as well, it grows a
        // level at the top.
        let full_tail = self.tail.clone();
        let (root, shift) = if (self.len >> BITS) > (1 << self.shift) {
            let root = Node::Branch(vec![self.root.clone(), new_path(self.shift, full_tail)]);
            (Arc::new(root), self.shift + BITS)
        } else {
            (Arc::new(self.push_tail(self.shift, &self.root, full_tail)), self.shift)
        };

        PersistentSequence {
            len: self.len + 1,
            shift,
            root,
            tail: Arc::new(Node::Leaf(vec![element])),
        }
    }
}

impl<E> Clone for PersistentSequence<E> {
    fn clone(&self) -> PersistentSequence<E> {
        PersistentSequence {
            len: self.len,
            shift: self.shift,
            root: self.root.clone(),
            tail: self.tail.clone(),
        }
    }
}

impl<E> Default for PersistentSequence<E> {
    fn default() -> PersistentSequence<E> {
        PersistentSequence::new()
    }
}

impl<E> ops::Index<usize> for PersistentSequence<E> {
    type Output = E;

    fn index(&self, index: usize) -> &E {
        match self.get(index) {
            Some(element) => element,
            None => panic!("{}", Error::OutOfBounds { index, len: self.len }),
        }
    }
}

impl<E: Clone> FromIterator<E> for PersistentSequence<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> PersistentSequence<E> {
        iter.into_iter()
            .fold(PersistentSequence::new(), |seq, element| seq.push(element))
    }
}

impl<E: PartialEq> PartialEq for PersistentSequence<E> {
    fn eq(&self, other: &PersistentSequence<E>) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<E: Eq> Eq for PersistentSequence<E> {}

impl<E: fmt::Debug> fmt::Debug for PersistentSequence<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, E> IntoIterator for &'a PersistentSequence<E> {
    type Item = &'a E;
    type IntoIter = Iter<'a, E>;

    fn into_iter(self) -> Iter<'a, E> {
        self.iter()
    }
}

/// An iterator over a `PersistentSequence`, in index order.
pub struct Iter<'a, E> {
    seq: &'a PersistentSequence<E>,
    /// The index of the next element.
    index: usize,
    /// The leaf containing `index`, once it has been entered.
    chunk: &'a [E],
}

impl<'a, E> Iterator for Iter<'a, E> {
    type Item = &'a E;

    fn next(&mut self) -> Option<&'a E> {
        if self.index >= self.seq.len {
            return None;
        }

        if self.index & MASK == 0 {
            self.chunk = self.seq.chunk(self.index);
        }

        let element = &self.chunk[self.index & MASK];
        self.index += 1;

        Some(element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.seq.len - self.index;
        (left, Some(left))
    }
}

impl<'a, E> ExactSizeIterator for Iter<'a, E> {}
