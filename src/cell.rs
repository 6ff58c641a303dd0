//! Cells and the singly linked bucket chains that own them.
//!
//! A chain link is an `Option<Box<Node>>`: `None` marks an empty bucket or the
//! end of a chain, `Some` owns the next node. Every edit walks a cursor over
//! `&mut Link`, so the link being rewritten is the one that owned the node,
//! whether that is the bucket head or a predecessor's `next`.
//!
//! Nodes never leave this module by `&mut`; callers get a [`CellMut`], which
//! can change the value but not the location or the chain.

use std::fmt;

/// An owning link in a bucket chain.
pub(crate) type Link = Option<Box<Node>>;

/// One materialized memory location and the rest of its chain.
pub(crate) struct Node {
    location: u64,
    value: u32,
    next: Link,
}

impl Node {
    #[inline]
    fn new(location: u64, value: u32) -> Self {
        Self {
            location,
            value,
            next: None,
        }
    }

    #[inline]
    pub(crate) fn location(&self) -> u64 {
        self.location
    }

    #[inline]
    pub(crate) fn value(&self) -> u32 {
        self.value
    }
}

/// Mutable handle to one materialized cell.
///
/// Returned by [`SparseMemoryTable::insert`](crate::SparseMemoryTable::insert).
/// Only the value can be changed through it.
pub struct CellMut<'a> {
    node: &'a mut Node,
}

impl CellMut<'_> {
    /// The address this cell materializes.
    #[inline]
    pub fn location(&self) -> u64 {
        self.node.location
    }

    /// The value currently stored.
    #[inline]
    pub fn value(&self) -> u32 {
        self.node.value
    }

    /// Overwrite the stored value, returning the previous one.
    #[inline]
    pub fn set(&mut self, value: u32) -> u32 {
        std::mem::replace(&mut self.node.value, value)
    }
}

impl fmt::Debug for CellMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellMut")
            .field("location", &self.node.location)
            .field("value", &self.node.value)
            .finish()
    }
}

/// Advance to the link that either holds the node for `location` or is the
/// `None` tail of the chain.
fn seek(mut link: &mut Link, location: u64) -> &mut Link {
    while link.as_ref().is_some_and(|node| node.location != location) {
        if let Some(node) = link {
            link = &mut node.next;
        }
    }
    link
}

/// A chain of cells whose locations share one bucket index.
pub(crate) struct Bucket {
    head: Link,
}

impl Bucket {
    pub(crate) const fn new() -> Self {
        Self { head: None }
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub(crate) fn cells(&self) -> Cells<'_> {
        Cells {
            next: self.head.as_deref(),
        }
    }

    pub(crate) fn find(&self, location: u64) -> Option<&Node> {
        self.cells().find(|node| node.location == location)
    }

    pub(crate) fn find_mut(&mut self, location: u64) -> Option<CellMut<'_>> {
        seek(&mut self.head, location)
            .as_deref_mut()
            .map(|node| CellMut { node })
    }

    /// Overwrite the cell for `location`, or append a new one at the tail.
    ///
    /// Returns the cell and whether it was created.
    pub(crate) fn upsert(&mut self, location: u64, value: u32) -> (CellMut<'_>, bool) {
        let link = seek(&mut self.head, location);
        let created = link.is_none();
        let node: &mut Node = match link {
            Some(node) => {
                node.value = value;
                node
            }
            None => link.insert(Box::new(Node::new(location, value))),
        };
        (CellMut { node }, created)
    }

    /// Detach the node for `location`, splicing its successor into the link
    /// that owned it. Returns the value it held.
    pub(crate) fn unlink(&mut self, location: u64) -> Option<u32> {
        let link = seek(&mut self.head, location);
        let mut node = link.take()?;
        *link = node.next.take();
        Some(node.value)
    }

    /// Free every node in the chain, head first, handing each to `inspect`
    /// before it is dropped. Returns the number of cells released.
    pub(crate) fn release(&mut self, mut inspect: impl FnMut(&Node)) -> usize {
        let mut released = 0;
        let mut link = self.head.take();
        while let Some(mut node) = link {
            inspect(&*node);
            link = node.next.take();
            released += 1;
        }
        released
    }

    /// Append without checking for an existing cell. Only used to build
    /// deliberately broken chains in tests.
    #[cfg(test)]
    pub(crate) fn push_unchecked(&mut self, location: u64, value: u32) {
        let mut link = &mut self.head;
        while let Some(node) = link {
            link = &mut node.next;
        }
        *link = Some(Box::new(Node::new(location, value)));
    }
}

impl Clone for Bucket {
    fn clone(&self) -> Self {
        let mut out = Bucket::new();
        let mut tail = &mut out.head;
        for node in self.cells() {
            tail = &mut tail.insert(Box::new(Node::new(node.location, node.value))).next;
        }
        out
    }
}

impl Drop for Bucket {
    fn drop(&mut self) {
        self.release(|_| {});
    }
}

/// Borrowing walk over one chain, head to tail.
pub(crate) struct Cells<'a> {
    next: Option<&'a Node>,
}

impl<'a> Iterator for Cells<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        let node = self.next?;
        self.next = node.next.as_deref();
        Some(node)
    }
}
