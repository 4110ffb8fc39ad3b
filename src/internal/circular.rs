//! Circular dependency detection infrastructure.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};
use crate::key::Key;

/// Keys currently mid-resolution, outermost first.
#[derive(Default)]
pub(crate) struct ResolvingStack {
    stack: Vec<Key>,
}

impl ResolvingStack {
    pub(crate) fn contains(&self, key: &Key) -> bool {
        self.stack.contains(key)
    }

    pub(crate) fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Marks `key` as resolving.
    ///
    /// Fails with the chain from the first in-progress occurrence of `key`
    /// back to `key` when it is already on the stack.
    pub(crate) fn push(&mut self, key: Key, max_depth: usize) -> DiResult<()> {
        if let Some(pos) = self.stack.iter().position(|k| *k == key) {
            let mut chain = self.stack[pos..].to_vec();
            chain.push(key);
            return Err(DiError::Circular { chain });
        }

        if self.stack.len() >= max_depth {
            return Err(DiError::DepthExceeded(self.stack.len()));
        }

        self.stack.push(key);
        Ok(())
    }

    fn pop(&mut self, key: &Key) {
        let last = self.stack.pop();
        debug_assert_eq!(last.as_ref(), Some(key));
    }
}

/// Guard that keeps a key on the resolving stack until dropped.
///
/// Dropping happens on every exit path, including unwinding out of a
/// constructor, so a failed resolution never leaves a stale entry behind.
pub(crate) struct ResolvingFrame<'a> {
    stack: &'a RefCell<ResolvingStack>,
    key: Key,
}

impl<'a> ResolvingFrame<'a> {
    pub(crate) fn enter(stack: &'a RefCell<ResolvingStack>, key: Key, max_depth: usize) -> DiResult<Self> {
        stack.borrow_mut().push(key, max_depth)?;
        Ok(Self { stack, key })
    }
}

impl Drop for ResolvingFrame<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop(&self.key);
    }
}
