pub mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use std::time::Duration;

/// Outcome of adding a member to a store-side set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetAdd {
    /// The member was not present and has been added.
    Newly,
    /// The member was already present; nothing changed.
    Already,
}

/// The primitive contract the pipeline needs from its backing store.
///
/// Every method is one blocking round trip and must be individually atomic:
/// in particular `set_add` is a single test-and-set (two concurrent adds of
/// the same member must never both report [`SetAdd::Newly`]) and
/// `move_atomic` transfers an element between lists without a window in
/// which it exists in neither.
///
/// Implementations over a remote store should bound each call with a
/// timeout and surface it as [`crate::Error::Store`].
pub trait RecordStore: Send + Sync {
    /// Append a value at the back of a list.
    fn append(&self, list: &str, value: &str) -> Result<()>;

    /// Push a value onto the front of a list (the next-to-pop end).
    fn prepend(&self, list: &str, value: &str) -> Result<()>;

    /// Pop the front value of a list, if any.
    fn pop_front(&self, list: &str) -> Result<Option<String>>;

    /// Atomically pop the front of `src` and push it onto the front of
    /// `dst`, returning the moved value.
    fn move_atomic(&self, src: &str, dst: &str) -> Result<Option<String>>;

    /// Read the half-open slice `[start, stop)` of a list, clamped to its
    /// length. A missing list reads as empty.
    fn range(&self, list: &str, start: usize, stop: usize) -> Result<Vec<String>>;

    /// Remove the first occurrence of `value` from a list. Returns whether
    /// anything was removed.
    fn remove_one(&self, list: &str, value: &str) -> Result<bool>;

    /// Length of a list; a missing list has length 0.
    fn length(&self, list: &str) -> Result<usize>;

    /// Add a member to a set, reporting whether it was already present.
    fn set_add(&self, set: &str, member: &str) -> Result<SetAdd>;

    /// Membership test against a set.
    fn set_contains(&self, set: &str, member: &str) -> Result<bool>;

    /// Number of members in a set.
    fn set_len(&self, set: &str) -> Result<usize>;

    /// Read a plain key.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a plain key.
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Write a plain key only if it does not exist. Returns whether the
    /// write happened.
    fn put_if_absent(&self, key: &str, value: &str) -> Result<bool>;

    /// Schedule a key to expire after `ttl`.
    fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Delete keys of any kind (lists, sets, plain keys) in one call.
    fn delete(&self, keys: &[&str]) -> Result<()>;
}
