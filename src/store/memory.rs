use super::{RecordStore, SetAdd};
use crate::error::Result;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// In-process [`RecordStore`] backed by mutex-guarded maps.
///
/// Every trait method takes the mutex once, so each call is atomic exactly
/// the way the contract demands of a remote store. Plain keys support lazy
/// expiry; expired keys read as absent.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Shared>,
}

#[derive(Default)]
struct Shared {
    lists: HashMap<String, VecDeque<String>>,
    sets: HashMap<String, HashSet<String>>,
    strings: HashMap<String, StringEntry>,
}

struct StringEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StringEntry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Shared {
    /// Drop a plain key if its TTL has passed, so callers observe absence.
    fn purge_expired(&mut self, key: &str) {
        if self.strings.get(key).is_some_and(StringEntry::expired) {
            self.strings.remove(key);
        }
    }
}

impl RecordStore for MemoryStore {
    fn append(&self, list: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .lists
            .entry(list.to_string())
            .or_default()
            .push_back(value.to_string());
        Ok(())
    }

    fn prepend(&self, list: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .lists
            .entry(list.to_string())
            .or_default()
            .push_front(value.to_string());
        Ok(())
    }

    fn pop_front(&self, list: &str) -> Result<Option<String>> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.lists.get_mut(list).and_then(VecDeque::pop_front))
    }

    fn move_atomic(&self, src: &str, dst: &str) -> Result<Option<String>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(value) = inner.lists.get_mut(src).and_then(VecDeque::pop_front) else {
            return Ok(None);
        };
        inner
            .lists
            .entry(dst.to_string())
            .or_default()
            .push_front(value.clone());
        Ok(Some(value))
    }

    fn range(&self, list: &str, start: usize, stop: usize) -> Result<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        let Some(deque) = inner.lists.get(list) else {
            return Ok(Vec::new());
        };
        let len = deque.len();
        let start = start.min(len);
        let stop = stop.min(len);
        Ok(deque
            .iter()
            .skip(start)
            .take(stop.saturating_sub(start))
            .cloned()
            .collect())
    }

    fn remove_one(&self, list: &str, value: &str) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(deque) = inner.lists.get_mut(list) else {
            return Ok(false);
        };
        match deque.iter().position(|existing| existing == value) {
            Some(pos) => {
                deque.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn length(&self, list: &str) -> Result<usize> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.lists.get(list).map_or(0, VecDeque::len))
    }

    fn set_add(&self, set: &str, member: &str) -> Result<SetAdd> {
        let mut inner = self.inner.lock().unwrap();
        let added = inner
            .sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(if added { SetAdd::Newly } else { SetAdd::Already })
    }

    fn set_contains(&self, set: &str, member: &str) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.sets.get(set).is_some_and(|s| s.contains(member)))
    }

    fn set_len(&self, set: &str) -> Result<usize> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.sets.get(set).map_or(0, HashSet::len))
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_expired(key);
        Ok(inner.strings.get(key).map(|entry| entry.value.clone()))
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    fn put_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_expired(key);
        if inner.strings.contains_key(key) {
            return Ok(false);
        }
        inner.strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(true)
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.strings.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    fn delete(&self, keys: &[&str]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for key in keys {
            inner.lists.remove(*key);
            inner.sets.remove(*key);
            inner.strings.remove(*key);
        }
        Ok(())
    }
}
