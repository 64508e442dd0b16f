#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;
use infrakit_core::{InfraError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

/// Native view of a key-value backend.
///
/// Reads report absence as `Ok(None)` and every backend failure as `Err`, so
/// the service layer can decide what a caller gets to see.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValRepository: Send + Sync {
    async fn set(&self, key: &str, val: &str, ttl: Option<Duration>) -> Result<()>;
    async fn set_nx(&self, key: &str, val: &str, ttl: Option<Duration>) -> Result<bool>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn del(&self, key: &str) -> Result<()>;
    async fn lpush(&self, key: &str, val: &str) -> Result<()>;
    async fn rpush(&self, key: &str, val: &str) -> Result<()>;
    async fn lpop(&self, key: &str) -> Result<Option<String>>;
    async fn rpop(&self, key: &str) -> Result<Option<String>>;
    async fn llen(&self, key: &str) -> Result<i64>;
    async fn lindex(&self, key: &str, index: i64) -> Result<Option<String>>;
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>>;
    async fn hset(&self, key: &str, values: &HashMap<String, String>) -> Result<()>;
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;
    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>>;
    async fn hdel(&self, key: &str, fields: &[String]) -> Result<()>;
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;
}

#[derive(Debug, Clone)]
enum Stored {
    Str(String),
    List(VecDeque<String>),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Stored,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Stored, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.and_then(deadline),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process store with Redis-like semantics: strings, lists, hashes and
/// lazily enforced expiry.
#[derive(Clone, Default)]
pub struct InMemoryKeyValRepository {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InMemoryKeyValRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn key_count(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|entries| entries.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    fn read<T>(&self, key: &str, f: impl FnOnce(&Stored) -> Result<T>) -> Result<Option<T>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        match entries.get(key) {
            Some(entry) if entry.is_live(Instant::now()) => f(&entry.value).map(Some),
            _ => Ok(None),
        }
    }

    fn write<T>(&self, f: impl FnOnce(&mut HashMap<String, Entry>) -> Result<T>) -> Result<T> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
        f(&mut entries)
    }

    fn push(&self, key: &str, val: &str, front: bool) -> Result<()> {
        self.write(|entries| {
            let entry = entries
                .entry(key.to_string())
                .or_insert_with(|| Entry::new(Stored::List(VecDeque::new()), None));
            match &mut entry.value {
                Stored::List(list) if front => list.push_front(val.to_string()),
                Stored::List(list) => list.push_back(val.to_string()),
                _ => return Err(wrong_type()),
            }
            Ok(())
        })
    }

    fn pop(&self, key: &str, front: bool) -> Result<Option<String>> {
        self.write(|entries| {
            let Some(entry) = entries.get_mut(key) else {
                return Ok(None);
            };
            let Stored::List(list) = &mut entry.value else {
                return Err(wrong_type());
            };
            let popped = if front { list.pop_front() } else { list.pop_back() };
            if list.is_empty() {
                entries.remove(key);
            }
            Ok(popped)
        })
    }
}

#[async_trait]
impl KeyValRepository for InMemoryKeyValRepository {
    async fn set(&self, key: &str, val: &str, ttl: Option<Duration>) -> Result<()> {
        self.write(|entries| {
            entries.insert(key.to_string(), Entry::new(Stored::Str(val.to_string()), ttl));
            Ok(())
        })
    }

    async fn set_nx(&self, key: &str, val: &str, ttl: Option<Duration>) -> Result<bool> {
        self.write(|entries| {
            if entries.contains_key(key) {
                return Ok(false);
            }
            entries.insert(key.to_string(), Entry::new(Stored::Str(val.to_string()), ttl));
            Ok(true)
        })
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.read(key, |stored| match stored {
            Stored::Str(value) => Ok(value.clone()),
            _ => Err(wrong_type()),
        })
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.write(|entries| {
            entries.remove(key);
            Ok(())
        })
    }

    async fn lpush(&self, key: &str, val: &str) -> Result<()> {
        self.push(key, val, true)
    }

    async fn rpush(&self, key: &str, val: &str) -> Result<()> {
        self.push(key, val, false)
    }

    async fn lpop(&self, key: &str) -> Result<Option<String>> {
        self.pop(key, true)
    }

    async fn rpop(&self, key: &str) -> Result<Option<String>> {
        self.pop(key, false)
    }

    async fn llen(&self, key: &str) -> Result<i64> {
        let len = self.read(key, |stored| match stored {
            Stored::List(list) => Ok(list.len() as i64),
            _ => Err(wrong_type()),
        })?;
        Ok(len.unwrap_or(0))
    }

    async fn lindex(&self, key: &str, index: i64) -> Result<Option<String>> {
        let found = self.read(key, |stored| match stored {
            Stored::List(list) => {
                Ok(resolve_index(index, list.len()).and_then(|i| list.get(i).cloned()))
            }
            _ => Err(wrong_type()),
        })?;
        Ok(found.flatten())
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let slice = self.read(key, |stored| match stored {
            Stored::List(list) => Ok(match resolve_range(start, stop, list.len()) {
                Some((from, to)) => list.range(from..=to).cloned().collect(),
                None => Vec::new(),
            }),
            _ => Err(wrong_type()),
        })?;
        Ok(slice.unwrap_or_default())
    }

    async fn hset(&self, key: &str, values: &HashMap<String, String>) -> Result<()> {
        self.write(|entries| {
            let entry = entries
                .entry(key.to_string())
                .or_insert_with(|| Entry::new(Stored::Hash(HashMap::new()), None));
            let Stored::Hash(hash) = &mut entry.value else {
                return Err(wrong_type());
            };
            hash.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(())
        })
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let found = self.read(key, |stored| match stored {
            Stored::Hash(hash) => Ok(hash.get(field).cloned()),
            _ => Err(wrong_type()),
        })?;
        Ok(found.flatten())
    }

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let all = self.read(key, |stored| match stored {
            Stored::Hash(hash) => Ok(hash.clone()),
            _ => Err(wrong_type()),
        })?;
        Ok(all.unwrap_or_default())
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> Result<()> {
        self.write(|entries| {
            let Some(entry) = entries.get_mut(key) else {
                return Ok(());
            };
            let Stored::Hash(hash) = &mut entry.value else {
                return Err(wrong_type());
            };
            for field in fields {
                hash.remove(field);
            }
            if hash.is_empty() {
                entries.remove(key);
            }
            Ok(())
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        self.write(|entries| {
            if let Some(entry) = entries.get_mut(key) {
                entry.expires_at = deadline(ttl);
            }
            Ok(())
        })
    }
}

/// Expiry instant for a TTL; one too far out to represent never expires.
fn deadline(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl)
}

/// Maps a possibly negative list index onto `0..len`.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { index + len } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

/// Clamps an inclusive `start..=stop` range the way LRANGE does.
fn resolve_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

fn wrong_type() -> InfraError {
    InfraError::BackendError(WRONG_TYPE.to_string())
}

fn poisoned() -> InfraError {
    InfraError::BackendError("keyval storage lock poisoned".to_string())
}
