use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

struct CacheEntry {
    record: Value,
    inserted_at: Instant,
}

/// One cache key's state. The generation counts invalidations; a slot
/// whose entry has been dropped lingers as a tombstone so that a read
/// started before the invalidation cannot re-insert the old record.
struct Slot {
    generation: u64,
    entry: Option<CacheEntry>,
    touched_at: Instant,
}

/// Advisory read cache for single-record lookups, keyed by schema and id.
///
/// Entries expire after a TTL and the map is capped; when full, new
/// inserts are skipped rather than evicting. Correctness never depends
/// on a hit: every write path invalidates its key, and inserts are
/// guarded by a generation token taken before the database read so a
/// concurrent delete or update wins over a slower reader.
pub struct RecordCache {
    enabled: bool,
    ttl: Duration,
    capacity: usize,
    slots: RwLock<HashMap<(String, Uuid), Slot>>,
}

impl RecordCache {
    pub fn new(enabled: bool, ttl_secs: u64, capacity: usize) -> Self {
        Self {
            enabled,
            ttl: Duration::from_secs(ttl_secs),
            capacity,
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, 0, 0)
    }

    pub async fn get(&self, schema: &str, id: Uuid) -> Option<Value> {
        if !self.enabled {
            return None;
        }
        let key = (schema.to_string(), id);
        {
            let slots = self.slots.read().await;
            match slots.get(&key).and_then(|slot| slot.entry.as_ref()) {
                Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                    return Some(entry.record.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Entry is stale; drop it but keep the slot's generation.
        let mut slots = self.slots.write().await;
        if let Some(slot) = slots.get_mut(&key) {
            if matches!(&slot.entry, Some(e) if e.inserted_at.elapsed() >= self.ttl) {
                slot.entry = None;
                slot.touched_at = Instant::now();
            }
        }
        None
    }

    /// Token to pass back to `put` after re-reading from storage. The
    /// insert is skipped if the key was invalidated in between.
    pub async fn read_token(&self, schema: &str, id: Uuid) -> u64 {
        if !self.enabled {
            return 0;
        }
        let slots = self.slots.read().await;
        slots
            .get(&(schema.to_string(), id))
            .map(|slot| slot.generation)
            .unwrap_or(0)
    }

    pub async fn put(&self, schema: &str, id: Uuid, record: Value, token: u64) {
        if !self.enabled {
            return;
        }
        let key = (schema.to_string(), id);
        let mut slots = self.slots.write().await;
        match slots.get_mut(&key) {
            Some(slot) => {
                // A writer invalidated this key after the token was taken.
                if slot.generation != token {
                    return;
                }
                slot.entry = Some(CacheEntry { record, inserted_at: Instant::now() });
                slot.touched_at = Instant::now();
            }
            None => {
                if token != 0 {
                    return;
                }
                if slots.len() >= self.capacity {
                    let ttl = self.ttl;
                    slots.retain(|_, slot| slot.touched_at.elapsed() < ttl);
                    if slots.len() >= self.capacity {
                        return;
                    }
                }
                slots.insert(
                    key,
                    Slot {
                        generation: 0,
                        entry: Some(CacheEntry { record, inserted_at: Instant::now() }),
                        touched_at: Instant::now(),
                    },
                );
            }
        }
    }

    pub async fn invalidate(&self, schema: &str, id: Uuid) {
        if !self.enabled {
            return;
        }
        let key = (schema.to_string(), id);
        let mut slots = self.slots.write().await;
        match slots.get_mut(&key) {
            Some(slot) => {
                slot.generation += 1;
                slot.entry = None;
                slot.touched_at = Instant::now();
            }
            // Tombstone for a key never cached, in case a read is in flight.
            None => {
                slots.insert(
                    key,
                    Slot { generation: 1, entry: None, touched_at: Instant::now() },
                );
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }
}
