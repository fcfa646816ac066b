//! Attribution store — maps a click/session identifier to the partial
//! identity captured from an intent event, with a reverse index over
//! hashed PII for bookings that arrive without an explicit key.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Partial identity captured from an intent event. PII fields hold hashed
/// tokens only; fbp/fbc are opaque browser ids passed through unmodified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributionRecord {
    pub fbp: Option<String>,
    pub fbc: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Combined first+last hash, used only for reverse lookup.
    pub name_combo: Option<String>,
}

impl AttributionRecord {
    pub fn has_browser_ids(&self) -> bool {
        self.fbp.is_some() || self.fbc.is_some()
    }
}

/// Hashed fields a booking can offer for reverse lookup.
#[derive(Debug, Clone, Default)]
pub struct IdentityQuery {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub name_combo: Option<String>,
}

struct StoredRecord {
    record: AttributionRecord,
    inserted_at: Instant,
}

struct IndexEntry {
    key: String,
    inserted_at: Instant,
}

/// Time-bounded key-value store with lazy TTL eviction. Entries expire
/// after the attribution window; reads never return stale records.
pub struct AttributionStore {
    records: DashMap<String, StoredRecord>,
    pii_index: DashMap<String, Vec<IndexEntry>>,
    window: Duration,
}

impl AttributionStore {
    pub fn new(window: Duration) -> Self {
        Self {
            records: DashMap::new(),
            pii_index: DashMap::new(),
            window,
        }
    }

    /// Insert or overwrite the record under `key`, stamping the current
    /// time, and register each hashed PII field in the reverse index.
    pub fn put(&self, key: &str, record: AttributionRecord) {
        let now = Instant::now();
        for hashed in [&record.email, &record.phone, &record.name_combo]
            .into_iter()
            .flatten()
        {
            let mut entries = self.pii_index.entry(hashed.clone()).or_default();
            entries.retain(|e| e.inserted_at.elapsed() <= self.window && e.key != key);
            entries.push(IndexEntry {
                key: key.to_string(),
                inserted_at: now,
            });
        }
        self.records.insert(
            key.to_string(),
            StoredRecord {
                record,
                inserted_at: now,
            },
        );
        debug!(key, "attribution record stored");
    }

    /// Get the record under `key` if it is still within the window.
    /// Stale entries are evicted on read.
    pub fn get(&self, key: &str) -> Option<AttributionRecord> {
        let entry = self.records.get(key)?;
        if entry.inserted_at.elapsed() > self.window {
            drop(entry);
            self.records.remove(key);
            return None;
        }
        Some(entry.record.clone())
    }

    /// Reverse lookup: the most recently inserted live key matching any of
    /// the supplied hashed fields. Highest insertion time wins ties.
    pub fn find_by_identity(&self, query: &IdentityQuery) -> Option<String> {
        let mut best: Option<(String, Instant)> = None;
        for hashed in [&query.email, &query.phone, &query.name_combo]
            .into_iter()
            .flatten()
        {
            let Some(entries) = self.pii_index.get(hashed) else {
                continue;
            };
            for entry in entries.iter() {
                if entry.inserted_at.elapsed() > self.window {
                    continue;
                }
                match &best {
                    Some((_, at)) if *at >= entry.inserted_at => {}
                    _ => best = Some((entry.key.clone(), entry.inserted_at)),
                }
            }
        }
        best.map(|(key, _)| key)
    }

    /// Remove expired records and index entries. Call this periodically
    /// from a background task; lazy expiry on read remains the
    /// correctness mechanism.
    pub fn evict_expired(&self) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, entry| entry.inserted_at.elapsed() <= self.window);
        self.pii_index.retain(|_, entries| {
            entries.retain(|e| e.inserted_at.elapsed() <= self.window);
            !entries.is_empty()
        });
        before - self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn record_with_email(email: &str) -> AttributionRecord {
        AttributionRecord {
            fbp: Some("fb.1.111.222".to_string()),
            email: Some(email.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_get_within_window() {
        let store = AttributionStore::new(Duration::from_secs(60));
        store.put("abc123", record_with_email("hash-a"));
        let found = store.get("abc123").unwrap();
        assert_eq!(found.fbp.as_deref(), Some("fb.1.111.222"));
    }

    #[test]
    fn test_expired_record_is_evicted_on_read() {
        let store = AttributionStore::new(Duration::from_millis(30));
        store.put("abc123", record_with_email("hash-a"));
        sleep(Duration::from_millis(50));
        assert!(store.get("abc123").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_overwrites_and_refreshes() {
        let store = AttributionStore::new(Duration::from_millis(60));
        store.put("abc123", record_with_email("hash-a"));
        sleep(Duration::from_millis(40));
        store.put("abc123", record_with_email("hash-b"));
        sleep(Duration::from_millis(40));
        // First insert would have expired; the overwrite restarted the clock.
        let found = store.get("abc123").unwrap();
        assert_eq!(found.email.as_deref(), Some("hash-b"));
    }

    #[test]
    fn test_find_by_identity_prefers_most_recent() {
        let store = AttributionStore::new(Duration::from_secs(60));
        store.put("older", record_with_email("shared-hash"));
        sleep(Duration::from_millis(5));
        store.put("newer", record_with_email("shared-hash"));

        let query = IdentityQuery {
            email: Some("shared-hash".to_string()),
            ..Default::default()
        };
        assert_eq!(store.find_by_identity(&query).as_deref(), Some("newer"));
    }

    #[test]
    fn test_find_by_identity_ignores_expired_entries() {
        let store = AttributionStore::new(Duration::from_millis(30));
        store.put("abc123", record_with_email("hash-a"));
        sleep(Duration::from_millis(50));

        let query = IdentityQuery {
            email: Some("hash-a".to_string()),
            ..Default::default()
        };
        assert!(store.find_by_identity(&query).is_none());
    }

    #[test]
    fn test_find_by_identity_matches_any_supplied_field() {
        let store = AttributionStore::new(Duration::from_secs(60));
        store.put(
            "abc123",
            AttributionRecord {
                phone: Some("phone-hash".to_string()),
                ..Default::default()
            },
        );

        let query = IdentityQuery {
            email: Some("unknown-hash".to_string()),
            phone: Some("phone-hash".to_string()),
            ..Default::default()
        };
        assert_eq!(store.find_by_identity(&query).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_evict_expired_sweeps_records_and_index() {
        let store = AttributionStore::new(Duration::from_millis(20));
        store.put("a", record_with_email("hash-a"));
        store.put("b", record_with_email("hash-b"));
        sleep(Duration::from_millis(40));
        assert_eq!(store.evict_expired(), 2);
        assert!(store.is_empty());
    }
}
