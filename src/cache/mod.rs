//! Duplicate-suppression cache: one entry per source address, remembering
//! the last packet-id seen from it so a retransmitted frame can be
//! recognized and re-acked without being delivered twice.
//!
//! Backed by a [`heapless::LinearMap`], the same fixed-capacity map the
//! interface layer uses for its own neighbor cache.

use heapless::LinearMap;

use crate::config::{CACHE_CAPACITY, CACHE_DISCARD_DELAY};
use crate::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Entry {
    packet_id: u16,
    seen_at: Instant,
}

#[derive(Debug)]
pub struct DuplicateCache {
    storage: LinearMap<u8, Entry, CACHE_CAPACITY>,
}

impl Default for DuplicateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DuplicateCache {
    pub fn new() -> Self {
        DuplicateCache {
            storage: LinearMap::new(),
        }
    }

    /// Record a frame from `source` carrying `packet_id`, observed at `now`.
    /// Returns `true` if this is a repeat of the last frame seen from that
    /// source (same packet-id), `false` if it's new.
    pub fn observe(&mut self, source: u8, packet_id: u16, now: Instant) -> bool {
        self.age_out(now);

        if let Some(entry) = self.storage.get_mut(&source) {
            let duplicate = entry.packet_id == packet_id;
            entry.packet_id = packet_id;
            entry.seen_at = now;
            return duplicate;
        }

        if self.storage.len() >= CACHE_CAPACITY {
            self.evict_oldest();
        }
        let _ = self.storage.insert(
            source,
            Entry {
                packet_id,
                seen_at: now,
            },
        );
        false
    }

    fn age_out(&mut self, now: Instant) {
        let stale: heapless::Vec<u8, CACHE_CAPACITY> = self
            .storage
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.seen_at) > CACHE_DISCARD_DELAY)
            .map(|(source, _)| *source)
            .collect();
        for source in stale {
            self.storage.remove(&source);
        }
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .storage
            .iter()
            .min_by_key(|(_, entry)| entry.seen_at.total_millis())
            .map(|(source, _)| *source);
        if let Some(source) = oldest {
            self.storage.remove(&source);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.storage.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Duration;

    #[test]
    fn first_sighting_is_not_a_duplicate() {
        let mut cache = DuplicateCache::new();
        assert!(!cache.observe(1, 10, Instant::from_millis(0)));
    }

    #[test]
    fn repeated_packet_id_is_a_duplicate() {
        let mut cache = DuplicateCache::new();
        cache.observe(1, 10, Instant::from_millis(0));
        assert!(cache.observe(1, 10, Instant::from_millis(5)));
    }

    #[test]
    fn new_packet_id_from_known_source_is_not_a_duplicate() {
        let mut cache = DuplicateCache::new();
        cache.observe(1, 10, Instant::from_millis(0));
        assert!(!cache.observe(1, 11, Instant::from_millis(5)));
    }

    #[test]
    fn entries_age_out_past_discard_delay() {
        let mut cache = DuplicateCache::new();
        cache.observe(1, 10, Instant::from_millis(0));
        let later = Instant::from_millis(0) + CACHE_DISCARD_DELAY + Duration::from_millis(1);
        assert!(!cache.observe(1, 10, later));
    }

    #[test]
    fn full_cache_evicts_oldest_entry() {
        let mut cache = DuplicateCache::new();
        for source in 0..CACHE_CAPACITY as u8 {
            cache.observe(source, 1, Instant::from_millis(source as u64));
        }
        assert_eq!(cache.len(), CACHE_CAPACITY);
        // source 0 is oldest; a new source must evict it.
        cache.observe(200, 1, Instant::from_millis(CACHE_CAPACITY as u64));
        assert_eq!(cache.len(), CACHE_CAPACITY);
        assert!(!cache.observe(0, 1, Instant::from_millis(CACHE_CAPACITY as u64 + 1)));
    }

    #[test]
    fn at_most_one_entry_per_source() {
        let mut cache = DuplicateCache::new();
        cache.observe(1, 10, Instant::from_millis(0));
        cache.observe(1, 11, Instant::from_millis(1));
        cache.observe(1, 12, Instant::from_millis(2));
        assert_eq!(cache.len(), 1);
    }
}
