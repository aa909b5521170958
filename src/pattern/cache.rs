//! Content-addressed tile cache with round-robin eviction under size
//! pressure, per §4.5 and the concurrency model's shared-resource policy
//! (§5).

use std::rc::Rc;

use crate::error::{PclError, PclResult};
use crate::pattern::PatternTile;

/// Identifies a rendered tile's *identity*, not its pattern number: includes
/// the foreground/halftone/color-space state that was baked into the
/// render, since changing any of those invalidates the tile (§4.5 "Hashing
/// invariant") without touching the user-visible pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternKey {
    pub pattern_id: u16,
    pub color_id: u32,
    pub halftone_id: u32,
    pub rendering_params_id: u32,
}

impl PatternKey {
    /// A cheap, stable spread over the cache's slot count. Does not need to
    /// be cryptographic, only to distribute keys across the small fixed-size
    /// slot table.
    fn hash(&self) -> u64 {
        let mut h = 0xcbf29ce484222325u64; // FNV-1a offset basis
        for word in [
            self.pattern_id as u64,
            self.color_id as u64,
            self.halftone_id as u64,
            self.rendering_params_id as u64,
        ] {
            h ^= word;
            h = h.wrapping_mul(0x100000001b3);
        }
        h
    }
}

struct CacheEntry {
    key: PatternKey,
    tile: Rc<PatternTile>,
    locked: bool,
    /// Set on an oversized tile immediately after insertion; the next
    /// `ensure_space` scan skips it once rather than evicting it straight
    /// back out, then the flag is cleared (AMBIENT supplement, `gxp1fill.c`).
    protected_once: bool,
}

pub struct PatternCache {
    slots: Vec<Option<CacheEntry>>,
    next: usize,
    max_bits: usize,
    bits_used: usize,
}

impl PatternCache {
    pub fn new(max_tiles: usize, max_bits: usize) -> PatternCache {
        let mut slots = Vec::with_capacity(max_tiles.max(1));
        slots.resize_with(max_tiles.max(1), || None);
        PatternCache {
            slots,
            next: 0,
            max_bits,
            bits_used: 0,
        }
    }

    pub fn bits_used(&self) -> usize {
        self.bits_used
    }

    fn slot_indices(&self, key: &PatternKey) -> (usize, usize) {
        let n = self.slots.len();
        let h = key.hash() as usize;
        (h % n, (h + 1) % n)
    }

    pub fn lookup(&self, key: &PatternKey) -> Option<&Rc<PatternTile>> {
        let (primary, alt) = self.slot_indices(key);
        for idx in [primary, alt] {
            if let Some(entry) = &self.slots[idx] {
                if &entry.key == key {
                    return Some(&entry.tile);
                }
            }
        }
        None
    }

    /// Evicts unlocked entries in round-robin order starting at `next`
    /// until `bits_used + nbytes <= max_bits` or a full scan has
    /// completed (§4.5, §5). An oversized tile's own insertion is allowed
    /// to leave `bits_used > max_bits`; this only evicts *other* entries.
    pub fn ensure_space(&mut self, nbytes: usize) {
        let n = self.slots.len();
        if self.bits_used + nbytes <= self.max_bits {
            return;
        }

        for step in 0..n {
            if self.bits_used + nbytes <= self.max_bits {
                break;
            }
            let idx = (self.next + step) % n;
            match &mut self.slots[idx] {
                None => continue,
                Some(entry) if entry.locked => continue,
                Some(entry) if entry.protected_once => {
                    entry.protected_once = false;
                    continue;
                }
                Some(entry) => {
                    self.bits_used -= entry.tile.bits_used;
                    self.slots[idx] = None;
                    self.next = (idx + 1) % n;
                }
            }
        }
    }

    /// Inserts `tile` under `key`, evicting as needed. Returns the cache
    /// slot index (the tile's instance id) or a fatal error if both
    /// candidate slots are locked.
    pub fn insert(&mut self, key: PatternKey, tile: PatternTile) -> PclResult<usize> {
        let nbytes = tile.bits_used;
        self.ensure_space(nbytes);

        let (primary, alt) = self.slot_indices(&key);

        let chosen = [primary, alt]
            .into_iter()
            .find(|&idx| self.slots[idx].is_none())
            .or_else(|| {
                [primary, alt]
                    .into_iter()
                    .find(|&idx| !self.slots[idx].as_ref().is_some_and(|e| e.locked))
            })
            .ok_or_else(|| {
                PclError::fatal("pattern cache: both candidate slots are locked")
            })?;

        if let Some(old) = self.slots[chosen].take() {
            self.bits_used -= old.tile.bits_used;
        }

        self.bits_used += nbytes;
        self.slots[chosen] = Some(CacheEntry {
            key,
            tile: Rc::new(tile),
            locked: false,
            protected_once: nbytes > self.max_bits,
        });

        Ok(chosen)
    }

    /// Locks or unlocks the tile at cache slot `id`. Fails if `id` is
    /// unknown (empty slot).
    pub fn set_lock(&mut self, id: usize, locked: bool) -> PclResult<()> {
        let entry = self
            .slots
            .get_mut(id)
            .and_then(|s| s.as_mut())
            .ok_or_else(|| PclError::invalid(format!("unknown pattern cache slot {id}")))?;
        entry.locked = locked;
        Ok(())
    }

    pub fn is_locked(&self, id: usize) -> Option<bool> {
        self.slots.get(id).and_then(|s| s.as_ref()).map(|e| e.locked)
    }

    pub fn get(&self, id: usize) -> Option<&Rc<PatternTile>> {
        self.slots.get(id).and_then(|s| s.as_ref()).map(|e| &e.tile)
    }

    /// Removes every entry (locked or not) matching `pred`. Used to purge
    /// tiles whose defining resource (palette, user pattern) was deleted.
    pub fn winnow(&mut self, pred: impl Fn(&PatternKey) -> bool) {
        for slot in &mut self.slots {
            if let Some(entry) = slot {
                if pred(&entry.key) {
                    self.bits_used -= entry.tile.bits_used;
                    *slot = None;
                }
            }
        }
    }

    /// Removes every entry, including locked ones.
    pub fn flush_all(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.bits_used = 0;
        self.next = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pattern::{PatternTile, SolidShade};

    fn tile(bits: usize) -> PatternTile {
        let mut t = PatternTile::solid(SolidShade::Black, 8, 8);
        t.bits_used = bits;
        t
    }

    fn key(id: u16) -> PatternKey {
        PatternKey {
            pattern_id: id,
            color_id: 0,
            halftone_id: 0,
            rendering_params_id: 0,
        }
    }

    #[test]
    fn insert_then_lookup_round_trips() {
        let mut cache = PatternCache::new(8, 10_000);
        let id = cache.insert(key(1), tile(100)).unwrap();
        assert!(cache.lookup(&key(1)).is_some());
        assert_eq!(cache.get(id).unwrap().bits_used, 100);
    }

    #[test]
    fn eviction_never_touches_locked_entries() {
        let mut cache = PatternCache::new(4, 200);
        let a = cache.insert(key(1), tile(100)).unwrap();
        cache.set_lock(a, true).unwrap();
        // Fill every remaining slot so the only evictable candidates are
        // the locked one or nothing.
        cache.insert(key(2), tile(50)).unwrap();
        cache.insert(key(3), tile(50)).unwrap();
        // This insertion needs room only the locked entry could supply.
        cache.insert(key(4), tile(50)).unwrap();
        assert!(cache.get(a).is_some(), "locked entry must survive eviction");
    }

    #[test]
    fn bits_used_never_exceeds_max_by_more_than_last_insertion() {
        let mut cache = PatternCache::new(4, 100);
        cache.insert(key(1), tile(40)).unwrap();
        cache.insert(key(2), tile(40)).unwrap();
        cache.insert(key(3), tile(90)).unwrap();
        assert!(cache.bits_used() <= 100 + 90);
    }

    #[test]
    fn oversized_tile_is_cached_alone() {
        let mut cache = PatternCache::new(4, 50);
        cache.insert(key(1), tile(10)).unwrap();
        cache.insert(key(2), tile(500)).unwrap();
        assert!(cache.lookup(&key(2)).is_some());
    }

    #[test]
    fn winnow_removes_matching_entries_even_if_locked() {
        let mut cache = PatternCache::new(4, 1000);
        let a = cache.insert(key(9), tile(10)).unwrap();
        cache.set_lock(a, true).unwrap();
        cache.winnow(|k| k.pattern_id == 9);
        assert!(cache.lookup(&key(9)).is_none());
    }

    #[test]
    fn flush_all_clears_locked_entries_too() {
        let mut cache = PatternCache::new(4, 1000);
        let a = cache.insert(key(1), tile(10)).unwrap();
        cache.set_lock(a, true).unwrap();
        cache.flush_all();
        assert_eq!(cache.bits_used(), 0);
        assert!(cache.lookup(&key(1)).is_none());
    }

    #[test]
    fn set_lock_on_unknown_id_fails() {
        let mut cache = PatternCache::new(4, 1000);
        assert!(cache.set_lock(3, true).is_err());
    }
}
