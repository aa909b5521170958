//! Multi-phase reset orchestration (§4.9). Grounded in the teacher's
//! `GraphicsState`/`Default` composition: a handful of independently
//! resettable components wired together by one small coordinator, rather
//! than each component reaching into its neighbors.

use std::collections::HashMap;
use std::rc::Rc;

use crate::color::foreground::Foreground;
use crate::color::palette::{PaletteControlOp, PaletteStore};
use crate::pattern::{PatternCache, PatternId, UserPatternDef};

/// A reset is a bitmask over these five kinds (§4.9); more than one bit may
/// be set at once (e.g. a cold reset is also an initial one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetKind(u8);

impl ResetKind {
    /// Dictionaries are initialized once, at startup.
    pub const INITIAL: ResetKind = ResetKind(1 << 0);
    /// Power-up state.
    pub const COLD: ResetKind = ResetKind(1 << 1);
    /// `ESC E`: releases all temporary resources.
    pub const PRINTER: ResetKind = ResetKind(1 << 2);
    /// Switch between an overlay macro and the document body.
    pub const OVERLAY: ResetKind = ResetKind(1 << 3);
    /// Shutdown: frees every reference-counted object.
    pub const PERMANENT: ResetKind = ResetKind(1 << 4);

    pub fn contains(self, other: ResetKind) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ResetKind {
    type Output = ResetKind;
    fn bitor(self, rhs: ResetKind) -> ResetKind {
        ResetKind(self.0 | rhs.0)
    }
}

/// Stateless orchestrator: each call threads the fixed component order
/// named in §4.9 — palette store, then foreground, then pattern cache,
/// then user-defined patterns — over whichever components the caller owns.
pub struct Resetter;

impl Resetter {
    /// Applies `kind` across the color/pattern subsystem. `Initial`,
    /// `Cold`, and `Permanent` wipe every temporary and permanent object;
    /// `Printer` releases temporary resources only; `Overlay` preserves
    /// everything (the overlay/document switch does not touch the palette,
    /// foreground, or pattern state this core owns).
    pub fn reset(
        kind: ResetKind,
        palette_store: &mut PaletteStore,
        pattern_cache: &mut PatternCache,
        user_patterns: &mut HashMap<PatternId, Rc<UserPatternDef>>,
    ) {
        let full = kind.contains(ResetKind::INITIAL)
            || kind.contains(ResetKind::COLD)
            || kind.contains(ResetKind::PERMANENT);
        let releases_temporary = full || kind.contains(ResetKind::PRINTER);

        if full {
            palette_store.do_reset();
        } else if kind.contains(ResetKind::PRINTER) {
            palette_store.control(PaletteControlOp::DeleteAllNotOnStack, 0);
        }

        if releases_temporary {
            Foreground::release_default();
        }

        if releases_temporary {
            pattern_cache.flush_all();
        }

        if releases_temporary {
            user_patterns.clear();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pattern::{PatternTile, SolidShade};

    fn cache_with_one_tile() -> PatternCache {
        let mut cache = PatternCache::new(4, 1 << 20);
        cache
            .insert(
                crate::pattern::PatternKey {
                    pattern_id: 1,
                    color_id: 0,
                    halftone_id: 0,
                    rendering_params_id: 0,
                },
                PatternTile::solid(SolidShade::Black, 4, 4),
            )
            .unwrap();
        cache
    }

    #[test]
    fn printer_reset_flushes_pattern_cache_and_user_patterns() {
        let mut store = PaletteStore::new(20);
        let mut cache = cache_with_one_tile();
        let mut patterns = HashMap::new();
        patterns.insert(PatternId(1), Rc::new(dummy_pattern()));

        Resetter::reset(ResetKind::PRINTER, &mut store, &mut cache, &mut patterns);

        assert_eq!(cache.bits_used(), 0);
        assert!(patterns.is_empty());
    }

    #[test]
    fn overlay_reset_preserves_everything() {
        let mut store = PaletteStore::new(20);
        let mut cache = cache_with_one_tile();
        let mut patterns = HashMap::new();
        patterns.insert(PatternId(1), Rc::new(dummy_pattern()));
        let bits_before = cache.bits_used();

        Resetter::reset(ResetKind::OVERLAY, &mut store, &mut cache, &mut patterns);

        assert_eq!(cache.bits_used(), bits_before);
        assert!(!patterns.is_empty());
    }

    #[test]
    fn printer_reset_twice_is_idempotent() {
        let mut store = PaletteStore::new(20);
        let mut cache = cache_with_one_tile();
        let mut patterns = HashMap::new();

        Resetter::reset(ResetKind::PRINTER, &mut store, &mut cache, &mut patterns);
        Resetter::reset(ResetKind::PRINTER, &mut store, &mut cache, &mut patterns);

        assert_eq!(cache.bits_used(), 0);
    }

    fn dummy_pattern() -> UserPatternDef {
        UserPatternDef::parse(&[0, 0, 1, 0, 0, 8, 0, 8], &[0u8; 8]).unwrap()
    }
}
