//! The frozen "current color" built from a palette slot, plus the singleton
//! default foreground (§4.4).

use std::cell::RefCell;
use std::rc::Rc;

use crate::color::palette::Palette;

/// An immutable snapshot of a palette slot, frozen at `set` time.
#[derive(Debug, Clone, PartialEq)]
pub struct Foreground {
    pub rgb: [f32; 3],
    /// Whether the palette this foreground was built from is CMY-based. The
    /// overprint compositor treats CMY-origin and RGB-origin foregrounds
    /// differently even though both are stored as RGB here.
    pub from_cmy: bool,
}

thread_local! {
    static DEFAULT_FOREGROUND: RefCell<Option<Rc<Foreground>>> = const { RefCell::new(None) };
}

impl Foreground {
    /// Builds a foreground from `palette` slot `index mod palette.size()`.
    /// When `palette` is the fixed 2-entry default and the resolved slot is
    /// 1 (black), returns the shared singleton default foreground instead
    /// of allocating a new one.
    pub fn set(palette: &Palette, index: i32, from_cmy: bool) -> Rc<Foreground> {
        let size = palette.size() as i32;
        let slot = index.rem_euclid(size) as usize;

        if palette.fixed && palette.is_default && slot == 1 {
            return DEFAULT_FOREGROUND.with(|cell| {
                let mut cell = cell.borrow_mut();
                cell.get_or_insert_with(|| {
                    Rc::new(Foreground {
                        rgb: [0.0, 0.0, 0.0],
                        from_cmy: false,
                    })
                })
                .clone()
            });
        }

        let raw = palette.normalized_entry(slot).unwrap_or([0.0, 0.0, 0.0]);
        Rc::new(Foreground {
            rgb: raw,
            from_cmy,
        })
    }

    /// Releases the singleton default foreground. Called by a reset that
    /// clears all foregrounds (§4.9).
    pub fn release_default() {
        DEFAULT_FOREGROUND.with(|cell| *cell.borrow_mut() = None);
    }
}
