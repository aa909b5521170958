//! Palette storage: a dictionary of ID-addressed palettes plus the active
//! selection and its push/pop stack, per §4.2.

use std::collections::HashMap;
use std::rc::Rc;

use crate::color::color_space::{ColorSpace, ColorSpaceKind};
use crate::error::{PclError, PclResult};

/// "CMY order": white, cyan, magenta, blue, yellow, green, red, black. Every
/// space's default table is a permutation/recoloring of this ordering.
const CMY_ORDER_RGB: [[u8; 3]; 8] = [
    [0xff, 0xff, 0xff],
    [0x00, 0xff, 0xff],
    [0xff, 0x00, 0xff],
    [0x00, 0x00, 0xff],
    [0xff, 0xff, 0x00],
    [0x00, 0xff, 0x00],
    [0xff, 0x00, 0x00],
    [0x00, 0x00, 0x00],
];

/// Slot-index -> CMY-order-table-index, one enumeration per bits-per-index
/// class. Slots beyond the table default to black (index 7).
const ORDER_1BIT: [usize; 2] = [0, 7];
const ORDER_2BIT: [usize; 4] = [0, 2, 5, 7];
const ORDER_GE3BIT: [usize; 8] = [0, 1, 2, 3, 4, 5, 6, 7];
const ORDER_GL2: [usize; 8] = [0, 5, 6, 3, 4, 1, 2, 7];

fn default_order(bits_per_index: u8, from_hpgl2: bool) -> &'static [usize] {
    if from_hpgl2 {
        return &ORDER_GL2;
    }
    match bits_per_index {
        1 => &ORDER_1BIT,
        2 => &ORDER_2BIT,
        _ => &ORDER_GE3BIT,
    }
}

fn default_color_for_slot(slot: usize, bits_per_index: u8, from_hpgl2: bool) -> [u8; 3] {
    let order = default_order(bits_per_index, from_hpgl2);
    match order.get(slot) {
        Some(&table_index) => CMY_ORDER_RGB[table_index],
        None => CMY_ORDER_RGB[7],
    }
}

/// A palette: a base color space plus a packed table of `size` entries,
/// each three raw (pre-normalization) component bytes, and a parallel pen
/// width table.
#[derive(Debug, Clone)]
pub struct Palette {
    pub base: Rc<ColorSpace>,
    entries: Vec<[u8; 3]>,
    pen_widths: Vec<u16>,
    pub fixed: bool,
    pub is_default: bool,
    from_hpgl2: bool,
}

impl Palette {
    /// The 2-entry fixed default palette: RGB, white then black.
    pub fn default_2_entry(base: Rc<ColorSpace>) -> Palette {
        Palette {
            base,
            entries: vec![[0xff, 0xff, 0xff], [0x00, 0x00, 0x00]],
            pen_widths: vec![1, 1],
            fixed: true,
            is_default: true,
            from_hpgl2: false,
        }
    }

    pub fn new(base: Rc<ColorSpace>, num_entries: u16, from_hpgl2: bool) -> Palette {
        let size = num_entries.next_power_of_two().clamp(1, 256) as usize;
        let bits_per_index = base.cid.bits_per_index;
        let entries = (0..size)
            .map(|i| default_color_for_slot(i, bits_per_index, from_hpgl2))
            .collect();
        Palette {
            base,
            entries,
            pen_widths: vec![1; size],
            fixed: false,
            is_default: false,
            from_hpgl2,
        }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Rounds `n` up to a power of two in `1..=256` and grows/truncates the
    /// entry table; newly added slots get the color-space's default colors.
    pub fn set_num_entries(&mut self, n: u16, from_hpgl2: bool) {
        let new_size = n.next_power_of_two().clamp(1, 256) as usize;
        let bits_per_index = self.base.cid.bits_per_index;
        if new_size > self.entries.len() {
            for i in self.entries.len()..new_size {
                self.entries.push(default_color_for_slot(i, bits_per_index, from_hpgl2));
                self.pen_widths.push(1);
            }
        } else {
            self.entries.truncate(new_size);
            self.pen_widths.truncate(new_size);
        }
        self.from_hpgl2 = from_hpgl2;
    }

    /// Normalizes `raw` (in the palette's base color space's own component
    /// range) into the permanent `0..=255` storage form and writes it to
    /// slot `i` (§3, §8 "Normalization" invariant).
    pub fn set_entry(&mut self, i: usize, raw: [f32; 3]) -> PclResult<()> {
        if i >= self.entries.len() {
            return Err(PclError::invalid(format!("palette index {i} out of range")));
        }
        self.entries[i] = self.base.normalize_to_bytes(raw);
        Ok(())
    }

    /// Writes already-normalized `0..=255` bytes directly, bypassing the
    /// color space's black/white reference normalization. Used for default
    /// color generation and cases where the caller already has final
    /// device-form bytes.
    pub fn set_entry_raw_bytes(&mut self, i: usize, bytes: [u8; 3]) -> PclResult<()> {
        let slot = self
            .entries
            .get_mut(i)
            .ok_or_else(|| PclError::invalid(format!("palette index {i} out of range")))?;
        *slot = bytes;
        Ok(())
    }

    pub fn set_default_entry(&mut self, i: usize) -> PclResult<()> {
        if i >= self.entries.len() {
            return Err(PclError::invalid(format!("palette index {i} out of range")));
        }
        self.entries[i] = default_color_for_slot(i, self.base.cid.bits_per_index, self.from_hpgl2);
        Ok(())
    }

    pub fn set_pen_width(&mut self, i: usize, width: u16) -> PclResult<()> {
        let slot = self
            .pen_widths
            .get_mut(i)
            .ok_or_else(|| PclError::invalid(format!("palette index {i} out of range")))?;
        *slot = width;
        Ok(())
    }

    pub fn entry(&self, i: usize) -> Option<[u8; 3]> {
        self.entries.get(i).copied()
    }

    /// Returns slot `i`'s stored `0..=255` bytes as a `0.0..=1.0` triple.
    /// Palette storage is already normalized (§3), so this is a plain
    /// rescale, not a second pass through the color space's black/white
    /// references.
    pub fn normalized_entry(&self, i: usize) -> Option<[f32; 3]> {
        self.entry(i)
            .map(|raw| std::array::from_fn(|i| raw[i] as f32 / 255.0))
    }

    /// §4.3 `is_white`/`is_black`: exact test against stored palette bytes.
    pub fn is_white(&self, i: usize) -> bool {
        self.entry(i).is_some_and(ColorSpace::is_white)
    }

    pub fn is_black(&self, i: usize) -> bool {
        self.entry(i).is_some_and(ColorSpace::is_black)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteControlOp {
    DeleteAllNotOnStack,
    ClearStack,
    DeleteById,
    CopyActiveToId,
}

/// The outcome of a control op that the interpreter must propagate to other
/// components (e.g. winnowing the pattern cache of anything referencing a
/// deleted palette).
pub enum ControlOutcome {
    None,
    Removed(Vec<u16>),
}

pub struct PaletteStore {
    palettes: HashMap<u16, Rc<Palette>>,
    active_id: u16,
    stack: Vec<Rc<Palette>>,
    max_stack_depth: usize,
    default_space_kind: ColorSpaceKind,
}

impl PaletteStore {
    pub fn new(max_stack_depth: usize) -> PaletteStore {
        let default_base = Rc::new(ColorSpace::build_base(
            crate::color::color_space::Cid {
                space_kind: ColorSpaceKind::DeviceRgb,
                encoding: crate::color::color_space::PixelEncoding::IndexedByPixel,
                bits_per_index: 1,
                bits_per_primary: [8, 8, 8],
            },
            None,
            false,
            false,
        ));
        let mut palettes = HashMap::new();
        palettes.insert(0, Rc::new(Palette::default_2_entry(default_base.clone())));
        PaletteStore {
            palettes,
            active_id: 0,
            stack: Vec::new(),
            max_stack_depth,
            default_space_kind: ColorSpaceKind::DeviceRgb,
        }
    }

    pub fn active_id(&self) -> u16 {
        self.active_id
    }

    pub fn active(&self) -> &Rc<Palette> {
        self.palettes
            .get(&self.active_id)
            .expect("active palette id always present (installation invariant)")
    }

    /// Activates `id`, creating a default 2-entry RGB palette if absent.
    pub fn select(&mut self, id: u16) {
        self.palettes.entry(id).or_insert_with(|| {
            let base = Rc::new(ColorSpace::build_base(
                crate::color::color_space::Cid {
                    space_kind: self.default_space_kind,
                    encoding: crate::color::color_space::PixelEncoding::IndexedByPixel,
                    bits_per_index: 1,
                    bits_per_primary: [8, 8, 8],
                },
                None,
                false,
                false,
            ));
            Rc::new(Palette::default_2_entry(base))
        });
        self.active_id = id;
    }

    /// Returns a mutable handle to the active palette, cloning it first if
    /// shared (copy-on-write "unshare", §5).
    pub fn active_mut(&mut self) -> &mut Palette {
        let active = self.palettes.get_mut(&self.active_id).unwrap();
        Rc::make_mut(active)
    }

    pub fn push(&mut self) -> PclResult<()> {
        if self.stack.len() >= self.max_stack_depth {
            return Err(PclError::invalid("palette stack depth exceeded"));
        }
        self.stack.push(self.active().clone());
        Ok(())
    }

    pub fn pop(&mut self) -> PclResult<()> {
        let top = self
            .stack
            .pop()
            .ok_or_else(|| PclError::protocol("palette stack is empty"))?;
        let id = self.active_id;
        self.palettes.insert(id, top);
        Ok(())
    }

    pub fn control(&mut self, op: PaletteControlOp, control_id: u16) -> ControlOutcome {
        match op {
            PaletteControlOp::ClearStack => {
                self.stack.clear();
                ControlOutcome::None
            }
            PaletteControlOp::DeleteAllNotOnStack => {
                let kept: std::collections::HashSet<u16> = std::iter::once(self.active_id)
                    .chain(self.stack.iter().filter_map(|p| {
                        self.palettes
                            .iter()
                            .find(|(_, v)| Rc::ptr_eq(v, p))
                            .map(|(k, _)| *k)
                    }))
                    .collect();
                let removed: Vec<u16> = self
                    .palettes
                    .keys()
                    .copied()
                    .filter(|id| !kept.contains(id) && *id != 0)
                    .collect();
                for id in &removed {
                    self.palettes.remove(id);
                }
                ControlOutcome::Removed(removed)
            }
            PaletteControlOp::DeleteById => {
                if control_id != 0 && self.palettes.remove(&control_id).is_some() {
                    ControlOutcome::Removed(vec![control_id])
                } else {
                    ControlOutcome::None
                }
            }
            PaletteControlOp::CopyActiveToId => {
                let active = self.active().clone();
                self.palettes.insert(control_id, active);
                ControlOutcome::None
            }
        }
    }

    pub fn do_reset(&mut self) {
        self.stack.clear();
        self.active_id = 0;
        self.palettes.retain(|id, _| *id == 0);
    }

    /// `* v # W`: installs a freshly built palette descriptor as the active
    /// palette (§4.3 `build_base`/`build_indexed`/`install`). Replaces the
    /// active palette outright rather than mutating it in place, since a
    /// new CID generally changes the entry count and base color space
    /// together.
    pub fn install_cid(
        &mut self,
        cid: crate::color::color_space::Cid,
        params: Option<crate::color::color_space::CidParams>,
        use_cie_color: bool,
        collapse_to_colorimetric: bool,
        from_hpgl2: bool,
    ) {
        let bits_per_index = cid.bits_per_index.min(8);
        let base = Rc::new(ColorSpace::build_base(cid, params, use_cie_color, collapse_to_colorimetric));
        let palette = Palette::new(base, 1u16 << bits_per_index, from_hpgl2);
        self.palettes.insert(self.active_id, Rc::new(palette));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn rgb_space() -> Rc<ColorSpace> {
        Rc::new(ColorSpace::build_base(
            crate::color::color_space::Cid {
                space_kind: ColorSpaceKind::DeviceRgb,
                encoding: crate::color::color_space::PixelEncoding::IndexedByPixel,
                bits_per_index: 3,
                bits_per_primary: [8, 8, 8],
            },
            None,
            false,
            false,
        ))
    }

    #[test]
    fn new_palette_rounds_size_up_to_power_of_two() {
        let p = Palette::new(rgb_space(), 5, false);
        assert_eq!(p.size(), 8);
    }

    #[test]
    fn growing_palette_fills_new_slots_with_defaults_not_garbage() {
        let mut p = Palette::new(rgb_space(), 2, false);
        p.set_entry(0, [1.0, 2.0, 3.0]).unwrap();
        p.set_num_entries(8, false);
        assert_eq!(p.size(), 8);
        assert_eq!(p.entry(0), Some([1, 2, 3]));
        assert!(p.entry(7).is_some());
    }

    #[test]
    fn out_of_range_entry_is_invalid_parameters() {
        let mut p = Palette::new(rgb_space(), 2, false);
        assert!(p.set_entry(99, [0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn default_palette_is_white_then_black() {
        let p = Palette::default_2_entry(rgb_space());
        assert_eq!(p.entry(0), Some([0xff, 0xff, 0xff]));
        assert_eq!(p.entry(1), Some([0x00, 0x00, 0x00]));
    }

    #[test]
    fn store_select_creates_default_palette_when_absent() {
        let mut store = PaletteStore::new(20);
        store.select(42);
        assert_eq!(store.active().size(), 2);
    }

    #[test]
    fn push_pop_round_trips_active_palette() {
        let mut store = PaletteStore::new(20);
        store.active_mut().set_entry(0, [9.0, 9.0, 9.0]).unwrap();
        store.push().unwrap();
        store.active_mut().set_entry(0, [1.0, 1.0, 1.0]).unwrap();
        assert_eq!(store.active().entry(0), Some([1, 1, 1]));
        store.pop().unwrap();
        assert_eq!(store.active().entry(0), Some([9, 9, 9]));
    }

    #[test]
    fn pop_without_push_is_protocol_error() {
        let mut store = PaletteStore::new(20);
        assert!(store.pop().is_err());
    }

    #[test]
    fn default_palette_round_trip_scenario() {
        let store = PaletteStore::new(20);
        let p = store.active();
        assert_eq!(p.size(), 2);
        assert!(p.is_white(0));
        assert!(p.is_black(1));
    }

    #[test]
    fn eight_entry_cmy_default_matches_cmy_order() {
        use crate::color::color_space::{Cid, PixelEncoding};

        let cid = Cid {
            space_kind: ColorSpaceKind::DeviceCmy,
            encoding: PixelEncoding::IndexedByPlane,
            bits_per_index: 3,
            bits_per_primary: [1, 1, 1],
        };
        let base = Rc::new(ColorSpace::build_base(cid, None, false, false));
        let p = Palette::new(base, 8, false);

        let expected = [
            [255, 255, 255],
            [0, 255, 255],
            [255, 0, 255],
            [0, 0, 255],
            [255, 255, 0],
            [0, 255, 0],
            [255, 0, 0],
            [0, 0, 0],
        ];
        for (i, want) in expected.iter().enumerate() {
            assert_eq!(p.entry(i), Some(*want));
        }
    }

    #[test]
    fn set_entry_normalizes_against_white_black_refs() {
        use crate::color::color_space::{Cid, CidParams, PixelEncoding};

        let cid = Cid {
            space_kind: ColorSpaceKind::DeviceRgb,
            encoding: PixelEncoding::IndexedByPixel,
            bits_per_index: 1,
            bits_per_primary: [8, 8, 8],
        };
        let params = CidParams::Device {
            white_ref: [128, 128, 128],
            black_ref: [0, 0, 0],
        };
        let base = Rc::new(ColorSpace::build_base(cid, Some(params), false, false));
        let mut p = Palette::new(base, 2, false);

        p.set_entry(1, [64.0, 64.0, 64.0]).unwrap();
        assert_eq!(p.entry(1), Some([128, 128, 128]));
    }

    #[test]
    fn delete_by_id_reports_removed_id() {
        let mut store = PaletteStore::new(20);
        store.select(7);
        store.select(0);
        match store.control(PaletteControlOp::DeleteById, 7) {
            ControlOutcome::Removed(ids) => assert_eq!(ids, vec![7]),
            ControlOutcome::None => panic!("expected removal"),
        }
    }
}
