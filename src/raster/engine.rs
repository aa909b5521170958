//! Graphics-mode state machine: entry transform computation, row
//! ingestion/emission, zero-row elision, and exit (§4.7). Grounded in
//! `original_source/pcl/rtgmode.c`'s `pcl_enter_graphics_mode` /
//! `pcl_end_graphics_mode` for the shape of the entry/exit algorithm; the
//! exact empirical-correction branches for `lp_orient` 1/3 noted there are
//! deliberately simplified here to a single isotropic fallback, documented
//! in `DESIGN.md`.

use once_cell::sync::Lazy;

use crate::color::palette::Palette;
use crate::data_structures::{Matrix, Point, Rectangle};
use crate::error::{PclError, PclResult};
use crate::raster::compression::{self, CompressionMode, SeedRow};
use crate::raster::RasterState;
use crate::surface::{ImageFormat, ImageHandle, ImageParams, Surface};

/// Raster-graphics start variants (`* r # A`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
    NoScaleLeftMargin,
    NoScaleCurPoint,
    ScaleLeftMargin,
    ScaleCurPoint,
    Implicit,
}

/// `* r B` vs `* r C`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitMode {
    EndKeep,
    EndFull,
}

/// A nibble spread into four bytes, each carrying the nibble's corresponding
/// bit (MSB first) in its own bit 0. Used to consolidate indexed-by-plane
/// seed rows into a byte-per-pixel buffer eight pixels at a time (§4.7.3).
static SPREAD4: Lazy<[[u8; 4]; 16]> = Lazy::new(|| {
    std::array::from_fn(|nibble| std::array::from_fn(|i| ((nibble >> (3 - i)) & 1) as u8))
});

fn spread_byte_into(out: &mut [u8], base: usize, byte: u8, plane: usize) {
    let hi = ((byte >> 4) & 0xf) as usize;
    let lo = (byte & 0xf) as usize;
    for (i, &bit) in SPREAD4[hi].iter().enumerate() {
        if let Some(slot) = out.get_mut(base + i) {
            *slot |= bit << plane;
        }
    }
    for (i, &bit) in SPREAD4[lo].iter().enumerate() {
        if let Some(slot) = out.get_mut(base + 4 + i) {
            *slot |= bit << plane;
        }
    }
}

/// Geometry resolved once at graphics-mode entry, supplied by the caller
/// (the interpreter, which knows the active palette's encoding) rather than
/// derived here, keeping this engine decoupled from `ColorSpace` internals.
#[derive(Debug, Clone, Copy)]
pub struct RowLayout {
    /// Pixels per row (`src_width`, after clipping).
    pub pixel_count: usize,
    /// Bytes per plane's seed row.
    pub row_bytes: usize,
    /// Planes participating in consolidation.
    pub nplanes: usize,
    /// Indexed-by-plane palettes need bit consolidation (§4.7.3 step 1);
    /// other encodings already deliver one byte per pixel per plane and are
    /// passed through untouched.
    pub plane_indexed: bool,
}

pub struct RasterEngine {
    pub state: RasterState,
    seed_rows: Vec<SeedRow>,
    scratch_row: SeedRow,
    layout: RowLayout,
    transform: Matrix,
    clip_device: Rectangle,
    pre_entry_cursor: Point,
    image: Option<ImageHandle>,
    image_params: ImageParams,
    mask_image: Option<ImageHandle>,
    mask_params: Option<ImageParams>,
    white_mask_active: bool,
    zero_is_white: bool,
    zero_is_black: bool,
}

impl RasterEngine {
    pub fn new() -> RasterEngine {
        RasterEngine {
            state: RasterState::default(),
            seed_rows: Vec::new(),
            scratch_row: SeedRow::new(0),
            layout: RowLayout {
                pixel_count: 0,
                row_bytes: 0,
                nplanes: 0,
                plane_indexed: false,
            },
            transform: Matrix::identity(),
            clip_device: Rectangle::new(0.0, 0.0, 0.0, 0.0),
            pre_entry_cursor: Point::origin(),
            image: None,
            image_params: ImageParams {
                width: 0,
                height: 0,
                bits_per_component: 8,
                format: ImageFormat::Chunky,
                decode: Vec::new(),
                mask_color: None,
                combines_with_paint: true,
            },
            mask_image: None,
            mask_params: None,
            white_mask_active: false,
            zero_is_white: false,
            zero_is_black: false,
        }
    }

    pub fn is_graphics_mode(&self) -> bool {
        self.state.graphics_mode
    }

    #[allow(clippy::too_many_arguments)]
    pub fn enter_graphics_mode(
        &mut self,
        mode: EntryMode,
        print_dir_quarter: i32,
        page_orient_quarter: i32,
        cur_point: Point,
        logical_clip: Rectangle,
        palette: &Palette,
        layout: RowLayout,
        source_transparent: bool,
        pattern_transparent: bool,
    ) -> PclResult<()> {
        // §4.7.1 step 1: orientation.
        let mut rot = (print_dir_quarter + page_orient_quarter) & 3;
        if self.state.presentation_mode_3 {
            rot &= 2;
        }
        if self.state.y_advance == -1 {
            rot = (rot + 2) & 3;
        }

        // §4.7.1 step 2: origin placement.
        self.state.gmargin_cp = match mode {
            EntryMode::Implicit => self.state.gmargin_cp,
            EntryMode::NoScaleCurPoint | EntryMode::ScaleCurPoint => cur_point.x,
            EntryMode::NoScaleLeftMargin | EntryMode::ScaleLeftMargin => {
                let axis_changed = rot == 1 || rot == 3;
                if axis_changed {
                    1200.0
                } else {
                    0.0
                }
            }
        };

        // §4.7.1 step 3: scaling.
        let src_w = self.state.src_width.value.max(1) as f32;
        let src_h = self.state.src_height.value.max(1) as f32;
        let isotropic_fallback = !self.state.scale_raster
            || (palette.fixed && mode == EntryMode::Implicit)
            || !self.state.src_width.explicit
            || !self.state.src_height.explicit;

        let (scale_x, scale_y) = if isotropic_fallback {
            let s = 7200.0 / self.state.resolution_dpi as f32;
            (s, s)
        } else if self.state.dest_width_cp.explicit && self.state.dest_height_cp.explicit {
            (
                self.state.dest_width_cp.value as f32 / src_w,
                self.state.dest_height_cp.value as f32 / src_h,
            )
        } else if self.state.dest_width_cp.explicit || self.state.dest_height_cp.explicit {
            let s = if self.state.dest_width_cp.explicit {
                self.state.dest_width_cp.value as f32 / src_w
            } else {
                self.state.dest_height_cp.value as f32 / src_h
            };
            (s, s)
        } else {
            let clip = logical_clip.clamp_to_positive_quadrant();
            let s = (clip.width() / src_w).min(clip.height() / src_h).max(0.0);
            (s, s)
        };

        // §4.7.1 step 4: clip.
        let clip = logical_clip.clamp_to_positive_quadrant();
        let mut clip_w = (clip.x1.floor() - clip.x0.floor()).max(1.0);
        let mut clip_h = (clip.y1.floor() - clip.y0.floor()).max(1.0);
        if self.state.src_width.explicit {
            clip_w = clip_w.min(self.state.src_width.value as f32);
        }
        if self.state.src_height.explicit {
            clip_h = clip_h.min(self.state.src_height.value as f32);
        }
        self.state.clip_all = clip_w <= 0.0 || clip_h <= 0.0;
        self.clip_device = Rectangle::new(0.0, 0.0, clip_w, clip_h);

        let rotation = match rot {
            0 => Matrix::identity(),
            1 => Matrix::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0),
            2 => Matrix::new(-1.0, 0.0, 0.0, -1.0, 0.0, 0.0),
            _ => Matrix::new(0.0, -1.0, 1.0, 0.0, 0.0, 0.0),
        };
        self.transform = Matrix::scale(scale_x, scale_y) * rotation * Matrix::translation(self.state.gmargin_cp, 0.0);

        // §4.7.1 step 5: mask setup.
        self.white_mask_active = !source_transparent && pattern_transparent;
        self.zero_is_white = palette.is_white(0);
        self.zero_is_black = palette.is_black(0);

        self.pre_entry_cursor = cur_point;
        self.layout = layout;
        self.seed_rows = (0..layout.nplanes.max(1))
            .map(|_| SeedRow::new(layout.row_bytes))
            .collect();
        self.scratch_row = SeedRow::new(layout.row_bytes);

        self.image_params = ImageParams {
            width: layout.pixel_count as u32,
            height: self.state.src_height.value,
            bits_per_component: 8,
            format: ImageFormat::Chunky,
            decode: palette.base.decode.to_vec(),
            mask_color: None,
            combines_with_paint: true,
        };
        self.mask_params = if self.white_mask_active {
            Some(ImageParams {
                width: layout.pixel_count as u32,
                height: self.state.src_height.value,
                bits_per_component: 1,
                format: ImageFormat::Chunky,
                decode: vec![0.0, 1.0],
                mask_color: None,
                combines_with_paint: false,
            })
        } else {
            None
        };

        self.image = None;
        self.mask_image = None;
        self.state.plane_index = 0;
        self.state.rows_rendered = 0;
        self.state.graphics_mode = true;
        Ok(())
    }

    fn ensure_image_open(&mut self, surface: &mut dyn Surface) {
        if self.image.is_none() {
            self.image = Some(surface.begin_image(self.image_params.clone()));
        }
        if self.white_mask_active && self.mask_image.is_none() {
            if let Some(params) = self.mask_params.clone() {
                self.mask_image = Some(surface.begin_image(params));
            }
        }
    }

    /// `* b # V`: add one plane to the row in progress. Adaptive compression
    /// is illegal here (§4.1, §4.7.2).
    pub fn transfer_plane(&mut self, bytes: &[u8]) -> PclResult<()> {
        if self.state.compression_mode == CompressionMode::Adaptive {
            return Err(PclError::protocol("adaptive compression is illegal in a plane transfer"));
        }
        self.decode_into_plane(bytes)?;
        self.state.plane_index += 1;
        Ok(())
    }

    /// `* b # W`: add one plane, then emit the completed row. Adaptive
    /// compression may emit several rows from one payload (§4.1, §4.7.2).
    pub fn transfer_row(&mut self, bytes: &[u8], surface: &mut dyn Surface) -> PclResult<()> {
        if self.state.compression_mode == CompressionMode::Adaptive {
            return self.transfer_row_adaptive(bytes, surface);
        }
        self.decode_into_plane(bytes)?;
        self.state.plane_index += 1;
        self.emit_row(surface)
    }

    fn decode_into_plane(&mut self, bytes: &[u8]) -> PclResult<()> {
        let nplanes = self.seed_rows.len();
        let target = if self.state.plane_index < nplanes {
            &mut self.seed_rows[self.state.plane_index]
        } else {
            // Surplus planes beyond the configured count are decoded but
            // discarded (§4.7.2): they must not corrupt a real plane.
            &mut self.scratch_row
        };
        compression::decode(self.state.compression_mode, target, bytes)
    }

    fn transfer_row_adaptive(&mut self, bytes: &[u8], surface: &mut dyn Surface) -> PclResult<()> {
        for op in compression::parse_adaptive(bytes)? {
            match op {
                compression::AdaptiveOp::Apply { mode, data } => {
                    let sub_mode = CompressionMode::from_u8(mode)?;
                    self.decode_into_plane_with_mode(sub_mode, data)?;
                    self.state.plane_index += 1;
                    self.emit_row(surface)?;
                }
                compression::AdaptiveOp::SkipRows(n) => self.skip_rows(n as u32, surface)?,
                compression::AdaptiveOp::RepeatRows(n) => {
                    for _ in 0..n {
                        self.emit_row(surface)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn decode_into_plane_with_mode(&mut self, mode: CompressionMode, bytes: &[u8]) -> PclResult<()> {
        let nplanes = self.seed_rows.len();
        let target = if self.state.plane_index < nplanes {
            &mut self.seed_rows[self.state.plane_index]
        } else {
            &mut self.scratch_row
        };
        compression::decode(mode, target, bytes)
    }

    fn consolidate(&self) -> Vec<u8> {
        let pixel_count = self.layout.pixel_count;
        if !self.layout.plane_indexed {
            return self.seed_rows.first().map(|s| s.pdata.clone()).unwrap_or_default();
        }

        let mut out = vec![0u8; pixel_count];
        for (plane, seed) in self.seed_rows.iter().enumerate() {
            let mut px = 0usize;
            while px < pixel_count {
                let byte = seed.pdata.get(px / 8).copied().unwrap_or(0);
                spread_byte_into(&mut out, px, byte, plane);
                px += 8;
            }
        }
        out
    }

    fn white_mask_row(&self, consolidated: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; consolidated.len().div_ceil(8)];
        for (i, &v) in consolidated.iter().enumerate() {
            if v == 0 {
                out[i / 8] |= 1 << (7 - (i % 8));
            }
        }
        out
    }

    /// §4.7.3: consolidate, remap, emit, emit mask, advance.
    fn emit_row(&mut self, surface: &mut dyn Surface) -> PclResult<()> {
        if self.state.clip_all {
            self.state.rows_rendered += 1;
            self.state.plane_index = 0;
            return Ok(());
        }

        let consolidated = self.consolidate();
        self.ensure_image_open(surface);
        if let Some(handle) = self.image {
            surface.image_row(handle, &consolidated);
        }
        if self.white_mask_active {
            let mask_row = self.white_mask_row(&consolidated);
            if let Some(handle) = self.mask_image {
                surface.image_row(handle, &mask_row);
            }
        }

        self.state.rows_rendered += 1;
        self.state.plane_index = 0;
        Ok(())
    }

    /// `* b # Y`: skip (zero-fill) `n` rows (§4.7.4).
    pub fn skip_rows(&mut self, n: u32, surface: &mut dyn Surface) -> PclResult<()> {
        if n == 0 {
            return Ok(());
        }
        if self.state.clip_all {
            self.state.rows_rendered += n;
            return Ok(());
        }

        for seed in &mut self.seed_rows {
            seed.clear();
        }

        let row_bytes = self.layout.row_bytes.max(1);
        let single_known_color = self.zero_is_white || self.zero_is_black;
        if (n as usize) * row_bytes > 1024 && single_known_color {
            if let Some(handle) = self.image.take() {
                surface.end_image(handle);
            }
            let color = if self.zero_is_white { [0xff, 0xff, 0xff] } else { [0x00, 0x00, 0x00] };
            let y0 = self.state.rows_rendered as f32;
            let rect = Rectangle::new(self.clip_device.x0, y0, self.clip_device.x1, y0 + n as f32);
            surface.fill_rect(rect, color, 0xCC);
            self.state.rows_rendered += n;
            return Ok(());
        }

        for _ in 0..n {
            self.emit_row(surface)?;
        }
        Ok(())
    }

    /// `* r B` / `* r C`: finalize the image, pad any un-sent rows, restore
    /// the pre-entry cursor, and release scoped resources (§4.7.5).
    /// Idempotent: a second call when graphics mode is already closed is a
    /// no-op (§8 "Idempotence").
    pub fn end_graphics_mode(&mut self, mode: ExitMode, surface: &mut dyn Surface) -> PclResult<Point> {
        if !self.state.graphics_mode {
            return Ok(self.pre_entry_cursor);
        }

        if self.state.src_height.explicit && self.state.rows_rendered < self.state.src_height.value {
            let remaining = self.state.src_height.value - self.state.rows_rendered;
            self.skip_rows(remaining, surface)?;
        }

        if let Some(handle) = self.image.take() {
            surface.end_image(handle);
        }
        if let Some(handle) = self.mask_image.take() {
            surface.end_image(handle);
        }

        if mode == ExitMode::EndFull {
            self.state.gmargin_cp = 0.0;
            self.state.compression_mode = CompressionMode::Uncompressed;
        }

        self.state.graphics_mode = false;
        self.state.clip_all = false;
        self.state.plane_index = 0;
        self.state.rows_rendered = 0;
        self.seed_rows.clear();

        Ok(self.pre_entry_cursor)
    }
}

impl Default for RasterEngine {
    fn default() -> Self {
        RasterEngine::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::color::color_space::{Cid, ColorSpaceKind, PixelEncoding};
    use crate::color::palette::Palette;
    use std::rc::Rc;

    struct RecordingSurface {
        rows: Vec<Vec<u8>>,
        fills: Vec<(Rectangle, [u8; 3])>,
        images_begun: usize,
        images_ended: usize,
    }

    impl RecordingSurface {
        fn new() -> Self {
            RecordingSurface {
                rows: Vec::new(),
                fills: Vec::new(),
                images_begun: 0,
                images_ended: 0,
            }
        }
    }

    impl Surface for RecordingSurface {
        fn fill_rect(&mut self, rect: Rectangle, color: [u8; 3], _rop: u8) {
            self.fills.push((rect, color));
        }
        fn strip_tile(
            &mut self,
            _rect: Rectangle,
            _tile: &crate::pattern::PatternTile,
            _phase: Point,
            _fg: [u8; 3],
            _bg: Option<[u8; 3]>,
            _rop: u8,
        ) {
        }
        fn strip_rop(
            &mut self,
            _rect: Rectangle,
            _tile: &crate::pattern::PatternTile,
            _rop: u8,
            _phase: Point,
            _step: Matrix,
        ) {
        }
        fn begin_image(&mut self, _params: ImageParams) -> ImageHandle {
            self.images_begun += 1;
            ImageHandle(self.images_begun as u32)
        }
        fn image_row(&mut self, _handle: ImageHandle, bytes: &[u8]) -> usize {
            self.rows.push(bytes.to_vec());
            bytes.len()
        }
        fn end_image(&mut self, _handle: ImageHandle) {
            self.images_ended += 1;
        }
        fn copy_mono(&mut self, _rect: Rectangle, _bits: &[u8], _fg: [u8; 3], _bg: Option<[u8; 3]>) {}
        fn copy_color(&mut self, _rect: Rectangle, _bits: &[u8]) {}
        fn copy_planes(&mut self, _rect: Rectangle, _planes: &[&[u8]]) {}
        fn set_rop(&mut self, _rop: u8) {}
        fn set_source_transparent(&mut self, _transparent: bool) {}
        fn set_pattern_transparent(&mut self, _transparent: bool) {}
    }

    fn cmy_palette(bits_per_index: u8) -> Palette {
        let cid = Cid {
            space_kind: ColorSpaceKind::DeviceCmy,
            encoding: PixelEncoding::IndexedByPlane,
            bits_per_index,
            bits_per_primary: [1, 1, 1],
        };
        let base = Rc::new(crate::color::color_space::ColorSpace::build_base(cid, None, false, false));
        Palette::new(base, 1 << bits_per_index, false)
    }

    fn entered_engine(pixel_count: usize, nplanes: usize, height: u32) -> (RasterEngine, Palette) {
        let mut engine = RasterEngine::new();
        engine.state.src_width.set(pixel_count as u32);
        engine.state.src_height.set(height);
        let palette = cmy_palette(nplanes as u8);
        let layout = RowLayout {
            pixel_count,
            row_bytes: pixel_count.div_ceil(8),
            nplanes,
            plane_indexed: true,
        };
        engine
            .enter_graphics_mode(
                EntryMode::NoScaleLeftMargin,
                0,
                0,
                Point::origin(),
                Rectangle::new(0.0, 0.0, 1000.0, 1000.0),
                &palette,
                layout,
                true,
                true,
            )
            .unwrap();
        (engine, palette)
    }

    #[test]
    fn transfer_row_emits_and_advances() {
        let (mut engine, _p) = entered_engine(8, 3, 4);
        let mut surface = RecordingSurface::new();
        engine.transfer_row(&[0xff], &mut surface).unwrap();
        assert_eq!(engine.state.rows_rendered, 1);
        assert_eq!(surface.rows.len(), 1);
    }

    #[test]
    fn plane_consolidation_ors_bits_across_planes() {
        let (mut engine, _p) = entered_engine(8, 3, 1);
        let mut surface = RecordingSurface::new();
        engine.transfer_plane(&[0b1000_0000]).unwrap();
        engine.transfer_plane(&[0b0000_0000]).unwrap();
        engine.transfer_row(&[0b0000_0000], &mut surface).unwrap();
        assert_eq!(surface.rows[0][0], 0b0000_0001);
    }

    #[test]
    fn end_graphics_mode_is_idempotent() {
        let (mut engine, _p) = entered_engine(8, 1, 1);
        let mut surface = RecordingSurface::new();
        engine.transfer_row(&[0xff], &mut surface).unwrap();
        let first = engine.end_graphics_mode(ExitMode::EndKeep, &mut surface).unwrap();
        let second = engine.end_graphics_mode(ExitMode::EndKeep, &mut surface).unwrap();
        assert_eq!(first, second);
        assert_eq!(surface.images_ended, 1);
    }

    #[test]
    fn end_graphics_mode_pads_unsent_rows() {
        let (mut engine, _p) = entered_engine(8, 1, 5);
        let mut surface = RecordingSurface::new();
        engine.transfer_row(&[0xff], &mut surface).unwrap();
        engine.end_graphics_mode(ExitMode::EndFull, &mut surface).unwrap();
        assert_eq!(surface.rows.len(), 5);
        assert_eq!(engine.state.compression_mode, CompressionMode::Uncompressed);
    }

    #[test]
    fn transfer_plane_rejects_adaptive_compression() {
        let (mut engine, _p) = entered_engine(8, 1, 1);
        engine.state.compression_mode = CompressionMode::Adaptive;
        assert!(engine.transfer_plane(&[]).is_err());
    }

    #[test]
    fn large_zero_run_over_known_color_uses_fill_rect() {
        let (mut engine, _p) = entered_engine(8192, 1, 100);
        let mut surface = RecordingSurface::new();
        engine.skip_rows(50, &mut surface).unwrap();
        assert_eq!(surface.fills.len(), 1);
        assert!(surface.rows.is_empty());
        assert_eq!(engine.state.rows_rendered, 50);
    }
}
