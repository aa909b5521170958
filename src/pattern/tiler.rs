//! Step-matrix-driven tiling of a rendered tile into a destination
//! rectangle, per §4.6.

use crate::data_structures::{Matrix, Point, Rectangle};
use crate::pattern::{imod, PatternTile};
use crate::surface::Surface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    Opaque,
    TransparentSource,
    TransparentPattern,
    PdfTransparencyGroup,
}

pub struct PatternTiler {
    /// Device capability flag (§3.3 `InterpreterConfig::supports_native_tile_fill`).
    pub supports_native_tile_fill: bool,
}

impl PatternTiler {
    pub fn new(supports_native_tile_fill: bool) -> PatternTiler {
        PatternTiler {
            supports_native_tile_fill,
        }
    }

    /// Fills `rect` with `tile`, stepped per `tile.step`, anchored so that
    /// `phase` lands on a tile-cell boundary.
    #[allow(clippy::too_many_arguments)]
    pub fn fill_rect(
        &self,
        surface: &mut dyn Surface,
        rect: Rectangle,
        tile: &PatternTile,
        mode: FillMode,
        phase: Point,
        fg: [u8; 3],
        bg: Option<[u8; 3]>,
        rop: u8,
    ) {
        if rect.is_empty() {
            return;
        }

        if tile.is_simple && self.supports_native_tile_fill {
            let local_phase = Point::new(
                simple_tile_phase(tile.step.e, phase.x, tile.width) as f32,
                simple_tile_phase(tile.step.f, phase.y, tile.height) as f32,
            );
            surface.strip_tile(rect, tile, local_phase, fg, bg, rop);
            return;
        }

        self.fill_rect_stepped(surface, rect, tile, mode, phase, rop);
    }

    fn fill_rect_stepped(
        &self,
        surface: &mut dyn Surface,
        rect: Rectangle,
        tile: &PatternTile,
        _mode: FillMode,
        phase: Point,
        rop: u8,
    ) {
        let Some(inv) = tile.step.inverse() else {
            // A singular step matrix degenerates to a single tile paint.
            surface.strip_rop(rect, tile, rop, phase, tile.step);
            return;
        };

        let corners = [
            Point::new(rect.x0, rect.y0),
            Point::new(rect.x1, rect.y0),
            Point::new(rect.x0, rect.y1),
            Point::new(rect.x1, rect.y1),
        ]
        .map(|p| inv.transform_point(Point::new(p.x - phase.x, p.y - phase.y)));

        let mut u0 = f32::INFINITY;
        let mut v0 = f32::INFINITY;
        let mut u1 = f32::NEG_INFINITY;
        let mut v1 = f32::NEG_INFINITY;
        for c in corners {
            u0 = u0.min(c.x);
            v0 = v0.min(c.y);
            u1 = u1.max(c.x);
            v1 = v1.max(c.y);
        }

        let mut stepping = Rectangle::new(u0, v0, u1, v1);
        if !tile.is_simple {
            // Non-simple tiles may protrude from their own step cell; widen
            // the search region by the tile's own bounding box.
            stepping = stepping.expand(tile.bbox.width(), tile.bbox.height());
        }

        let eps = 1.0 / expansion(&tile.step);

        let i_lo = (stepping.x0 - eps).floor() as i64;
        let i_hi = (stepping.x1 + eps).ceil() as i64;
        let j_lo = (stepping.y0 - eps).floor() as i64;
        let j_hi = (stepping.y1 + eps).ceil() as i64;

        // Row-major order: j (row) outer, i (column) inner. Earlier (i, j)
        // owns a shared boundary pixel because each tile is clipped to its
        // own disjoint cell before being handed to the device.
        for j in j_lo..=j_hi {
            for i in i_lo..=i_hi {
                let origin = tile.step.transform_point(Point::new(i as f32, j as f32));
                let ox = origin.x + phase.x;
                let oy = origin.y + phase.y;

                if ox as i64 == i64::from(i32::MIN) || oy as i64 == i64::from(i32::MIN) {
                    continue; // transform underflow guard
                }

                let tile_rect = Rectangle::new(ox, oy, ox + tile.width as f32, oy + tile.height as f32);
                let clipped = tile_rect.intersect(&rect);
                if clipped.is_empty() {
                    continue;
                }

                surface.strip_rop(clipped, tile, rop, Point::new(ox, oy), tile.step);
            }
        }
    }
}

fn simple_tile_phase(step_translation: f32, external_phase: f32, tile_dim: u32) -> i64 {
    let shifted = step_translation - external_phase + 0.5;
    imod(-(shifted.floor() as i64), tile_dim as i64)
}

/// The step matrix's largest per-axis scale factor; used to size the
/// floor/ceil epsilon in stepping-space so floating-point error in the
/// inverse transform never causes a missed or doubled tile (§4.6, §9).
fn expansion(m: &Matrix) -> f32 {
    m.a.abs().max(m.b.abs()).max(m.c.abs()).max(m.d.abs()).max(1e-6)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pattern::SolidShade;
    use crate::surface::{ImageHandle, ImageParams};

    struct RecordingSurface {
        strip_tile_calls: Vec<(Rectangle, Point)>,
        strip_rop_calls: Vec<Rectangle>,
    }

    impl RecordingSurface {
        fn new() -> Self {
            RecordingSurface {
                strip_tile_calls: Vec::new(),
                strip_rop_calls: Vec::new(),
            }
        }
    }

    impl Surface for RecordingSurface {
        fn fill_rect(&mut self, _rect: Rectangle, _color: [u8; 3], _rop: u8) {}

        fn strip_tile(
            &mut self,
            rect: Rectangle,
            _tile: &PatternTile,
            phase: Point,
            _fg: [u8; 3],
            _bg: Option<[u8; 3]>,
            _rop: u8,
        ) {
            self.strip_tile_calls.push((rect, phase));
        }

        fn strip_rop(
            &mut self,
            rect: Rectangle,
            _tile: &PatternTile,
            _rop: u8,
            _phase: Point,
            _step: Matrix,
        ) {
            self.strip_rop_calls.push(rect);
        }

        fn begin_image(&mut self, _params: ImageParams) -> ImageHandle {
            ImageHandle(0)
        }
        fn image_row(&mut self, _handle: ImageHandle, _bytes: &[u8]) -> usize {
            0
        }
        fn end_image(&mut self, _handle: ImageHandle) {}
        fn copy_mono(&mut self, _rect: Rectangle, _bits: &[u8], _fg: [u8; 3], _bg: Option<[u8; 3]>) {}
        fn copy_color(&mut self, _rect: Rectangle, _bits: &[u8]) {}
        fn copy_planes(&mut self, _rect: Rectangle, _planes: &[&[u8]]) {}
        fn set_rop(&mut self, _rop: u8) {}
        fn set_source_transparent(&mut self, _transparent: bool) {}
        fn set_pattern_transparent(&mut self, _transparent: bool) {}
    }

    #[test]
    fn simple_tile_at_zero_phase_has_zero_local_phase() {
        // Scenario 7: a 4x4 tile, step == tile size, phase (0,0).
        assert_eq!(simple_tile_phase(0.0, 0.0, 4), 0);
    }

    #[test]
    fn simple_tile_uses_native_strip_tile_path() {
        let tiler = PatternTiler::new(true);
        let mut surface = RecordingSurface::new();
        let tile = PatternTile::solid(SolidShade::Black, 4, 4);

        tiler.fill_rect(
            &mut surface,
            Rectangle::new(0.0, 0.0, 10.0, 10.0),
            &tile,
            FillMode::Opaque,
            Point::origin(),
            [0, 0, 0],
            None,
            0xCC,
        );

        assert_eq!(surface.strip_tile_calls.len(), 1);
        assert!(surface.strip_rop_calls.is_empty());
    }

    #[test]
    fn stepped_tiling_covers_rect_with_multiple_cells() {
        let tiler = PatternTiler::new(false);
        let mut surface = RecordingSurface::new();
        let tile = PatternTile::solid(SolidShade::White, 4, 4);

        tiler.fill_rect(
            &mut surface,
            Rectangle::new(0.0, 0.0, 10.0, 10.0),
            &tile,
            FillMode::Opaque,
            Point::origin(),
            [0xff, 0xff, 0xff],
            None,
            0xCC,
        );

        // A 10x10 rect tiled by 4x4 cells needs a 3x3 lattice (cells at
        // 0,4,8 in each axis, clipped at the rect boundary).
        assert_eq!(surface.strip_rop_calls.len(), 9);
    }

    #[test]
    fn empty_rect_is_a_no_op() {
        let tiler = PatternTiler::new(false);
        let mut surface = RecordingSurface::new();
        let tile = PatternTile::solid(SolidShade::Black, 4, 4);

        tiler.fill_rect(
            &mut surface,
            Rectangle::new(5.0, 5.0, 5.0, 5.0),
            &tile,
            FillMode::Opaque,
            Point::origin(),
            [0, 0, 0],
            None,
            0,
        );

        assert!(surface.strip_rop_calls.is_empty());
        assert!(surface.strip_tile_calls.is_empty());
    }
}
