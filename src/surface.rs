//! The abstract draw-call sink the core emits into (§6.2). Device output,
//! actual pixel compositing, and window/file presentation are someone
//! else's problem — this crate only describes *what* was drawn.

use crate::data_structures::{Matrix, Point, Rectangle};
use crate::pattern::PatternTile;

/// A pixel format for [`ImageParams`]. Chunky interleaves components per
/// pixel; component-planar stores one full plane per component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Chunky,
    ComponentPlanar,
}

/// Parameters for [`Surface::begin_image`]. Mirrors the raster engine's
/// image-enumerator contract in §4.7 and the masked-image (image type 4)
/// variant named in §6.2.
#[derive(Debug, Clone)]
pub struct ImageParams {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    pub format: ImageFormat,
    pub decode: Vec<f32>,
    /// For an image-type-4 masked image: the index/color treated as
    /// transparent.
    pub mask_color: Option<u32>,
    /// Whether the current paint (pattern/foreground) combines with this
    /// image rather than replacing it outright.
    pub combines_with_paint: bool,
}

/// An opaque handle returned by [`Surface::begin_image`]. The engine treats
/// it as a capability token, not an index into anything of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHandle(pub u32);

/// The device/output sink. One implementation per embedding (screen canvas,
/// raster-to-PDF bridge, golden-file test recorder, ...); this crate only
/// calls through the trait.
pub trait Surface {
    fn fill_rect(&mut self, rect: Rectangle, color: [u8; 3], rop: u8);

    /// Simple repeated tile: the device's native tiled-fill path (§4.6).
    fn strip_tile(
        &mut self,
        rect: Rectangle,
        tile: &PatternTile,
        phase: Point,
        fg: [u8; 3],
        bg: Option<[u8; 3]>,
        rop: u8,
    );

    /// Stepped tiling with an explicit rop, for non-simple step matrices.
    fn strip_rop(&mut self, rect: Rectangle, tile: &PatternTile, rop: u8, phase: Point, step: Matrix);

    fn begin_image(&mut self, params: ImageParams) -> ImageHandle;
    fn image_row(&mut self, handle: ImageHandle, bytes: &[u8]) -> usize;
    fn end_image(&mut self, handle: ImageHandle);

    fn copy_mono(&mut self, rect: Rectangle, bits: &[u8], fg: [u8; 3], bg: Option<[u8; 3]>);
    fn copy_color(&mut self, rect: Rectangle, bits: &[u8]);
    fn copy_planes(&mut self, rect: Rectangle, planes: &[&[u8]]);

    fn set_rop(&mut self, rop: u8);
    fn set_source_transparent(&mut self, transparent: bool);
    fn set_pattern_transparent(&mut self, transparent: bool);
}
