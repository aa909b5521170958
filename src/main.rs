//! A tiny demonstration driver: builds an [`Interpreter`], feeds it a
//! handful of commands by hand (a real embedder would get these from a
//! tokenizer reading actual PCL escape sequences), and prints what a
//! [`Surface`] implementation received.

use anyhow::Context;

use pcl_core::command::{ColorComponentSlot, Command};
use pcl_core::data_structures::{Matrix, Point, Rectangle};
use pcl_core::pattern::PatternTile;
use pcl_core::surface::{ImageHandle, ImageParams, Surface};
use pcl_core::{Interpreter, InterpreterConfig, PageContext};

/// Logs every draw call instead of compositing pixels; stands in for a real
/// device backend (screen canvas, raster-to-PDF bridge, ...).
struct LoggingSurface {
    rows_seen: usize,
}

impl Surface for LoggingSurface {
    fn fill_rect(&mut self, rect: Rectangle, color: [u8; 3], rop: u8) {
        log::info!("fill_rect {rect:?} color={color:?} rop={rop:#04x}");
    }

    fn strip_tile(&mut self, rect: Rectangle, _tile: &PatternTile, phase: Point, fg: [u8; 3], bg: Option<[u8; 3]>, rop: u8) {
        log::info!("strip_tile {rect:?} phase={phase:?} fg={fg:?} bg={bg:?} rop={rop:#04x}");
    }

    fn strip_rop(&mut self, rect: Rectangle, _tile: &PatternTile, rop: u8, phase: Point, step: Matrix) {
        log::info!("strip_rop {rect:?} phase={phase:?} step={step:?} rop={rop:#04x}");
    }

    fn begin_image(&mut self, params: ImageParams) -> ImageHandle {
        log::info!("begin_image {}x{}", params.width, params.height);
        ImageHandle(1)
    }

    fn image_row(&mut self, _handle: ImageHandle, bytes: &[u8]) -> usize {
        self.rows_seen += 1;
        bytes.len()
    }

    fn end_image(&mut self, _handle: ImageHandle) {
        log::info!("end_image, {} row(s) seen", self.rows_seen);
    }

    fn copy_mono(&mut self, _rect: Rectangle, _bits: &[u8], _fg: [u8; 3], _bg: Option<[u8; 3]>) {}
    fn copy_color(&mut self, _rect: Rectangle, _bits: &[u8]) {}
    fn copy_planes(&mut self, _rect: Rectangle, _planes: &[&[u8]]) {}

    fn set_rop(&mut self, rop: u8) {
        log::debug!("set_rop {rop:#04x}");
    }
    fn set_source_transparent(&mut self, transparent: bool) {
        log::debug!("set_source_transparent {transparent}");
    }
    fn set_pattern_transparent(&mut self, transparent: bool) {
        log::debug!("set_pattern_transparent {transparent}");
    }
}

fn main() -> anyhow::Result<()> {
    pcl_core::logging::init();

    let mut interpreter = Interpreter::new(InterpreterConfig::default());
    interpreter.establish_page();
    let mut surface = LoggingSurface { rows_seen: 0 };
    let ctx = PageContext::default();

    // `* v # W`: a 1-bit-per-index RGB palette (short-form CID, 6 bytes).
    let cid_payload = vec![0, 0, 0, 8, 8, 8];
    let commands = [
        Command::ConfigureImageData { payload: cid_payload },
        Command::StageColorComponent { slot: ColorComponentSlot::First, value: 255.0 },
        Command::AssignColorComponents { index: 1 },
        Command::SetForeground { index: 1 },
        Command::SetRasterResolution { dpi: 300 },
        Command::SetRasterSourceWidth { pixels: 8 },
        Command::SetRasterSourceHeight { pixels: 1 },
        Command::StartRasterGraphics { variant: 0 },
        Command::TransferRow { payload: vec![0b1010_1010] },
        Command::EndGraphicsFull,
    ];

    for cmd in commands {
        interpreter
            .execute(cmd, &ctx, &mut surface)
            .with_context(|| "executing demo command stream")?;
    }

    interpreter.fill_rect(Rectangle::new(0.0, 0.0, 16.0, 16.0), &mut surface)?;

    Ok(())
}
