//! Raster band fill: triggered by `RASTER_CTRL.bit0`, fills a full-width
//! horizontal band directly into the back buffer.

use super::framebuffer::Framebuffer;

pub fn fill_band(fb: &mut Framebuffer, y: u32, height: u32, color: u32) {
    let width = fb.width();
    for row in y..(y + height).min(fb.height()) {
        for x in 0..width {
            fb.write_pixel(x, row, color);
        }
    }
}
