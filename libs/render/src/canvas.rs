// This file is part of OpenGMS.
//
// OpenGMS is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// OpenGMS is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with OpenGMS.  If not, see <http://www.gnu.org/licenses/>.
use gamedata::{TexRegion, TexturePage};

/// Straight (non premultiplied) RGBA color.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

pub const WHITE: Color = Color {
    r: 255,
    g: 255,
    b: 255,
    a: 255,
};

pub const BLACK: Color = Color {
    r: 0,
    g: 0,
    b: 0,
    a: 255,
};

impl Color {
    /// Source colors store red in the low byte: c = r | g<<8 | b<<16.
    pub fn from_gm(col: u32) -> Self {
        Self {
            r: (col & 0xFF) as u8,
            g: ((col >> 8) & 0xFF) as u8,
            b: ((col >> 16) & 0xFF) as u8,
            a: 255,
        }
    }

    /// Room colors carry alpha in the top byte above the same layout.
    pub fn from_gm_alpha(col: u32) -> Self {
        Self {
            a: ((col >> 24) & 0xFF) as u8,
            ..Self::from_gm(col)
        }
    }

    pub fn to_gm(self) -> u32 {
        u32::from(self.r) | (u32::from(self.g) << 8) | (u32::from(self.b) << 16)
    }

    pub fn with_alpha(self, alpha: f64) -> Self {
        Self {
            a: (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
            ..self
        }
    }

    /// Modulate a sampled texel by this color, matching fixed function
    /// vertex color blending.
    #[inline]
    fn modulate(self, texel: [u8; 4]) -> [u8; 4] {
        [
            ((u16::from(texel[0]) * u16::from(self.r)) / 255) as u8,
            ((u16::from(texel[1]) * u16::from(self.g)) / 255) as u8,
            ((u16::from(texel[2]) * u16::from(self.b)) / 255) as u8,
            ((u16::from(texel[3]) * u16::from(self.a)) / 255) as u8,
        ]
    }
}

// Room-to-canvas mapping for the active view, plus the port clip.
#[derive(Clone, Copy, Debug)]
struct ViewMap {
    view_x: f64,
    view_y: f64,
    scale_x: f64,
    scale_y: f64,
    port_x: f64,
    port_y: f64,
    clip: (i32, i32, i32, i32),
}

/// The CPU backbuffer. All draw operations take room coordinates and run
/// through the active view transform; output order is deterministic, which
/// makes whole frames byte comparable across runs.
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    view: ViewMap,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        let mut canvas = Self {
            width,
            height,
            pixels: vec![0u8; (width * height * 4) as usize],
            view: ViewMap {
                view_x: 0.0,
                view_y: 0.0,
                scale_x: 1.0,
                scale_y: 1.0,
                port_x: 0.0,
                port_y: 0.0,
                clip: (0, 0, width as i32, height as i32),
            },
        };
        canvas.clear(BLACK);
        canvas
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let at = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[at],
            self.pixels[at + 1],
            self.pixels[at + 2],
            self.pixels[at + 3],
        ]
    }

    pub fn clear(&mut self, color: Color) {
        for px in self.pixels.chunks_exact_mut(4) {
            px[0] = color.r;
            px[1] = color.g;
            px[2] = color.b;
            px[3] = 255;
        }
    }

    /// Project `view` rectangle onto `port` rectangle for subsequent draws.
    #[allow(clippy::too_many_arguments)]
    pub fn set_view(
        &mut self,
        view_x: f64,
        view_y: f64,
        view_w: f64,
        view_h: f64,
        port_x: i32,
        port_y: i32,
        port_w: i32,
        port_h: i32,
    ) {
        self.view = ViewMap {
            view_x,
            view_y,
            scale_x: if view_w > 0.0 {
                f64::from(port_w) / view_w
            } else {
                1.0
            },
            scale_y: if view_h > 0.0 {
                f64::from(port_h) / view_h
            } else {
                1.0
            },
            port_x: f64::from(port_x),
            port_y: f64::from(port_y),
            clip: (
                port_x.max(0),
                port_y.max(0),
                (port_x + port_w).min(self.width as i32),
                (port_y + port_h).min(self.height as i32),
            ),
        };
    }

    pub fn reset_view(&mut self) {
        self.view = ViewMap {
            view_x: 0.0,
            view_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            port_x: 0.0,
            port_y: 0.0,
            clip: (0, 0, self.width as i32, self.height as i32),
        };
    }

    #[inline]
    fn to_canvas(&self, rx: f64, ry: f64) -> (f64, f64) {
        (
            (rx - self.view.view_x) * self.view.scale_x + self.view.port_x,
            (ry - self.view.view_y) * self.view.scale_y + self.view.port_y,
        )
    }

    #[inline]
    fn to_room(&self, cx: f64, cy: f64) -> (f64, f64) {
        (
            (cx - self.view.port_x) / self.view.scale_x + self.view.view_x,
            (cy - self.view.port_y) / self.view.scale_y + self.view.view_y,
        )
    }

    #[inline]
    fn put(&mut self, x: i32, y: i32, src: [u8; 4]) {
        let (cl, ct, cr, cb) = self.view.clip;
        if x < cl || y < ct || x >= cr || y >= cb || src[3] == 0 {
            return;
        }
        let at = ((y as u32 * self.width + x as u32) * 4) as usize;
        let sa = u16::from(src[3]);
        if sa == 255 {
            self.pixels[at] = src[0];
            self.pixels[at + 1] = src[1];
            self.pixels[at + 2] = src[2];
            self.pixels[at + 3] = 255;
            return;
        }
        let inv = 255 - sa;
        self.pixels[at] = ((u16::from(src[0]) * sa + u16::from(self.pixels[at]) * inv) / 255) as u8;
        self.pixels[at + 1] =
            ((u16::from(src[1]) * sa + u16::from(self.pixels[at + 1]) * inv) / 255) as u8;
        self.pixels[at + 2] =
            ((u16::from(src[2]) * sa + u16::from(self.pixels[at + 2]) * inv) / 255) as u8;
        self.pixels[at + 3] = self.pixels[at + 3].max(src[3]);
    }

    /// Solid rectangle between two room space corners, inclusive.
    pub fn fill_rect(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, color: Color) {
        let (ax, ay) = self.to_canvas(x1.min(x2), y1.min(y2));
        let (bx, by) = self.to_canvas(x1.max(x2) + 1.0, y1.max(y2) + 1.0);
        let src = [color.r, color.g, color.b, color.a];
        for y in ay.floor() as i32..by.ceil() as i32 {
            for x in ax.floor() as i32..bx.ceil() as i32 {
                self.put(x, y, src);
            }
        }
    }

    pub fn draw_point(&mut self, x: f64, y: f64, color: Color) {
        let (cx, cy) = self.to_canvas(x, y);
        self.put(cx.floor() as i32, cy.floor() as i32, [
            color.r, color.g, color.b, color.a,
        ]);
    }

    pub fn draw_line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, color: Color) {
        let (ax, ay) = self.to_canvas(x1, y1);
        let (bx, by) = self.to_canvas(x2, y2);
        let steps = (bx - ax).abs().max((by - ay).abs()).ceil().max(1.0) as i32;
        let src = [color.r, color.g, color.b, color.a];
        for i in 0..=steps {
            let t = f64::from(i) / f64::from(steps);
            let x = ax + (bx - ax) * t;
            let y = ay + (by - ay) * t;
            self.put(x.floor() as i32, y.floor() as i32, src);
        }
    }

    /// Axis aligned blit of a page rectangle to a room position; used for
    /// glyphs, tiles, and backgrounds. Honors the view scale, no rotation.
    #[allow(clippy::too_many_arguments)]
    pub fn blit_rect(
        &mut self,
        page: &TexturePage,
        src_x: i64,
        src_y: i64,
        src_w: i64,
        src_h: i64,
        dest_x: f64,
        dest_y: f64,
        xscale: f64,
        yscale: f64,
        blend: Color,
    ) {
        if xscale == 0.0 || yscale == 0.0 || src_w <= 0 || src_h <= 0 {
            return;
        }
        let (ax, ay) = self.to_canvas(dest_x.min(dest_x + src_w as f64 * xscale), dest_y.min(dest_y + src_h as f64 * yscale));
        let (bx, by) = self.to_canvas(dest_x.max(dest_x + src_w as f64 * xscale), dest_y.max(dest_y + src_h as f64 * yscale));
        for cy in ay.floor() as i32..by.ceil() as i32 {
            for cx in ax.floor() as i32..bx.ceil() as i32 {
                let (rx, ry) = self.to_room(f64::from(cx) + 0.5, f64::from(cy) + 0.5);
                let fx = ((rx - dest_x) / xscale).floor() as i64;
                let fy = ((ry - dest_y) / yscale).floor() as i64;
                if fx < 0 || fy < 0 || fx >= src_w || fy >= src_h {
                    continue;
                }
                let texel = page.texel(src_x + fx, src_y + fy);
                self.put(cx, cy, blend.modulate(texel));
            }
        }
    }

    /// Draw one sprite frame. `x, y` is the pivot position in room space,
    /// `pivot_x, pivot_y` the origin inside the logical frame; rotation is
    /// counterclockwise degrees about the pivot, applied after scaling.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_frame(
        &mut self,
        page: &TexturePage,
        region: &TexRegion,
        x: f64,
        y: f64,
        pivot_x: f64,
        pivot_y: f64,
        xscale: f64,
        yscale: f64,
        angle_deg: f64,
        blend: Color,
    ) {
        if xscale == 0.0 || yscale == 0.0 {
            return;
        }
        let theta = angle_deg.to_radians();
        let (sin, cos) = theta.sin_cos();

        // Forward map a logical frame corner to canvas space.
        let corner = |fx: f64, fy: f64| -> (f64, f64) {
            let lx = (fx - pivot_x) * xscale;
            let ly = (fy - pivot_y) * yscale;
            let rx = x + lx * cos + ly * sin;
            let ry = y - lx * sin + ly * cos;
            self.to_canvas(rx, ry)
        };

        let w = f64::from(region.dest_w);
        let h = f64::from(region.dest_h);
        let corners = [
            corner(0.0, 0.0),
            corner(w, 0.0),
            corner(0.0, h),
            corner(w, h),
        ];
        let min_x = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
        let max_x = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
        let min_y = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
        let max_y = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);

        let tx0 = f64::from(region.target_x);
        let ty0 = f64::from(region.target_y);
        let tx1 = tx0 + f64::from(region.target_w);
        let ty1 = ty0 + f64::from(region.target_h);

        for cy in min_y.floor() as i32..max_y.ceil() as i32 {
            for cx in min_x.floor() as i32..max_x.ceil() as i32 {
                let (rx, ry) = self.to_room(f64::from(cx) + 0.5, f64::from(cy) + 0.5);
                // Inverse rotation, then inverse scale, back to frame space.
                let dx = rx - x;
                let dy = ry - y;
                let lx = dx * cos - dy * sin;
                let ly = dx * sin + dy * cos;
                let fx = lx / xscale + pivot_x;
                let fy = ly / yscale + pivot_y;
                if fx < tx0 || fy < ty0 || fx >= tx1 || fy >= ty1 {
                    continue;
                }
                let texel = page.texel(
                    i64::from(region.src_x) + (fx - tx0).floor() as i64,
                    i64::from(region.src_y) + (fy - ty0).floor() as i64,
                );
                self.put(cx, cy, blend.modulate(texel));
            }
        }
    }

    /// Integer upscale with letterboxing; the largest whole multiple that
    /// fits is centered on a black field. HiDPI callers pass the OS
    /// reported framebuffer size here, not the logical window size.
    pub fn upscaled(&self, target_w: u32, target_h: u32) -> Canvas {
        let scale = (target_w / self.width.max(1))
            .min(target_h / self.height.max(1))
            .max(1);
        let mut out = Canvas::new(target_w, target_h);
        let off_x = (target_w.saturating_sub(self.width * scale)) / 2;
        let off_y = (target_h.saturating_sub(self.height * scale)) / 2;
        for y in 0..self.height * scale {
            let sy = y / scale;
            for x in 0..self.width * scale {
                let sx = x / scale;
                let src = self.pixel(sx, sy);
                let tx = x + off_x;
                let ty = y + off_y;
                if tx < target_w && ty < target_h {
                    let at = ((ty * target_w + tx) * 4) as usize;
                    out.pixels[at..at + 4].copy_from_slice(&src);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker_page() -> TexturePage {
        // 2x2: red, green / blue, white.
        let mut rgba = Vec::new();
        for px in [
            [255u8, 0, 0, 255],
            [0, 255, 0, 255],
            [0, 0, 255, 255],
            [255, 255, 255, 255],
        ] {
            rgba.extend_from_slice(&px);
        }
        TexturePage {
            width: 2,
            height: 2,
            rgba,
        }
    }

    fn full_region() -> TexRegion {
        TexRegion {
            src_x: 0,
            src_y: 0,
            src_w: 2,
            src_h: 2,
            target_x: 0,
            target_y: 0,
            target_w: 2,
            target_h: 2,
            dest_w: 2,
            dest_h: 2,
            page: 0,
        }
    }

    #[test]
    fn it_draws_an_unscaled_frame() {
        let mut canvas = Canvas::new(4, 4);
        canvas.draw_frame(
            &checker_page(),
            &full_region(),
            1.0,
            1.0,
            0.0,
            0.0,
            1.0,
            1.0,
            0.0,
            WHITE,
        );
        assert_eq!(canvas.pixel(1, 1), [255, 0, 0, 255]);
        assert_eq!(canvas.pixel(2, 1), [0, 255, 0, 255]);
        assert_eq!(canvas.pixel(1, 2), [0, 0, 255, 255]);
        assert_eq!(canvas.pixel(0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn it_modulates_by_blend_color() {
        let mut canvas = Canvas::new(2, 2);
        let blend = Color {
            r: 0,
            g: 255,
            b: 255,
            a: 255,
        };
        canvas.draw_frame(
            &checker_page(),
            &full_region(),
            0.0,
            0.0,
            0.0,
            0.0,
            1.0,
            1.0,
            0.0,
            blend,
        );
        // Red texel times cyan blend is black.
        assert_eq!(canvas.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(canvas.pixel(1, 0), [0, 255, 0, 255]);
    }

    #[test]
    fn view_offset_shifts_draws() {
        let mut canvas = Canvas::new(2, 2);
        canvas.set_view(10.0, 10.0, 2.0, 2.0, 0, 0, 2, 2);
        canvas.draw_frame(
            &checker_page(),
            &full_region(),
            10.0,
            10.0,
            0.0,
            0.0,
            1.0,
            1.0,
            0.0,
            WHITE,
        );
        assert_eq!(canvas.pixel(0, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn upscale_letterboxes_and_centers() {
        let mut canvas = Canvas::new(2, 2);
        canvas.fill_rect(0.0, 0.0, 1.0, 1.0, Color::from_gm(0x0000FF));
        let scaled = canvas.upscaled(6, 4);
        // 2x scale leaves a one pixel black border left and right.
        assert_eq!(scaled.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(scaled.pixel(1, 0), [255, 0, 0, 255]);
        assert_eq!(scaled.pixel(4, 3), [255, 0, 0, 255]);
        assert_eq!(scaled.pixel(5, 3), [0, 0, 0, 255]);
    }

    #[test]
    fn negative_scale_mirrors() {
        let mut canvas = Canvas::new(4, 4);
        // Pivot at frame center; x flip swaps left and right columns.
        canvas.draw_frame(
            &checker_page(),
            &full_region(),
            2.0,
            2.0,
            1.0,
            1.0,
            -1.0,
            1.0,
            0.0,
            WHITE,
        );
        assert_eq!(canvas.pixel(1, 1), [0, 255, 0, 255]);
        assert_eq!(canvas.pixel(2, 1), [255, 0, 0, 255]);
    }
}
