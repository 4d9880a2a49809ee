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
use crate::canvas::{Canvas, Color};
use gamedata::{Font, TexRegion, TexturePage};

/// Horizontal and vertical anchoring, in the source engine's constant
/// order: 0 = left/top, 1 = center/middle, 2 = right/bottom.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Align {
    Start,
    Center,
    End,
}

impl Align {
    pub fn from_i32(v: i32) -> Self {
        match v {
            1 => Align::Center,
            2 => Align::End,
            _ => Align::Start,
        }
    }

    fn offset(self, extent: f64) -> f64 {
        match self {
            Align::Start => 0.0,
            Align::Center => -extent / 2.0,
            Align::End => -extent,
        }
    }
}

/// Vertical distance between line starts: the tallest glyph the font
/// carries, or the em size for empty glyph tables.
pub fn line_height(font: &Font) -> f64 {
    font.glyphs
        .values()
        .map(|g| u32::from(g.height))
        .max()
        .unwrap_or(font.em_size)
        .max(1) as f64
}

fn line_width(font: &Font, line: &str) -> f64 {
    line.chars()
        .filter_map(|c| font.glyph(c))
        .map(|g| f64::from(g.shift))
        .sum()
}

/// Measured extent of a laid out string. Lines split only on explicit
/// newlines; there is no automatic wrapping.
pub fn measure(font: &Font, text: &str) -> (f64, f64) {
    let mut width = 0f64;
    let mut lines = 0usize;
    for line in text.split('\n') {
        width = width.max(line_width(font, line));
        lines += 1;
    }
    (width, lines as f64 * line_height(font))
}

/// Emit one glyph quad per character. The anchor point shifts by the
/// measured extent before emission according to the alignment pair.
#[allow(clippy::too_many_arguments)]
pub fn draw_string(
    canvas: &mut Canvas,
    page: &TexturePage,
    region: &TexRegion,
    font: &Font,
    x: f64,
    y: f64,
    text: &str,
    halign: Align,
    valign: Align,
    color: Color,
) {
    let (_, total_h) = measure(font, text);
    let mut pen_y = y + valign.offset(total_h);
    for line in text.split('\n') {
        let mut pen_x = x + halign.offset(line_width(font, line));
        for c in line.chars() {
            if let Some(glyph) = font.glyph(c) {
                canvas.blit_rect(
                    page,
                    i64::from(region.src_x) + i64::from(glyph.x),
                    i64::from(region.src_y) + i64::from(glyph.y),
                    i64::from(glyph.width),
                    i64::from(glyph.height),
                    pen_x + f64::from(glyph.offset),
                    pen_y,
                    1.0,
                    1.0,
                    color,
                );
                pen_x += f64::from(glyph.shift);
            }
        }
        pen_y += line_height(font);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamedata::Glyph;
    use std::collections::HashMap;

    fn test_font() -> Font {
        let mut glyphs = HashMap::new();
        glyphs.insert(
            'A' as u16,
            Glyph {
                x: 0,
                y: 0,
                width: 3,
                height: 5,
                shift: 4,
                offset: 0,
            },
        );
        glyphs.insert(
            'B' as u16,
            Glyph {
                x: 4,
                y: 0,
                width: 3,
                height: 4,
                shift: 5,
                offset: 1,
            },
        );
        Font {
            name: 0,
            display_name: 0,
            em_size: 12,
            bold: false,
            italic: false,
            range_start: 32,
            range_end: 127,
            region: 0,
            scale_x: 1.0,
            scale_y: 1.0,
            glyphs,
        }
    }

    #[test]
    fn it_measures_lines_and_newlines() {
        let font = test_font();
        let (w, h) = measure(&font, "AB");
        assert_eq!(w, 9.0);
        assert_eq!(h, 5.0);
        let (w, h) = measure(&font, "A\nAB");
        assert_eq!(w, 9.0);
        assert_eq!(h, 10.0);
    }

    #[test]
    fn alignment_shifts_the_anchor() {
        assert_eq!(Align::Start.offset(10.0), 0.0);
        assert_eq!(Align::Center.offset(10.0), -5.0);
        assert_eq!(Align::End.offset(10.0), -10.0);
        assert_eq!(Align::from_i32(1), Align::Center);
        assert_eq!(Align::from_i32(7), Align::Start);
    }

    #[test]
    fn it_renders_glyph_quads() {
        let mut page_rgba = vec![0u8; 8 * 8 * 4];
        // Solid white 3x5 block where glyph A samples from.
        for y in 0..5 {
            for x in 0..3 {
                let at = (y * 8 + x) * 4;
                page_rgba[at..at + 4].copy_from_slice(&[255, 255, 255, 255]);
            }
        }
        let page = TexturePage {
            width: 8,
            height: 8,
            rgba: page_rgba,
        };
        let region = TexRegion {
            src_x: 0,
            src_y: 0,
            src_w: 8,
            src_h: 8,
            target_x: 0,
            target_y: 0,
            target_w: 8,
            target_h: 8,
            dest_w: 8,
            dest_h: 8,
            page: 0,
        };
        let mut canvas = Canvas::new(16, 16);
        draw_string(
            &mut canvas,
            &page,
            &region,
            &test_font(),
            2.0,
            2.0,
            "A",
            Align::Start,
            Align::Start,
            crate::canvas::WHITE,
        );
        assert_eq!(canvas.pixel(2, 2), [255, 255, 255, 255]);
        assert_eq!(canvas.pixel(4, 6), [255, 255, 255, 255]);
        assert_eq!(canvas.pixel(6, 2), [0, 0, 0, 255]);
    }
}
