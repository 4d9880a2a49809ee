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
use anyhow::Result;
use form::Chunk;
use log::debug;
use std::collections::HashMap;

/// A decoded TXTR page: PNG payload expanded to straight RGBA8.
#[derive(Debug)]
pub struct TexturePage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TexturePage {
    pub fn from_png(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)?.into_rgba8();
        Ok(Self {
            width: img.width(),
            height: img.height(),
            rgba: img.into_raw(),
        })
    }

    /// Sample one texel; out-of-page coordinates read as transparent black.
    #[inline]
    pub fn texel(&self, x: i64, y: i64) -> [u8; 4] {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return [0, 0, 0, 0];
        }
        let at = ((y as usize * self.width as usize) + x as usize) * 4;
        [
            self.rgba[at],
            self.rgba[at + 1],
            self.rgba[at + 2],
            self.rgba[at + 3],
        ]
    }
}

/// Decode the TXTR chunk. Each entry is a pair of dwords, the second being
/// the absolute offset of the embedded PNG stream; the decoder stops at the
/// image trailer so handing it the rest of the chunk is fine.
pub fn parse_texture_pages(chunk: &Chunk) -> Result<Vec<TexturePage>> {
    let mut r = chunk.reader();
    let count = r.read_u32()? as usize;
    let offsets = r.read_u32_table(count)?;

    let mut pages = Vec::with_capacity(count);
    for &offset in &offsets {
        r.seek_absolute(offset as usize)?;
        let _scaled = r.read_u32()?;
        let png_offset = r.read_u32()? as usize;
        r.seek_absolute(png_offset)?;
        let png = r.read_bytes(r.remaining())?;
        let page = TexturePage::from_png(png)?;
        debug!("decoded texture page {}x{}", page.width, page.height);
        pages.push(page);
    }
    Ok(pages)
}

/// A TPAG region: a sub-rectangle of one texture page, plus the placement
/// information needed to reconstitute the original (possibly cropped)
/// sprite frame.
#[derive(Clone, Copy, Debug)]
pub struct TexRegion {
    pub src_x: u16,
    pub src_y: u16,
    pub src_w: u16,
    pub src_h: u16,
    pub target_x: u16,
    pub target_y: u16,
    pub target_w: u16,
    pub target_h: u16,
    pub dest_w: u16,
    pub dest_h: u16,
    pub page: u16,
}

/// Parse TPAG. Sprites, backgrounds, and fonts reference regions by their
/// absolute entry offset, so the offset-to-index map is returned alongside
/// the table.
pub fn parse_regions(chunk: &Chunk) -> Result<(Vec<TexRegion>, HashMap<u32, u32>)> {
    let mut r = chunk.reader();
    let count = r.read_u32()? as usize;
    let offsets = r.read_u32_table(count)?;

    let mut regions = Vec::with_capacity(count);
    let mut by_offset = HashMap::with_capacity(count);
    for (i, &offset) in offsets.iter().enumerate() {
        r.seek_absolute(offset as usize)?;
        regions.push(TexRegion {
            src_x: r.read_u16()?,
            src_y: r.read_u16()?,
            src_w: r.read_u16()?,
            src_h: r.read_u16()?,
            target_x: r.read_u16()?,
            target_y: r.read_u16()?,
            target_w: r.read_u16()?,
            target_h: r.read_u16()?,
            dest_w: r.read_u16()?,
            dest_h: r.read_u16()?,
            page: r.read_u16()?,
        });
        by_offset.insert(offset, i as u32);
    }
    Ok((regions, by_offset))
}
