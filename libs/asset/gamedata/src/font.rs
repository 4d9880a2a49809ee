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
use crate::{strings::StringTable, AssetRefError};
use anyhow::Result;
use form::Chunk;
use std::collections::HashMap;

/// One glyph cell. Source coordinates are relative to the font's TPAG
/// region; `shift` is the horizontal pen advance and `offset` the extra
/// left-side bearing applied before the quad is emitted.
#[derive(Clone, Copy, Debug)]
pub struct Glyph {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub shift: i16,
    pub offset: i16,
}

#[derive(Clone, Debug)]
pub struct Font {
    pub name: u32,
    pub display_name: u32,
    pub em_size: u32,
    pub bold: bool,
    pub italic: bool,
    pub range_start: u16,
    pub range_end: u32,
    pub region: u32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub glyphs: HashMap<u16, Glyph>,
}

impl Font {
    pub fn glyph(&self, ch: char) -> Option<&Glyph> {
        self.glyphs.get(&(ch as u32 as u16))
    }
}

pub fn parse_fonts(
    chunk: &Chunk,
    strings: &StringTable,
    tpag_by_offset: &HashMap<u32, u32>,
) -> Result<Vec<Font>> {
    let mut r = chunk.reader();
    let count = r.read_u32()? as usize;
    let offsets = r.read_u32_table(count)?;

    let mut fonts = Vec::with_capacity(count);
    for &offset in &offsets {
        r.seek_absolute(offset as usize)?;
        let name = strings.resolve(r.read_u32()?)?;
        let display_name = strings.resolve(r.read_u32()?)?;
        let em_size = r.read_u32()?;
        let bold = r.read_u32()? != 0;
        let italic = r.read_u32()? != 0;
        let range_start = r.read_u16()?;
        let _charset = r.read_u8()?;
        let _antialias = r.read_u8()?;
        let range_end = r.read_u32()?;
        let region_offset = r.read_u32()?;
        let region =
            *tpag_by_offset
                .get(&region_offset)
                .ok_or_else(|| AssetRefError::DanglingRegion {
                    owner: strings.get(name).to_owned(),
                    offset: region_offset,
                })?;
        let scale_x = r.read_f32()?;
        let scale_y = r.read_f32()?;

        let glyph_count = r.read_u32()? as usize;
        let glyph_offsets = r.read_u32_table(glyph_count)?;
        let mut glyphs = HashMap::with_capacity(glyph_count);
        for &go in &glyph_offsets {
            r.seek_absolute(go as usize)?;
            let character = r.read_u16()?;
            let glyph = Glyph {
                x: r.read_u16()?,
                y: r.read_u16()?,
                width: r.read_u16()?,
                height: r.read_u16()?,
                shift: r.read_i16()?,
                offset: r.read_i16()?,
            };
            let kerning_count = r.read_u16()? as usize;
            r.read_bytes(kerning_count * 4)?;
            glyphs.insert(character, glyph);
        }

        fonts.push(Font {
            name,
            display_name,
            em_size,
            bold,
            italic,
            range_start,
            range_end,
            region,
            scale_x,
            scale_y,
            glyphs,
        });
    }
    Ok(fonts)
}
