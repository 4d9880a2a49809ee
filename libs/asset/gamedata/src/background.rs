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

#[derive(Clone, Debug)]
pub struct Background {
    pub name: u32,
    pub transparent: bool,
    /// TPAG region holding the pixels; also the tile source for ROOM tiles.
    pub region: u32,
}

pub fn parse_backgrounds(
    chunk: &Chunk,
    strings: &StringTable,
    tpag_by_offset: &HashMap<u32, u32>,
) -> Result<Vec<Background>> {
    let mut r = chunk.reader();
    let count = r.read_u32()? as usize;
    let offsets = r.read_u32_table(count)?;

    let mut backgrounds = Vec::with_capacity(count);
    for &offset in &offsets {
        r.seek_absolute(offset as usize)?;
        let name = strings.resolve(r.read_u32()?)?;
        let transparent = r.read_u32()? != 0;
        let _smooth = r.read_u32()?;
        let _preload = r.read_u32()?;
        let region_offset = r.read_u32()?;
        let region =
            *tpag_by_offset
                .get(&region_offset)
                .ok_or_else(|| AssetRefError::DanglingRegion {
                    owner: strings.get(name).to_owned(),
                    offset: region_offset,
                })?;
        backgrounds.push(Background {
            name,
            transparent,
            region,
        });
    }
    Ok(backgrounds)
}
