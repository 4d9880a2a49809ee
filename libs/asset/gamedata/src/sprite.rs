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

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CollisionKind {
    Precise,
    Rectangle,
    Ellipse,
    Diamond,
}

impl CollisionKind {
    fn from_u32(v: u32) -> Self {
        match v {
            1 => CollisionKind::Rectangle,
            2 => CollisionKind::Ellipse,
            3 => CollisionKind::Diamond,
            _ => CollisionKind::Precise,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Sprite {
    pub name: u32,
    pub width: u32,
    pub height: u32,
    pub margin_left: i32,
    pub margin_right: i32,
    pub margin_bottom: i32,
    pub margin_top: i32,
    pub transparent: bool,
    pub bbox_mode: u32,
    pub collision_kind: CollisionKind,
    pub origin_x: i32,
    pub origin_y: i32,
    /// TPAG indices, one per animation frame, in play order.
    pub frames: Vec<u32>,
    /// Per-pixel masks are present in the container but collision in this
    /// runtime is bbox only; we record whether any were shipped.
    pub has_masks: bool,
}

impl Sprite {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

pub fn parse_sprites(
    chunk: &Chunk,
    strings: &StringTable,
    tpag_by_offset: &HashMap<u32, u32>,
) -> Result<Vec<Sprite>> {
    let mut r = chunk.reader();
    let count = r.read_u32()? as usize;
    let offsets = r.read_u32_table(count)?;

    let mut sprites = Vec::with_capacity(count);
    for &offset in &offsets {
        r.seek_absolute(offset as usize)?;
        let name = strings.resolve(r.read_u32()?)?;
        let width = r.read_u32()?;
        let height = r.read_u32()?;
        let margin_left = r.read_i32()?;
        let margin_right = r.read_i32()?;
        let margin_bottom = r.read_i32()?;
        let margin_top = r.read_i32()?;
        let transparent = r.read_u32()? != 0;
        let _smooth = r.read_u32()?;
        let _preload = r.read_u32()?;
        let bbox_mode = r.read_u32()?;
        let collision_kind = CollisionKind::from_u32(r.read_u32()?);
        let origin_x = r.read_i32()?;
        let origin_y = r.read_i32()?;

        let frame_count = r.read_u32()? as usize;
        let frame_offsets = r.read_u32_table(frame_count)?;
        let mut frames = Vec::with_capacity(frame_count);
        for &fo in &frame_offsets {
            let index =
                *tpag_by_offset
                    .get(&fo)
                    .ok_or_else(|| AssetRefError::DanglingRegion {
                        owner: strings.get(name).to_owned(),
                        offset: fo,
                    })?;
            frames.push(index);
        }
        let mask_count = r.read_u32()?;

        sprites.push(Sprite {
            name,
            width,
            height,
            margin_left,
            margin_right,
            margin_bottom,
            margin_top,
            transparent,
            bbox_mode,
            collision_kind,
            origin_x,
            origin_y,
            frames,
            has_masks: mask_count > 0,
        });
    }
    Ok(sprites)
}
