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
use crate::strings::StringTable;
use anyhow::Result;
use form::Chunk;

#[derive(Clone, Copy, Debug)]
pub struct RoomBackground {
    pub enabled: bool,
    pub foreground: bool,
    /// BGND index; -1 when the layer is empty.
    pub background: i32,
    pub x: i32,
    pub y: i32,
    pub tile_h: bool,
    pub tile_v: bool,
    pub speed_x: i32,
    pub speed_y: i32,
    pub stretch: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct View {
    pub enabled: bool,
    pub view_x: i32,
    pub view_y: i32,
    pub view_w: i32,
    pub view_h: i32,
    pub port_x: i32,
    pub port_y: i32,
    pub port_w: i32,
    pub port_h: i32,
    pub border_x: u32,
    pub border_y: u32,
    pub speed_x: i32,
    pub speed_y: i32,
    pub follow_object: i32,
}

#[derive(Clone, Copy, Debug)]
pub struct RoomInstance {
    pub x: i32,
    pub y: i32,
    pub object_index: i32,
    pub instance_id: u32,
    pub creation_code: i32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub color: u32,
    pub rotation: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct RoomTile {
    pub x: i32,
    pub y: i32,
    pub background: i32,
    pub source_x: u32,
    pub source_y: u32,
    pub width: u32,
    pub height: u32,
    pub depth: i32,
    pub instance_id: u32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub color: u32,
}

#[derive(Clone, Debug)]
pub struct Room {
    pub name: u32,
    pub caption: u32,
    pub width: u32,
    pub height: u32,
    pub speed: u32,
    pub persistent: bool,
    pub background_color: u32,
    pub draw_background_color: bool,
    pub creation_code: i32,
    pub backgrounds: Vec<RoomBackground>,
    pub views: Vec<View>,
    pub instances: Vec<RoomInstance>,
    pub tiles: Vec<RoomTile>,
}

pub fn parse_rooms(chunk: &Chunk, strings: &StringTable) -> Result<Vec<Room>> {
    let mut r = chunk.reader();
    let count = r.read_u32()? as usize;
    let offsets = r.read_u32_table(count)?;

    let mut rooms = Vec::with_capacity(count);
    for &offset in &offsets {
        r.seek_absolute(offset as usize)?;
        let name = strings.resolve(r.read_u32()?)?;
        let caption = strings.resolve(r.read_u32()?)?;
        let width = r.read_u32()?;
        let height = r.read_u32()?;
        let speed = r.read_u32()?;
        let persistent = r.read_u32()? != 0;
        let background_color = r.read_u32()?;
        let draw_background_color = r.read_u32()? != 0;
        let creation_code = r.read_i32()?;
        let _flags = r.read_u32()?;
        let backgrounds_at = r.read_u32()? as usize;
        let views_at = r.read_u32()? as usize;
        let instances_at = r.read_u32()? as usize;
        let tiles_at = r.read_u32()? as usize;

        r.seek_absolute(backgrounds_at)?;
        let bg_count = r.read_u32()? as usize;
        let bg_offsets = r.read_u32_table(bg_count)?;
        let mut backgrounds = Vec::with_capacity(bg_count);
        for &bo in &bg_offsets {
            r.seek_absolute(bo as usize)?;
            backgrounds.push(RoomBackground {
                enabled: r.read_u32()? != 0,
                foreground: r.read_u32()? != 0,
                background: r.read_i32()?,
                x: r.read_i32()?,
                y: r.read_i32()?,
                tile_h: r.read_u32()? != 0,
                tile_v: r.read_u32()? != 0,
                speed_x: r.read_i32()?,
                speed_y: r.read_i32()?,
                stretch: r.read_u32()? != 0,
            });
        }

        r.seek_absolute(views_at)?;
        let view_count = r.read_u32()? as usize;
        let view_offsets = r.read_u32_table(view_count)?;
        let mut views = Vec::with_capacity(view_count);
        for &vo in &view_offsets {
            r.seek_absolute(vo as usize)?;
            views.push(View {
                enabled: r.read_u32()? != 0,
                view_x: r.read_i32()?,
                view_y: r.read_i32()?,
                view_w: r.read_i32()?,
                view_h: r.read_i32()?,
                port_x: r.read_i32()?,
                port_y: r.read_i32()?,
                port_w: r.read_i32()?,
                port_h: r.read_i32()?,
                border_x: r.read_u32()?,
                border_y: r.read_u32()?,
                speed_x: r.read_i32()?,
                speed_y: r.read_i32()?,
                follow_object: r.read_i32()?,
            });
        }

        r.seek_absolute(instances_at)?;
        let inst_count = r.read_u32()? as usize;
        let inst_offsets = r.read_u32_table(inst_count)?;
        let mut instances = Vec::with_capacity(inst_count);
        for &io in &inst_offsets {
            r.seek_absolute(io as usize)?;
            instances.push(RoomInstance {
                x: r.read_i32()?,
                y: r.read_i32()?,
                object_index: r.read_i32()?,
                instance_id: r.read_u32()?,
                creation_code: r.read_i32()?,
                scale_x: r.read_f32()?,
                scale_y: r.read_f32()?,
                color: r.read_u32()?,
                rotation: r.read_f32()?,
            });
        }

        r.seek_absolute(tiles_at)?;
        let tile_count = r.read_u32()? as usize;
        let tile_offsets = r.read_u32_table(tile_count)?;
        let mut tiles = Vec::with_capacity(tile_count);
        for &to in &tile_offsets {
            r.seek_absolute(to as usize)?;
            tiles.push(RoomTile {
                x: r.read_i32()?,
                y: r.read_i32()?,
                background: r.read_i32()?,
                source_x: r.read_u32()?,
                source_y: r.read_u32()?,
                width: r.read_u32()?,
                height: r.read_u32()?,
                depth: r.read_i32()?,
                instance_id: r.read_u32()?,
                scale_x: r.read_f32()?,
                scale_y: r.read_f32()?,
                color: r.read_u32()?,
            });
        }

        rooms.push(Room {
            name,
            caption,
            width,
            height,
            speed,
            persistent,
            background_color,
            draw_background_color,
            creation_code,
            backgrounds,
            views,
            instances,
            tiles,
        });
    }
    Ok(rooms)
}
