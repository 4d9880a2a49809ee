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
use bitflags::bitflags;
use form::Chunk;

bitflags! {
    pub struct Gen8Flags: u32 {
        const FULLSCREEN        = 0x0001;
        const SYNC_VERTEX_1     = 0x0002;
        const SYNC_VERTEX_2     = 0x0004;
        const INTERPOLATE       = 0x0008;
        const SHOW_CURSOR       = 0x0020;
        const SIZEABLE          = 0x0040;
        const SCREEN_KEY        = 0x0080;
        const SYNC_VERTEX_3     = 0x0100;
        const BORDERLESS        = 0x4000;
    }
}

/// General header chunk. Carries the bytecode version gate, the window
/// geometry, and the room play order; the first room order entry is the
/// room the game boots into.
#[derive(Debug)]
pub struct Gen8 {
    pub debug: bool,
    pub bytecode_version: u8,
    pub filename: u32,
    pub config: u32,
    pub game_id: u32,
    pub name: u32,
    pub version: (u32, u32, u32, u32),
    pub default_window_width: u32,
    pub default_window_height: u32,
    pub flags: Gen8Flags,
    pub timestamp: u64,
    pub display_name: u32,
    pub steam_app_id: i32,
    pub room_order: Vec<u32>,
}

impl Gen8 {
    pub fn from_chunk(chunk: &Chunk, strings: &StringTable) -> Result<Self> {
        let mut r = chunk.reader();
        let debug = r.read_u8()? != 0;
        let bytecode_version = r.read_u8()?;
        let _unknown = r.read_u16()?;
        let filename = strings.resolve(r.read_u32()?)?;
        let config = strings.resolve(r.read_u32()?)?;
        let _last_obj = r.read_u32()?;
        let _last_tile = r.read_u32()?;
        let game_id = r.read_u32()?;
        let _guid = r.read_bytes(16)?;
        let name = strings.resolve(r.read_u32()?)?;
        let major = r.read_u32()?;
        let minor = r.read_u32()?;
        let release = r.read_u32()?;
        let build = r.read_u32()?;
        let default_window_width = r.read_u32()?;
        let default_window_height = r.read_u32()?;
        let flags = Gen8Flags::from_bits_truncate(r.read_u32()?);
        let _license_crc = r.read_u32()?;
        let _license_md5 = r.read_bytes(16)?;
        let timestamp = r.read_u64()?;
        let display_name = strings.resolve(r.read_u32()?)?;
        let _active_targets = r.read_u64()?;
        let _function_classifications = r.read_u64()?;
        let steam_app_id = r.read_i32()?;
        let _debugger_port = r.read_u32()?;
        let room_count = r.read_u32()? as usize;
        let room_order = r.read_u32_table(room_count)?;

        Ok(Self {
            debug,
            bytecode_version,
            filename,
            config,
            game_id,
            name,
            version: (major, minor, release, build),
            default_window_width,
            default_window_height,
            flags,
            timestamp,
            display_name,
            steam_app_id,
            room_order,
        })
    }
}
