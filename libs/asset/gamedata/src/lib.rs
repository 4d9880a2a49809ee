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
mod background;
mod code;
mod font;
mod gen8;
mod object;
mod path;
mod room;
mod sprite;
mod strings;
pub mod testkit;
mod texture;

pub use crate::{
    background::Background,
    code::{CodeEntry, CodeLocals, CodeTable, FunctionDef, Script, VariableDef},
    font::{Font, Glyph},
    gen8::{Gen8, Gen8Flags},
    object::Object,
    path::{Path, PathPoint},
    room::{Room, RoomBackground, RoomInstance, RoomTile, View},
    sprite::{CollisionKind, Sprite},
    strings::StringTable,
    texture::{TexRegion, TexturePage},
};

use anyhow::Result;
use form::{Form, Tag};
use log::{debug, info};
use std::collections::HashMap;
use thiserror::Error;

/// The bytecode generation this runtime understands.
pub const SUPPORTED_BYTECODE: u8 = 16;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("required chunk {tag} is missing from the container")]
    MissingChunk { tag: Tag },
    #[error("unsupported bytecode version {version} (want {SUPPORTED_BYTECODE})")]
    UnsupportedBytecode { version: u8 },
}

#[derive(Debug, Error)]
pub enum AssetRefError {
    #[error("string reference {offset:08X} does not point into STRG")]
    DanglingString { offset: u32 },
    #[error("{owner}: texture region reference {offset:08X} does not point into TPAG")]
    DanglingRegion { owner: String, offset: u32 },
    #[error("{owner}: {field} index {index} out of range ({limit} entries)")]
    Dangling {
        owner: String,
        field: &'static str,
        index: i64,
        limit: usize,
    },
}

/// The fully resolved asset graph: every table decoded, every
/// cross-reference checked, and variable/function references linked into
/// the code blob. Immutable for the life of the program.
#[derive(Debug)]
pub struct GameData {
    pub gen8: Gen8,
    pub strings: StringTable,
    pub textures: Vec<TexturePage>,
    pub regions: Vec<TexRegion>,
    pub sprites: Vec<Sprite>,
    pub backgrounds: Vec<Background>,
    pub fonts: Vec<Font>,
    pub objects: Vec<Object>,
    pub rooms: Vec<Room>,
    pub paths: Vec<Path>,
    pub code: CodeTable,
    pub variables: Vec<VariableDef>,
    pub functions: Vec<FunctionDef>,
    pub locals: Vec<CodeLocals>,
    pub scripts: Vec<Script>,

    scripts_by_name: HashMap<String, u32>,
    rooms_by_name: HashMap<String, u32>,
    objects_by_name: HashMap<String, u32>,
}

impl GameData {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let form = Form::from_bytes(data)?;
        let required = |name: &[u8; 4]| {
            form.chunk(name)
                .ok_or(LoadError::MissingChunk { tag: Tag(*name) })
        };

        let strings = StringTable::from_chunk(required(b"STRG")?)?;
        let gen8 = Gen8::from_chunk(required(b"GEN8")?, &strings)?;
        if gen8.bytecode_version != SUPPORTED_BYTECODE {
            return Err(LoadError::UnsupportedBytecode {
                version: gen8.bytecode_version,
            }
            .into());
        }
        info!(
            "loading {} ({} strings)",
            strings.get(gen8.name),
            strings.len()
        );

        let textures = texture::parse_texture_pages(required(b"TXTR")?)?;
        let (regions, tpag_by_offset) = texture::parse_regions(required(b"TPAG")?)?;
        let sprites = sprite::parse_sprites(required(b"SPRT")?, &strings, &tpag_by_offset)?;
        let backgrounds =
            background::parse_backgrounds(required(b"BGND")?, &strings, &tpag_by_offset)?;
        let fonts = font::parse_fonts(required(b"FONT")?, &strings, &tpag_by_offset)?;
        let objects = object::parse_objects(required(b"OBJT")?, &strings)?;
        let rooms = room::parse_rooms(required(b"ROOM")?, &strings)?;
        let paths = path::parse_paths(required(b"PATH")?, &strings)?;
        let mut code = CodeTable::from_chunk(required(b"CODE")?, &strings)?;
        let variables = code::parse_variables(required(b"VARI")?, &strings)?;
        let (functions, locals) = code::parse_functions(required(b"FUNC")?, &strings)?;
        let scripts = code::parse_scripts(required(b"SCPT")?, &strings)?;
        code.link(&variables, &functions)?;
        debug!(
            "linked {} variables and {} functions over {} code entries",
            variables.len(),
            functions.len(),
            code.entries.len()
        );

        let scripts_by_name = scripts
            .iter()
            .enumerate()
            .map(|(i, s)| (strings.get(s.name).to_owned(), i as u32))
            .collect();
        let rooms_by_name = rooms
            .iter()
            .enumerate()
            .map(|(i, r)| (strings.get(r.name).to_owned(), i as u32))
            .collect();
        let objects_by_name = objects
            .iter()
            .enumerate()
            .map(|(i, o)| (strings.get(o.name).to_owned(), i as u32))
            .collect();

        let data = Self {
            gen8,
            strings,
            textures,
            regions,
            sprites,
            backgrounds,
            fonts,
            objects,
            rooms,
            paths,
            code,
            variables,
            functions,
            locals,
            scripts,
            scripts_by_name,
            rooms_by_name,
            objects_by_name,
        };
        data.validate()?;
        Ok(data)
    }

    pub fn string(&self, index: u32) -> &str {
        self.strings.get(index)
    }

    pub fn script_by_name(&self, name: &str) -> Option<u32> {
        self.scripts_by_name.get(name).copied()
    }

    pub fn room_by_name(&self, name: &str) -> Option<u32> {
        self.rooms_by_name.get(name).copied()
    }

    pub fn object_by_name(&self, name: &str) -> Option<u32> {
        self.objects_by_name.get(name).copied()
    }

    /// Walk the parent chain from `object_index`, yielding it and every
    /// ancestor in order. Cycles are impossible in toolchain output; the
    /// walk is nonetheless bounded by the table size.
    pub fn object_chain(&self, object_index: u32) -> impl Iterator<Item = u32> + '_ {
        let mut current = object_index as i64;
        let mut steps = self.objects.len() + 1;
        std::iter::from_fn(move || {
            if current < 0 || current as usize >= self.objects.len() || steps == 0 {
                return None;
            }
            steps -= 1;
            let index = current as u32;
            current = i64::from(self.objects[index as usize].parent);
            Some(index)
        })
    }

    /// True when `child` is `ancestor` or inherits from it.
    pub fn object_is_a(&self, child: u32, ancestor: u32) -> bool {
        self.object_chain(child).any(|o| o == ancestor)
    }

    fn validate(&self) -> Result<()> {
        let check = |owner: &str, field: &'static str, index: i64, limit: usize| -> Result<()> {
            if index >= 0 && index as usize >= limit {
                return Err(AssetRefError::Dangling {
                    owner: owner.to_owned(),
                    field,
                    index,
                    limit,
                }
                .into());
            }
            Ok(())
        };

        for region in &self.regions {
            check(
                "TPAG",
                "texture page",
                i64::from(region.page),
                self.textures.len(),
            )?;
        }
        for sprite in &self.sprites {
            let name = self.string(sprite.name);
            for &frame in &sprite.frames {
                check(name, "frame region", i64::from(frame), self.regions.len())?;
            }
        }
        for object in &self.objects {
            let name = self.string(object.name);
            check(
                name,
                "sprite",
                i64::from(object.sprite_index),
                self.sprites.len(),
            )?;
            check(name, "parent", i64::from(object.parent), self.objects.len())?;
            check(name, "mask", i64::from(object.mask), self.sprites.len())?;
            for &code in object.events.values() {
                check(name, "event code", i64::from(code), self.code.entries.len())?;
            }
        }
        for room in &self.rooms {
            let name = self.string(room.name);
            check(
                name,
                "creation code",
                i64::from(room.creation_code),
                self.code.entries.len(),
            )?;
            for inst in &room.instances {
                check(
                    name,
                    "instance object",
                    i64::from(inst.object_index),
                    self.objects.len(),
                )?;
                check(
                    name,
                    "instance creation code",
                    i64::from(inst.creation_code),
                    self.code.entries.len(),
                )?;
            }
            for bg in &room.backgrounds {
                check(
                    name,
                    "background",
                    i64::from(bg.background),
                    self.backgrounds.len(),
                )?;
            }
            for tile in &room.tiles {
                check(
                    name,
                    "tile background",
                    i64::from(tile.background),
                    self.backgrounds.len(),
                )?;
            }
        }
        for script in &self.scripts {
            let name = self.string(script.name);
            check(
                name,
                "script code",
                i64::from(script.code),
                self.code.entries.len(),
            )?;
        }
        for &room in &self.gen8.room_order {
            check("GEN8", "room order", i64::from(room), self.rooms.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // Byte level container builder for tests. Only the framing the loader
    // actually reads is produced; everything else is zero filled.
    struct Builder {
        out: Vec<u8>,
    }

    impl Builder {
        fn new() -> Self {
            Self {
                out: b"FORM\x00\x00\x00\x00".to_vec(),
            }
        }

        fn chunk(&mut self, tag: &[u8; 4], payload: &[u8]) -> &mut Self {
            self.out.extend_from_slice(tag);
            self.out
                .extend_from_slice(&(payload.len() as u32).to_le_bytes());
            self.out.extend_from_slice(payload);
            self
        }

        // Where the next chunk's payload will begin, absolutely.
        fn next_payload_at(&self) -> u32 {
            self.out.len() as u32 + 8
        }

        fn finish(mut self) -> Vec<u8> {
            let total = (self.out.len() - 8) as u32;
            self.out[4..8].copy_from_slice(&total.to_le_bytes());
            self.out
        }
    }

    fn strg_payload(strings: &[&str], base: u32) -> (Vec<u8>, Vec<u32>) {
        let count = strings.len() as u32;
        let mut payload = Vec::new();
        payload.extend_from_slice(&count.to_le_bytes());
        let table_len = 4 + 4 * strings.len() as u32;
        let mut entry_at = base + table_len;
        let mut offsets = Vec::new();
        let mut body = Vec::new();
        for s in strings {
            payload.extend_from_slice(&entry_at.to_le_bytes());
            offsets.push(entry_at + 4);
            body.extend_from_slice(&(s.len() as u32).to_le_bytes());
            body.extend_from_slice(s.as_bytes());
            body.push(0);
            entry_at += 4 + s.len() as u32 + 1;
        }
        payload.extend_from_slice(&body);
        (payload, offsets)
    }

    fn gen8_payload(bytecode: u8, name_ref: u32, room_order: &[u32]) -> Vec<u8> {
        let mut p = Vec::new();
        p.push(0); // debug
        p.push(bytecode);
        p.extend_from_slice(&0u16.to_le_bytes());
        p.extend_from_slice(&name_ref.to_le_bytes()); // filename
        p.extend_from_slice(&name_ref.to_le_bytes()); // config
        p.extend_from_slice(&0u32.to_le_bytes()); // last obj
        p.extend_from_slice(&0u32.to_le_bytes()); // last tile
        p.extend_from_slice(&1234u32.to_le_bytes()); // game id
        p.extend_from_slice(&[0u8; 16]); // guid
        p.extend_from_slice(&name_ref.to_le_bytes()); // name
        for _ in 0..4 {
            p.extend_from_slice(&1u32.to_le_bytes()); // version
        }
        p.extend_from_slice(&640u32.to_le_bytes());
        p.extend_from_slice(&480u32.to_le_bytes());
        p.extend_from_slice(&0u32.to_le_bytes()); // flags
        p.extend_from_slice(&0u32.to_le_bytes()); // license crc
        p.extend_from_slice(&[0u8; 16]); // license md5
        p.extend_from_slice(&0u64.to_le_bytes()); // timestamp
        p.extend_from_slice(&name_ref.to_le_bytes()); // display name
        p.extend_from_slice(&0u64.to_le_bytes()); // active targets
        p.extend_from_slice(&0u64.to_le_bytes()); // classifications
        p.extend_from_slice(&0i32.to_le_bytes()); // steam app id
        p.extend_from_slice(&0u32.to_le_bytes()); // debugger port
        p.extend_from_slice(&(room_order.len() as u32).to_le_bytes());
        for r in room_order {
            p.extend_from_slice(&r.to_le_bytes());
        }
        p
    }

    fn empty_table() -> Vec<u8> {
        0u32.to_le_bytes().to_vec()
    }

    fn vari_payload() -> Vec<u8> {
        let mut p = Vec::new();
        for _ in 0..3 {
            p.extend_from_slice(&0u32.to_le_bytes());
        }
        p
    }

    fn func_payload() -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(&0u32.to_le_bytes()); // functions
        p.extend_from_slice(&0u32.to_le_bytes()); // locals
        p
    }

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn minimal_container(bytecode: u8) -> Vec<u8> {
        let mut b = Builder::new();
        let (strg, refs) = strg_payload(&["game", "room_start", ""], b.next_payload_at());
        b.chunk(b"STRG", &strg);
        b.chunk(b"GEN8", &gen8_payload(bytecode, refs[0], &[0]));

        // One texture page wrapping a tiny png.
        let base = b.next_payload_at();
        let png = tiny_png();
        let mut txtr = Vec::new();
        txtr.extend_from_slice(&1u32.to_le_bytes());
        txtr.extend_from_slice(&(base + 8).to_le_bytes());
        txtr.extend_from_slice(&0u32.to_le_bytes()); // scaled
        txtr.extend_from_slice(&(base + 16).to_le_bytes()); // png at
        txtr.extend_from_slice(&png);
        b.chunk(b"TXTR", &txtr);

        // One region covering the page.
        let base = b.next_payload_at();
        let mut tpag = Vec::new();
        tpag.extend_from_slice(&1u32.to_le_bytes());
        tpag.extend_from_slice(&(base + 8).to_le_bytes());
        for v in [0u16, 0, 2, 2, 0, 0, 2, 2, 2, 2, 0] {
            tpag.extend_from_slice(&v.to_le_bytes());
        }
        b.chunk(b"TPAG", &tpag);

        b.chunk(b"SPRT", &empty_table());
        b.chunk(b"BGND", &empty_table());
        b.chunk(b"FONT", &empty_table());
        b.chunk(b"OBJT", &empty_table());

        // One empty room named room_start.
        let base = b.next_payload_at();
        let mut room = Vec::new();
        room.extend_from_slice(&1u32.to_le_bytes());
        room.extend_from_slice(&(base + 8).to_le_bytes());
        let body_at = base + 8;
        room.extend_from_slice(&refs[1].to_le_bytes()); // name
        room.extend_from_slice(&refs[2].to_le_bytes()); // caption
        room.extend_from_slice(&320u32.to_le_bytes());
        room.extend_from_slice(&240u32.to_le_bytes());
        room.extend_from_slice(&30u32.to_le_bytes());
        room.extend_from_slice(&0u32.to_le_bytes()); // persistent
        room.extend_from_slice(&0xFF00_0000u32.to_le_bytes()); // bg color
        room.extend_from_slice(&1u32.to_le_bytes()); // draw bg color
        room.extend_from_slice(&(-1i32).to_le_bytes()); // creation code
        room.extend_from_slice(&0u32.to_le_bytes()); // flags
        let lists_at = body_at + 14 * 4;
        room.extend_from_slice(&lists_at.to_le_bytes());
        room.extend_from_slice(&(lists_at + 4).to_le_bytes());
        room.extend_from_slice(&(lists_at + 8).to_le_bytes());
        room.extend_from_slice(&(lists_at + 12).to_le_bytes());
        for _ in 0..4 {
            room.extend_from_slice(&0u32.to_le_bytes()); // empty lists
        }
        b.chunk(b"ROOM", &room);

        b.chunk(b"PATH", &empty_table());
        b.chunk(b"CODE", &empty_table());
        b.chunk(b"VARI", &vari_payload());
        b.chunk(b"FUNC", &func_payload());
        b.chunk(b"SCPT", &empty_table());
        b.finish()
    }

    #[test]
    fn it_loads_a_minimal_container() -> Result<()> {
        let _ = env_logger::try_init();
        let data = minimal_container(SUPPORTED_BYTECODE);
        let game = GameData::from_bytes(&data)?;
        assert_eq!(game.string(game.gen8.name), "game");
        assert_eq!(game.rooms.len(), 1);
        assert_eq!(game.room_by_name("room_start"), Some(0));
        assert_eq!(game.gen8.room_order, vec![0]);
        assert_eq!(game.textures.len(), 1);
        assert_eq!(game.textures[0].texel(0, 0), [255, 0, 0, 255]);
        assert_eq!(game.regions.len(), 1);
        assert_eq!(game.regions[0].src_w, 2);
        Ok(())
    }

    #[test]
    fn it_rejects_other_bytecode_versions() {
        let data = minimal_container(15);
        let err = GameData::from_bytes(&data).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::UnsupportedBytecode { version: 15 })
        ));
    }

    #[test]
    fn it_requires_all_core_chunks() {
        let mut b = Builder::new();
        let (strg, _refs) = strg_payload(&["game"], b.next_payload_at());
        b.chunk(b"STRG", &strg);
        let data = b.finish();
        let err = GameData::from_bytes(&data).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::MissingChunk { .. })
        ));
    }

    #[test]
    fn string_offsets_round_trip_names() -> Result<()> {
        let data = minimal_container(SUPPORTED_BYTECODE);
        let game = GameData::from_bytes(&data)?;
        // Every room name resolved through a STRG offset must be present
        // in the string table exactly as stored.
        for room in &game.rooms {
            assert!(game.strings.iter().any(|s| s == game.string(room.name)));
        }
        Ok(())
    }
}
