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

//! Test support: compose a synthetic container in memory and load it back
//! through the normal decoder. Shipped game data cannot be redistributed,
//! so the test suites of the runtime crates build their fixtures here; the
//! writer doubles as a round-trip check on the chunk framing.

use crate::GameData;
use anyhow::Result;

/// Variable scope codes as the toolchain stores them.
pub const SCOPE_SELF: i32 = -1;
pub const SCOPE_GLOBAL: i32 = -5;
pub const SCOPE_BUILTIN: i32 = -6;
pub const SCOPE_LOCAL: i32 = -7;
pub const SCOPE_ARGUMENT: i32 = -15;

#[derive(Clone)]
struct ObjectSpec {
    name: u32,
    sprite: i32,
    parent: i32,
    visible: bool,
    solid: bool,
    persistent: bool,
    depth: i32,
    events: Vec<(u32, u32, u32)>,
}

#[derive(Clone)]
struct SpriteSpec {
    name: u32,
    width: u32,
    height: u32,
    origin_x: i32,
    origin_y: i32,
    frames: u32,
}

#[derive(Clone)]
struct RoomSpec {
    name: u32,
    width: u32,
    height: u32,
    speed: u32,
    instances: Vec<(u32, i32, i32)>,
    creation_code: i32,
}

#[derive(Clone)]
struct CodeSpec {
    name: u32,
    bytes: Vec<u8>,
    locals: u16,
    args: u16,
}

/// Builds a loadable container. Names are interned up front; variable and
/// function references in assembled code carry their final table index, so
/// the link pass (driven by occurrence counts of zero) leaves them alone.
pub struct GameBuilder {
    strings: Vec<String>,
    sprites: Vec<SpriteSpec>,
    objects: Vec<ObjectSpec>,
    rooms: Vec<RoomSpec>,
    code: Vec<CodeSpec>,
    variables: Vec<(u32, i32, i32)>,
    functions: Vec<u32>,
    scripts: Vec<(u32, i32)>,
}

impl Default for GameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GameBuilder {
    pub fn new() -> Self {
        Self {
            strings: vec![String::new(), "game".to_owned()],
            sprites: Vec::new(),
            objects: Vec::new(),
            rooms: Vec::new(),
            code: Vec::new(),
            variables: Vec::new(),
            functions: Vec::new(),
            scripts: Vec::new(),
        }
    }

    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(i) = self.strings.iter().position(|x| x == s) {
            return i as u32;
        }
        self.strings.push(s.to_owned());
        self.strings.len() as u32 - 1
    }

    pub fn sprite(&mut self, name: &str, width: u32, height: u32, ox: i32, oy: i32) -> u32 {
        let name = self.intern(name);
        self.sprites.push(SpriteSpec {
            name,
            width,
            height,
            origin_x: ox,
            origin_y: oy,
            frames: 0,
        });
        self.sprites.len() as u32 - 1
    }

    /// Give a sprite animation frames; they alternate over the two stock
    /// texture regions every container carries.
    pub fn sprite_frames(&mut self, sprite: u32, frames: u32) {
        self.sprites[sprite as usize].frames = frames;
    }

    pub fn object(&mut self, name: &str, sprite: i32, parent: i32) -> u32 {
        let name = self.intern(name);
        self.objects.push(ObjectSpec {
            name,
            sprite,
            parent,
            visible: true,
            solid: false,
            persistent: false,
            depth: 0,
            events: Vec::new(),
        });
        self.objects.len() as u32 - 1
    }

    pub fn persistent_object(&mut self, name: &str, sprite: i32, parent: i32) -> u32 {
        let index = self.object(name, sprite, parent);
        self.objects[index as usize].persistent = true;
        index
    }

    pub fn set_depth(&mut self, object: u32, depth: i32) {
        self.objects[object as usize].depth = depth;
    }

    pub fn event(&mut self, object: u32, kind: u32, subtype: u32, code: u32) {
        self.objects[object as usize].events.push((kind, subtype, code));
    }

    pub fn room(&mut self, name: &str, width: u32, height: u32, speed: u32) -> u32 {
        let name = self.intern(name);
        self.rooms.push(RoomSpec {
            name,
            width,
            height,
            speed,
            instances: Vec::new(),
            creation_code: -1,
        });
        self.rooms.len() as u32 - 1
    }

    pub fn place(&mut self, room: u32, object: u32, x: i32, y: i32) {
        self.rooms[room as usize].instances.push((object, x, y));
    }

    pub fn room_creation_code(&mut self, room: u32, code: u32) {
        self.rooms[room as usize].creation_code = code as i32;
    }

    pub fn code(&mut self, name: &str, asm: &Asm) -> u32 {
        let name = self.intern(name);
        self.code.push(CodeSpec {
            name,
            bytes: asm.bytes.clone(),
            locals: 0,
            args: asm.args,
        });
        self.code.len() as u32 - 1
    }

    /// Declare a variable slot; assembled references carry this index.
    pub fn variable(&mut self, name: &str, scope: i32) -> u32 {
        let name = self.intern(name);
        self.variables.push((name, scope, self.variables.len() as i32));
        self.variables.len() as u32 - 1
    }

    /// Declare an argument slot bound to position `slot`.
    pub fn argument(&mut self, name: &str, slot: i32) -> u32 {
        let name = self.intern(name);
        self.variables.push((name, SCOPE_ARGUMENT, slot));
        self.variables.len() as u32 - 1
    }

    /// Declare a callable name; assembled call sites carry this index.
    pub fn function(&mut self, name: &str) -> u32 {
        let name = self.intern(name);
        self.functions.push(name);
        self.functions.len() as u32 - 1
    }

    pub fn script(&mut self, name: &str, code: u32) -> u32 {
        let name = self.intern(name);
        self.scripts.push((name, code as i32));
        self.scripts.len() as u32 - 1
    }

    pub fn build(mut self) -> Result<GameData> {
        if self.rooms.is_empty() {
            self.room("room_test", 320, 240, 30);
        }
        let bytes = self.serialize();
        GameData::from_bytes(&bytes)
    }

    fn serialize(&self) -> Vec<u8> {
        let mut out: Vec<u8> = b"FORM\x00\x00\x00\x00".to_vec();

        // STRG first so every later chunk can reference character data.
        let mut string_refs = Vec::with_capacity(self.strings.len());
        {
            let base = out.len() as u32 + 8;
            let mut payload = Vec::new();
            payload.extend_from_slice(&(self.strings.len() as u32).to_le_bytes());
            let mut entry_at = base + 4 + 4 * self.strings.len() as u32;
            let mut body = Vec::new();
            for s in &self.strings {
                payload.extend_from_slice(&entry_at.to_le_bytes());
                string_refs.push(entry_at + 4);
                body.extend_from_slice(&(s.len() as u32).to_le_bytes());
                body.extend_from_slice(s.as_bytes());
                body.push(0);
                entry_at += 4 + s.len() as u32 + 1;
            }
            payload.extend_from_slice(&body);
            push_chunk(&mut out, b"STRG", &payload);
        }
        let sref = |i: u32| string_refs[i as usize];

        // GEN8 with bytecode 16 and the room order in declaration order.
        {
            let mut p = Vec::new();
            p.push(0);
            p.push(crate::SUPPORTED_BYTECODE);
            p.extend_from_slice(&0u16.to_le_bytes());
            p.extend_from_slice(&sref(1).to_le_bytes());
            p.extend_from_slice(&sref(1).to_le_bytes());
            p.extend_from_slice(&0u32.to_le_bytes());
            p.extend_from_slice(&0u32.to_le_bytes());
            p.extend_from_slice(&7u32.to_le_bytes());
            p.extend_from_slice(&[0u8; 16]);
            p.extend_from_slice(&sref(1).to_le_bytes());
            for _ in 0..4 {
                p.extend_from_slice(&1u32.to_le_bytes());
            }
            p.extend_from_slice(&640u32.to_le_bytes());
            p.extend_from_slice(&480u32.to_le_bytes());
            p.extend_from_slice(&0u32.to_le_bytes());
            p.extend_from_slice(&0u32.to_le_bytes());
            p.extend_from_slice(&[0u8; 16]);
            p.extend_from_slice(&0u64.to_le_bytes());
            p.extend_from_slice(&sref(1).to_le_bytes());
            p.extend_from_slice(&0u64.to_le_bytes());
            p.extend_from_slice(&0u64.to_le_bytes());
            p.extend_from_slice(&0i32.to_le_bytes());
            p.extend_from_slice(&0u32.to_le_bytes());
            p.extend_from_slice(&(self.rooms.len() as u32).to_le_bytes());
            for i in 0..self.rooms.len() as u32 {
                p.extend_from_slice(&i.to_le_bytes());
            }
            push_chunk(&mut out, b"GEN8", &p);
        }

        // One stock texture page so sprites can carry real frames.
        {
            let base = out.len() as u32 + 8;
            let png = stock_png();
            let mut p = Vec::new();
            p.extend_from_slice(&1u32.to_le_bytes());
            p.extend_from_slice(&(base + 8).to_le_bytes());
            p.extend_from_slice(&0u32.to_le_bytes()); // scaled
            p.extend_from_slice(&(base + 16).to_le_bytes());
            p.extend_from_slice(&png);
            push_chunk(&mut out, b"TXTR", &p);
        }

        // Two regions over that page; sprite frames alternate between them.
        let mut tpag_entries = [0u32; 2];
        {
            let base = out.len() as u32 + 8;
            let mut p = Vec::new();
            p.extend_from_slice(&2u32.to_le_bytes());
            tpag_entries[0] = base + 12;
            tpag_entries[1] = base + 12 + 22;
            p.extend_from_slice(&tpag_entries[0].to_le_bytes());
            p.extend_from_slice(&tpag_entries[1].to_le_bytes());
            for _ in 0..2 {
                for v in [0u16, 0, 2, 2, 0, 0, 2, 2, 2, 2, 0] {
                    p.extend_from_slice(&v.to_le_bytes());
                }
            }
            push_chunk(&mut out, b"TPAG", &p);
        }

        // Sprites with margins spanning the full cell.
        {
            let base = out.len() as u32 + 8;
            let mut entries = Vec::new();
            let table_len = 4 + 4 * self.sprites.len() as u32;
            let mut offsets = Vec::new();
            let mut at = base + table_len;
            for s in &self.sprites {
                let mut e = Vec::new();
                e.extend_from_slice(&sref(s.name).to_le_bytes());
                e.extend_from_slice(&s.width.to_le_bytes());
                e.extend_from_slice(&s.height.to_le_bytes());
                e.extend_from_slice(&0i32.to_le_bytes()); // margin left
                e.extend_from_slice(&(s.width as i32 - 1).to_le_bytes());
                e.extend_from_slice(&(s.height as i32 - 1).to_le_bytes());
                e.extend_from_slice(&0i32.to_le_bytes()); // margin top
                for v in [0u32, 0, 0, 0, 1] {
                    e.extend_from_slice(&v.to_le_bytes());
                }
                e.extend_from_slice(&s.origin_x.to_le_bytes());
                e.extend_from_slice(&s.origin_y.to_le_bytes());
                e.extend_from_slice(&s.frames.to_le_bytes());
                for f in 0..s.frames {
                    e.extend_from_slice(&tpag_entries[(f % 2) as usize].to_le_bytes());
                }
                e.extend_from_slice(&0u32.to_le_bytes()); // masks
                offsets.push(at);
                at += e.len() as u32;
                entries.push(e);
            }
            let mut p = Vec::new();
            p.extend_from_slice(&(self.sprites.len() as u32).to_le_bytes());
            for o in &offsets {
                p.extend_from_slice(&o.to_le_bytes());
            }
            for e in &entries {
                p.extend_from_slice(e);
            }
            push_chunk(&mut out, b"SPRT", &p);
        }

        push_chunk(&mut out, b"BGND", &0u32.to_le_bytes());
        push_chunk(&mut out, b"FONT", &0u32.to_le_bytes());

        // Objects with their event tables.
        {
            let base = out.len() as u32 + 8;
            let table_len = 4 + 4 * self.objects.len() as u32;
            let mut offsets = Vec::new();
            let mut bodies = Vec::new();
            let mut at = base + table_len;
            for o in &self.objects {
                let body = serialize_object(o, at, &string_refs);
                offsets.push(at);
                at += body.len() as u32;
                bodies.push(body);
            }
            let mut p = Vec::new();
            p.extend_from_slice(&(self.objects.len() as u32).to_le_bytes());
            for o in &offsets {
                p.extend_from_slice(&o.to_le_bytes());
            }
            for b in &bodies {
                p.extend_from_slice(b);
            }
            push_chunk(&mut out, b"OBJT", &p);
        }

        // Rooms with placed instances.
        {
            let base = out.len() as u32 + 8;
            let table_len = 4 + 4 * self.rooms.len() as u32;
            let mut offsets = Vec::new();
            let mut bodies = Vec::new();
            let mut at = base + table_len;
            for (i, r) in self.rooms.iter().enumerate() {
                let body = serialize_room(r, at, i as u32, &string_refs);
                offsets.push(at);
                at += body.len() as u32;
                bodies.push(body);
            }
            let mut p = Vec::new();
            p.extend_from_slice(&(self.rooms.len() as u32).to_le_bytes());
            for o in &offsets {
                p.extend_from_slice(&o.to_le_bytes());
            }
            for b in &bodies {
                p.extend_from_slice(b);
            }
            push_chunk(&mut out, b"ROOM", &p);
        }

        push_chunk(&mut out, b"PATH", &0u32.to_le_bytes());

        // CODE: entry headers first, then the shared blob.
        {
            let base = out.len() as u32 + 8;
            let table_len = 4 + 4 * self.code.len() as u32;
            const HEADER: u32 = 20;
            let headers_len = HEADER * self.code.len() as u32;
            let blob_at = table_len + headers_len;
            let mut blob = Vec::new();
            let mut p = Vec::new();
            p.extend_from_slice(&(self.code.len() as u32).to_le_bytes());
            for i in 0..self.code.len() as u32 {
                p.extend_from_slice(&(base + table_len + HEADER * i).to_le_bytes());
            }
            for (i, c) in self.code.iter().enumerate() {
                let span = blob_at + blob.len() as u32;
                let rel_field_at = table_len + HEADER * i as u32 + 12;
                p.extend_from_slice(&sref(c.name).to_le_bytes());
                p.extend_from_slice(&(c.bytes.len() as u32).to_le_bytes());
                p.extend_from_slice(&c.locals.to_le_bytes());
                p.extend_from_slice(&c.args.to_le_bytes());
                p.extend_from_slice(&((span as i32) - (rel_field_at as i32)).to_le_bytes());
                p.extend_from_slice(&0u32.to_le_bytes());
                blob.extend_from_slice(&c.bytes);
            }
            p.extend_from_slice(&blob);
            push_chunk(&mut out, b"CODE", &p);
        }

        // VARI with zero occurrence counts: references were assembled
        // pre-linked.
        {
            let mut p = Vec::new();
            for _ in 0..3 {
                p.extend_from_slice(&0u32.to_le_bytes());
            }
            for (name, scope, var_id) in &self.variables {
                p.extend_from_slice(&sref(*name).to_le_bytes());
                p.extend_from_slice(&scope.to_le_bytes());
                p.extend_from_slice(&var_id.to_le_bytes());
                p.extend_from_slice(&0u32.to_le_bytes());
                p.extend_from_slice(&(-1i32).to_le_bytes());
            }
            push_chunk(&mut out, b"VARI", &p);
        }

        {
            let mut p = Vec::new();
            p.extend_from_slice(&(self.functions.len() as u32).to_le_bytes());
            for name in &self.functions {
                p.extend_from_slice(&sref(*name).to_le_bytes());
                p.extend_from_slice(&0u32.to_le_bytes());
                p.extend_from_slice(&(-1i32).to_le_bytes());
            }
            p.extend_from_slice(&0u32.to_le_bytes());
            push_chunk(&mut out, b"FUNC", &p);
        }

        {
            let base = out.len() as u32 + 8;
            let table_len = 4 + 4 * self.scripts.len() as u32;
            let mut p = Vec::new();
            p.extend_from_slice(&(self.scripts.len() as u32).to_le_bytes());
            for i in 0..self.scripts.len() as u32 {
                p.extend_from_slice(&(base + table_len + 8 * i).to_le_bytes());
            }
            for (name, code) in &self.scripts {
                p.extend_from_slice(&sref(*name).to_le_bytes());
                p.extend_from_slice(&code.to_le_bytes());
            }
            push_chunk(&mut out, b"SCPT", &p);
        }

        let total = (out.len() - 8) as u32;
        out[4..8].copy_from_slice(&total.to_le_bytes());
        out
    }
}

fn push_chunk(out: &mut Vec<u8>, tag: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(tag);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
}

// A 2x2 all-white page.
fn stock_png() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 255, 255, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageOutputFormat::Png)
        .expect("in-memory png encode cannot fail");
    out.into_inner()
}

fn serialize_object(o: &ObjectSpec, base: u32, string_refs: &[u32]) -> Vec<u8> {
    let mut e = Vec::new();
    e.extend_from_slice(&string_refs[o.name as usize].to_le_bytes());
    e.extend_from_slice(&o.sprite.to_le_bytes());
    e.extend_from_slice(&u32::from(o.visible).to_le_bytes());
    e.extend_from_slice(&u32::from(o.solid).to_le_bytes());
    e.extend_from_slice(&o.depth.to_le_bytes());
    e.extend_from_slice(&u32::from(o.persistent).to_le_bytes());
    e.extend_from_slice(&o.parent.to_le_bytes());
    e.extend_from_slice(&(-1i32).to_le_bytes()); // mask
    for _ in 0..3 {
        e.extend_from_slice(&0u32.to_le_bytes()); // physics dwords
    }
    for _ in 0..2 {
        e.extend_from_slice(&0f32.to_bits().to_le_bytes());
    }
    e.extend_from_slice(&0u32.to_le_bytes());
    for _ in 0..3 {
        e.extend_from_slice(&0f32.to_bits().to_le_bytes());
    }
    for _ in 0..2 {
        e.extend_from_slice(&0u32.to_le_bytes());
    }

    // Event table: fourteen kind lists.
    const KINDS: u32 = 14;
    e.extend_from_slice(&KINDS.to_le_bytes());
    let kinds_at = base + e.len() as u32;
    let mut kind_lists: Vec<Vec<(u32, u32)>> = vec![Vec::new(); KINDS as usize];
    for &(kind, subtype, code) in &o.events {
        kind_lists[kind as usize].push((subtype, code));
    }
    // Layout: kind offset table, then per kind an event pointer list, then
    // the events themselves, each followed by one action.
    let mut cursor = kinds_at + 4 * KINDS;
    let mut kind_offsets = Vec::new();
    let mut tails: Vec<u8> = Vec::new();
    let tail_base = {
        // First pass sizes the per kind pointer lists.
        let mut c = cursor;
        for list in &kind_lists {
            c += 4 + 4 * list.len() as u32;
        }
        c
    };
    let mut event_cursor = tail_base;
    let mut lists_bytes = Vec::new();
    for list in &kind_lists {
        kind_offsets.push(cursor);
        lists_bytes.extend_from_slice(&(list.len() as u32).to_le_bytes());
        cursor += 4;
        for _ in list {
            lists_bytes.extend_from_slice(&event_cursor.to_le_bytes());
            cursor += 4;
            event_cursor += EVENT_SIZE;
        }
    }
    for list in &kind_lists {
        for &(subtype, code) in list {
            let event_at = tail_base + tails.len() as u32;
            tails.extend_from_slice(&subtype.to_le_bytes());
            tails.extend_from_slice(&1u32.to_le_bytes());
            tails.extend_from_slice(&(event_at + 12).to_le_bytes());
            // One code action.
            tails.extend_from_slice(&1u32.to_le_bytes()); // lib id
            tails.extend_from_slice(&603u32.to_le_bytes()); // action id
            tails.extend_from_slice(&7u32.to_le_bytes()); // kind: code
            for _ in 0..4 {
                tails.extend_from_slice(&0u32.to_le_bytes());
            }
            tails.extend_from_slice(&string_refs[0].to_le_bytes()); // name
            tails.extend_from_slice(&(code as i32).to_le_bytes());
            tails.extend_from_slice(&1u32.to_le_bytes()); // argc
            tails.extend_from_slice(&(-1i32).to_le_bytes()); // who
            for _ in 0..3 {
                tails.extend_from_slice(&0u32.to_le_bytes());
            }
        }
    }
    for off in kind_offsets {
        e.extend_from_slice(&off.to_le_bytes());
    }
    e.extend_from_slice(&lists_bytes);
    e.extend_from_slice(&tails);
    e
}

// Subtype + action pointer list header + one 14 dword action.
const EVENT_SIZE: u32 = 4 + 8 + 14 * 4;

fn serialize_room(r: &RoomSpec, base: u32, _index: u32, string_refs: &[u32]) -> Vec<u8> {
    let mut e = Vec::new();
    e.extend_from_slice(&string_refs[r.name as usize].to_le_bytes());
    e.extend_from_slice(&string_refs[0].to_le_bytes()); // caption
    e.extend_from_slice(&r.width.to_le_bytes());
    e.extend_from_slice(&r.height.to_le_bytes());
    e.extend_from_slice(&r.speed.to_le_bytes());
    e.extend_from_slice(&0u32.to_le_bytes()); // persistent
    e.extend_from_slice(&0xFF00_0000u32.to_le_bytes()); // black
    e.extend_from_slice(&1u32.to_le_bytes()); // draw bg color
    e.extend_from_slice(&r.creation_code.to_le_bytes());
    e.extend_from_slice(&0u32.to_le_bytes()); // flags
    let lists_at = base + 14 * 4;
    let backgrounds_at = lists_at;
    let views_at = backgrounds_at + 4;
    let instances_at = views_at + 4;
    let tiles_at = instances_at + 4 + 4 * r.instances.len() as u32 + 36 * r.instances.len() as u32;
    e.extend_from_slice(&backgrounds_at.to_le_bytes());
    e.extend_from_slice(&views_at.to_le_bytes());
    e.extend_from_slice(&instances_at.to_le_bytes());
    e.extend_from_slice(&tiles_at.to_le_bytes());
    e.extend_from_slice(&0u32.to_le_bytes()); // backgrounds: none
    e.extend_from_slice(&0u32.to_le_bytes()); // views: none
    e.extend_from_slice(&(r.instances.len() as u32).to_le_bytes());
    let entries_at = instances_at + 4 + 4 * r.instances.len() as u32;
    for i in 0..r.instances.len() as u32 {
        e.extend_from_slice(&(entries_at + 36 * i).to_le_bytes());
    }
    for (i, &(object, x, y)) in r.instances.iter().enumerate() {
        e.extend_from_slice(&x.to_le_bytes());
        e.extend_from_slice(&y.to_le_bytes());
        e.extend_from_slice(&(object as i32).to_le_bytes());
        e.extend_from_slice(&(1_000_000 + i as u32).to_le_bytes());
        e.extend_from_slice(&(-1i32).to_le_bytes()); // creation code
        e.extend_from_slice(&1f32.to_bits().to_le_bytes());
        e.extend_from_slice(&1f32.to_bits().to_le_bytes());
        e.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        e.extend_from_slice(&0f32.to_bits().to_le_bytes());
    }
    e.extend_from_slice(&0u32.to_le_bytes()); // tiles: none
    e
}

/// A tiny assembler producing exactly the encodings the decoder expects.
/// Branch operands are given in instruction words relative to the branch.
#[derive(Clone, Default)]
pub struct Asm {
    bytes: Vec<u8>,
    args: u16,
}

pub const REF_NORMAL: u32 = 0xA0;
pub const REF_STACKTOP: u32 = 0x80;
pub const REF_ARRAY: u32 = 0x00;

impl Asm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_args(args: u16) -> Self {
        Self {
            bytes: Vec::new(),
            args,
        }
    }

    pub fn len_words(&self) -> i32 {
        (self.bytes.len() / 4) as i32
    }

    fn word(&mut self, op: u8, t2: u8, t1: u8, low: u16) -> &mut Self {
        let w = (u32::from(op) << 24) | (u32::from(t2) << 20) | (u32::from(t1) << 16) | u32::from(low);
        self.bytes.extend_from_slice(&w.to_le_bytes());
        self
    }

    fn raw24(&mut self, op: u8, offset_words: i32) -> &mut Self {
        let w = (u32::from(op) << 24) | ((offset_words as u32) & 0x00FF_FFFF);
        self.bytes.extend_from_slice(&w.to_le_bytes());
        self
    }

    pub fn push_i16(&mut self, v: i16) -> &mut Self {
        self.word(0x84, 0xF, 0xF, v as u16)
    }

    pub fn push_d(&mut self, v: f64) -> &mut Self {
        self.word(0xC0, 0x0, 0x0, 0);
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn push_str(&mut self, index: u32) -> &mut Self {
        self.word(0xC0, 0x6, 0x6, 0);
        self.bytes.extend_from_slice(&index.to_le_bytes());
        self
    }

    pub fn push_var(&mut self, scope: i32, index: u32, kind: u32) -> &mut Self {
        self.word(0xC0, 0x5, 0x5, scope as i16 as u16);
        self.bytes
            .extend_from_slice(&((kind << 24) | (index & 0xFF_FFFF)).to_le_bytes());
        self
    }

    pub fn pop_var(&mut self, scope: i32, index: u32, kind: u32) -> &mut Self {
        self.word(0x45, 0x5, 0x5, scope as i16 as u16);
        self.bytes
            .extend_from_slice(&((kind << 24) | (index & 0xFF_FFFF)).to_le_bytes());
        self
    }

    pub fn op(&mut self, opcode: u8) -> &mut Self {
        self.word(opcode, 0x5, 0x5, 0)
    }

    pub fn add(&mut self) -> &mut Self {
        self.op(0x0C)
    }

    pub fn sub(&mut self) -> &mut Self {
        self.op(0x0D)
    }

    pub fn mul(&mut self) -> &mut Self {
        self.op(0x08)
    }

    pub fn div(&mut self) -> &mut Self {
        self.op(0x09)
    }

    /// relation: 1 lt, 2 le, 3 eq, 4 ne, 5 ge, 6 gt.
    pub fn cmp(&mut self, relation: u16) -> &mut Self {
        self.word(0x15, 0x5, 0x5, relation << 8)
    }

    pub fn b(&mut self, offset_words: i32) -> &mut Self {
        self.raw24(0xB6, offset_words)
    }

    pub fn bt(&mut self, offset_words: i32) -> &mut Self {
        self.raw24(0xB7, offset_words)
    }

    pub fn bf(&mut self, offset_words: i32) -> &mut Self {
        self.raw24(0xB8, offset_words)
    }

    pub fn pushenv(&mut self, offset_words: i32) -> &mut Self {
        self.raw24(0xBA, offset_words)
    }

    pub fn popenv(&mut self, offset_words: i32) -> &mut Self {
        self.raw24(0xBB, offset_words)
    }

    pub fn popenv_break(&mut self) -> &mut Self {
        self.raw24(0xBB, 0x00F0_0000u32 as i32)
    }

    pub fn call(&mut self, function: u32, argc: u16) -> &mut Self {
        self.word(0xD9, 0x5, 0x5, argc);
        self.bytes
            .extend_from_slice(&(function & 0xFF_FFFF).to_le_bytes());
        self
    }

    pub fn dup(&mut self, extra: u8) -> &mut Self {
        self.word(0x86, 0x5, 0x5, u16::from(extra))
    }

    pub fn popz(&mut self) -> &mut Self {
        self.word(0x9E, 0x5, 0x5, 0)
    }

    pub fn ret(&mut self) -> &mut Self {
        self.word(0x9C, 0x5, 0x5, 0)
    }

    pub fn exit(&mut self) -> &mut Self {
        self.word(0x9D, 0x5, 0x5, 0)
    }
}

/// The smallest loadable game: one empty room.
pub fn minimal_game() -> GameData {
    GameBuilder::new()
        .build()
        .expect("minimal synthetic container must load")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_output_loads_back() -> Result<()> {
        let mut b = GameBuilder::new();
        let spr = b.sprite("spr_block", 16, 16, 8, 8);
        let obj = b.object("obj_block", spr as i32, -1);
        let room = b.room("room_start", 320, 240, 30);
        b.place(room, obj, 100, 100);
        let mut asm = Asm::new();
        asm.push_i16(5).ret();
        let code = b.code("gml_Script_five", &asm);
        b.script("five", code);
        let game = b.build()?;
        assert_eq!(game.rooms.len(), 1);
        assert_eq!(game.rooms[0].instances.len(), 1);
        assert_eq!(game.objects.len(), 1);
        assert_eq!(game.sprites[spr as usize].origin_x, 8);
        assert_eq!(game.script_by_name("five"), Some(0));
        assert_eq!(game.code.entries.len(), 1);
        assert_eq!(game.code.entries[0].length, 8);
        Ok(())
    }

    #[test]
    fn events_round_trip() -> Result<()> {
        let mut b = GameBuilder::new();
        let obj = b.object("obj_thing", -1, -1);
        let mut asm = Asm::new();
        asm.exit();
        let code = b.code("gml_Object_obj_thing_Create_0", &asm);
        b.event(obj, 0, 0, code);
        let game = b.build()?;
        assert_eq!(game.objects[0].event(0, 0), Some(0));
        assert_eq!(game.objects[0].event(3, 0), None);
        Ok(())
    }
}
