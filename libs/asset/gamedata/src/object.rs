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
use log::trace;
use std::collections::HashMap;

/// An object definition: sprite binding, flags, parent link, and the event
/// table. Event code is attached through drag-and-drop "actions" in the
/// container; compiled titles ship exactly one code action per event, so
/// the table maps straight to a CODE index.
#[derive(Clone, Debug)]
pub struct Object {
    pub name: u32,
    pub sprite_index: i32,
    pub visible: bool,
    pub solid: bool,
    pub depth: i32,
    pub persistent: bool,
    /// Parent object index; -1 means no parent.
    pub parent: i32,
    pub mask: i32,
    pub events: HashMap<(u32, u32), u32>,
}

impl Object {
    pub fn event(&self, kind: u32, subtype: u32) -> Option<u32> {
        self.events.get(&(kind, subtype)).copied()
    }
}

pub fn parse_objects(chunk: &Chunk, strings: &StringTable) -> Result<Vec<Object>> {
    let mut r = chunk.reader();
    let count = r.read_u32()? as usize;
    let offsets = r.read_u32_table(count)?;

    let mut objects = Vec::with_capacity(count);
    for &offset in &offsets {
        r.seek_absolute(offset as usize)?;
        let name = strings.resolve(r.read_u32()?)?;
        let sprite_index = r.read_i32()?;
        let visible = r.read_u32()? != 0;
        let solid = r.read_u32()? != 0;
        let depth = r.read_i32()?;
        let persistent = r.read_u32()? != 0;
        let parent = r.read_i32()?;
        let mask = r.read_i32()?;

        // Physics block: unused by this runtime but part of the framing.
        let _uses_physics = r.read_u32()?;
        let _is_sensor = r.read_u32()?;
        let _collision_shape = r.read_u32()?;
        let _density = r.read_f32()?;
        let _restitution = r.read_f32()?;
        let _group = r.read_u32()?;
        let _linear_damping = r.read_f32()?;
        let _angular_damping = r.read_f32()?;
        let _physics_friction = r.read_f32()?;
        let _awake = r.read_u32()?;
        let _kinematic = r.read_u32()?;

        let kind_count = r.read_u32()? as usize;
        let kind_offsets = r.read_u32_table(kind_count)?;

        let mut events = HashMap::new();
        for (kind, &ko) in kind_offsets.iter().enumerate() {
            r.seek_absolute(ko as usize)?;
            let event_count = r.read_u32()? as usize;
            let event_offsets = r.read_u32_table(event_count)?;
            for &eo in &event_offsets {
                r.seek_absolute(eo as usize)?;
                let subtype = r.read_u32()?;
                let action_count = r.read_u32()? as usize;
                let action_offsets = r.read_u32_table(action_count)?;
                for &ao in &action_offsets {
                    r.seek_absolute(ao as usize)?;
                    let _lib_id = r.read_u32()?;
                    let _id = r.read_u32()?;
                    let _action_kind = r.read_u32()?;
                    let _use_relative = r.read_u32()?;
                    let _is_question = r.read_u32()?;
                    let _use_apply_to = r.read_u32()?;
                    let _exe_type = r.read_u32()?;
                    let _action_name = r.read_u32()?;
                    let code_id = r.read_i32()?;
                    let _argument_count = r.read_u32()?;
                    let _who = r.read_i32()?;
                    let _relative = r.read_u32()?;
                    let _is_not = r.read_u32()?;
                    let _unknown = r.read_u32()?;
                    if code_id >= 0 {
                        trace!(
                            "{}: event ({}, {}) -> code {}",
                            strings.get(name),
                            kind,
                            subtype,
                            code_id
                        );
                        events.insert((kind as u32, subtype), code_id as u32);
                        break;
                    }
                }
            }
        }

        objects.push(Object {
            name,
            sprite_index,
            visible,
            solid,
            depth,
            persistent,
            parent,
            mask,
            events,
        });
    }
    Ok(objects)
}
