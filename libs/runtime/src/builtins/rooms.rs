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
use super::{int, reg, BuiltinFn};
use crate::World;
use gml::Value;
use std::collections::HashMap;

pub fn register(map: &mut HashMap<&'static str, BuiltinFn>) {
    reg(map, "room_goto", |w, _, _, a| {
        let target = int(a, 0)?;
        if target >= 0 && (target as usize) < w.assets.rooms.len() {
            w.room.pending = Some(target as u32);
        } else {
            w.warn_limited("room", "goto-bad-index", "room_goto to unknown room");
        }
        Ok(Value::Real(0.0))
    });
    reg(map, "room_goto_next", |w, _, _, _| {
        if let Some(next) = neighbor_in_order(w, 1) {
            w.room.pending = Some(next);
        }
        Ok(Value::Real(0.0))
    });
    reg(map, "room_goto_previous", |w, _, _, _| {
        if let Some(prev) = neighbor_in_order(w, -1) {
            w.room.pending = Some(prev);
        }
        Ok(Value::Real(0.0))
    });
    reg(map, "room_restart", |w, _, _, _| {
        if w.room.index >= 0 {
            w.room.pending = Some(w.room.index as u32);
        }
        Ok(Value::Real(0.0))
    });
    reg(map, "room_next", |w, _, _, _| {
        Ok(Value::Real(neighbor_in_order(w, 1).map(f64::from).unwrap_or(-1.0)))
    });
    reg(map, "room_previous", |w, _, _, _| {
        Ok(Value::Real(neighbor_in_order(w, -1).map(f64::from).unwrap_or(-1.0)))
    });
    reg(map, "room_get_name", |w, _, _, a| {
        let index = int(a, 0)?;
        if index >= 0 && (index as usize) < w.assets.rooms.len() {
            let name = w.assets.string(w.assets.rooms[index as usize].name);
            Ok(Value::string(name))
        } else {
            Ok(Value::string("<undefined>"))
        }
    });
}

/// Rooms advance along the GEN8 play order, not the asset table order.
fn neighbor_in_order(world: &World, step: i64) -> Option<u32> {
    let order = &world.assets.gen8.room_order;
    let here = order
        .iter()
        .position(|&r| i64::from(r) == i64::from(world.room.index))?;
    let target = here as i64 + step;
    if target < 0 || target as usize >= order.len() {
        return None;
    }
    Some(order[target as usize])
}
