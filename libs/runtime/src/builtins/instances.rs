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
use super::{int, real, reg, BuiltinFn};
use crate::{
    instance::BuiltinVar,
    interp::ID_THRESHOLD,
    World,
};
use anyhow::Result;
use gml::{scope, Value};
use std::collections::HashMap;

const NOONE: f64 = -4.0;

pub fn register(map: &mut HashMap<&'static str, BuiltinFn>) {
    reg(map, "instance_create", |w, _, _, a| {
        let (x, y) = (real(a, 0)?, real(a, 1)?);
        let object = int(a, 2)?;
        if object < 0 || object as usize >= w.assets.objects.len() {
            w.warn_limited("instance", "create-bad-object", "instance_create of unknown object");
            return Ok(Value::Real(NOONE));
        }
        let id = w.create_instance(x, y, object as u32, true);
        Ok(Value::Real(f64::from(id)))
    });
    reg(map, "instance_destroy", |w, s, _, a| {
        // Persistent instances survive destruction requests; clearing the
        // persistent flag first is the only way to remove one.
        let targets = if a.is_empty() {
            if s >= 0 {
                vec![s as u32]
            } else {
                Vec::new()
            }
        } else {
            collision_candidates(w, real(a, 0)? as i64, -1)
        };
        for id in targets {
            let persistent = w.instances.get(&id).map(|i| i.persistent).unwrap_or(false);
            if persistent {
                w.warn_limited(
                    "instance",
                    "destroy-persistent",
                    "instance_destroy ignored for a persistent instance",
                );
            } else {
                w.mark_destroyed(id);
            }
        }
        Ok(Value::Real(0.0))
    });
    reg(map, "instance_exists", |w, _, _, a| {
        let target = real(a, 0)? as i64;
        Ok(Value::bool(if target >= ID_THRESHOLD {
            w.instance_alive(target as u32)
        } else if target >= 0 {
            w.first_instance_of(target as u32).is_some()
        } else {
            false
        }))
    });
    reg(map, "instance_number", |w, _, _, a| {
        let object = int(a, 0)?;
        Ok(Value::Real(if object >= 0 {
            w.instances_of(object as u32).len() as f64
        } else {
            0.0
        }))
    });
    reg(map, "instance_find", |w, _, _, a| {
        let object = int(a, 0)?;
        let n = int(a, 1)?.max(0) as usize;
        if object < 0 {
            return Ok(Value::Real(NOONE));
        }
        Ok(Value::Real(
            w.instances_of(object as u32)
                .get(n)
                .map(|&id| f64::from(id))
                .unwrap_or(NOONE),
        ))
    });
    reg(map, "instance_nearest", |w, _, _, a| {
        let (x, y) = (real(a, 0)?, real(a, 1)?);
        let object = int(a, 2)?;
        if object < 0 {
            return Ok(Value::Real(NOONE));
        }
        let mut best = NOONE;
        let mut best_d = f64::INFINITY;
        for id in w.instances_of(object as u32) {
            let inst = &w.instances[&id];
            let d = (inst.x - x).hypot(inst.y - y);
            if d < best_d {
                best_d = d;
                best = f64::from(id);
            }
        }
        Ok(Value::Real(best))
    });

    reg(map, "place_meeting", |w, s, _, a| {
        let (x, y) = (real(a, 0)?, real(a, 1)?);
        let target = real(a, 2)? as i64;
        Ok(Value::bool(
            place_meeting_at(w, s, x, y, target, false).is_some(),
        ))
    });
    reg(map, "instance_place", |w, s, _, a| {
        let (x, y) = (real(a, 0)?, real(a, 1)?);
        let target = real(a, 2)? as i64;
        Ok(Value::Real(
            place_meeting_at(w, s, x, y, target, false)
                .map(f64::from)
                .unwrap_or(NOONE),
        ))
    });
    reg(map, "position_meeting", |w, s, _, a| {
        let (x, y) = (real(a, 0)?, real(a, 1)?);
        let target = real(a, 2)? as i64;
        Ok(Value::bool(position_meeting_at(w, s, x, y, target).is_some()))
    });
    reg(map, "place_free", |w, s, _, a| {
        let (x, y) = (real(a, 0)?, real(a, 1)?);
        let hit = place_meeting_at(w, s, x, y, i64::from(scope::ALL), true);
        Ok(Value::bool(hit.is_none()))
    });
    reg(map, "collision_point", |w, s, _, a| {
        let (x, y) = (real(a, 0)?, real(a, 1)?);
        let target = real(a, 2)? as i64;
        let notme = a.get(4).map(|v| v.to_bool()).transpose()?.unwrap_or(false);
        let me = if notme { s } else { -1 };
        Ok(Value::Real(
            point_hit(w, x, y, target, me).map(f64::from).unwrap_or(NOONE),
        ))
    });
    reg(map, "collision_rectangle", |w, s, _, a| {
        let rect = (real(a, 0)?, real(a, 1)?, real(a, 2)?, real(a, 3)?);
        let target = real(a, 4)? as i64;
        let notme = a.get(6).map(|v| v.to_bool()).transpose()?.unwrap_or(false);
        let me = if notme { s } else { -1 };
        Ok(Value::Real(
            rect_hit(w, rect, target, me).map(f64::from).unwrap_or(NOONE),
        ))
    });

    reg(map, "distance_to_point", |w, s, _, a| {
        let (x, y) = (real(a, 0)?, real(a, 1)?);
        let Some(inst) = instance_of(w, s) else {
            return Ok(Value::Real(0.0));
        };
        Ok(Value::Real(match inst.bbox(&w.assets) {
            Some((l, t, r, b)) => {
                let dx = (l - x).max(x - r).max(0.0);
                let dy = (t - y).max(y - b).max(0.0);
                dx.hypot(dy)
            }
            None => (inst.x - x).hypot(inst.y - y),
        }))
    });
    reg(map, "distance_to_object", |w, s, _, a| {
        let object = int(a, 0)?;
        let Some(inst) = instance_of(w, s) else {
            return Ok(Value::Real(0.0));
        };
        let my = inst
            .bbox(&w.assets)
            .unwrap_or((inst.x, inst.y, inst.x, inst.y));
        let mut best = f64::INFINITY;
        if object >= 0 {
            for id in w.instances_of(object as u32) {
                if i64::from(id) == s {
                    continue;
                }
                let other = &w.instances[&id];
                let ob = other
                    .bbox(&w.assets)
                    .unwrap_or((other.x, other.y, other.x, other.y));
                let dx = (my.0 - ob.2).max(ob.0 - my.2).max(0.0);
                let dy = (my.1 - ob.3).max(ob.1 - my.3).max(0.0);
                best = best.min(dx.hypot(dy));
            }
        }
        Ok(Value::Real(if best.is_finite() { best } else { 0.0 }))
    });
    reg(map, "move_towards_point", |w, s, _, a| {
        let (x, y, sp) = (real(a, 0)?, real(a, 1)?, real(a, 2)?);
        if s >= 0 {
            if let Some(inst) = w.instances.get_mut(&(s as u32)) {
                let dir = (-(y - inst.y)).atan2(x - inst.x).to_degrees().rem_euclid(360.0);
                inst.set_builtin(BuiltinVar::Direction, &Value::Real(dir))?;
                inst.set_builtin(BuiltinVar::Speed, &Value::Real(sp))?;
            }
        }
        Ok(Value::Real(0.0))
    });

    reg(map, "path_start", |w, s, _, a| {
        let path = int(a, 0)?;
        let speed = real(a, 1)?;
        let end_action = int(a, 2)?;
        let absolute = a.get(3).map(|v| v.to_bool()).transpose()?.unwrap_or(true);
        if s >= 0 && path >= 0 && (path as usize) < w.assets.paths.len() {
            let start = w.assets.paths[path as usize].at(0.0);
            if let Some(inst) = w.instances.get_mut(&(s as u32)) {
                inst.path_index = path;
                inst.path_position = 0.0;
                inst.path_speed = speed;
                inst.path_end_action = end_action;
                if absolute {
                    inst.x = start.0;
                    inst.y = start.1;
                }
            }
        }
        Ok(Value::Real(0.0))
    });
    reg(map, "path_end", |w, s, _, _| {
        if s >= 0 {
            if let Some(inst) = w.instances.get_mut(&(s as u32)) {
                inst.path_index = -1;
                inst.path_speed = 0.0;
            }
        }
        Ok(Value::Real(0.0))
    });
}

fn instance_of(world: &World, id: i64) -> Option<&crate::instance::Instance> {
    if id < 0 {
        return None;
    }
    world.instances.get(&(id as u32))
}

/// Expand a target expression (id, object index, or the `all` keyword)
/// into candidate instance ids, excluding the caller where requested.
pub(crate) fn collision_candidates(world: &World, target: i64, exclude: i64) -> Vec<u32> {
    let mut out = if target >= ID_THRESHOLD {
        if world.instance_alive(target as u32) {
            vec![target as u32]
        } else {
            Vec::new()
        }
    } else if target >= 0 {
        world.instances_of(target as u32)
    } else if target == i64::from(scope::ALL) {
        world.live_ids()
    } else {
        Vec::new()
    };
    if exclude >= 0 {
        out.retain(|&id| i64::from(id) != exclude);
    }
    out
}

fn boxes_overlap(a: (f64, f64, f64, f64), b: (f64, f64, f64, f64)) -> bool {
    a.0 <= b.2 && b.0 <= a.2 && a.1 <= b.3 && b.1 <= a.3
}

fn place_meeting_at(
    world: &World,
    self_id: i64,
    x: f64,
    y: f64,
    target: i64,
    solid_only: bool,
) -> Option<u32> {
    let inst = instance_of(world, self_id)?;
    let (l, t, r, b) = inst.bbox(&world.assets)?;
    let moved = (l + x - inst.x, t + y - inst.y, r + x - inst.x, b + y - inst.y);
    for id in collision_candidates(world, target, self_id) {
        let other = &world.instances[&id];
        if solid_only && !other.solid {
            continue;
        }
        if let Some(ob) = other.bbox(&world.assets) {
            if boxes_overlap(moved, ob) {
                return Some(id);
            }
        }
    }
    None
}

// position_meeting includes self when targeting all; exclusion only
// happens through collision_point's notme flag.
fn position_meeting_at(world: &World, _self_id: i64, x: f64, y: f64, target: i64) -> Option<u32> {
    point_hit(world, x, y, target, -1)
}

fn point_hit(world: &World, x: f64, y: f64, target: i64, exclude: i64) -> Option<u32> {
    for id in collision_candidates(world, target, exclude) {
        if let Some((l, t, r, b)) = world.instances[&id].bbox(&world.assets) {
            if x >= l && x <= r && y >= t && y <= b {
                return Some(id);
            }
        }
    }
    None
}

fn rect_hit(
    world: &World,
    rect: (f64, f64, f64, f64),
    target: i64,
    exclude: i64,
) -> Option<u32> {
    let rect = (
        rect.0.min(rect.2),
        rect.1.min(rect.3),
        rect.0.max(rect.2),
        rect.1.max(rect.3),
    );
    for id in collision_candidates(world, target, exclude) {
        if let Some(ob) = world.instances[&id].bbox(&world.assets) {
            if boxes_overlap(rect, ob) {
                return Some(id);
            }
        }
    }
    None
}
