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
use crate::{event, interp, World};
use anyhow::Result;
use log::info;
use render::Canvas;

/// Pseudo self used for room creation code, which runs outside any
/// instance.
const NO_INSTANCE: i64 = -4;

/// Boot into the first room of the play order.
pub fn start_game(world: &mut World) -> Result<()> {
    let first = world.assets.gen8.room_order.first().copied().unwrap_or(0);
    enter_room(world, first, true)
}

/// Apply a latched room change. Only called from the flush boundary; the
/// latch is never honored mid-event.
pub fn perform_pending(world: &mut World) -> Result<bool> {
    let Some(target) = world.room.pending.take() else {
        return Ok(false);
    };

    // Room End fires on non-persistent instances, which are then removed
    // without a Destroy event. Persistent instances carry across.
    let ids = world.live_ids();
    for id in ids {
        let persistent = world
            .instances
            .get(&id)
            .map(|i| i.persistent)
            .unwrap_or(false);
        if !persistent {
            event::fire_event(world, id, event::OTHER, event::OTHER_ROOM_END)?;
        }
    }
    world.instances.retain(|_, inst| inst.persistent && !inst.destroyed);
    let carried: Vec<u32> = world
        .pending_create
        .iter()
        .copied()
        .filter(|id| world.instances.contains_key(id))
        .collect();
    world.pending_create = carried;
    world.pending_destroy.clear();

    enter_room(world, target, false)?;
    Ok(true)
}

/// The transition protocol: set up room state, create static instances
/// with fresh ids, run per-instance creation code then Create in list
/// order, then room creation code, then Room Start on everything.
pub fn enter_room(world: &mut World, index: u32, first_room: bool) -> Result<()> {
    let assets = world.assets.clone();
    let room = &assets.rooms[index as usize];
    info!("entering room {} ({})", assets.string(room.name), index);

    world.room.index = index as i32;
    world.room.speed = room.speed.max(1);
    world.room.width = room.width;
    world.room.height = room.height;
    world.room.caption = assets.string(room.caption).to_owned();
    world.room.background_color = room.background_color;
    world.room.draw_background_color = room.draw_background_color;
    world.room.views = room.views.clone();
    world.room.backgrounds = room.backgrounds.clone();
    world.room.tiles = room.tiles.clone();
    world.room.pending = None;

    // The logical backbuffer matches the first enabled port, or the room
    // itself when views are off.
    let (bb_w, bb_h) = room
        .views
        .iter()
        .find(|v| v.enabled)
        .map(|v| (v.port_w.max(1) as u32, v.port_h.max(1) as u32))
        .unwrap_or((room.width.max(1), room.height.max(1)));
    if world.canvas.width() != bb_w || world.canvas.height() != bb_h {
        world.canvas = Canvas::new(bb_w, bb_h);
    }

    let mut created = Vec::with_capacity(room.instances.len());
    for placed in &room.instances {
        let id = world.create_instance(
            f64::from(placed.x),
            f64::from(placed.y),
            placed.object_index as u32,
            false,
        );
        if let Some(inst) = world.instances.get_mut(&id) {
            inst.image_xscale = f64::from(placed.scale_x);
            inst.image_yscale = f64::from(placed.scale_y);
            inst.image_angle = f64::from(placed.rotation);
            inst.image_blend = placed.color & 0x00FF_FFFF;
        }
        created.push((id, placed.creation_code));
    }

    for &(id, creation_code) in &created {
        if creation_code >= 0 {
            interp::execute_code(world, creation_code as u32, i64::from(id), i64::from(id), &[])?;
        }
        event::fire_event(world, id, event::CREATE, 0)?;
    }

    if first_room {
        for id in world.live_ids() {
            event::fire_event(world, id, event::OTHER, event::OTHER_GAME_START)?;
        }
    }

    if room.creation_code >= 0 {
        interp::execute_code(
            world,
            room.creation_code as u32,
            NO_INSTANCE,
            NO_INSTANCE,
            &[],
        )?;
    }

    for id in world.live_ids() {
        event::fire_event(world, id, event::OTHER, event::OTHER_ROOM_START)?;
    }

    world.flush_deferred()
}
