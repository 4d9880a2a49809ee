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
use crate::{builtins, event, room, World};
use anyhow::Result;
use gamedata::RoomBackground;
use render::Color;
use std::collections::{HashMap, HashSet};

/// One simulation frame, phases in the authoritative order: input snapshot,
/// Begin Step, alarms, keyboard events, Step with motion and paths, the
/// collision pass, End Step, the flush boundary (including any latched room
/// change), animation advance, and the draw walk.
pub fn run_frame(world: &mut World, held: &HashSet<u32>) -> Result<()> {
    world.input.begin_frame(held);

    for id in world.live_ids() {
        if let Some(inst) = world.instances.get_mut(&id) {
            inst.xprevious = inst.x;
            inst.yprevious = inst.y;
        }
        fire_if_alive(world, id, event::STEP, event::STEP_BEGIN)?;
    }

    alarm_phase(world)?;
    keyboard_phase(world)?;

    for id in world.live_ids() {
        fire_if_alive(world, id, event::STEP, event::STEP_NORMAL)?;
        integrate_motion(world, id);
        advance_path(world, id)?;
    }

    collision_phase(world)?;

    for id in world.live_ids() {
        fire_if_alive(world, id, event::STEP, event::STEP_END)?;
    }

    world.flush_deferred()?;
    room::perform_pending(world)?;

    for id in world.live_ids() {
        if let Some(inst) = world.instances.get_mut(&id) {
            if inst.visible && inst.sprite_index >= 0 {
                inst.image_index += inst.image_speed;
            }
        }
    }

    draw_walk(world)?;
    world.frame_count += 1;
    Ok(())
}

fn fire_if_alive(world: &mut World, id: u32, kind: u32, subtype: u32) -> Result<()> {
    if world.instance_alive(id) {
        event::fire_event(world, id, kind, subtype)?;
    }
    Ok(())
}

/// Each active counter ticks down by one; hitting zero parks the slot at
/// -1 and fires Alarm(k), per instance in id order.
fn alarm_phase(world: &mut World) -> Result<()> {
    for id in world.live_ids() {
        let mut fired = Vec::new();
        if let Some(inst) = world.instances.get_mut(&id) {
            if inst.destroyed {
                continue;
            }
            for k in 0..12 {
                if inst.alarms[k] > 0 {
                    inst.alarms[k] -= 1;
                    if inst.alarms[k] == 0 {
                        inst.alarms[k] = -1;
                        fired.push(k as u32);
                    }
                }
            }
        }
        for k in fired {
            fire_if_alive(world, id, event::ALARM, k)?;
        }
    }
    Ok(())
}

/// Collect the keyboard-family subtypes an object's chain subscribes to,
/// child definitions shadowing the parent's.
fn subscribed_keys(world: &World, object: u32, kind: u32) -> Vec<u32> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for obj in world.assets.object_chain(object) {
        for &(k, subtype) in world.assets.objects[obj as usize].events.keys() {
            if k == kind && seen.insert(subtype) {
                out.push(subtype);
            }
        }
    }
    out.sort_unstable();
    out
}

fn keyboard_phase(world: &mut World) -> Result<()> {
    for id in world.live_ids() {
        let Some(inst) = world.instances.get(&id) else {
            continue;
        };
        let object = inst.object_index;
        for key in subscribed_keys(world, object, event::KEY_PRESS) {
            if world.input.check_pressed(key) {
                fire_if_alive(world, id, event::KEY_PRESS, key)?;
            }
        }
        for key in subscribed_keys(world, object, event::KEYBOARD) {
            if world.input.check(key) {
                fire_if_alive(world, id, event::KEYBOARD, key)?;
            }
        }
        for key in subscribed_keys(world, object, event::KEY_RELEASE) {
            if world.input.check_released(key) {
                fire_if_alive(world, id, event::KEY_RELEASE, key)?;
            }
        }
    }
    Ok(())
}

/// Built-in movement: position advances by the components, then friction
/// pulls speed toward zero and gravity accumulates along its direction.
fn integrate_motion(world: &mut World, id: u32) {
    let Some(inst) = world.instances.get_mut(&id) else {
        return;
    };
    if inst.destroyed {
        return;
    }
    inst.x += inst.hspeed;
    inst.y += inst.vspeed;
    if inst.friction != 0.0 && inst.speed != 0.0 {
        let new_speed = if inst.speed > 0.0 {
            (inst.speed - inst.friction).max(0.0)
        } else {
            (inst.speed + inst.friction).min(0.0)
        };
        let rad = inst.direction.to_radians();
        inst.speed = new_speed;
        inst.hspeed = rad.cos() * new_speed;
        inst.vspeed = -rad.sin() * new_speed;
    }
    if inst.gravity != 0.0 {
        let rad = inst.gravity_direction.to_radians();
        inst.hspeed += rad.cos() * inst.gravity;
        inst.vspeed += -rad.sin() * inst.gravity;
        inst.speed = inst.hspeed.hypot(inst.vspeed);
        if inst.speed != 0.0 {
            inst.direction = (-inst.vspeed).atan2(inst.hspeed).to_degrees().rem_euclid(360.0);
        }
    }
}

/// Path followers advance their normalized position by speed over the
/// room speed; the end action decides between stopping and looping.
fn advance_path(world: &mut World, id: u32) -> Result<()> {
    let room_speed = f64::from(world.room.speed.max(1));
    let assets = world.assets.clone();
    let mut finished = false;
    if let Some(inst) = world.instances.get_mut(&id) {
        if inst.destroyed || inst.path_index < 0 {
            return Ok(());
        }
        let path = &assets.paths[inst.path_index as usize];
        inst.path_position += inst.path_speed / room_speed;
        if inst.path_position >= 1.0 {
            match inst.path_end_action {
                1 => inst.path_position -= inst.path_position.floor(),
                _ => {
                    inst.path_position = 1.0;
                    inst.path_index = -1;
                    finished = true;
                }
            }
        }
        let (x, y) = path.at(inst.path_position);
        inst.x = x;
        inst.y = y;
    }
    if finished {
        fire_if_alive(world, id, event::OTHER, event::OTHER_END_OF_PATH)?;
    }
    Ok(())
}

/// Every intersecting pair fires on whichever side subscribes, walking
/// parent chains on both the subscriber and the subtype.
fn collision_phase(world: &mut World) -> Result<()> {
    let ids = world.live_ids();
    let assets = world.assets.clone();
    let mut boxes = HashMap::new();
    for &id in &ids {
        if let Some(b) = world.instances.get(&id).and_then(|i| i.bbox(&assets)) {
            boxes.insert(id, b);
        }
    }

    for (ai, &a) in ids.iter().enumerate() {
        for &b in &ids[ai + 1..] {
            let (Some(&ba), Some(&bb)) = (boxes.get(&a), boxes.get(&b)) else {
                continue;
            };
            if ba.0 > bb.2 || bb.0 > ba.2 || ba.1 > bb.3 || bb.1 > ba.3 {
                continue;
            }
            fire_collisions_between(world, a, b)?;
            fire_collisions_between(world, b, a)?;
        }
    }
    Ok(())
}

fn fire_collisions_between(world: &mut World, subscriber: u32, other: u32) -> Result<()> {
    if !world.instance_alive(subscriber) || !world.instance_alive(other) {
        return Ok(());
    }
    let sub_object = world.instances[&subscriber].object_index;
    let other_object = world.instances[&other].object_index;
    for subtype in subscribed_keys(world, sub_object, event::COLLISION) {
        if world.assets.object_is_a(other_object, subtype) {
            event::fire_event_with_other(
                world,
                subscriber,
                event::COLLISION,
                subtype,
                i64::from(other),
            )?;
        }
    }
    Ok(())
}

/// The deterministic draw order: per enabled view, backgrounds below,
/// tiles by falling depth, instances by falling depth with id tiebreak
/// (Draw handlers re-enter the VM), then foreground backgrounds.
pub fn draw_walk(world: &mut World) -> Result<()> {
    if world.room.draw_background_color {
        world
            .canvas
            .clear(Color::from_gm(world.room.background_color));
    }

    follow_views(world);

    let views: Vec<gamedata::View> = world
        .room
        .views
        .iter()
        .filter(|v| v.enabled)
        .cloned()
        .collect();
    let synthetic = views.is_empty();
    let view_list = if synthetic {
        vec![full_room_view(world)]
    } else {
        views
    };

    for view in view_list {
        world.canvas.set_view(
            f64::from(view.view_x),
            f64::from(view.view_y),
            f64::from(view.view_w.max(1)),
            f64::from(view.view_h.max(1)),
            view.port_x,
            view.port_y,
            view.port_w.max(1),
            view.port_h.max(1),
        );

        let layers = world.room.backgrounds.clone();
        for layer in layers.iter().filter(|l| l.enabled && !l.foreground) {
            draw_background_layer(world, layer, &view);
        }

        draw_tiles(world);
        draw_instances(world)?;

        for layer in layers.iter().filter(|l| l.enabled && l.foreground) {
            draw_background_layer(world, layer, &view);
        }
    }
    world.canvas.reset_view();
    Ok(())
}

/// Views tracking an object recenter on its first live instance, clamped
/// to the room.
fn follow_views(world: &mut World) {
    let mut updates = Vec::new();
    for (i, view) in world.room.views.iter().enumerate() {
        if !view.enabled || view.follow_object < 0 {
            continue;
        }
        if let Some(id) = world.first_instance_of(view.follow_object as u32) {
            let inst = &world.instances[&id];
            let x = (inst.x - f64::from(view.view_w) / 2.0)
                .clamp(0.0, f64::from(world.room.width.max(1)) - f64::from(view.view_w))
                .floor() as i32;
            let y = (inst.y - f64::from(view.view_h) / 2.0)
                .clamp(0.0, f64::from(world.room.height.max(1)) - f64::from(view.view_h))
                .floor() as i32;
            updates.push((i, x, y));
        }
    }
    for (i, x, y) in updates {
        world.room.views[i].view_x = x;
        world.room.views[i].view_y = y;
    }
}

fn full_room_view(world: &World) -> gamedata::View {
    gamedata::View {
        enabled: true,
        view_x: 0,
        view_y: 0,
        view_w: world.canvas.width() as i32,
        view_h: world.canvas.height() as i32,
        port_x: 0,
        port_y: 0,
        port_w: world.canvas.width() as i32,
        port_h: world.canvas.height() as i32,
        border_x: 0,
        border_y: 0,
        speed_x: -1,
        speed_y: -1,
        follow_object: -1,
    }
}

fn draw_background_layer(world: &mut World, layer: &RoomBackground, view: &gamedata::View) {
    if layer.background < 0 {
        return;
    }
    let assets = world.assets.clone();
    let bg = &assets.backgrounds[layer.background as usize];
    let region = assets.regions[bg.region as usize];
    let page = &assets.textures[region.page as usize];
    let w = f64::from(region.dest_w.max(1));
    let h = f64::from(region.dest_h.max(1));

    let (view_l, view_t) = (f64::from(view.view_x), f64::from(view.view_y));
    let (view_r, view_b) = (view_l + f64::from(view.view_w), view_t + f64::from(view.view_h));

    let xs: Vec<f64> = if layer.tile_h {
        let first = f64::from(layer.x) + ((view_l - f64::from(layer.x)) / w).floor() * w;
        let mut out = Vec::new();
        let mut x = first;
        while x < view_r {
            out.push(x);
            x += w;
        }
        out
    } else {
        vec![f64::from(layer.x)]
    };
    let ys: Vec<f64> = if layer.tile_v {
        let first = f64::from(layer.y) + ((view_t - f64::from(layer.y)) / h).floor() * h;
        let mut out = Vec::new();
        let mut y = first;
        while y < view_b {
            out.push(y);
            y += h;
        }
        out
    } else {
        vec![f64::from(layer.y)]
    };

    for &y in &ys {
        for &x in &xs {
            world
                .canvas
                .draw_frame(page, &region, x, y, 0.0, 0.0, 1.0, 1.0, 0.0, render::WHITE);
        }
    }
}

fn draw_tiles(world: &mut World) {
    let assets = world.assets.clone();
    let mut tiles = world.room.tiles.clone();
    tiles.sort_by(|a, b| b.depth.cmp(&a.depth).then(a.instance_id.cmp(&b.instance_id)));
    for tile in tiles {
        if tile.background < 0 {
            continue;
        }
        let bg = &assets.backgrounds[tile.background as usize];
        let region = assets.regions[bg.region as usize];
        let page = &assets.textures[region.page as usize];
        world.canvas.blit_rect(
            page,
            i64::from(region.src_x) + i64::from(tile.source_x),
            i64::from(region.src_y) + i64::from(tile.source_y),
            i64::from(tile.width),
            i64::from(tile.height),
            f64::from(tile.x),
            f64::from(tile.y),
            f64::from(tile.scale_x),
            f64::from(tile.scale_y),
            Color::from_gm_alpha(tile.color),
        );
    }
}

fn draw_instances(world: &mut World) -> Result<()> {
    let mut order: Vec<(f64, u32)> = world
        .instances
        .values()
        .filter(|i| i.created && !i.destroyed && i.visible)
        .map(|i| (i.depth, i.id))
        .collect();
    order.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
    for (_, id) in order {
        if !world.instance_alive(id) {
            continue;
        }
        let object = world.instances[&id].object_index;
        if world
            .resolve_event(object, event::DRAW, event::DRAW_NORMAL)
            .is_some()
        {
            event::fire_event(world, id, event::DRAW, event::DRAW_NORMAL)?;
        } else {
            builtins::default_draw(world, id);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{instance::FIRST_INSTANCE_ID, room, World};
    use anyhow::Result;
    use gamedata::testkit::{Asm, GameBuilder, REF_NORMAL, SCOPE_GLOBAL, SCOPE_SELF};
    use gml::scope;
    use std::rc::Rc;

    fn world_with(b: GameBuilder) -> World {
        World::new(Rc::new(b.build().expect("synthetic game must load")), 7)
    }

    fn no_keys() -> HashSet<u32> {
        HashSet::new()
    }

    // global += 1
    fn inc_global(b: &mut GameBuilder, var: u32, name: &str) -> u32 {
        let mut asm = Asm::new();
        asm.push_var(scope::GLOBAL, var, REF_NORMAL)
            .push_i16(1)
            .add()
            .pop_var(scope::GLOBAL, var, REF_NORMAL)
            .exit();
        b.code(name, &asm)
    }

    fn global_of(world: &World, var: u32) -> f64 {
        world
            .globals
            .get(&var)
            .cloned()
            .unwrap_or_default()
            .to_real()
            .unwrap_or(0.0)
    }

    #[test]
    fn alarms_fire_exactly_on_the_one_to_zero_transition() -> Result<()> {
        let _ = env_logger::try_init();
        let mut b = GameBuilder::new();
        let fired = b.variable("fired", SCOPE_GLOBAL);
        let obj = b.object("obj_timer", -1, -1);
        let code = inc_global(&mut b, fired, "on_alarm");
        b.event(obj, crate::event::ALARM, 3, code);
        let room = b.room("room_start", 320, 240, 30);
        b.place(room, obj, 0, 0);

        let mut world = world_with(b);
        room::start_game(&mut world)?;
        let id = world.live_ids()[0];
        world.instances.get_mut(&id).unwrap().alarms[3] = 2;

        run_frame(&mut world, &no_keys())?;
        assert_eq!(global_of(&world, fired), 0.0);
        assert_eq!(world.instances[&id].alarms[3], 1);

        run_frame(&mut world, &no_keys())?;
        assert_eq!(global_of(&world, fired), 1.0);
        assert_eq!(world.instances[&id].alarms[3], -1);

        run_frame(&mut world, &no_keys())?;
        assert_eq!(global_of(&world, fired), 1.0);
        Ok(())
    }

    #[test]
    fn deferred_creates_fire_before_any_step_of_the_new_instance() -> Result<()> {
        let mut b = GameBuilder::new();
        let created = b.variable("created", SCOPE_GLOBAL);
        let stepped = b.variable("stepped", SCOPE_GLOBAL);
        let spawner = b.object("obj_spawner", -1, -1);
        let spawned = b.object("obj_spawned", -1, -1);
        let create_code = inc_global(&mut b, created, "spawned_create");
        let step_code = inc_global(&mut b, stepped, "spawned_step");
        b.event(spawned, crate::event::CREATE, 0, create_code);
        b.event(spawned, crate::event::STEP, crate::event::STEP_NORMAL, step_code);

        let instance_create = b.function("instance_create");
        let mut spawn = Asm::new();
        // Arguments are popped first-on-top, so push obj, y, x.
        spawn
            .push_i16(spawned as i16)
            .push_i16(0)
            .push_i16(0)
            .call(instance_create, 3)
            .popz()
            .exit();
        let spawn_code = b.code("spawner_step", &spawn);
        b.event(spawner, crate::event::STEP, crate::event::STEP_NORMAL, spawn_code);

        let room = b.room("room_start", 320, 240, 30);
        b.place(room, spawner, 0, 0);

        let mut world = world_with(b);
        room::start_game(&mut world)?;
        run_frame(&mut world, &no_keys())?;
        assert_eq!(global_of(&world, created), 1.0);
        assert_eq!(global_of(&world, stepped), 0.0);
        run_frame(&mut world, &no_keys())?;
        assert_eq!(global_of(&world, stepped), 1.0);
        Ok(())
    }

    #[test]
    fn room_change_keeps_persistent_instances_only() -> Result<()> {
        let mut b = GameBuilder::new();
        let destroyed = b.variable("destroyed", SCOPE_GLOBAL);
        let ended = b.variable("ended", SCOPE_GLOBAL);
        let keeper = b.persistent_object("obj_keeper", -1, -1);
        let mortal = b.object("obj_mortal", -1, -1);
        let destroy_code = inc_global(&mut b, destroyed, "mortal_destroy");
        let end_code = inc_global(&mut b, ended, "mortal_room_end");
        b.event(mortal, crate::event::DESTROY, 0, destroy_code);
        b.event(
            mortal,
            crate::event::OTHER,
            crate::event::OTHER_ROOM_END,
            end_code,
        );
        let first = b.room("room_first", 320, 240, 30);
        b.place(first, keeper, 0, 0);
        b.place(first, mortal, 0, 0);
        b.room("room_second", 320, 240, 30);

        let mut world = world_with(b);
        room::start_game(&mut world)?;
        assert_eq!(world.live_ids().len(), 2);

        world.room.pending = Some(1);
        run_frame(&mut world, &no_keys())?;

        assert_eq!(world.room.index, 1);
        assert_eq!(world.live_ids().len(), 1);
        let survivor = &world.instances[&world.live_ids()[0]];
        assert_eq!(survivor.object_index, keeper);
        // Room End fired on the mortal, but removal is not destruction.
        assert_eq!(global_of(&world, ended), 1.0);
        assert_eq!(global_of(&world, destroyed), 0.0);
        Ok(())
    }

    #[test]
    fn key_press_is_edge_triggered() -> Result<()> {
        let mut b = GameBuilder::new();
        let presses = b.variable("presses", SCOPE_GLOBAL);
        let obj = b.object("obj_input", -1, -1);
        let code = inc_global(&mut b, presses, "on_enter");
        b.event(obj, crate::event::KEY_PRESS, crate::input::vk::ENTER, code);
        let room = b.room("room_start", 320, 240, 30);
        b.place(room, obj, 0, 0);

        let mut world = world_with(b);
        room::start_game(&mut world)?;

        let enter: HashSet<u32> = [crate::input::vk::ENTER].into_iter().collect();
        run_frame(&mut world, &enter)?;
        run_frame(&mut world, &enter)?;
        run_frame(&mut world, &no_keys())?;
        run_frame(&mut world, &enter)?;
        assert_eq!(global_of(&world, presses), 2.0);
        Ok(())
    }

    #[test]
    fn overlapping_boxes_fire_collision_events() -> Result<()> {
        let mut b = GameBuilder::new();
        let hits = b.variable("hits", SCOPE_GLOBAL);
        let spr = b.sprite("spr_box", 16, 16, 0, 0);
        let wall = b.object("obj_wall", spr as i32, -1);
        let mover = b.object("obj_mover", spr as i32, -1);
        let code = inc_global(&mut b, hits, "on_hit_wall");
        b.event(mover, crate::event::COLLISION, wall, code);
        let room = b.room("room_start", 320, 240, 30);
        b.place(room, mover, 0, 0);
        b.place(room, wall, 8, 8);

        let mut world = world_with(b);
        room::start_game(&mut world)?;
        run_frame(&mut world, &no_keys())?;
        assert_eq!(global_of(&world, hits), 1.0);
        Ok(())
    }

    #[test]
    fn motion_integration_applies_component_speeds() -> Result<()> {
        let mut b = GameBuilder::new();
        let hspeed = b.variable("hspeed", SCOPE_SELF);
        let obj = b.object("obj_mover", -1, -1);
        let mut asm = Asm::new();
        asm.push_d(2.0).pop_var(scope::SELF, hspeed, REF_NORMAL).exit();
        let code = b.code("mover_create", &asm);
        b.event(obj, crate::event::CREATE, 0, code);
        let room = b.room("room_start", 320, 240, 30);
        b.place(room, obj, 10, 0);

        let mut world = world_with(b);
        room::start_game(&mut world)?;
        run_frame(&mut world, &no_keys())?;
        run_frame(&mut world, &no_keys())?;
        let id = world.live_ids()[0];
        assert_eq!(world.instances[&id].x, 14.0);
        assert_eq!(world.instances[&id].xprevious, 12.0);
        Ok(())
    }

    #[test]
    fn instance_ids_never_repeat() -> Result<()> {
        let mut b = GameBuilder::new();
        let obj = b.object("obj_thing", -1, -1);
        let room = b.room("room_start", 320, 240, 30);
        b.place(room, obj, 0, 0);
        let mut world = world_with(b);
        room::start_game(&mut world)?;

        let mut seen = vec![world.live_ids()[0]];
        for _ in 0..4 {
            let id = world.create_instance(0.0, 0.0, obj, false);
            assert!(!seen.contains(&id));
            assert!(id >= FIRST_INSTANCE_ID);
            seen.push(id);
            world.mark_destroyed(id);
            world.flush_deferred()?;
        }
        Ok(())
    }

    // End to end checks against a real shipped container. Game data cannot
    // be redistributed, so these are ignored by default; point OPENGMS_DATA
    // at an Undertale v1.08 game.unx and run with --ignored.
    fn load_shipped() -> Result<Option<Rc<gamedata::GameData>>> {
        let Ok(path) = std::env::var("OPENGMS_DATA") else {
            return Ok(None);
        };
        let bytes = std::fs::read(path)?;
        Ok(Some(Rc::new(gamedata::GameData::from_bytes(&bytes)?)))
    }

    #[test]
    #[ignore] // Needs OPENGMS_DATA pointed at a shipped container.
    fn first_frame_of_the_intro_is_black() -> Result<()> {
        let Some(assets) = load_shipped()? else {
            return Ok(());
        };
        let mut world = World::new(assets, 0);
        room::start_game(&mut world)?;
        run_frame(&mut world, &no_keys())?;
        let center = world
            .canvas
            .pixel(world.canvas.width() / 2, world.canvas.height() / 2);
        assert_eq!(center, [0, 0, 0, 255]);
        Ok(())
    }

    #[test]
    #[ignore] // Needs OPENGMS_DATA pointed at a shipped container.
    fn the_known_intro_rooms_are_present() -> Result<()> {
        let Some(assets) = load_shipped()? else {
            return Ok(());
        };
        for name in [
            "room_start",
            "room_introstory",
            "room_introimage",
            "room_intromenu",
            "room_ruins1",
        ] {
            assert!(assets.room_by_name(name).is_some(), "missing {name}");
        }
        Ok(())
    }

    #[test]
    #[ignore] // Needs OPENGMS_DATA pointed at a shipped container.
    fn screenshots_letterbox_to_the_window_size() -> Result<()> {
        let Some(assets) = load_shipped()? else {
            return Ok(());
        };
        let Some(index) = assets.room_by_name("room_introimage") else {
            return Ok(());
        };
        let mut world = World::new(assets.clone(), 0);
        room::enter_room(&mut world, index, true)?;
        run_frame(&mut world, &no_keys())?;
        let shot = world.canvas.upscaled(
            assets.gen8.default_window_width,
            assets.gen8.default_window_height,
        );
        assert_eq!((shot.width(), shot.height()), (640, 480));
        Ok(())
    }

    #[test]
    #[ignore] // Needs OPENGMS_DATA pointed at a shipped container.
    fn enter_advances_the_intro_to_the_menu() -> Result<()> {
        let Some(assets) = load_shipped()? else {
            return Ok(());
        };
        let menu = assets.room_by_name("room_intromenu").expect("menu room");
        let mut world = World::new(assets, 0);
        room::start_game(&mut world)?;

        let enter: HashSet<u32> = [crate::input::vk::ENTER].into_iter().collect();
        let none = no_keys();
        let mut reached = false;
        for frame in 0..75u64 {
            let held = if frame == 60 { &enter } else { &none };
            run_frame(&mut world, held)?;
            if world.room.index == menu as i32 {
                assert!((60..=70).contains(&frame), "arrived at frame {frame}");
                reached = true;
                break;
            }
        }
        assert!(reached, "never reached room_intromenu");
        Ok(())
    }

    #[test]
    #[ignore] // Needs OPENGMS_DATA pointed at a shipped container.
    fn replaying_a_recording_reproduces_frames() -> Result<()> {
        let Some(assets) = load_shipped()? else {
            return Ok(());
        };
        let run = |seed: u64| -> Result<Vec<u8>> {
            let mut world = World::new(assets.clone(), seed);
            room::start_game(&mut world)?;
            let enter: HashSet<u32> = [crate::input::vk::ENTER].into_iter().collect();
            let none = no_keys();
            for frame in 0..90u64 {
                let held = if (60..64).contains(&frame) { &enter } else { &none };
                run_frame(&mut world, held)?;
            }
            Ok(world.canvas.pixels().to_vec())
        };
        assert_eq!(run(0)?, run(0)?);
        Ok(())
    }

    #[test]
    fn identical_seeds_replay_identical_frames() -> Result<()> {
        fn build() -> GameBuilder {
            let mut b = GameBuilder::new();
            let x = b.variable("x", SCOPE_SELF);
            let hspeed = b.variable("hspeed", SCOPE_SELF);
            let random = b.function("random");
            let draw_rectangle = b.function("draw_rectangle");
            let obj = b.object("obj_walker", -1, -1);

            // hspeed = random(2)
            let mut create = Asm::new();
            create
                .push_i16(2)
                .call(random, 1)
                .pop_var(scope::SELF, hspeed, REF_NORMAL)
                .exit();
            let create_code = b.code("walker_create", &create);
            b.event(obj, crate::event::CREATE, 0, create_code);

            // draw_rectangle(x, 10, x + 10, 20, false), arguments reversed.
            let mut draw = Asm::new();
            draw.push_i16(0)
                .push_i16(20)
                .push_var(scope::SELF, x, REF_NORMAL)
                .push_i16(10)
                .add()
                .push_i16(10)
                .push_var(scope::SELF, x, REF_NORMAL)
                .call(draw_rectangle, 5)
                .popz()
                .exit();
            let draw_code = b.code("walker_draw", &draw);
            b.event(obj, crate::event::DRAW, crate::event::DRAW_NORMAL, draw_code);

            let room = b.room("room_start", 64, 48, 30);
            b.place(room, obj, 4, 0);
            b
        }

        let mut first = world_with(build());
        let mut second = world_with(build());
        room::start_game(&mut first)?;
        room::start_game(&mut second)?;
        for _ in 0..3 {
            run_frame(&mut first, &no_keys())?;
            run_frame(&mut second, &no_keys())?;
            assert_eq!(first.canvas.pixels(), second.canvas.pixels());
        }
        // The walk actually drew something other than clear color.
        assert!(first.canvas.pixels().chunks_exact(4).any(|p| p[0] == 255));
        Ok(())
    }
}
