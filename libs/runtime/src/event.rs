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
use crate::{interp, world::EventContext, World};
use anyhow::{Context, Result};
use log::trace;

pub const CREATE: u32 = 0;
pub const DESTROY: u32 = 1;
pub const ALARM: u32 = 2;
pub const STEP: u32 = 3;
pub const COLLISION: u32 = 4;
pub const KEYBOARD: u32 = 5;
pub const MOUSE: u32 = 6;
pub const OTHER: u32 = 7;
pub const DRAW: u32 = 8;
pub const KEY_PRESS: u32 = 9;
pub const KEY_RELEASE: u32 = 10;
pub const TRIGGER: u32 = 11;
pub const CLEANUP: u32 = 12;
pub const GESTURE: u32 = 13;

pub const STEP_NORMAL: u32 = 0;
pub const STEP_BEGIN: u32 = 1;
pub const STEP_END: u32 = 2;

pub const DRAW_NORMAL: u32 = 0;
pub const DRAW_GUI: u32 = 64;

pub const OTHER_OUTSIDE: u32 = 0;
pub const OTHER_BOUNDARY: u32 = 1;
pub const OTHER_GAME_START: u32 = 2;
pub const OTHER_GAME_END: u32 = 3;
pub const OTHER_ROOM_START: u32 = 4;
pub const OTHER_ROOM_END: u32 = 5;
pub const OTHER_ANIMATION_END: u32 = 7;
pub const OTHER_END_OF_PATH: u32 = 8;
pub const OTHER_USER0: u32 = 10;

pub fn kind_name(kind: u32) -> &'static str {
    match kind {
        CREATE => "create",
        DESTROY => "destroy",
        ALARM => "alarm",
        STEP => "step",
        COLLISION => "collision",
        KEYBOARD => "keyboard",
        MOUSE => "mouse",
        OTHER => "other",
        DRAW => "draw",
        KEY_PRESS => "key press",
        KEY_RELEASE => "key release",
        TRIGGER => "trigger",
        CLEANUP => "cleanup",
        GESTURE => "gesture",
        _ => "unknown",
    }
}

/// Fire one event on one instance, resolving the handler along the parent
/// chain. `other` defaults to self outside collision events and `with`.
pub fn fire_event(world: &mut World, id: u32, kind: u32, subtype: u32) -> Result<()> {
    fire_event_with_other(world, id, kind, subtype, i64::from(id))
}

pub fn fire_event_with_other(
    world: &mut World,
    id: u32,
    kind: u32,
    subtype: u32,
    other: i64,
) -> Result<()> {
    let Some(inst) = world.instances.get(&id) else {
        return Ok(());
    };
    let object_index = inst.object_index;
    let Some((def_object, code)) = world.resolve_event(object_index, kind, subtype) else {
        return Ok(());
    };

    let assets = world.assets.clone();
    let object_name = assets.string(assets.objects[object_index as usize].name);
    if world.trace.events.matches(object_name) || world.trace.debug_objects.contains(object_name) {
        trace!(
            "event {}({}) on {} #{}",
            kind_name(kind),
            subtype,
            object_name,
            id
        );
    }

    world.event_stack.push(EventContext {
        object: def_object,
        kind,
        subtype,
    });
    let result = interp::execute_code(world, code, i64::from(id), other, &[]);
    world.event_stack.pop();

    result
        .map(|_| ())
        .with_context(|| {
            format!(
                "while running {}({}) on instance {} of {}",
                kind_name(kind),
                subtype,
                id,
                object_name_of(world, object_index),
            )
        })
}

fn object_name_of(world: &World, object_index: u32) -> String {
    world
        .assets
        .string(world.assets.objects[object_index as usize].name)
        .to_owned()
}

/// Re-dispatch the current event one level up the parent chain; the
/// event_inherited builtin lands here.
pub fn fire_inherited(world: &mut World, self_id: i64, other_id: i64) -> Result<()> {
    let Some(ctx) = world.event_stack.last().copied() else {
        world.warn_limited("event_inherited", "outside-event", "called outside any event");
        return Ok(());
    };
    let parent = world.assets.objects[ctx.object as usize].parent;
    if parent < 0 {
        return Ok(());
    }
    let Some((def_object, code)) = world.resolve_event(parent as u32, ctx.kind, ctx.subtype) else {
        return Ok(());
    };
    world.event_stack.push(EventContext {
        object: def_object,
        kind: ctx.kind,
        subtype: ctx.subtype,
    });
    let result = interp::execute_code(world, code, self_id, other_id, &[]);
    world.event_stack.pop();
    result.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamedata::testkit::{Asm, GameBuilder, REF_NORMAL, SCOPE_GLOBAL};
    use gml::scope;
    use std::rc::Rc;

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
    fn undefined_events_resolve_through_the_parent_chain() -> anyhow::Result<()> {
        let mut b = GameBuilder::new();
        let steps = b.variable("steps", SCOPE_GLOBAL);
        let parent = b.object("obj_parent", -1, -1);
        let code = inc_global(&mut b, steps, "parent_step");
        b.event(parent, STEP, STEP_NORMAL, code);
        let child = b.object("obj_child", -1, parent as i32);

        let mut world = World::new(Rc::new(b.build()?), 7);
        let id = world.create_instance(0.0, 0.0, child, false);
        fire_event(&mut world, id, STEP, STEP_NORMAL)?;
        assert_eq!(global_of(&world, steps), 1.0);
        Ok(())
    }

    #[test]
    fn event_inherited_reenters_one_level_up() -> anyhow::Result<()> {
        let mut b = GameBuilder::new();
        let base = b.variable("base", SCOPE_GLOBAL);
        let derived = b.variable("derived", SCOPE_GLOBAL);
        let parent = b.object("obj_parent", -1, -1);
        let parent_code = inc_global(&mut b, base, "parent_create");
        b.event(parent, CREATE, 0, parent_code);

        let child = b.object("obj_child", -1, parent as i32);
        let inherited = b.function("event_inherited");
        let mut asm = Asm::new();
        asm.call(inherited, 0).popz();
        asm.push_var(scope::GLOBAL, derived, REF_NORMAL)
            .push_i16(1)
            .add()
            .pop_var(scope::GLOBAL, derived, REF_NORMAL)
            .exit();
        let child_code = b.code("child_create", &asm);
        b.event(child, CREATE, 0, child_code);

        let mut world = World::new(Rc::new(b.build()?), 7);
        let id = world.create_instance(0.0, 0.0, child, false);
        fire_event(&mut world, id, CREATE, 0)?;
        assert_eq!(global_of(&world, base), 1.0);
        assert_eq!(global_of(&world, derived), 1.0);
        Ok(())
    }

    #[test]
    fn child_handlers_shadow_the_parent() -> anyhow::Result<()> {
        let mut b = GameBuilder::new();
        let from_parent = b.variable("from_parent", SCOPE_GLOBAL);
        let from_child = b.variable("from_child", SCOPE_GLOBAL);
        let parent = b.object("obj_parent", -1, -1);
        let parent_code = inc_global(&mut b, from_parent, "parent_step");
        b.event(parent, STEP, STEP_NORMAL, parent_code);
        let child = b.object("obj_child", -1, parent as i32);
        let child_code = inc_global(&mut b, from_child, "child_step");
        b.event(child, STEP, STEP_NORMAL, child_code);

        let mut world = World::new(Rc::new(b.build()?), 7);
        let id = world.create_instance(0.0, 0.0, child, false);
        fire_event(&mut world, id, STEP, STEP_NORMAL)?;
        assert_eq!(global_of(&world, from_parent), 0.0);
        assert_eq!(global_of(&world, from_child), 1.0);
        Ok(())
    }
}
