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
use crate::{
    builtins::Registry,
    event,
    input::InputState,
    instance::{BuiltinVar, Instance, FIRST_INSTANCE_ID},
};
use anyhow::Result;
use gamedata::{GameData, RoomBackground, RoomTile, View};
use gml::Value;
use log::{info, warn};
use ordered_float::OrderedFloat;
use render::{Align, Canvas};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    rc::Rc,
};

/// Wildcard-or-exact name filter for the trace flags.
#[derive(Clone, Debug, Default)]
pub struct TraceFilter {
    pattern: Option<String>,
}

impl TraceFilter {
    pub fn from_arg(arg: Option<String>) -> Self {
        Self { pattern: arg }
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.pattern {
            Some(p) => p == "*" || p == name,
            None => false,
        }
    }

    pub fn enabled(&self) -> bool {
        self.pattern.is_some()
    }
}

#[derive(Clone, Debug, Default)]
pub struct TraceOptions {
    pub calls: TraceFilter,
    pub events: TraceFilter,
    pub instructions: TraceFilter,
    pub ignore_calls: HashSet<String>,
    pub debug_objects: HashSet<String>,
}

/// Pen state shared by the drawing builtins.
#[derive(Clone, Debug)]
pub struct DrawState {
    pub color: u32,
    pub alpha: f64,
    pub font: i32,
    pub halign: Align,
    pub valign: Align,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            color: 0x00FF_FFFF,
            alpha: 1.0,
            font: -1,
            halign: Align::Start,
            valign: Align::Start,
        }
    }
}

/// Hashable key for ds_map entries.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum DsKey {
    Real(OrderedFloat<f64>),
    Str(String),
}

impl DsKey {
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(match value {
            Value::Str(s) => DsKey::Str(s.to_string()),
            other => DsKey::Real(OrderedFloat(other.to_real()?)),
        })
    }
}

/// Integer-handle arenas for the ds_map/ds_list families.
#[derive(Debug, Default)]
pub struct DsArenas {
    pub maps: HashMap<i32, HashMap<DsKey, Value>>,
    pub lists: HashMap<i32, Vec<Value>>,
    next_map: i32,
    next_list: i32,
}

impl DsArenas {
    pub fn create_map(&mut self) -> i32 {
        let id = self.next_map;
        self.next_map += 1;
        self.maps.insert(id, HashMap::new());
        id
    }

    pub fn create_list(&mut self) -> i32 {
        let id = self.next_list;
        self.next_list += 1;
        self.lists.insert(id, Vec::new());
        id
    }
}

/// The live copy of the current room, mutable where the original allows
/// scripts to move views or retarget layers.
#[derive(Clone, Debug, Default)]
pub struct RoomState {
    pub index: i32,
    pub speed: u32,
    pub width: u32,
    pub height: u32,
    pub caption: String,
    pub background_color: u32,
    pub draw_background_color: bool,
    pub views: Vec<View>,
    pub backgrounds: Vec<RoomBackground>,
    pub tiles: Vec<RoomTile>,
    /// Latched goto; takes effect only at the flush boundary.
    pub pending: Option<u32>,
}

/// One level of event dispatch, for event_inherited.
#[derive(Clone, Copy, Debug)]
pub struct EventContext {
    /// The object whose handler is running (may be an ancestor of self's).
    pub object: u32,
    pub kind: u32,
    pub subtype: u32,
}

const WARN_LIMIT: u32 = 8;

/// All mutable simulation state. Owned and mutated only by the main loop;
/// the VM and builtins reach everything through here.
pub struct World {
    pub assets: Rc<GameData>,
    pub instances: BTreeMap<u32, Instance>,
    next_id: u32,
    /// Global variables by variable table slot.
    pub globals: HashMap<u32, Value>,
    /// Builtin-scope storage addressed by name (score and friends).
    pub named_globals: HashMap<String, Value>,
    /// Slot-indexed interception table for built-in instance properties.
    pub var_builtins: Vec<Option<BuiltinVar>>,
    pub room: RoomState,
    pub draw: DrawState,
    pub canvas: Canvas,
    pub input: InputState,
    pub rng: fastrand::Rng,
    pub rng_seed: u64,
    pub ds: DsArenas,
    pub pending_create: Vec<u32>,
    pub pending_destroy: Vec<u32>,
    pub frame_count: u64,
    pub exit_requested: bool,
    pub trace: TraceOptions,
    pub event_stack: Vec<EventContext>,
    /// The shared VM value stack; frames mark their base into it.
    pub stack: Vec<Value>,
    pub builtins: Registry,
    warn_counts: HashMap<(&'static str, String), u32>,
}

impl World {
    pub fn new(assets: Rc<GameData>, seed: u64) -> Self {
        let var_builtins = assets
            .variables
            .iter()
            .map(|v| BuiltinVar::from_name(assets.string(v.name)))
            .collect();
        info!(
            "world up: {} objects, {} rooms, seed {}",
            assets.objects.len(),
            assets.rooms.len(),
            seed
        );
        Self {
            assets,
            instances: BTreeMap::new(),
            next_id: FIRST_INSTANCE_ID,
            globals: HashMap::new(),
            named_globals: HashMap::new(),
            var_builtins,
            room: RoomState {
                index: -1,
                ..RoomState::default()
            },
            draw: DrawState::default(),
            canvas: Canvas::new(320, 240),
            input: InputState::new(),
            rng: fastrand::Rng::with_seed(seed),
            rng_seed: seed,
            ds: DsArenas::default(),
            pending_create: Vec::new(),
            pending_destroy: Vec::new(),
            frame_count: 0,
            exit_requested: false,
            trace: TraceOptions::default(),
            event_stack: Vec::new(),
            stack: Vec::new(),
            builtins: Registry::new(),
            warn_counts: HashMap::new(),
        }
    }

    /// Allocate an instance. The id is returned immediately and the table
    /// entry is addressable, but the Create event is deferred to the next
    /// flush boundary unless the caller fires it itself (room load does).
    pub fn create_instance(&mut self, x: f64, y: f64, object_index: u32, defer: bool) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        let mut inst = Instance::new(id, object_index, x, y, &self.assets);
        inst.created = !defer;
        self.instances.insert(id, inst);
        if defer {
            self.pending_create.push(id);
        }
        id
    }

    /// Mark for deferred destruction; the Destroy event fires exactly once
    /// at the flush boundary and the instance stays addressable until then.
    pub fn mark_destroyed(&mut self, id: u32) {
        if let Some(inst) = self.instances.get_mut(&id) {
            if !inst.destroyed {
                inst.destroyed = true;
                self.pending_destroy.push(id);
            }
        }
    }

    /// Flush boundary: deferred creations fire Create in id order, then
    /// deferred destructions fire Destroy and are removed. Event code may
    /// queue more work; we drain until stable.
    pub fn flush_deferred(&mut self) -> Result<()> {
        while !self.pending_create.is_empty() || !self.pending_destroy.is_empty() {
            let mut creates = std::mem::take(&mut self.pending_create);
            creates.sort_unstable();
            for id in creates {
                let fire = match self.instances.get_mut(&id) {
                    Some(inst) => {
                        inst.created = true;
                        !inst.destroyed
                    }
                    None => false,
                };
                if fire {
                    event::fire_event(self, id, event::CREATE, 0)?;
                }
            }
            let mut destroys = std::mem::take(&mut self.pending_destroy);
            destroys.sort_unstable();
            destroys.dedup();
            for id in destroys {
                if self.instances.contains_key(&id) {
                    event::fire_event(self, id, event::DESTROY, 0)?;
                    self.instances.remove(&id);
                }
            }
        }
        Ok(())
    }

    /// Ascending-id snapshot of instances alive right now. Instances whose
    /// deferred Create has not fired yet are not part of the simulation.
    pub fn live_ids(&self) -> Vec<u32> {
        self.instances
            .values()
            .filter(|i| i.created && !i.destroyed)
            .map(|i| i.id)
            .collect()
    }

    /// Live instances of an object, descendants included.
    pub fn instances_of(&self, object_index: u32) -> Vec<u32> {
        self.instances
            .values()
            .filter(|i| {
                i.created && !i.destroyed && self.assets.object_is_a(i.object_index, object_index)
            })
            .map(|i| i.id)
            .collect()
    }

    pub fn first_instance_of(&self, object_index: u32) -> Option<u32> {
        self.instances
            .values()
            .find(|i| {
                i.created && !i.destroyed && self.assets.object_is_a(i.object_index, object_index)
            })
            .map(|i| i.id)
    }

    pub fn instance_alive(&self, id: u32) -> bool {
        self.instances
            .get(&id)
            .map(|i| i.created && !i.destroyed)
            .unwrap_or(false)
    }

    /// Resolve an event along the parent chain: the first object that
    /// defines a handler wins.
    pub fn resolve_event(&self, object_index: u32, kind: u32, subtype: u32) -> Option<(u32, u32)> {
        for obj in self.assets.object_chain(object_index) {
            if let Some(code) = self.assets.objects[obj as usize].event(kind, subtype) {
                return Some((obj, code));
            }
        }
        None
    }

    /// Rate limited warning channel for stubs and absent handlers; one
    /// site/key pair goes quiet after its first few reports.
    pub fn warn_limited(&mut self, site: &'static str, key: &str, message: &str) {
        let count = self
            .warn_counts
            .entry((site, key.to_owned()))
            .or_insert(0);
        *count += 1;
        if *count < WARN_LIMIT {
            warn!("{}: {}", site, message);
        } else if *count == WARN_LIMIT {
            warn!("{}: {} (further reports suppressed)", site, message);
        }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = fastrand::Rng::with_seed(seed);
        self.rng_seed = seed;
    }

    /// Milliseconds of logical time; derived from the frame counter so
    /// that replays see identical clocks.
    pub fn current_time_ms(&self) -> f64 {
        let speed = self.room.speed.max(1);
        self.frame_count as f64 * 1000.0 / f64::from(speed)
    }

    /// Read a builtin-scope global by name. Unrecognized names fall back
    /// to plain named storage so titles can invent their own.
    pub fn global_builtin_read(&self, name: &str) -> Value {
        match name {
            "room" => f64::from(self.room.index).into(),
            "room_speed" => f64::from(self.room.speed).into(),
            "room_width" => f64::from(self.room.width).into(),
            "room_height" => f64::from(self.room.height).into(),
            "room_caption" => Value::string(&self.room.caption),
            "room_persistent" => Value::bool(false),
            "fps" => f64::from(self.room.speed).into(),
            "current_time" => self.current_time_ms().into(),
            "instance_count" => (self.live_ids().len() as f64).into(),
            "view_current" => 0f64.into(),
            "view_xview" | "view_yview" | "view_wview" | "view_hview" | "view_enabled" => {
                self.view_field(name, 0)
            }
            _ => self
                .named_globals
                .get(name)
                .cloned()
                .unwrap_or(Value::Undefined),
        }
    }

    pub fn view_field(&self, name: &str, index: usize) -> Value {
        let Some(view) = self.room.views.get(index) else {
            return 0f64.into();
        };
        match name {
            "view_xview" => f64::from(view.view_x).into(),
            "view_yview" => f64::from(view.view_y).into(),
            "view_wview" => f64::from(view.view_w).into(),
            "view_hview" => f64::from(view.view_h).into(),
            "view_enabled" => Value::bool(view.enabled),
            _ => 0f64.into(),
        }
    }

    pub fn set_view_field(&mut self, name: &str, index: usize, value: &Value) -> Result<bool> {
        let v = value.to_real()?;
        let Some(view) = self.room.views.get_mut(index) else {
            return Ok(true);
        };
        match name {
            "view_xview" => view.view_x = v as i32,
            "view_yview" => view.view_y = v as i32,
            "view_wview" => view.view_w = v as i32,
            "view_hview" => view.view_h = v as i32,
            "view_enabled" => view.enabled = v >= 0.5,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Write a builtin-scope global. Returns false when the name needs the
    /// caller's context (none currently do).
    pub fn global_builtin_write(&mut self, name: &str, value: &Value) -> Result<()> {
        match name {
            "room" => {
                let target = value.to_i32()?;
                if target >= 0 && (target as usize) < self.assets.rooms.len() {
                    self.room.pending = Some(target as u32);
                }
            }
            "room_speed" => self.room.speed = value.to_real()?.max(1.0) as u32,
            "room_caption" => self.room.caption = value.to_display()?,
            "view_xview" | "view_yview" | "view_wview" | "view_hview" | "view_enabled" => {
                self.set_view_field(name, 0, value)?;
            }
            _ => {
                self.named_globals.insert(name.to_owned(), value.clone());
            }
        }
        Ok(())
    }
}
