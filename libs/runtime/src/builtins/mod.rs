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
mod draw;
mod ds;
mod instances;
mod keyboard;
mod math;
mod rooms;
mod strings;
mod stubs;
mod system;

pub(crate) use draw::default_draw;

use crate::World;
use anyhow::Result;
use gml::Value;
use std::collections::HashMap;

/// Every builtin has this shape: the world, the calling instance pair, and
/// the evaluated arguments, first argument first.
pub type BuiltinFn = fn(&mut World, i64, i64, &[Value]) -> Result<Value>;

/// The name-keyed dispatch table the VM consults for non-script calls.
pub struct Registry {
    map: HashMap<&'static str, BuiltinFn>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let mut map = HashMap::new();
        math::register(&mut map);
        strings::register(&mut map);
        draw::register(&mut map);
        instances::register(&mut map);
        rooms::register(&mut map);
        keyboard::register(&mut map);
        ds::register(&mut map);
        stubs::register(&mut map);
        system::register(&mut map);
        Self { map }
    }

    pub fn get(&self, name: &str) -> Option<BuiltinFn> {
        self.map.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// Argument accessors shared by the family modules. Missing arguments read
// as Undefined, which coerces per the value model.

pub(crate) fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Undefined)
}

pub(crate) fn real(args: &[Value], i: usize) -> Result<f64> {
    arg(args, i).to_real()
}

pub(crate) fn int(args: &[Value], i: usize) -> Result<i32> {
    arg(args, i).to_i32()
}

pub(crate) fn text(args: &[Value], i: usize) -> Result<String> {
    arg(args, i).to_display()
}

pub(crate) fn reg(map: &mut HashMap<&'static str, BuiltinFn>, name: &'static str, f: BuiltinFn) {
    map.insert(name, f);
}
