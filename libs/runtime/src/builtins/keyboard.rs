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
use gml::Value;
use std::collections::HashMap;

/// All checks read the per-frame snapshot; nothing here touches the OS.
pub fn register(map: &mut HashMap<&'static str, BuiltinFn>) {
    reg(map, "keyboard_check", |w, _, _, a| {
        Ok(Value::bool(w.input.check(int(a, 0)?.max(0) as u32)))
    });
    reg(map, "keyboard_check_pressed", |w, _, _, a| {
        Ok(Value::bool(w.input.check_pressed(int(a, 0)?.max(0) as u32)))
    });
    reg(map, "keyboard_check_released", |w, _, _, a| {
        Ok(Value::bool(w.input.check_released(int(a, 0)?.max(0) as u32)))
    });
    reg(map, "keyboard_check_direct", |w, _, _, a| {
        Ok(Value::bool(w.input.check(int(a, 0)?.max(0) as u32)))
    });
    reg(map, "keyboard_clear", |w, _, _, _| {
        w.input.clear();
        Ok(Value::Real(0.0))
    });
    reg(map, "io_clear", |w, _, _, _| {
        w.input.clear();
        Ok(Value::Real(0.0))
    });
}
