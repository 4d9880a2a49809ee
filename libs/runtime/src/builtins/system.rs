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
use super::{int, reg, text, BuiltinFn};
use crate::{event, interp};
use gml::Value;
use log::info;
use std::collections::HashMap;

pub fn register(map: &mut HashMap<&'static str, BuiltinFn>) {
    reg(map, "game_end", |w, _, _, _| {
        w.exit_requested = true;
        Ok(Value::Real(0.0))
    });
    reg(map, "game_restart", |w, _, _, _| {
        // A full restart would reset globals too; returning to the first
        // room covers the titles in scope.
        w.warn_limited("system", "game_restart", "game_restart resets to the first room");
        if let Some(&first) = w.assets.gen8.room_order.first() {
            w.room.pending = Some(first);
        }
        Ok(Value::Real(0.0))
    });
    reg(map, "show_debug_message", |_, _, _, a| {
        info!("{}", text(a, 0)?);
        Ok(Value::Real(0.0))
    });
    reg(map, "show_message", |_, _, _, a| {
        info!("[message] {}", text(a, 0)?);
        Ok(Value::Real(0.0))
    });
    reg(map, "window_set_caption", |w, _, _, a| {
        w.room.caption = text(a, 0)?;
        Ok(Value::Real(0.0))
    });
    reg(map, "window_get_caption", |w, _, _, _| {
        Ok(Value::string(&w.room.caption))
    });
    reg(map, "window_set_fullscreen", |w, _, _, _| {
        w.warn_limited("system", "fullscreen", "window_set_fullscreen is ignored");
        Ok(Value::Real(0.0))
    });
    reg(map, "window_get_fullscreen", |_, _, _, _| Ok(Value::bool(false)));
    reg(map, "display_get_width", |w, _, _, _| {
        Ok(Value::Real(f64::from(w.assets.gen8.default_window_width)))
    });
    reg(map, "display_get_height", |w, _, _, _| {
        Ok(Value::Real(f64::from(w.assets.gen8.default_window_height)))
    });
    reg(map, "window_get_width", |w, _, _, _| {
        Ok(Value::Real(f64::from(w.assets.gen8.default_window_width)))
    });
    reg(map, "window_get_height", |w, _, _, _| {
        Ok(Value::Real(f64::from(w.assets.gen8.default_window_height)))
    });
    reg(map, "get_timer", |w, _, _, _| {
        Ok(Value::Real(w.current_time_ms() * 1000.0))
    });

    reg(map, "script_execute", |w, s, o, a| {
        let script = int(a, 0)?;
        interp::call_script(w, script, s, o, &a[1.min(a.len())..])
    });
    reg(map, "event_inherited", |w, s, o, _| {
        event::fire_inherited(w, s, o)?;
        Ok(Value::Real(0.0))
    });
    reg(map, "event_perform", |w, s, _, a| {
        let kind = int(a, 0)?.max(0) as u32;
        let subtype = int(a, 1)?.max(0) as u32;
        if s >= 0 {
            event::fire_event(w, s as u32, kind, subtype)?;
        }
        Ok(Value::Real(0.0))
    });
    reg(map, "event_user", |w, s, _, a| {
        let n = int(a, 0)?.clamp(0, 15) as u32;
        if s >= 0 {
            event::fire_event(w, s as u32, event::OTHER, event::OTHER_USER0 + n)?;
        }
        Ok(Value::Real(0.0))
    });
}
