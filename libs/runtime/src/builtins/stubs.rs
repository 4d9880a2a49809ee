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
use super::{reg, BuiltinFn};
use gml::Value;
use std::collections::HashMap;

// Side-effect free replacements for the file, INI, and audio surfaces.
// Each logs through the rate limited channel and returns a safe default so
// a title that calls them in a tight loop cannot flood the terminal.
macro_rules! stub {
    ($map:ident, $name:literal, $ret:expr) => {
        reg($map, $name, |w, _, _, _| {
            w.warn_limited("stub", $name, concat!($name, " is stubbed"));
            Ok($ret)
        });
    };
}

pub fn register(map: &mut HashMap<&'static str, BuiltinFn>) {
    // Files and INI persistence.
    stub!(map, "file_exists", Value::bool(false));
    stub!(map, "file_delete", Value::bool(false));
    stub!(map, "directory_exists", Value::bool(false));
    stub!(map, "file_text_open_read", Value::Real(-1.0));
    stub!(map, "file_text_open_write", Value::Real(-1.0));
    stub!(map, "file_text_close", Value::Real(0.0));
    stub!(map, "file_text_read_string", Value::string(""));
    stub!(map, "file_text_read_real", Value::Real(0.0));
    stub!(map, "file_text_readln", Value::string(""));
    stub!(map, "file_text_eof", Value::bool(true));
    stub!(map, "file_text_write_string", Value::Real(0.0));
    stub!(map, "file_text_write_real", Value::Real(0.0));
    stub!(map, "file_text_writeln", Value::Real(0.0));
    stub!(map, "ini_open", Value::Real(0.0));
    stub!(map, "ini_close", Value::string(""));
    stub!(map, "ini_section_exists", Value::bool(false));
    stub!(map, "ini_key_exists", Value::bool(false));
    stub!(map, "ini_write_real", Value::Real(0.0));
    stub!(map, "ini_write_string", Value::Real(0.0));
    reg(map, "ini_read_real", |w, _, _, a| {
        w.warn_limited("stub", "ini_read_real", "ini_read_real is stubbed");
        Ok(a.get(2).cloned().unwrap_or(Value::Real(0.0)))
    });
    reg(map, "ini_read_string", |w, _, _, a| {
        w.warn_limited("stub", "ini_read_string", "ini_read_string is stubbed");
        Ok(a.get(2).cloned().unwrap_or_else(|| Value::string("")))
    });

    // Legacy sound api.
    stub!(map, "sound_play", Value::Real(0.0));
    stub!(map, "sound_loop", Value::Real(0.0));
    stub!(map, "sound_stop", Value::Real(0.0));
    stub!(map, "sound_stop_all", Value::Real(0.0));
    stub!(map, "sound_volume", Value::Real(0.0));
    stub!(map, "sound_isplaying", Value::bool(false));

    // Studio audio api.
    stub!(map, "audio_play_sound", Value::Real(-1.0));
    stub!(map, "audio_stop_sound", Value::Real(0.0));
    stub!(map, "audio_stop_all", Value::Real(0.0));
    stub!(map, "audio_pause_sound", Value::Real(0.0));
    stub!(map, "audio_resume_sound", Value::Real(0.0));
    stub!(map, "audio_sound_gain", Value::Real(0.0));
    stub!(map, "audio_sound_pitch", Value::Real(0.0));
    stub!(map, "audio_is_playing", Value::bool(false));

    // The external streaming library the target title ships with.
    stub!(map, "caster_load", Value::Real(-1.0));
    stub!(map, "caster_free", Value::Real(0.0));
    stub!(map, "caster_play", Value::Real(0.0));
    stub!(map, "caster_loop", Value::Real(0.0));
    stub!(map, "caster_stop", Value::Real(0.0));
    stub!(map, "caster_pause", Value::Real(0.0));
    stub!(map, "caster_resume", Value::Real(0.0));
    stub!(map, "caster_set_volume", Value::Real(0.0));
    stub!(map, "caster_get_volume", Value::Real(1.0));
    stub!(map, "caster_is_playing", Value::bool(false));
}
