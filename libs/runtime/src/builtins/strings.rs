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
use super::{arg, int, reg, text, BuiltinFn};
use gml::{parse_real_prefix, Value};
use std::collections::HashMap;

/// Character positions are 1-based throughout; out-of-range reads yield
/// the empty string rather than erroring.
pub fn register(map: &mut HashMap<&'static str, BuiltinFn>) {
    reg(map, "string", |_, _, _, a| Ok(Value::from(text(a, 0)?)));
    reg(map, "real", |_, _, _, a| {
        Ok(Value::Real(match arg(a, 0) {
            Value::Str(s) => parse_real_prefix(&s),
            other => other.to_real()?,
        }))
    });
    reg(map, "chr", |_, _, _, a| {
        let code = int(a, 0)?.max(0) as u32;
        Ok(Value::from(
            char::from_u32(code).map(String::from).unwrap_or_default(),
        ))
    });
    reg(map, "ord", |_, _, _, a| {
        let s = text(a, 0)?;
        Ok(Value::Real(
            s.chars().next().map(|c| c as u32 as f64).unwrap_or(0.0),
        ))
    });
    reg(map, "string_length", |_, _, _, a| {
        Ok(Value::Real(text(a, 0)?.chars().count() as f64))
    });
    reg(map, "string_char_at", |_, _, _, a| {
        let s = text(a, 0)?;
        let i = int(a, 1)?;
        let out = if i >= 1 {
            s.chars().nth(i as usize - 1).map(String::from)
        } else {
            None
        };
        Ok(Value::from(out.unwrap_or_default()))
    });
    reg(map, "string_copy", |_, _, _, a| {
        let s: Vec<char> = text(a, 0)?.chars().collect();
        let i = int(a, 1)?;
        let n = int(a, 2)?.max(0) as usize;
        if i < 1 || i as usize > s.len() {
            return Ok(Value::string(""));
        }
        let from = i as usize - 1;
        let to = (from + n).min(s.len());
        Ok(Value::from(s[from..to].iter().collect::<String>()))
    });
    reg(map, "string_delete", |_, _, _, a| {
        let s: Vec<char> = text(a, 0)?.chars().collect();
        let i = int(a, 1)?;
        let n = int(a, 2)?.max(0) as usize;
        if i < 1 || i as usize > s.len() {
            return Ok(Value::from(s.iter().collect::<String>()));
        }
        let from = i as usize - 1;
        let to = (from + n).min(s.len());
        let mut out: String = s[..from].iter().collect();
        out.extend(&s[to..]);
        Ok(Value::from(out))
    });
    reg(map, "string_insert", |_, _, _, a| {
        let add = text(a, 0)?;
        let s: Vec<char> = text(a, 1)?.chars().collect();
        let i = (int(a, 2)?.max(1) as usize - 1).min(s.len());
        let mut out: String = s[..i].iter().collect();
        out.push_str(&add);
        out.extend(&s[i..]);
        Ok(Value::from(out))
    });
    reg(map, "string_pos", |_, _, _, a| {
        let needle = text(a, 0)?;
        let hay = text(a, 1)?;
        Ok(Value::Real(match hay.find(&needle) {
            Some(byte) => hay[..byte].chars().count() as f64 + 1.0,
            None => 0.0,
        }))
    });
    reg(map, "string_replace", |_, _, _, a| {
        let s = text(a, 0)?;
        let from = text(a, 1)?;
        let to = text(a, 2)?;
        Ok(Value::from(s.replacen(&from, &to, 1)))
    });
    reg(map, "string_replace_all", |_, _, _, a| {
        let s = text(a, 0)?;
        let from = text(a, 1)?;
        let to = text(a, 2)?;
        Ok(Value::from(s.replace(&from, &to)))
    });
    reg(map, "string_count", |_, _, _, a| {
        let needle = text(a, 0)?;
        let hay = text(a, 1)?;
        if needle.is_empty() {
            return Ok(Value::Real(0.0));
        }
        Ok(Value::Real(hay.matches(&needle).count() as f64))
    });
    reg(map, "string_lower", |_, _, _, a| {
        Ok(Value::from(text(a, 0)?.to_lowercase()))
    });
    reg(map, "string_upper", |_, _, _, a| {
        Ok(Value::from(text(a, 0)?.to_uppercase()))
    });
    reg(map, "string_repeat", |_, _, _, a| {
        let s = text(a, 0)?;
        let n = int(a, 1)?.max(0) as usize;
        Ok(Value::from(s.repeat(n)))
    });
    reg(map, "string_digits", |_, _, _, a| {
        Ok(Value::from(
            text(a, 0)?.chars().filter(|c| c.is_ascii_digit()).collect::<String>(),
        ))
    });
    reg(map, "string_letters", |_, _, _, a| {
        Ok(Value::from(
            text(a, 0)?
                .chars()
                .filter(|c| c.is_ascii_alphabetic())
                .collect::<String>(),
        ))
    });
    reg(map, "string_lettersdigits", |_, _, _, a| {
        Ok(Value::from(
            text(a, 0)?
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>(),
        ))
    });
    reg(map, "string_hash_to_newline", |_, _, _, a| {
        Ok(Value::from(text(a, 0)?.replace('#', "\n")))
    });

    // Type checks live with the coercion helpers.
    reg(map, "is_real", |_, _, _, a| {
        Ok(Value::bool(matches!(arg(a, 0), Value::Real(_))))
    });
    reg(map, "is_string", |_, _, _, a| {
        Ok(Value::bool(matches!(arg(a, 0), Value::Str(_))))
    });
    reg(map, "is_array", |_, _, _, a| {
        Ok(Value::bool(matches!(arg(a, 0), Value::Array(_))))
    });
    reg(map, "is_undefined", |_, _, _, a| {
        Ok(Value::bool(matches!(arg(a, 0), Value::Undefined)))
    });
    reg(map, "is_bool", |_, _, _, a| {
        Ok(Value::bool(matches!(arg(a, 0), Value::Real(v) if v == 0.0 || v == 1.0)))
    });
    reg(map, "array_length_1d", |_, _, _, a| {
        Ok(Value::Real(match arg(a, 0).as_array() {
            Some(arr) => f64::from(arr.row_width(0)),
            None => 0.0,
        }))
    });
    reg(map, "array_height_2d", |_, _, _, a| {
        Ok(Value::Real(match arg(a, 0).as_array() {
            Some(arr) => arr.height() as f64,
            None => 0.0,
        }))
    });
    reg(map, "array_length_2d", |_, _, _, a| {
        let row = int(a, 1)?;
        Ok(Value::Real(match arg(a, 0).as_array() {
            Some(arr) => f64::from(arr.row_width(row)),
            None => 0.0,
        }))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::World;
    use anyhow::Result;
    use std::collections::HashMap as Map;

    fn call(name: &str, args: &[Value]) -> Result<Value> {
        let mut map: Map<&'static str, BuiltinFn> = Map::new();
        register(&mut map);
        let f = map[name];
        // String builtins never touch the world, but the signature wants one.
        let mut world = World::new(
            std::rc::Rc::new(gamedata::testkit::minimal_game()),
            1,
        );
        f(&mut world, -4, -4, args)
    }

    #[test]
    fn copy_is_one_based_and_forgiving() -> Result<()> {
        let s = Value::string("hello");
        assert_eq!(
            call("string_copy", &[s.clone(), Value::Real(2.0), Value::Real(3.0)])?.to_display()?,
            "ell"
        );
        assert_eq!(
            call("string_copy", &[s.clone(), Value::Real(9.0), Value::Real(3.0)])?.to_display()?,
            ""
        );
        assert_eq!(
            call("string_copy", &[s, Value::Real(0.0), Value::Real(3.0)])?.to_display()?,
            ""
        );
        Ok(())
    }

    #[test]
    fn pos_and_count_find_substrings() -> Result<()> {
        assert_eq!(
            call("string_pos", &[Value::string("l"), Value::string("hello")])?.to_real()?,
            3.0
        );
        assert_eq!(
            call("string_pos", &[Value::string("z"), Value::string("hello")])?.to_real()?,
            0.0
        );
        assert_eq!(
            call("string_count", &[Value::string("l"), Value::string("hello")])?.to_real()?,
            2.0
        );
        Ok(())
    }

    #[test]
    fn hash_marks_become_newlines() -> Result<()> {
        assert_eq!(
            call("string_hash_to_newline", &[Value::string("a#b")])?.to_display()?,
            "a\nb"
        );
        Ok(())
    }
}
