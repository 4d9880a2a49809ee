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
use super::{arg, int, reg, BuiltinFn};
use crate::world::DsKey;
use gml::Value;
use std::collections::HashMap;

/// Integer-handle map and list stores. Operations on a dead handle warn
/// and return safe defaults rather than aborting the frame.
pub fn register(map: &mut HashMap<&'static str, BuiltinFn>) {
    reg(map, "ds_map_create", |w, _, _, _| {
        Ok(Value::Real(f64::from(w.ds.create_map())))
    });
    reg(map, "ds_map_destroy", |w, _, _, a| {
        let id = int(a, 0)?;
        if w.ds.maps.remove(&id).is_none() {
            w.warn_limited("ds_map", "destroy-dead", "ds_map_destroy of unknown map");
        }
        Ok(Value::Real(0.0))
    });
    reg(map, "ds_map_add", |w, _, _, a| {
        let id = int(a, 0)?;
        let key = DsKey::from_value(&arg(a, 1))?;
        let value = arg(a, 2);
        match w.ds.maps.get_mut(&id) {
            Some(m) => {
                // add does not replace an existing key.
                Ok(Value::bool(match m.entry(key) {
                    std::collections::hash_map::Entry::Vacant(e) => {
                        e.insert(value);
                        true
                    }
                    std::collections::hash_map::Entry::Occupied(_) => false,
                }))
            }
            None => {
                w.warn_limited("ds_map", "add-dead", "ds_map_add to unknown map");
                Ok(Value::bool(false))
            }
        }
    });
    reg(map, "ds_map_replace", |w, _, _, a| {
        let id = int(a, 0)?;
        let key = DsKey::from_value(&arg(a, 1))?;
        let value = arg(a, 2);
        if let Some(m) = w.ds.maps.get_mut(&id) {
            m.insert(key, value);
        }
        Ok(Value::Real(0.0))
    });
    reg(map, "ds_map_find_value", |w, _, _, a| {
        let id = int(a, 0)?;
        let key = DsKey::from_value(&arg(a, 1))?;
        Ok(w.ds
            .maps
            .get(&id)
            .and_then(|m| m.get(&key))
            .cloned()
            .unwrap_or(Value::Undefined))
    });
    reg(map, "ds_map_exists", |w, _, _, a| {
        let id = int(a, 0)?;
        let key = DsKey::from_value(&arg(a, 1))?;
        Ok(Value::bool(
            w.ds.maps.get(&id).map(|m| m.contains_key(&key)).unwrap_or(false),
        ))
    });
    reg(map, "ds_map_size", |w, _, _, a| {
        let id = int(a, 0)?;
        Ok(Value::Real(
            w.ds.maps.get(&id).map(|m| m.len() as f64).unwrap_or(0.0),
        ))
    });
    reg(map, "ds_map_clear", |w, _, _, a| {
        let id = int(a, 0)?;
        if let Some(m) = w.ds.maps.get_mut(&id) {
            m.clear();
        }
        Ok(Value::Real(0.0))
    });
    reg(map, "ds_map_delete", |w, _, _, a| {
        let id = int(a, 0)?;
        let key = DsKey::from_value(&arg(a, 1))?;
        if let Some(m) = w.ds.maps.get_mut(&id) {
            m.remove(&key);
        }
        Ok(Value::Real(0.0))
    });

    reg(map, "ds_list_create", |w, _, _, _| {
        Ok(Value::Real(f64::from(w.ds.create_list())))
    });
    reg(map, "ds_list_destroy", |w, _, _, a| {
        let id = int(a, 0)?;
        if w.ds.lists.remove(&id).is_none() {
            w.warn_limited("ds_list", "destroy-dead", "ds_list_destroy of unknown list");
        }
        Ok(Value::Real(0.0))
    });
    reg(map, "ds_list_add", |w, _, _, a| {
        let id = int(a, 0)?;
        if let Some(list) = w.ds.lists.get_mut(&id) {
            for v in &a[1..] {
                list.push(v.clone());
            }
        } else {
            w.warn_limited("ds_list", "add-dead", "ds_list_add to unknown list");
        }
        Ok(Value::Real(0.0))
    });
    reg(map, "ds_list_find_value", |w, _, _, a| {
        let id = int(a, 0)?;
        let pos = int(a, 1)?;
        Ok(w.ds
            .lists
            .get(&id)
            .and_then(|l| {
                if pos >= 0 {
                    l.get(pos as usize).cloned()
                } else {
                    None
                }
            })
            .unwrap_or(Value::Undefined))
    });
    reg(map, "ds_list_find_index", |w, _, _, a| {
        let id = int(a, 0)?;
        let needle = arg(a, 1);
        Ok(Value::Real(
            w.ds.lists
                .get(&id)
                .and_then(|l| l.iter().position(|v| v.loose_eq(&needle)))
                .map(|i| i as f64)
                .unwrap_or(-1.0),
        ))
    });
    reg(map, "ds_list_size", |w, _, _, a| {
        let id = int(a, 0)?;
        Ok(Value::Real(
            w.ds.lists.get(&id).map(|l| l.len() as f64).unwrap_or(0.0),
        ))
    });
    reg(map, "ds_list_clear", |w, _, _, a| {
        let id = int(a, 0)?;
        if let Some(l) = w.ds.lists.get_mut(&id) {
            l.clear();
        }
        Ok(Value::Real(0.0))
    });
    reg(map, "ds_list_delete", |w, _, _, a| {
        let id = int(a, 0)?;
        let pos = int(a, 1)?;
        if let Some(l) = w.ds.lists.get_mut(&id) {
            if pos >= 0 && (pos as usize) < l.len() {
                l.remove(pos as usize);
            }
        }
        Ok(Value::Real(0.0))
    });
}
