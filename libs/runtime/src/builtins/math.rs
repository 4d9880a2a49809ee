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
use super::{arg, real, reg, BuiltinFn};
use crate::World;
use anyhow::Result;
use gml::Value;
use std::collections::HashMap;

pub fn register(map: &mut HashMap<&'static str, BuiltinFn>) {
    reg(map, "abs", |_, _, _, a| Ok(Value::Real(real(a, 0)?.abs())));
    reg(map, "sign", |_, _, _, a| {
        let v = real(a, 0)?;
        Ok(Value::Real(if v > 0.0 {
            1.0
        } else if v < 0.0 {
            -1.0
        } else {
            0.0
        }))
    });
    reg(map, "floor", |_, _, _, a| Ok(Value::Real(real(a, 0)?.floor())));
    reg(map, "ceil", |_, _, _, a| Ok(Value::Real(real(a, 0)?.ceil())));
    reg(map, "round", |_, _, _, a| Ok(Value::Real(round_half_even(real(a, 0)?))));
    reg(map, "frac", |_, _, _, a| Ok(Value::Real(real(a, 0)?.fract())));
    reg(map, "sqrt", |_, _, _, a| Ok(Value::Real(real(a, 0)?.sqrt())));
    reg(map, "sqr", |_, _, _, a| {
        let v = real(a, 0)?;
        Ok(Value::Real(v * v))
    });
    reg(map, "power", |_, _, _, a| {
        Ok(Value::Real(real(a, 0)?.powf(real(a, 1)?)))
    });
    reg(map, "exp", |_, _, _, a| Ok(Value::Real(real(a, 0)?.exp())));
    reg(map, "ln", |_, _, _, a| Ok(Value::Real(real(a, 0)?.ln())));
    reg(map, "log2", |_, _, _, a| Ok(Value::Real(real(a, 0)?.log2())));
    reg(map, "log10", |_, _, _, a| Ok(Value::Real(real(a, 0)?.log10())));
    reg(map, "sin", |_, _, _, a| Ok(Value::Real(real(a, 0)?.sin())));
    reg(map, "cos", |_, _, _, a| Ok(Value::Real(real(a, 0)?.cos())));
    reg(map, "tan", |_, _, _, a| Ok(Value::Real(real(a, 0)?.tan())));
    reg(map, "arcsin", |_, _, _, a| Ok(Value::Real(real(a, 0)?.asin())));
    reg(map, "arccos", |_, _, _, a| Ok(Value::Real(real(a, 0)?.acos())));
    reg(map, "arctan", |_, _, _, a| Ok(Value::Real(real(a, 0)?.atan())));
    reg(map, "arctan2", |_, _, _, a| {
        Ok(Value::Real(real(a, 0)?.atan2(real(a, 1)?)))
    });
    reg(map, "degtorad", |_, _, _, a| {
        Ok(Value::Real(real(a, 0)?.to_radians()))
    });
    reg(map, "radtodeg", |_, _, _, a| {
        Ok(Value::Real(real(a, 0)?.to_degrees()))
    });
    reg(map, "min", min_of);
    reg(map, "max", max_of);
    reg(map, "clamp", |_, _, _, a| {
        Ok(Value::Real(real(a, 0)?.clamp(real(a, 1)?, real(a, 2)?)))
    });
    reg(map, "lerp", |_, _, _, a| {
        let (x, y, t) = (real(a, 0)?, real(a, 1)?, real(a, 2)?);
        Ok(Value::Real(x + (y - x) * t))
    });
    reg(map, "random", |w, _, _, a| {
        Ok(Value::Real(w.rng.f64() * real(a, 0)?))
    });
    reg(map, "random_range", |w, _, _, a| {
        let (lo, hi) = (real(a, 0)?, real(a, 1)?);
        Ok(Value::Real(lo + w.rng.f64() * (hi - lo)))
    });
    reg(map, "irandom", |w, _, _, a| {
        let n = real(a, 0)?.floor();
        Ok(Value::Real((w.rng.f64() * (n + 1.0)).floor()))
    });
    reg(map, "irandom_range", |w, _, _, a| {
        let (lo, hi) = (real(a, 0)?.floor(), real(a, 1)?.floor());
        Ok(Value::Real(lo + (w.rng.f64() * (hi - lo + 1.0)).floor()))
    });
    reg(map, "random_set_seed", |w, _, _, a| {
        w.reseed(real(a, 0)? as i64 as u64);
        Ok(Value::Real(0.0))
    });
    reg(map, "random_get_seed", |w, _, _, _| {
        Ok(Value::Real(w.rng_seed as i64 as f64))
    });
    reg(map, "randomize", |w, _, _, _| {
        // Derive a fresh seed from the deterministic stream itself so that
        // replays with the same starting seed stay reproducible.
        let seed = w.rng.u64(..);
        w.reseed(seed);
        Ok(Value::Real(0.0))
    });
    reg(map, "choose", |w, _, _, a| {
        if a.is_empty() {
            return Ok(Value::Undefined);
        }
        Ok(arg(a, w.rng.usize(..a.len())))
    });
    reg(map, "point_distance", |_, _, _, a| {
        let (x1, y1, x2, y2) = (real(a, 0)?, real(a, 1)?, real(a, 2)?, real(a, 3)?);
        Ok(Value::Real((x2 - x1).hypot(y2 - y1)))
    });
    reg(map, "point_direction", |_, _, _, a| {
        let (x1, y1, x2, y2) = (real(a, 0)?, real(a, 1)?, real(a, 2)?, real(a, 3)?);
        Ok(Value::Real((-(y2 - y1)).atan2(x2 - x1).to_degrees().rem_euclid(360.0)))
    });
    reg(map, "lengthdir_x", |_, _, _, a| {
        Ok(Value::Real(real(a, 0)? * real(a, 1)?.to_radians().cos()))
    });
    reg(map, "lengthdir_y", |_, _, _, a| {
        Ok(Value::Real(-(real(a, 0)? * real(a, 1)?.to_radians().sin())))
    });
    reg(map, "dot_product", |_, _, _, a| {
        Ok(Value::Real(real(a, 0)? * real(a, 2)? + real(a, 1)? * real(a, 3)?))
    });
    reg(map, "angle_difference", |_, _, _, a| {
        let d = (real(a, 0)? - real(a, 1)?).rem_euclid(360.0);
        Ok(Value::Real(if d > 180.0 { d - 360.0 } else { d }))
    });
    reg(map, "median", median);
    reg(map, "mean", |_, _, _, a| {
        if a.is_empty() {
            return Ok(Value::Real(0.0));
        }
        let mut sum = 0.0;
        for i in 0..a.len() {
            sum += real(a, i)?;
        }
        Ok(Value::Real(sum / a.len() as f64))
    });
}

/// The source rounds ties to even, which scripts notice around sprite
/// subimage math.
fn round_half_even(v: f64) -> f64 {
    let floor = v.floor();
    let diff = v - floor;
    if (diff - 0.5).abs() < f64::EPSILON {
        if (floor as i64) % 2 == 0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        v.round()
    }
}

fn min_of(_: &mut World, _: i64, _: i64, a: &[Value]) -> Result<Value> {
    let mut best = f64::INFINITY;
    for i in 0..a.len() {
        best = best.min(real(a, i)?);
    }
    Ok(Value::Real(if a.is_empty() { 0.0 } else { best }))
}

fn max_of(_: &mut World, _: i64, _: i64, a: &[Value]) -> Result<Value> {
    let mut best = f64::NEG_INFINITY;
    for i in 0..a.len() {
        best = best.max(real(a, i)?);
    }
    Ok(Value::Real(if a.is_empty() { 0.0 } else { best }))
}

fn median(_: &mut World, _: i64, _: i64, a: &[Value]) -> Result<Value> {
    if a.is_empty() {
        return Ok(Value::Real(0.0));
    }
    let mut values = Vec::with_capacity(a.len());
    for i in 0..a.len() {
        values.push(real(a, i)?);
    }
    values.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));
    Ok(Value::Real(values[values.len() / 2]))
}
