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
use super::{int, real, reg, text, BuiltinFn};
use crate::World;
use anyhow::Result;
use gml::Value;
use render::{Align, Color};
use std::collections::HashMap;

pub fn register(map: &mut HashMap<&'static str, BuiltinFn>) {
    reg(map, "draw_set_color", |w, _, _, a| {
        w.draw.color = real(a, 0)? as i64 as u32;
        Ok(Value::Real(0.0))
    });
    reg(map, "draw_set_colour", |w, _, _, a| {
        w.draw.color = real(a, 0)? as i64 as u32;
        Ok(Value::Real(0.0))
    });
    reg(map, "draw_get_color", |w, _, _, _| {
        Ok(Value::Real(f64::from(w.draw.color)))
    });
    reg(map, "draw_set_alpha", |w, _, _, a| {
        w.draw.alpha = real(a, 0)?.clamp(0.0, 1.0);
        Ok(Value::Real(0.0))
    });
    reg(map, "draw_get_alpha", |w, _, _, _| {
        Ok(Value::Real(w.draw.alpha))
    });
    reg(map, "draw_set_font", |w, _, _, a| {
        w.draw.font = int(a, 0)?;
        Ok(Value::Real(0.0))
    });
    reg(map, "draw_set_halign", |w, _, _, a| {
        w.draw.halign = Align::from_i32(int(a, 0)?);
        Ok(Value::Real(0.0))
    });
    reg(map, "draw_set_valign", |w, _, _, a| {
        w.draw.valign = Align::from_i32(int(a, 0)?);
        Ok(Value::Real(0.0))
    });
    reg(map, "make_color_rgb", make_color_rgb);
    reg(map, "make_colour_rgb", make_color_rgb);
    reg(map, "merge_color", merge_color);
    reg(map, "merge_colour", merge_color);
    reg(map, "color_get_red", |_, _, _, a| {
        Ok(Value::Real(f64::from(real(a, 0)? as i64 as u32 & 0xFF)))
    });
    reg(map, "color_get_green", |_, _, _, a| {
        Ok(Value::Real(f64::from((real(a, 0)? as i64 as u32 >> 8) & 0xFF)))
    });
    reg(map, "color_get_blue", |_, _, _, a| {
        Ok(Value::Real(f64::from((real(a, 0)? as i64 as u32 >> 16) & 0xFF)))
    });

    reg(map, "draw_sprite", |w, s, _, a| {
        let sprite = int(a, 0)?;
        let subimg = resolve_subimg(w, s, real(a, 1)?);
        let alpha = w.draw.alpha;
        draw_sprite_frame(
            w,
            sprite,
            subimg,
            real(a, 2)?,
            real(a, 3)?,
            1.0,
            1.0,
            0.0,
            0x00FF_FFFF,
            alpha,
        );
        Ok(Value::Real(0.0))
    });
    reg(map, "draw_sprite_ext", |w, s, _, a| {
        let sprite = int(a, 0)?;
        let subimg = resolve_subimg(w, s, real(a, 1)?);
        draw_sprite_frame(
            w,
            sprite,
            subimg,
            real(a, 2)?,
            real(a, 3)?,
            real(a, 4)?,
            real(a, 5)?,
            real(a, 6)?,
            real(a, 7)? as i64 as u32,
            real(a, 8)?,
        );
        Ok(Value::Real(0.0))
    });
    reg(map, "draw_self", |w, s, _, _| {
        if s >= 0 {
            default_draw(w, s as u32);
        }
        Ok(Value::Real(0.0))
    });
    reg(map, "draw_background", |w, _, _, a| {
        let index = int(a, 0)?;
        let (x, y) = (real(a, 1)?, real(a, 2)?);
        let assets = w.assets.clone();
        if index >= 0 && (index as usize) < assets.backgrounds.len() {
            let region = assets.regions[assets.backgrounds[index as usize].region as usize];
            let page = &assets.textures[region.page as usize];
            w.canvas
                .draw_frame(page, &region, x, y, 0.0, 0.0, 1.0, 1.0, 0.0, render::WHITE);
        }
        Ok(Value::Real(0.0))
    });

    reg(map, "draw_text", |w, _, _, a| {
        let (x, y) = (real(a, 0)?, real(a, 1)?);
        let s = text(a, 2)?;
        draw_text_at(w, x, y, &s);
        Ok(Value::Real(0.0))
    });
    reg(map, "draw_text_ext", |w, _, _, a| {
        // Separation and width are accepted but text wraps only on explicit
        // newlines, as the rest of the renderer does.
        let (x, y) = (real(a, 0)?, real(a, 1)?);
        let s = text(a, 2)?;
        draw_text_at(w, x, y, &s);
        Ok(Value::Real(0.0))
    });
    reg(map, "string_width", |w, _, _, a| {
        let s = prepare_text(&text(a, 0)?);
        let assets = w.assets.clone();
        Ok(Value::Real(match font_of(w) {
            Some(font) => render::measure(&assets.fonts[font], &s).0,
            None => 0.0,
        }))
    });
    reg(map, "string_height", |w, _, _, a| {
        let s = prepare_text(&text(a, 0)?);
        let assets = w.assets.clone();
        Ok(Value::Real(match font_of(w) {
            Some(font) => render::measure(&assets.fonts[font], &s).1,
            None => 0.0,
        }))
    });

    reg(map, "draw_rectangle", |w, _, _, a| {
        let (x1, y1, x2, y2) = (real(a, 0)?, real(a, 1)?, real(a, 2)?, real(a, 3)?);
        let outline = a.get(4).map(|v| v.to_bool()).transpose()?.unwrap_or(false);
        let color = pen(w);
        if outline {
            w.canvas.draw_line(x1, y1, x2, y1, color);
            w.canvas.draw_line(x2, y1, x2, y2, color);
            w.canvas.draw_line(x2, y2, x1, y2, color);
            w.canvas.draw_line(x1, y2, x1, y1, color);
        } else {
            w.canvas.fill_rect(x1, y1, x2, y2, color);
        }
        Ok(Value::Real(0.0))
    });
    reg(map, "draw_line", |w, _, _, a| {
        let color = pen(w);
        w.canvas
            .draw_line(real(a, 0)?, real(a, 1)?, real(a, 2)?, real(a, 3)?, color);
        Ok(Value::Real(0.0))
    });
    reg(map, "draw_point", |w, _, _, a| {
        let color = pen(w);
        w.canvas.draw_point(real(a, 0)?, real(a, 1)?, color);
        Ok(Value::Real(0.0))
    });
    reg(map, "draw_circle", |w, _, _, a| {
        let (cx, cy, r) = (real(a, 0)?, real(a, 1)?, real(a, 2)?);
        let outline = a.get(3).map(|v| v.to_bool()).transpose()?.unwrap_or(false);
        let color = pen(w);
        if outline {
            let steps = (r.abs().max(4.0) * 4.0) as i32;
            for i in 0..steps {
                let t0 = f64::from(i) / f64::from(steps) * std::f64::consts::TAU;
                let t1 = f64::from(i + 1) / f64::from(steps) * std::f64::consts::TAU;
                w.canvas.draw_line(
                    cx + r * t0.cos(),
                    cy + r * t0.sin(),
                    cx + r * t1.cos(),
                    cy + r * t1.sin(),
                    color,
                );
            }
        } else {
            let ir = r.abs().ceil() as i32;
            for dy in -ir..=ir {
                let half = (r * r - f64::from(dy) * f64::from(dy)).max(0.0).sqrt();
                w.canvas
                    .draw_line(cx - half, cy + f64::from(dy), cx + half, cy + f64::from(dy), color);
            }
        }
        Ok(Value::Real(0.0))
    });
    reg(map, "draw_set_blend_mode", |w, _, _, _| {
        w.warn_limited("draw", "blend-mode", "draw_set_blend_mode is not supported");
        Ok(Value::Real(0.0))
    });
}

fn make_color_rgb(_: &mut World, _: i64, _: i64, a: &[Value]) -> Result<Value> {
    let (r, g, b) = (int(a, 0)?, int(a, 1)?, int(a, 2)?);
    Ok(Value::Real(f64::from(
        (r as u32 & 0xFF) | ((g as u32 & 0xFF) << 8) | ((b as u32 & 0xFF) << 16),
    )))
}

fn merge_color(_: &mut World, _: i64, _: i64, a: &[Value]) -> Result<Value> {
    let c1 = real(a, 0)? as i64 as u32;
    let c2 = real(a, 1)? as i64 as u32;
    let t = real(a, 2)?.clamp(0.0, 1.0);
    let mix = |x: u32, y: u32| -> u32 {
        (f64::from(x) + (f64::from(y) - f64::from(x)) * t).round() as u32 & 0xFF
    };
    Ok(Value::Real(f64::from(
        mix(c1 & 0xFF, c2 & 0xFF)
            | (mix((c1 >> 8) & 0xFF, (c2 >> 8) & 0xFF) << 8)
            | (mix((c1 >> 16) & 0xFF, (c2 >> 16) & 0xFF) << 16),
    )))
}

fn pen(world: &World) -> Color {
    Color::from_gm(world.draw.color).with_alpha(world.draw.alpha)
}

fn font_of(world: &World) -> Option<usize> {
    let font = world.draw.font;
    if font >= 0 && (font as usize) < world.assets.fonts.len() {
        Some(font as usize)
    } else {
        None
    }
}

/// The legacy text path treats '#' as a line break.
fn prepare_text(s: &str) -> String {
    s.replace('#', "\n")
}

fn draw_text_at(world: &mut World, x: f64, y: f64, s: &str) {
    let assets = world.assets.clone();
    let Some(font_index) = font_of(world) else {
        world.warn_limited("draw", "no-font", "draw_text with no font selected");
        return;
    };
    let font = &assets.fonts[font_index];
    let region = assets.regions[font.region as usize];
    let page = &assets.textures[region.page as usize];
    let color = pen(world);
    let (halign, valign) = (world.draw.halign, world.draw.valign);
    render::draw_string(
        &mut world.canvas,
        page,
        &region,
        font,
        x,
        y,
        &prepare_text(s),
        halign,
        valign,
        color,
    );
}

fn resolve_subimg(world: &World, self_id: i64, subimg: f64) -> f64 {
    if subimg >= 0.0 {
        return subimg;
    }
    if self_id >= 0 {
        if let Some(inst) = world.instances.get(&(self_id as u32)) {
            return inst.image_index;
        }
    }
    0.0
}

#[allow(clippy::too_many_arguments)]
fn draw_sprite_frame(
    world: &mut World,
    sprite: i32,
    subimg: f64,
    x: f64,
    y: f64,
    xscale: f64,
    yscale: f64,
    angle: f64,
    blend: u32,
    alpha: f64,
) {
    let assets = world.assets.clone();
    if sprite < 0 || sprite as usize >= assets.sprites.len() {
        return;
    }
    let spr = &assets.sprites[sprite as usize];
    let count = spr.frame_count() as i64;
    if count == 0 {
        return;
    }
    let frame = (subimg.floor() as i64).rem_euclid(count) as usize;
    let region = assets.regions[spr.frames[frame] as usize];
    let page = &assets.textures[region.page as usize];
    world.canvas.draw_frame(
        page,
        &region,
        x,
        y,
        f64::from(spr.origin_x),
        f64::from(spr.origin_y),
        xscale,
        yscale,
        angle,
        Color::from_gm(blend).with_alpha(alpha),
    );
}

/// The default draw used when an instance has no Draw handler: the current
/// frame at the instance position, modulated by its blend and alpha.
pub(crate) fn default_draw(world: &mut World, id: u32) {
    let Some(inst) = world.instances.get(&id) else {
        return;
    };
    let (sprite, subimg, x, y, xs, ys, angle, blend, alpha) = (
        inst.sprite_index,
        inst.image_index,
        inst.x,
        inst.y,
        inst.image_xscale,
        inst.image_yscale,
        inst.image_angle,
        inst.image_blend,
        inst.image_alpha,
    );
    draw_sprite_frame(world, sprite, subimg, x, y, xs, ys, angle, blend, alpha);
}
