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
use anyhow::Result;
use gamedata::GameData;
use gml::Value;
use std::collections::HashMap;

/// The first id handed out; room-placed and scripted instances share the
/// same counter, so ids never collide within a run.
pub const FIRST_INSTANCE_ID: u32 = 100_001;

/// Built-in instance properties intercepted before the per-instance slot
/// bag. Keyed by variable table slot at load, so the VM's variable ops
/// need no name lookups on the hot path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuiltinVar {
    X,
    Y,
    XPrevious,
    YPrevious,
    XStart,
    YStart,
    HSpeed,
    VSpeed,
    Direction,
    Speed,
    Friction,
    Gravity,
    GravityDirection,
    SpriteIndex,
    ImageIndex,
    ImageSpeed,
    ImageXScale,
    ImageYScale,
    ImageAngle,
    ImageBlend,
    ImageAlpha,
    ImageNumber,
    MaskIndex,
    Depth,
    Visible,
    Solid,
    Persistent,
    ObjectIndex,
    Id,
    Alarm,
    SpriteWidth,
    SpriteHeight,
    BboxLeft,
    BboxRight,
    BboxTop,
    BboxBottom,
    PathIndex,
    PathPosition,
    PathSpeed,
    PathEndAction,
}

impl BuiltinVar {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "x" => BuiltinVar::X,
            "y" => BuiltinVar::Y,
            "xprevious" => BuiltinVar::XPrevious,
            "yprevious" => BuiltinVar::YPrevious,
            "xstart" => BuiltinVar::XStart,
            "ystart" => BuiltinVar::YStart,
            "hspeed" => BuiltinVar::HSpeed,
            "vspeed" => BuiltinVar::VSpeed,
            "direction" => BuiltinVar::Direction,
            "speed" => BuiltinVar::Speed,
            "friction" => BuiltinVar::Friction,
            "gravity" => BuiltinVar::Gravity,
            "gravity_direction" => BuiltinVar::GravityDirection,
            "sprite_index" => BuiltinVar::SpriteIndex,
            "image_index" => BuiltinVar::ImageIndex,
            "image_speed" => BuiltinVar::ImageSpeed,
            "image_xscale" => BuiltinVar::ImageXScale,
            "image_yscale" => BuiltinVar::ImageYScale,
            "image_angle" => BuiltinVar::ImageAngle,
            "image_blend" => BuiltinVar::ImageBlend,
            "image_alpha" => BuiltinVar::ImageAlpha,
            "image_number" => BuiltinVar::ImageNumber,
            "mask_index" => BuiltinVar::MaskIndex,
            "depth" => BuiltinVar::Depth,
            "visible" => BuiltinVar::Visible,
            "solid" => BuiltinVar::Solid,
            "persistent" => BuiltinVar::Persistent,
            "object_index" => BuiltinVar::ObjectIndex,
            "id" => BuiltinVar::Id,
            "alarm" => BuiltinVar::Alarm,
            "sprite_width" => BuiltinVar::SpriteWidth,
            "sprite_height" => BuiltinVar::SpriteHeight,
            "bbox_left" => BuiltinVar::BboxLeft,
            "bbox_right" => BuiltinVar::BboxRight,
            "bbox_top" => BuiltinVar::BboxTop,
            "bbox_bottom" => BuiltinVar::BboxBottom,
            "path_index" => BuiltinVar::PathIndex,
            "path_position" => BuiltinVar::PathPosition,
            "path_speed" => BuiltinVar::PathSpeed,
            "path_endaction" => BuiltinVar::PathEndAction,
            _ => return None,
        })
    }
}

/// A live entity derived from an OBJT definition. All VM visible handles
/// are ids into the world's instance table, never references.
#[derive(Clone, Debug)]
pub struct Instance {
    pub id: u32,
    pub object_index: u32,
    pub x: f64,
    pub y: f64,
    pub xprevious: f64,
    pub yprevious: f64,
    pub xstart: f64,
    pub ystart: f64,
    pub sprite_index: i32,
    pub image_index: f64,
    pub image_speed: f64,
    pub image_xscale: f64,
    pub image_yscale: f64,
    pub image_angle: f64,
    /// Blend color in the source's r | g<<8 | b<<16 layout.
    pub image_blend: u32,
    pub image_alpha: f64,
    pub mask_index: i32,
    pub depth: f64,
    pub direction: f64,
    pub speed: f64,
    pub hspeed: f64,
    pub vspeed: f64,
    pub gravity: f64,
    pub gravity_direction: f64,
    pub friction: f64,
    pub solid: bool,
    pub visible: bool,
    pub persistent: bool,
    /// -1 = inactive. Counters tick down in the alarm phase and fire on
    /// the 1 -> 0 transition.
    pub alarms: [i32; 12],
    pub path_index: i32,
    pub path_position: f64,
    pub path_speed: f64,
    pub path_end_action: i32,
    /// Deferred destruction: still addressable until the flush boundary.
    pub destroyed: bool,
    /// False until the (possibly deferred) Create event has fired; the
    /// phase walks skip such instances so Create always precedes Step.
    pub created: bool,
    /// Instance variables by variable table slot.
    pub vars: HashMap<u32, Value>,
}

impl Instance {
    pub fn new(id: u32, object_index: u32, x: f64, y: f64, assets: &GameData) -> Self {
        let object = &assets.objects[object_index as usize];
        Self {
            id,
            object_index,
            x,
            y,
            xprevious: x,
            yprevious: y,
            xstart: x,
            ystart: y,
            sprite_index: object.sprite_index,
            image_index: 0.0,
            image_speed: 1.0,
            image_xscale: 1.0,
            image_yscale: 1.0,
            image_angle: 0.0,
            image_blend: 0x00FF_FFFF,
            image_alpha: 1.0,
            mask_index: object.mask,
            depth: f64::from(object.depth),
            direction: 0.0,
            speed: 0.0,
            hspeed: 0.0,
            vspeed: 0.0,
            gravity: 0.0,
            gravity_direction: 270.0,
            friction: 0.0,
            solid: object.solid,
            visible: object.visible,
            persistent: object.persistent,
            alarms: [-1; 12],
            path_index: -1,
            path_position: 0.0,
            path_speed: 0.0,
            path_end_action: 0,
            destroyed: false,
            created: false,
            vars: HashMap::new(),
        }
    }

    fn sync_from_components(&mut self) {
        self.speed = self.hspeed.hypot(self.vspeed);
        if self.speed != 0.0 {
            self.direction = (-self.vspeed).atan2(self.hspeed).to_degrees().rem_euclid(360.0);
        }
    }

    fn sync_from_polar(&mut self) {
        let rad = self.direction.to_radians();
        self.hspeed = rad.cos() * self.speed;
        self.vspeed = -rad.sin() * self.speed;
    }

    /// The sprite used for collision: the mask when set, else the sprite.
    pub fn collision_sprite(&self) -> i32 {
        if self.mask_index >= 0 {
            self.mask_index
        } else {
            self.sprite_index
        }
    }

    // Scripts can assign any number to sprite_index, so every table access
    // bounds checks.
    fn sprite_at<'a>(assets: &'a GameData, index: i32) -> Option<&'a gamedata::Sprite> {
        if index < 0 {
            return None;
        }
        assets.sprites.get(index as usize)
    }

    /// Axis aligned bounds from the collision sprite's margins under the
    /// current scale. Sprite-less instances collide nowhere.
    pub fn bbox(&self, assets: &GameData) -> Option<(f64, f64, f64, f64)> {
        let sprite = Self::sprite_at(assets, self.collision_sprite())?;
        let x1 = self.x + (f64::from(sprite.margin_left) - f64::from(sprite.origin_x)) * self.image_xscale;
        let x2 = self.x
            + (f64::from(sprite.margin_right) + 1.0 - f64::from(sprite.origin_x)) * self.image_xscale;
        let y1 = self.y + (f64::from(sprite.margin_top) - f64::from(sprite.origin_y)) * self.image_yscale;
        let y2 = self.y
            + (f64::from(sprite.margin_bottom) + 1.0 - f64::from(sprite.origin_y)) * self.image_yscale;
        Some((x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2)))
    }

    /// Frame selection: floor(image_index) wrapped into the frame count,
    /// negatives wrapping positively.
    pub fn frame(&self, assets: &GameData) -> Option<u32> {
        let sprite = Self::sprite_at(assets, self.sprite_index)?;
        let count = sprite.frame_count() as i64;
        if count == 0 {
            return None;
        }
        let index = (self.image_index.floor() as i64).rem_euclid(count);
        Some(sprite.frames[index as usize])
    }

    /// Intercepted read of a built-in property.
    pub fn builtin(&self, var: BuiltinVar, assets: &GameData) -> Value {
        match var {
            BuiltinVar::X => self.x.into(),
            BuiltinVar::Y => self.y.into(),
            BuiltinVar::XPrevious => self.xprevious.into(),
            BuiltinVar::YPrevious => self.yprevious.into(),
            BuiltinVar::XStart => self.xstart.into(),
            BuiltinVar::YStart => self.ystart.into(),
            BuiltinVar::HSpeed => self.hspeed.into(),
            BuiltinVar::VSpeed => self.vspeed.into(),
            BuiltinVar::Direction => self.direction.into(),
            BuiltinVar::Speed => self.speed.into(),
            BuiltinVar::Friction => self.friction.into(),
            BuiltinVar::Gravity => self.gravity.into(),
            BuiltinVar::GravityDirection => self.gravity_direction.into(),
            BuiltinVar::SpriteIndex => f64::from(self.sprite_index).into(),
            BuiltinVar::ImageIndex => self.image_index.into(),
            BuiltinVar::ImageSpeed => self.image_speed.into(),
            BuiltinVar::ImageXScale => self.image_xscale.into(),
            BuiltinVar::ImageYScale => self.image_yscale.into(),
            BuiltinVar::ImageAngle => self.image_angle.into(),
            BuiltinVar::ImageBlend => f64::from(self.image_blend).into(),
            BuiltinVar::ImageAlpha => self.image_alpha.into(),
            BuiltinVar::ImageNumber => Self::sprite_at(assets, self.sprite_index)
                .map(|s| s.frame_count() as f64)
                .unwrap_or(0.0)
                .into(),
            BuiltinVar::MaskIndex => f64::from(self.mask_index).into(),
            BuiltinVar::Depth => self.depth.into(),
            BuiltinVar::Visible => self.visible.into(),
            BuiltinVar::Solid => self.solid.into(),
            BuiltinVar::Persistent => self.persistent.into(),
            BuiltinVar::ObjectIndex => f64::from(self.object_index).into(),
            BuiltinVar::Id => f64::from(self.id).into(),
            BuiltinVar::Alarm => f64::from(self.alarms[0]).into(),
            BuiltinVar::SpriteWidth => Self::sprite_at(assets, self.sprite_index)
                .map(|s| f64::from(s.width) * self.image_xscale)
                .unwrap_or(0.0)
                .into(),
            BuiltinVar::SpriteHeight => Self::sprite_at(assets, self.sprite_index)
                .map(|s| f64::from(s.height) * self.image_yscale)
                .unwrap_or(0.0)
                .into(),
            BuiltinVar::BboxLeft => self.bbox(assets).map(|b| b.0).unwrap_or(self.x).into(),
            BuiltinVar::BboxTop => self.bbox(assets).map(|b| b.1).unwrap_or(self.y).into(),
            BuiltinVar::BboxRight => self.bbox(assets).map(|b| b.2).unwrap_or(self.x).into(),
            BuiltinVar::BboxBottom => self.bbox(assets).map(|b| b.3).unwrap_or(self.y).into(),
            BuiltinVar::PathIndex => f64::from(self.path_index).into(),
            BuiltinVar::PathPosition => self.path_position.into(),
            BuiltinVar::PathSpeed => self.path_speed.into(),
            BuiltinVar::PathEndAction => f64::from(self.path_end_action).into(),
        }
    }

    /// Intercepted write. Speed and direction stay coherent with their
    /// cartesian components whichever side is written.
    pub fn set_builtin(&mut self, var: BuiltinVar, value: &Value) -> Result<()> {
        match var {
            BuiltinVar::X => self.x = value.to_real()?,
            BuiltinVar::Y => self.y = value.to_real()?,
            BuiltinVar::XPrevious => self.xprevious = value.to_real()?,
            BuiltinVar::YPrevious => self.yprevious = value.to_real()?,
            BuiltinVar::XStart => self.xstart = value.to_real()?,
            BuiltinVar::YStart => self.ystart = value.to_real()?,
            BuiltinVar::HSpeed => {
                self.hspeed = value.to_real()?;
                self.sync_from_components();
            }
            BuiltinVar::VSpeed => {
                self.vspeed = value.to_real()?;
                self.sync_from_components();
            }
            BuiltinVar::Direction => {
                self.direction = value.to_real()?.rem_euclid(360.0);
                self.sync_from_polar();
            }
            BuiltinVar::Speed => {
                self.speed = value.to_real()?;
                self.sync_from_polar();
            }
            BuiltinVar::Friction => self.friction = value.to_real()?,
            BuiltinVar::Gravity => self.gravity = value.to_real()?,
            BuiltinVar::GravityDirection => self.gravity_direction = value.to_real()?,
            BuiltinVar::SpriteIndex => self.sprite_index = value.to_i32()?,
            BuiltinVar::ImageIndex => self.image_index = value.to_real()?,
            BuiltinVar::ImageSpeed => self.image_speed = value.to_real()?,
            BuiltinVar::ImageXScale => self.image_xscale = value.to_real()?,
            BuiltinVar::ImageYScale => self.image_yscale = value.to_real()?,
            BuiltinVar::ImageAngle => self.image_angle = value.to_real()?,
            BuiltinVar::ImageBlend => self.image_blend = value.to_real()? as i64 as u32,
            BuiltinVar::ImageAlpha => self.image_alpha = value.to_real()?,
            BuiltinVar::MaskIndex => self.mask_index = value.to_i32()?,
            BuiltinVar::Depth => self.depth = value.to_real()?,
            BuiltinVar::Visible => self.visible = value.to_bool()?,
            BuiltinVar::Solid => self.solid = value.to_bool()?,
            BuiltinVar::Persistent => self.persistent = value.to_bool()?,
            BuiltinVar::Alarm => self.alarms[0] = value.to_i32()?,
            BuiltinVar::PathIndex => self.path_index = value.to_i32()?,
            BuiltinVar::PathPosition => self.path_position = value.to_real()?,
            BuiltinVar::PathSpeed => self.path_speed = value.to_real()?,
            BuiltinVar::PathEndAction => self.path_end_action = value.to_i32()?,
            // Read only properties: writes are dropped like the source does.
            BuiltinVar::SpriteWidth
            | BuiltinVar::SpriteHeight
            | BuiltinVar::BboxLeft
            | BuiltinVar::BboxRight
            | BuiltinVar::BboxTop
            | BuiltinVar::BboxBottom
            | BuiltinVar::ImageNumber
            | BuiltinVar::ObjectIndex
            | BuiltinVar::Id => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamedata::testkit::GameBuilder;

    #[test]
    fn image_index_wraps_modulo_frame_count() -> Result<()> {
        let mut b = GameBuilder::new();
        let spr = b.sprite("spr_anim", 2, 2, 0, 0);
        b.sprite_frames(spr, 2);
        let obj = b.object("obj_anim", spr as i32, -1);
        let game = b.build()?;

        let mut inst = Instance::new(FIRST_INSTANCE_ID, obj, 0.0, 0.0, &game);
        assert_eq!(inst.frame(&game), Some(0));
        inst.image_index = 3.0;
        assert_eq!(inst.frame(&game), Some(1));
        inst.image_index = -1.0;
        assert_eq!(inst.frame(&game), Some(1));
        inst.image_index = -2.0;
        assert_eq!(inst.frame(&game), Some(0));
        Ok(())
    }

    #[test]
    fn speed_and_direction_stay_coherent() -> Result<()> {
        let mut inst = test_instance();
        inst.set_builtin(BuiltinVar::HSpeed, &Value::Real(3.0))?;
        inst.set_builtin(BuiltinVar::VSpeed, &Value::Real(-4.0))?;
        assert!((inst.speed - 5.0).abs() < 1e-9);
        assert!((inst.direction - 53.13010235415598).abs() < 1e-6);

        inst.set_builtin(BuiltinVar::Direction, &Value::Real(180.0))?;
        assert!((inst.hspeed + 5.0).abs() < 1e-9);
        assert!(inst.vspeed.abs() < 1e-9);
        Ok(())
    }

    fn test_instance() -> Instance {
        Instance {
            id: FIRST_INSTANCE_ID,
            object_index: 0,
            x: 0.0,
            y: 0.0,
            xprevious: 0.0,
            yprevious: 0.0,
            xstart: 0.0,
            ystart: 0.0,
            sprite_index: -1,
            image_index: 0.0,
            image_speed: 1.0,
            image_xscale: 1.0,
            image_yscale: 1.0,
            image_angle: 0.0,
            image_blend: 0x00FF_FFFF,
            image_alpha: 1.0,
            mask_index: -1,
            depth: 0.0,
            direction: 0.0,
            speed: 0.0,
            hspeed: 0.0,
            vspeed: 0.0,
            gravity: 0.0,
            gravity_direction: 270.0,
            friction: 0.0,
            solid: false,
            visible: true,
            persistent: false,
            alarms: [-1; 12],
            path_index: -1,
            path_position: 0.0,
            path_speed: 0.0,
            path_end_action: 0,
            destroyed: false,
            created: true,
            vars: HashMap::new(),
        }
    }
}
