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
use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, HashSet};

/// Virtual key codes as the source titles see them.
pub mod vk {
    pub const NOKEY: u32 = 0;
    pub const ANYKEY: u32 = 1;
    pub const BACKSPACE: u32 = 8;
    pub const TAB: u32 = 9;
    pub const ENTER: u32 = 13;
    pub const SHIFT: u32 = 16;
    pub const CONTROL: u32 = 17;
    pub const ALT: u32 = 18;
    pub const PAUSE: u32 = 19;
    pub const ESCAPE: u32 = 27;
    pub const SPACE: u32 = 32;
    pub const PAGEUP: u32 = 33;
    pub const PAGEDOWN: u32 = 34;
    pub const END: u32 = 35;
    pub const HOME: u32 = 36;
    pub const LEFT: u32 = 37;
    pub const UP: u32 = 38;
    pub const RIGHT: u32 = 39;
    pub const DOWN: u32 = 40;
    pub const INSERT: u32 = 45;
    pub const DELETE: u32 = 46;
    pub const F1: u32 = 112;
    pub const F12: u32 = 123;
}

/// Edge triggered keyboard state. The world samples one snapshot per frame;
/// everything the simulation sees for the rest of the frame is latched here,
/// which is what makes recorded runs reproducible.
#[derive(Clone, Debug, Default)]
pub struct InputState {
    held: HashSet<u32>,
    pressed: HashSet<u32>,
    released: HashSet<u32>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch transitions against the previous frame's held set.
    pub fn begin_frame(&mut self, now_held: &HashSet<u32>) {
        self.pressed = now_held.difference(&self.held).copied().collect();
        self.released = self.held.difference(now_held).copied().collect();
        self.held = now_held.clone();
    }

    pub fn check(&self, key: u32) -> bool {
        match key {
            vk::NOKEY => self.held.is_empty(),
            vk::ANYKEY => !self.held.is_empty(),
            _ => self.held.contains(&key),
        }
    }

    pub fn check_pressed(&self, key: u32) -> bool {
        match key {
            vk::NOKEY => self.pressed.is_empty(),
            vk::ANYKEY => !self.pressed.is_empty(),
            _ => self.pressed.contains(&key),
        }
    }

    pub fn check_released(&self, key: u32) -> bool {
        match key {
            vk::NOKEY => self.released.is_empty(),
            vk::ANYKEY => !self.released.is_empty(),
            _ => self.released.contains(&key),
        }
    }

    pub fn held_keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.held.iter().copied()
    }

    pub fn clear(&mut self) {
        self.held.clear();
        self.pressed.clear();
        self.released.clear();
    }
}

/// A keyboard recording: frame number to the set of keys held that frame.
/// Keys not listed for a frame are released. The on-disk format is JSON,
/// `{"events": {"<frame>": [key, ...]}}`.
#[derive(Clone, Debug, Default)]
pub struct Recording {
    pub events: BTreeMap<u64, Vec<u32>>,
}

impl Recording {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let parsed = json::parse(text)?;
        let mut events = BTreeMap::new();
        for (frame, keys) in parsed["events"].entries() {
            let frame: u64 = frame
                .parse()
                .map_err(|_| anyhow!("frame key {:?} is not a number", frame))?;
            let mut held = Vec::new();
            for key in keys.members() {
                held.push(
                    key.as_u32()
                        .ok_or_else(|| anyhow!("key code {} is not a number", key))?,
                );
            }
            events.insert(frame, held);
        }
        Ok(Self { events })
    }

    pub fn to_json_string(&self) -> String {
        let mut events = json::JsonValue::new_object();
        for (frame, keys) in &self.events {
            let mut arr = json::JsonValue::new_array();
            for &k in keys {
                arr.push(k).ok();
            }
            events[frame.to_string()] = arr;
        }
        let mut root = json::JsonValue::new_object();
        root["events"] = events;
        root.dump()
    }

    pub fn held_at(&self, frame: u64) -> HashSet<u32> {
        self.events
            .get(&frame)
            .map(|keys| keys.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Record one frame's held set; empty frames are elided.
    pub fn record(&mut self, frame: u64, held: &HashSet<u32>) {
        if !held.is_empty() {
            let mut keys: Vec<u32> = held.iter().copied().collect();
            keys.sort_unstable();
            self.events.insert(frame, keys);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_latch_once_per_transition() {
        let mut input = InputState::new();
        let enter: HashSet<u32> = [vk::ENTER].into_iter().collect();
        input.begin_frame(&enter);
        assert!(input.check(vk::ENTER));
        assert!(input.check_pressed(vk::ENTER));
        assert!(!input.check_released(vk::ENTER));
        assert!(input.check(vk::ANYKEY));

        input.begin_frame(&enter);
        assert!(input.check(vk::ENTER));
        assert!(!input.check_pressed(vk::ENTER));

        input.begin_frame(&HashSet::new());
        assert!(!input.check(vk::ENTER));
        assert!(input.check_released(vk::ENTER));
        assert!(input.check(vk::NOKEY));
    }

    #[test]
    fn recordings_round_trip_through_json() -> Result<()> {
        let mut rec = Recording::default();
        rec.record(60, &[vk::ENTER].into_iter().collect());
        rec.record(61, &[vk::ENTER, vk::DOWN].into_iter().collect());
        rec.record(62, &HashSet::new());

        let text = rec.to_json_string();
        let back = Recording::from_json_str(&text)?;
        assert_eq!(back.events, rec.events);
        assert_eq!(back.held_at(60), [vk::ENTER].into_iter().collect());
        assert!(back.held_at(62).is_empty());
        assert!(back.held_at(1000).is_empty());
        Ok(())
    }

    #[test]
    fn playback_matches_the_documented_format() -> Result<()> {
        let rec = Recording::from_json_str(r#"{"events": {"60": [13]}}"#)?;
        assert_eq!(rec.held_at(60), [13u32].into_iter().collect());
        Ok(())
    }
}
