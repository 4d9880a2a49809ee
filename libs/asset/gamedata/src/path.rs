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
use crate::strings::StringTable;
use anyhow::Result;
use form::Chunk;

#[derive(Clone, Copy, Debug)]
pub struct PathPoint {
    pub x: f32,
    pub y: f32,
    pub speed: f32,
}

#[derive(Clone, Debug)]
pub struct Path {
    pub name: u32,
    pub smooth: bool,
    pub closed: bool,
    pub precision: u32,
    pub points: Vec<PathPoint>,
}

impl Path {
    /// Linear position along the polyline, `t` in [0, 1]. Closed paths wrap
    /// back to the first point.
    pub fn at(&self, t: f64) -> (f64, f64) {
        if self.points.is_empty() {
            return (0.0, 0.0);
        }
        if self.points.len() == 1 {
            return (self.points[0].x as f64, self.points[0].y as f64);
        }
        let segs = if self.closed {
            self.points.len()
        } else {
            self.points.len() - 1
        };
        let t = t.clamp(0.0, 1.0) * segs as f64;
        let seg = (t.floor() as usize).min(segs - 1);
        let frac = t - seg as f64;
        let a = self.points[seg];
        let b = self.points[(seg + 1) % self.points.len()];
        (
            a.x as f64 + (b.x as f64 - a.x as f64) * frac,
            a.y as f64 + (b.y as f64 - a.y as f64) * frac,
        )
    }
}

pub fn parse_paths(chunk: &Chunk, strings: &StringTable) -> Result<Vec<Path>> {
    let mut r = chunk.reader();
    let count = r.read_u32()? as usize;
    let offsets = r.read_u32_table(count)?;
    let mut paths = Vec::with_capacity(count);
    for &offset in &offsets {
        r.seek_absolute(offset as usize)?;
        let name = strings.resolve(r.read_u32()?)?;
        let smooth = r.read_u32()? != 0;
        let closed = r.read_u32()? != 0;
        let precision = r.read_u32()?;
        let point_count = r.read_u32()? as usize;
        let mut points = Vec::with_capacity(point_count);
        for _ in 0..point_count {
            points.push(PathPoint {
                x: r.read_f32()?,
                y: r.read_f32()?,
                speed: r.read_f32()?,
            });
        }
        paths.push(Path {
            name,
            smooth,
            closed,
            precision,
            points,
        });
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_interpolates_open_paths() {
        let path = Path {
            name: 0,
            smooth: false,
            closed: false,
            precision: 4,
            points: vec![
                PathPoint {
                    x: 0.0,
                    y: 0.0,
                    speed: 100.0,
                },
                PathPoint {
                    x: 10.0,
                    y: 0.0,
                    speed: 100.0,
                },
            ],
        };
        assert_eq!(path.at(0.0), (0.0, 0.0));
        assert_eq!(path.at(0.5), (5.0, 0.0));
        assert_eq!(path.at(1.0), (10.0, 0.0));
    }

    #[test]
    fn it_wraps_closed_paths() {
        let path = Path {
            name: 0,
            smooth: false,
            closed: true,
            precision: 4,
            points: vec![
                PathPoint {
                    x: 0.0,
                    y: 0.0,
                    speed: 100.0,
                },
                PathPoint {
                    x: 8.0,
                    y: 0.0,
                    speed: 100.0,
                },
            ],
        };
        // Second half of a closed two point path returns home.
        assert_eq!(path.at(0.75), (4.0, 0.0));
    }
}
