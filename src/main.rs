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
use anyhow::{anyhow, Context, Result};
use gamedata::{AssetRefError, GameData, LoadError};
use log::{error, info, warn};
use runtime::{input::vk, room, run_frame, Recording, TraceFilter, World};
use std::{
    collections::HashSet,
    fs,
    path::PathBuf,
    process,
    rc::Rc,
    time::{Duration, Instant},
};
use structopt::StructOpt;
use window::GameWindow;

/// Re-execute a GameMaker: Studio 1.x (bytecode 16) title from its shipped
/// data container.
#[derive(Debug, StructOpt)]
struct Opt {
    /// The data container to run
    #[structopt(default_value = "game.unx")]
    data: PathBuf,

    /// Verbose logging
    #[structopt(long)]
    debug: bool,

    /// Screenshot filename pattern; %s becomes the frame number
    #[structopt(long, default_value = "frame%s.png")]
    screenshot: String,

    /// Capture a screenshot at this frame; repeatable, implies headless
    #[structopt(long = "screenshot-at-frame")]
    screenshot_at_frame: Vec<u64>,

    /// Start in a specific room, by name or index
    #[structopt(long)]
    room: Option<String>,

    /// Print all room names and exit
    #[structopt(long = "list-rooms")]
    list_rooms: bool,

    /// Log event dispatch for instances of this object; repeatable
    #[structopt(long = "debug-obj")]
    debug_obj: Vec<String>,

    /// Trace calls to one function, or * for all
    #[structopt(long = "trace-calls")]
    trace_calls: Option<String>,

    /// Drop this function from call tracing; repeatable
    #[structopt(long = "ignore-function-traced-calls")]
    ignore_function_traced_calls: Vec<String>,

    /// Trace event dispatch for one object, or * for all
    #[structopt(long = "trace-events")]
    trace_events: Option<String>,

    /// Trace executed instructions for one code entry, or * for all
    #[structopt(long = "trace-instructions")]
    trace_instructions: Option<String>,

    /// Simulation speed multiplier
    #[structopt(long, default_value = "1")]
    speed: f64,

    /// Write the keys held each frame to this JSON file on exit
    #[structopt(long = "record-inputs")]
    record_inputs: Option<PathBuf>,

    /// Play keyboard input back from this JSON file
    #[structopt(long = "playback-inputs")]
    playback_inputs: Option<PathBuf>,

    /// Seed for the deterministic random stream
    #[structopt(long, default_value = "0")]
    seed: u64,

    /// Run without a window, as fast as possible
    #[structopt(long)]
    headless: bool,

    /// Stop after this many frames (headless runs)
    #[structopt(long = "max-frames")]
    max_frames: Option<u64>,
}

fn main() {
    let opt = Opt::from_args();
    let level = if opt.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&opt) {
        Ok(()) => {}
        Err(e) => {
            error!("{:#}", e);
            let code = if e.downcast_ref::<LoadError>().is_some()
                || e.downcast_ref::<AssetRefError>().is_some()
                || e.downcast_ref::<form::FormError>().is_some()
            {
                2
            } else {
                1
            };
            process::exit(code);
        }
    }
}

fn run(opt: &Opt) -> Result<()> {
    let bytes = fs::read(&opt.data)
        .with_context(|| format!("reading data container {}", opt.data.display()))?;
    let assets = Rc::new(GameData::from_bytes(&bytes)?);

    if opt.list_rooms {
        for room in &assets.rooms {
            println!("{}", assets.string(room.name));
        }
        return Ok(());
    }

    let mut world = World::new(assets.clone(), opt.seed);
    world.trace.calls = TraceFilter::from_arg(opt.trace_calls.clone());
    world.trace.events = TraceFilter::from_arg(opt.trace_events.clone());
    world.trace.instructions = TraceFilter::from_arg(opt.trace_instructions.clone());
    world.trace.ignore_calls = opt.ignore_function_traced_calls.iter().cloned().collect();
    world.trace.debug_objects = opt.debug_obj.iter().cloned().collect();
    for name in &opt.debug_obj {
        if assets.object_by_name(name).is_none() {
            warn!("--debug-obj: no object named {}", name);
        }
    }

    let start_room = match &opt.room {
        Some(which) => Some(resolve_room(&assets, which)?),
        None => None,
    };
    match start_room {
        Some(index) => room::enter_room(&mut world, index, true)?,
        None => room::start_game(&mut world)?,
    }

    let playback = match &opt.playback_inputs {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading input recording {}", path.display()))?;
            Some(Recording::from_json_str(&text)?)
        }
        None => None,
    };
    let mut recording = opt.record_inputs.as_ref().map(|_| Recording::default());

    let headless = opt.headless || !opt.screenshot_at_frame.is_empty();
    let mut game_window = if headless {
        None
    } else {
        let title = assets.string(assets.gen8.display_name);
        let title = if title.is_empty() {
            assets.string(assets.gen8.name)
        } else {
            title
        };
        Some(GameWindow::new(
            title,
            assets.gen8.default_window_width.max(1),
            assets.gen8.default_window_height.max(1),
        )?)
    };

    let mut paused = false;
    let mut step_one = false;
    let mut debug_prev: HashSet<u32> = HashSet::new();
    let mut next_deadline = Instant::now();

    loop {
        if world.exit_requested {
            info!("game requested exit at frame {}", world.frame_count);
            break;
        }
        if let Some(max) = opt.max_frames {
            if world.frame_count >= max {
                break;
            }
        }
        if headless
            && !opt.screenshot_at_frame.is_empty()
            && opt
                .screenshot_at_frame
                .iter()
                .all(|&f| f <= world.frame_count)
        {
            break;
        }

        let live_keys: HashSet<u32> = match &mut game_window {
            Some(w) => {
                if !w.pump() {
                    break;
                }
                w.held_keys().clone()
            }
            None => HashSet::new(),
        };

        // Debug keys act on the live keyboard only, never on playback.
        let debug_pressed = |key: u32| live_keys.contains(&key) && !debug_prev.contains(&key);
        if debug_pressed(vk::PAGEUP) {
            cycle_room(&mut world, -1);
        }
        if debug_pressed(vk::PAGEDOWN) {
            cycle_room(&mut world, 1);
        }
        if debug_pressed(b'P' as u32) {
            paused = !paused;
            info!("{}", if paused { "paused" } else { "resumed" });
        }
        if debug_pressed(b'O' as u32) && paused {
            step_one = true;
        }
        debug_prev = live_keys.clone();

        let held = match &playback {
            Some(rec) => rec.held_at(world.frame_count),
            None => live_keys,
        };

        if !paused || step_one {
            step_one = false;
            if let Some(rec) = recording.as_mut() {
                rec.record(world.frame_count, &held);
            }
            run_frame(&mut world, &held)?;

            let shot_frame = world.frame_count;
            if opt.screenshot_at_frame.contains(&shot_frame) {
                if let Err(e) = save_screenshot(&world, opt, shot_frame) {
                    warn!("screenshot at frame {} failed: {:#}", shot_frame, e);
                }
            }
        }

        if let Some(w) = game_window.as_mut() {
            let (fb_w, fb_h) = w.framebuffer_size();
            let scaled = world.canvas.upscaled(fb_w, fb_h);
            w.present(scaled.pixels(), scaled.width(), scaled.height())?;

            // Fixed timestep pacing from the room speed and the multiplier.
            let speed = f64::from(world.room.speed.max(1)) * opt.speed.max(0.01);
            next_deadline += Duration::from_secs_f64(1.0 / speed);
            let now = Instant::now();
            if next_deadline > now {
                std::thread::sleep(next_deadline - now);
            } else {
                next_deadline = now;
            }
        }
    }

    if let (Some(path), Some(rec)) = (&opt.record_inputs, &recording) {
        if let Err(e) = fs::write(path, rec.to_json_string()) {
            warn!("writing input recording failed: {:#}", e);
        } else {
            info!("wrote input recording to {}", path.display());
        }
    }
    Ok(())
}

fn resolve_room(assets: &GameData, which: &str) -> Result<u32> {
    if let Some(index) = assets.room_by_name(which) {
        return Ok(index);
    }
    if let Ok(index) = which.parse::<u32>() {
        if (index as usize) < assets.rooms.len() {
            return Ok(index);
        }
    }
    Err(anyhow!("no room named or numbered {:?}", which))
}

/// PageUp/PageDown walk the GEN8 play order.
fn cycle_room(world: &mut World, step: i64) {
    let order = &world.assets.gen8.room_order;
    if order.is_empty() {
        return;
    }
    let here = order
        .iter()
        .position(|&r| i64::from(r) == i64::from(world.room.index))
        .unwrap_or(0) as i64;
    let next = (here + step).rem_euclid(order.len() as i64);
    world.room.pending = Some(order[next as usize]);
}

/// Screenshots capture the letterboxed window-size image, so they match
/// what a windowed run shows.
fn save_screenshot(world: &World, opt: &Opt, frame: u64) -> Result<()> {
    let target_w = world.assets.gen8.default_window_width.max(1);
    let target_h = world.assets.gen8.default_window_height.max(1);
    let scaled = world.canvas.upscaled(target_w, target_h);
    let path = opt.screenshot.replace("%s", &frame.to_string());
    let image = image::RgbaImage::from_raw(
        scaled.width(),
        scaled.height(),
        scaled.pixels().to_vec(),
    )
    .ok_or_else(|| anyhow!("framebuffer size mismatch"))?;
    image
        .save(&path)
        .with_context(|| format!("writing {}", path))?;
    info!("wrote {} ({}x{})", path, target_w, target_h);
    Ok(())
}
