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
use anyhow::{bail, Result};
use form::Form;
use gamedata::GameData;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::{fs, path::PathBuf};
use structopt::StructOpt;

/// Container inspection tooling: chunk layout, asset tables, bytecode.
#[derive(Debug, StructOpt)]
struct Opt {
    /// Trace execution
    #[structopt(short, long)]
    verbose: bool,

    /// List the string table
    #[structopt(short, long)]
    strings: bool,

    /// List sprites, objects, and rooms with their indices
    #[structopt(short, long)]
    assets: bool,

    /// Disassemble one code entry by name, or * for all
    #[structopt(short, long)]
    disassemble: Option<String>,

    /// Data containers to inspect
    #[structopt()]
    inputs: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    let level = if opt.verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Warn
    };
    TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)?;
    if opt.inputs.is_empty() {
        bail!("no inputs; pass at least one data container");
    }

    for input in &opt.inputs {
        let data = fs::read(input)?;
        println!("{}:", input.display());
        let container = Form::from_bytes(&data)?;
        for chunk in &container.chunks {
            println!("  {} {:>10} bytes at {:08X}", chunk.tag, chunk.data.len(), chunk.offset);
        }

        if !(opt.strings || opt.assets || opt.disassemble.is_some()) {
            continue;
        }
        let game = GameData::from_bytes(&data)?;

        if opt.strings {
            for (i, s) in game.strings.iter().enumerate() {
                println!("  str {:>6}: {:?}", i, s);
            }
        }
        if opt.assets {
            for (i, sprite) in game.sprites.iter().enumerate() {
                println!("  sprite {:>5}: {}", i, game.string(sprite.name));
            }
            for (i, object) in game.objects.iter().enumerate() {
                println!(
                    "  object {:>5}: {} ({} events)",
                    i,
                    game.string(object.name),
                    object.events.len()
                );
            }
            for (i, room) in game.rooms.iter().enumerate() {
                println!(
                    "  room {:>7}: {} {}x{}, {} instances",
                    i,
                    game.string(room.name),
                    room.width,
                    room.height,
                    room.instances.len()
                );
            }
        }
        if let Some(which) = &opt.disassemble {
            for entry in &game.code.entries {
                let name = game.string(entry.name);
                if which != "*" && which != name {
                    continue;
                }
                println!("  code {} ({} bytes):", name, entry.length);
                let mut at = entry.offset;
                let end = entry.offset + entry.length;
                while at < end {
                    let instr = gml::decode_at(&game.code.blob, at)?;
                    println!(
                        "    {:08X}: {:?}.{:?}.{:?} {:6} {:+}",
                        at - entry.offset,
                        instr.opcode,
                        instr.type1,
                        instr.type2,
                        instr.operand16,
                        instr.operand24,
                    );
                    at += instr.size;
                }
            }
        }
    }
    Ok(())
}
