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
pub mod builtins;
pub mod event;
pub mod frame;
pub mod input;
pub mod instance;
pub mod interp;
pub mod room;
pub mod world;

pub use crate::{
    frame::run_frame,
    input::{vk, InputState, Recording},
    instance::{BuiltinVar, Instance, FIRST_INSTANCE_ID},
    interp::{call_function, execute_code, VmError},
    world::{DrawState, TraceFilter, TraceOptions, World},
};
