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
mod decode;
mod value;

pub use crate::{
    decode::{
        decode_at, scope, Comparison, DataType, DecodeError, Extension, Instr, Opcode, RefKind,
        SymbolRef, POPENV_BREAK,
    },
    value::{format_real, parse_real_prefix, CoercionError, GmArray, Value},
};
