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
use anyhow::{ensure, Result};
use form::Chunk;
use log::trace;

/// One bytecode entry: an event handler, script body, or creation code.
/// The bytes themselves live in the shared blob; the entry carries its span.
#[derive(Clone, Debug)]
pub struct CodeEntry {
    pub name: u32,
    pub offset: usize,
    pub length: usize,
    pub locals_count: u16,
    pub args_count: u16,
}

/// All CODE entries plus the chunk payload they index into. Variable and
/// function references inside the blob are patched from occurrence chains
/// to table indices by `link`, which must run before the VM sees any code.
#[derive(Debug)]
pub struct CodeTable {
    pub blob: Vec<u8>,
    pub entries: Vec<CodeEntry>,
}

impl CodeTable {
    pub fn from_chunk(chunk: &Chunk, strings: &StringTable) -> Result<Self> {
        let mut r = chunk.reader();
        let count = r.read_u32()? as usize;
        let offsets = r.read_u32_table(count)?;

        let mut entries = Vec::with_capacity(count);
        for &offset in &offsets {
            r.seek_absolute(offset as usize)?;
            let name = strings.resolve(r.read_u32()?)?;
            let length = r.read_u32()? as usize;
            let locals_count = r.read_u16()?;
            let args_count = r.read_u16()? & 0x1FFF;
            let rel_at = r.absolute_position();
            let rel = r.read_i32()?;
            let _padding = r.read_u32()?;

            let span_abs = rel_at as i64 + rel as i64;
            let span = span_abs - chunk.offset as i64;
            ensure!(
                span >= 0 && span as usize + length <= chunk.data.len(),
                "code entry {} span {}+{} outside CODE chunk",
                strings.get(name),
                span,
                length
            );
            trace!(
                "code {} at blob {:08X}, {} bytes, {} locals, {} args",
                strings.get(name),
                span,
                length,
                locals_count,
                args_count
            );
            entries.push(CodeEntry {
                name,
                offset: span as usize,
                length,
                locals_count,
                args_count,
            });
        }

        Ok(Self {
            blob: chunk.data.to_vec(),
            entries,
        })
    }

    /// Walk every symbol's occurrence chain and replace the low 24 bits of
    /// each reference operand with the symbol's table index. Chain
    /// addresses are relative to the start of the CODE payload; each link's
    /// low 24 bits hold the byte distance to the next occurrence.
    pub fn link(&mut self, variables: &[VariableDef], functions: &[FunctionDef]) -> Result<()> {
        for (index, var) in variables.iter().enumerate() {
            self.patch_chain(index as u32, var.occurrences, var.first_address)?;
        }
        for (index, func) in functions.iter().enumerate() {
            self.patch_chain(index as u32, func.occurrences, func.first_address)?;
        }
        Ok(())
    }

    fn patch_chain(&mut self, index: u32, occurrences: u32, first_address: i32) -> Result<()> {
        if occurrences == 0 || first_address < 0 {
            return Ok(());
        }
        let mut addr = first_address as usize;
        for _ in 0..occurrences {
            // The reference dword sits just past the 4 byte instruction word.
            ensure!(
                addr + 8 <= self.blob.len(),
                "occurrence chain for symbol {} runs past end of code at {:08X}",
                index,
                addr
            );
            let at = addr + 4;
            let word = u32::from_le_bytes([
                self.blob[at],
                self.blob[at + 1],
                self.blob[at + 2],
                self.blob[at + 3],
            ]);
            let next = (word & 0x00FF_FFFF) as usize;
            let patched = (word & 0xFF00_0000) | (index & 0x00FF_FFFF);
            self.blob[at..at + 4].copy_from_slice(&patched.to_le_bytes());
            addr += next;
        }
        Ok(())
    }
}

/// A VARI row: a named slot plus the scope kind it was compiled against.
#[derive(Clone, Debug)]
pub struct VariableDef {
    pub name: u32,
    pub scope: i32,
    pub var_id: i32,
    pub occurrences: u32,
    pub first_address: i32,
}

pub fn parse_variables(chunk: &Chunk, strings: &StringTable) -> Result<Vec<VariableDef>> {
    let mut r = chunk.reader();
    let _instance_vars = r.read_u32()?;
    let _other_vars = r.read_u32()?;
    let _max_locals = r.read_u32()?;

    let mut defs = Vec::new();
    while r.remaining() >= 20 {
        defs.push(VariableDef {
            name: strings.resolve(r.read_u32()?)?,
            scope: r.read_i32()?,
            var_id: r.read_i32()?,
            occurrences: r.read_u32()?,
            first_address: r.read_i32()?,
        });
    }
    Ok(defs)
}

#[derive(Clone, Debug)]
pub struct FunctionDef {
    pub name: u32,
    pub occurrences: u32,
    pub first_address: i32,
}

/// Named local slots for one code entry, from the FUNC locals section.
#[derive(Clone, Debug)]
pub struct CodeLocals {
    pub code_name: u32,
    pub vars: Vec<(u32, u32)>,
}

pub fn parse_functions(
    chunk: &Chunk,
    strings: &StringTable,
) -> Result<(Vec<FunctionDef>, Vec<CodeLocals>)> {
    let mut r = chunk.reader();
    let count = r.read_u32()? as usize;
    let mut defs = Vec::with_capacity(count);
    for _ in 0..count {
        defs.push(FunctionDef {
            name: strings.resolve(r.read_u32()?)?,
            occurrences: r.read_u32()?,
            first_address: r.read_i32()?,
        });
    }

    let locals_count = r.read_u32()? as usize;
    let mut locals = Vec::with_capacity(locals_count);
    for _ in 0..locals_count {
        let var_count = r.read_u32()? as usize;
        let code_name = strings.resolve(r.read_u32()?)?;
        let mut vars = Vec::with_capacity(var_count);
        for _ in 0..var_count {
            let index = r.read_u32()?;
            let name = strings.resolve(r.read_u32()?)?;
            vars.push((index, name));
        }
        locals.push(CodeLocals { code_name, vars });
    }
    Ok((defs, locals))
}

#[derive(Clone, Debug)]
pub struct Script {
    pub name: u32,
    pub code: i32,
}

pub fn parse_scripts(chunk: &Chunk, strings: &StringTable) -> Result<Vec<Script>> {
    let mut r = chunk.reader();
    let count = r.read_u32()? as usize;
    let offsets = r.read_u32_table(count)?;
    let mut scripts = Vec::with_capacity(count);
    for &offset in &offsets {
        r.seek_absolute(offset as usize)?;
        scripts.push(Script {
            name: strings.resolve(r.read_u32()?)?,
            code: r.read_i32()?,
        });
    }
    Ok(scripts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_patches_occurrence_chains() -> Result<()> {
        // Two occurrences of symbol 3, eight bytes apart, reference kind
        // byte 0xA0 preserved through the patch.
        let mut table = CodeTable {
            blob: vec![0u8; 24],
            entries: Vec::new(),
        };
        table.blob[4..8].copy_from_slice(&0xA000_0008u32.to_le_bytes());
        table.blob[12..16].copy_from_slice(&0xA000_0000u32.to_le_bytes());
        let mut vars = Vec::new();
        for var_id in 0..3 {
            vars.push(VariableDef {
                name: 0,
                scope: -1,
                var_id,
                occurrences: 0,
                first_address: -1,
            });
        }
        vars.push(VariableDef {
            name: 0,
            scope: -5,
            var_id: 0,
            occurrences: 2,
            first_address: 0,
        });
        table.link(&vars, &[])?;
        assert_eq!(&table.blob[4..8], &0xA000_0003u32.to_le_bytes());
        assert_eq!(&table.blob[12..16], &0xA000_0003u32.to_le_bytes());
        Ok(())
    }

    #[test]
    fn it_rejects_chains_past_the_end() {
        let mut table = CodeTable {
            blob: vec![0u8; 8],
            entries: Vec::new(),
        };
        let vars = vec![VariableDef {
            name: 0,
            scope: -1,
            var_id: 0,
            occurrences: 1,
            first_address: 4,
        }];
        assert!(table.link(&vars, &[]).is_err());
    }
}
