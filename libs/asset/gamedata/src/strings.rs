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
use crate::AssetRefError;
use anyhow::Result;
use form::Chunk;
use std::collections::HashMap;

/// The STRG table. Other chunks reference strings by the absolute file
/// offset of the character data (the entry offset plus the four byte length
/// prefix), so we keep an offset-to-index map alongside the decoded strings.
#[derive(Debug)]
pub struct StringTable {
    strings: Vec<String>,
    by_ref: HashMap<u32, u32>,
}

impl StringTable {
    pub fn from_chunk(chunk: &Chunk) -> Result<Self> {
        let mut r = chunk.reader();
        let count = r.read_u32()? as usize;
        let offsets = r.read_u32_table(count)?;

        let mut strings = Vec::with_capacity(count);
        let mut by_ref = HashMap::with_capacity(count);
        for (i, &offset) in offsets.iter().enumerate() {
            r.seek_absolute(offset as usize)?;
            let len = r.read_u32()? as usize;
            let bytes = r.read_bytes(len)?;
            strings.push(String::from_utf8_lossy(bytes).into_owned());
            by_ref.insert(offset + 4, i as u32);
        }
        Ok(Self { strings, by_ref })
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn get(&self, index: u32) -> &str {
        &self.strings[index as usize]
    }

    /// Convert a stored file offset into a table index.
    pub fn resolve(&self, file_offset: u32) -> Result<u32> {
        if file_offset == 0 {
            // A null reference; map to the canonical empty slot if present,
            // otherwise report it like any other dangling reference.
            if let Some(i) = self.strings.iter().position(|s| s.is_empty()) {
                return Ok(i as u32);
            }
        }
        self.by_ref.get(&file_offset).copied().ok_or_else(|| {
            AssetRefError::DanglingString {
                offset: file_offset,
            }
            .into()
        })
    }

    /// Resolve and fetch in one step, for name fields.
    pub fn lookup(&self, file_offset: u32) -> Result<&str> {
        Ok(self.get(self.resolve(file_offset)?))
    }

    pub fn iter(&self) -> std::slice::Iter<String> {
        self.strings.iter()
    }
}
