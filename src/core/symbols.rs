use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::number::{parse_address, Address};
use crate::prelude::{Error, SdResult};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct SymbolEntry {
    pub address: Address,
    pub name: String,
}

impl SymbolEntry {
    pub fn new(address: Address, name: &str) -> Self {
        Self {
            address,
            name: name.into(),
        }
    }

    /// distance of `address` past the start of this symbol
    pub fn offset_of(&self, address: Address) -> Address {
        address.saturating_sub(self.address)
    }
}

/// Address ordered list of symbols read from a linker map.
/// Entries sharing an address keep the order they had in the map file.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
}

impl SymbolTable {
    pub fn load(path: &Path) -> SdResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::MapUnreadable {
            path: path.into(),
            source,
        })?;
        let table = Self::parse(&text);
        log::debug!("Loaded {} symbols from {:?}", table.len(), path);
        Ok(table)
    }

    pub fn parse(text: &str) -> Self {
        let mut entries: Vec<SymbolEntry> = text.lines().filter_map(Self::parse_line).collect();
        // stable, equal addresses stay in file order
        entries.sort_by_key(|x| x.address);
        Self { entries }
    }

    /// A symbol line looks like `0x00101000    kernel_main`.
    /// Lines where the second column is also an address describe sections
    /// or input files and are skipped, as is anything else that does not fit.
    fn parse_line(line: &str) -> Option<SymbolEntry> {
        let line = line.trim();
        if !line.starts_with("0x") {
            return None;
        }

        let mut split = line.splitn(2, char::is_whitespace);
        let address = split.next()?;
        let name = split.next()?.trim();
        if name.is_empty() || name.starts_with("0x") {
            return None;
        }

        let address = parse_address(address).ok()?;
        Some(SymbolEntry::new(address, name))
    }

    /// Finds the symbol with the greatest address not above `address`.
    /// On equal addresses the entry seen first in the map wins.
    pub fn resolve(&self, address: Address) -> Option<&SymbolEntry> {
        let upper = self.entries.partition_point(|x| x.address <= address);
        let floor = self.entries.get(upper.checked_sub(1)?)?.address;
        let first = self.entries[..upper].partition_point(|x| x.address < floor);
        self.entries.get(first)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&SymbolEntry> {
        self.entries.iter().find(|x| x.name == name)
    }

    pub fn entries(&self) -> &[SymbolEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymbolEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
