//! Compiled resource table (`resources.arsc`), enough of it to turn a
//! `@string/...` reference into text.
use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::chunk::{
    Bytes, ChunkHeader, ResValue, RES_STRING_POOL_TYPE, RES_TABLE_PACKAGE_TYPE, RES_TABLE_TYPE,
    RES_TABLE_TYPE_SPEC_TYPE, RES_TABLE_TYPE_TYPE,
};
use super::string_pool::StringPool;
use crate::error::ApkError;

const NO_ENTRY: u32 = u32::MAX;
const NO_ENTRY_16: u16 = u16::MAX;

const FLAG_SPARSE: u8 = 0x01;
const FLAG_OFFSET16: u8 = 0x02;

const ENTRY_FLAG_COMPLEX: u16 = 0x0001;
const ENTRY_FLAG_COMPACT: u16 = 0x0008;

const MAX_REFERENCE_DEPTH: usize = 8;

/// One `ResTable_type` chunk: the entries of a type for a single configuration.
#[derive(Debug, Clone)]
struct TypeChunk {
    id: u8,
    language: [u8; 2],
    country: [u8; 2],
    entries: BTreeMap<u16, (u8, u32)>,
}

impl TypeChunk {
    fn is_default_config(&self) -> bool {
        self.language == [0, 0] && self.country == [0, 0]
    }
}

#[derive(Debug, Clone)]
struct Package {
    id: u8,
    types: Vec<TypeChunk>,
}

#[derive(Debug, Default)]
pub struct ResourceTable {
    strings: StringPool,
    packages: Vec<Package>,
}

impl ResourceTable {
    pub fn parse(data: &[u8]) -> Result<Self, ApkError> {
        let bytes = Bytes::new(data, "resource table");
        let root = bytes.chunk(0)?;
        if root.kind != RES_TABLE_TYPE {
            return Err(bytes.error(0, format!("not a resource table (chunk type 0x{:04x})", root.kind)));
        }

        let mut table = ResourceTable::default();
        for chunk in bytes.chunks(root.body(), root.end()) {
            let chunk = chunk?;
            match chunk.kind {
                RES_STRING_POOL_TYPE => table.strings = StringPool::parse(&bytes, &chunk)?,
                RES_TABLE_PACKAGE_TYPE => table.packages.push(parse_package(&bytes, &chunk)?),
                other => debug!("Skipping resource table chunk 0x{:04x}", other),
            }
        }
        debug!(
            "Resource table: {} strings, {} package(s)",
            table.strings.len(),
            table.packages.len()
        );
        Ok(table)
    }

    /// Resolves a resource id to its value, following references.
    pub fn resolve(&self, id: u32) -> Result<ResValue, ApkError> {
        let mut current = id;
        for _ in 0..MAX_REFERENCE_DEPTH {
            let (data_type, data) = self.lookup(current).ok_or(ApkError::UnresolvedResource(current))?;
            match self.strings.value(data_type, data) {
                ResValue::Reference(next) => current = next,
                value => return Ok(value),
            }
        }
        warn!("Reference chain from 0x{:08x} is too deep", id);
        Err(ApkError::UnresolvedResource(id))
    }

    pub fn resolve_string(&self, id: u32) -> Result<String, ApkError> {
        match self.resolve(id)? {
            ResValue::String(s) => Ok(s),
            ResValue::Int(v) => Ok(v.to_string()),
            _ => Err(ApkError::UnresolvedResource(id)),
        }
    }

    fn lookup(&self, id: u32) -> Option<(u8, u32)> {
        let package_id = (id >> 24) as u8;
        let type_id = ((id >> 16) & 0xff) as u8;
        let entry = (id & 0xffff) as u16;

        let package = self.packages.iter().find(|p| p.id == package_id)?;
        let mut candidates = package
            .types
            .iter()
            .filter(|t| t.id == type_id)
            .filter_map(|t| t.entries.get(&entry).map(|v| (t, *v)));
        let first = candidates.next()?;
        if first.0.is_default_config() {
            return Some(first.1);
        }
        Some(
            candidates
                .find(|(t, _)| t.is_default_config())
                .unwrap_or(first)
                .1,
        )
    }
}

fn parse_package(bytes: &Bytes<'_>, header: &ChunkHeader) -> Result<Package, ApkError> {
    let id = bytes.u32(header.offset + 8)? as u8;
    let mut types = Vec::new();
    for chunk in bytes.chunks(header.body(), header.end()) {
        let chunk = chunk?;
        match chunk.kind {
            RES_TABLE_TYPE_TYPE => types.push(parse_type(bytes, &chunk)?),
            RES_STRING_POOL_TYPE | RES_TABLE_TYPE_SPEC_TYPE => {}
            other => debug!("Skipping package chunk 0x{:04x}", other),
        }
    }
    Ok(Package { id, types })
}

fn parse_type(bytes: &Bytes<'_>, header: &ChunkHeader) -> Result<TypeChunk, ApkError> {
    let base = header.offset;
    let id = bytes.u8(base + 8)?;
    let flags = bytes.u8(base + 9)?;
    let entry_count = bytes.u32(base + 12)? as usize;
    let entries_start = base + bytes.u32(base + 16)? as usize;

    let config = base + 20;
    let config_size = bytes.u32(config)? as usize;
    let (language, country) = if config_size >= 12 {
        let lang = bytes.slice(config + 8, config + 10)?;
        let ctry = bytes.slice(config + 10, config + 12)?;
        ([lang[0], lang[1]], [ctry[0], ctry[1]])
    } else {
        ([0, 0], [0, 0])
    };

    let table = header.body();
    let mut offsets: Vec<(u16, usize)> = Vec::with_capacity(entry_count.min(header.size / 2));
    for i in 0..entry_count {
        if flags & FLAG_SPARSE != 0 {
            let index = bytes.u16(table + i * 4)?;
            let offset = bytes.u16(table + i * 4 + 2)? as usize * 4;
            offsets.push((index, offset));
        } else if flags & FLAG_OFFSET16 != 0 {
            let offset = bytes.u16(table + i * 2)?;
            if offset != NO_ENTRY_16 {
                offsets.push((i as u16, offset as usize * 4));
            }
        } else {
            let offset = bytes.u32(table + i * 4)?;
            if offset != NO_ENTRY {
                offsets.push((i as u16, offset as usize));
            }
        }
    }

    let mut entries = BTreeMap::new();
    for (index, offset) in offsets {
        let at = entries_start + offset;
        if at >= header.end() {
            return Err(bytes.error(at, format!("entry {} past end of type chunk", index)));
        }
        let size = bytes.u16(at)? as usize;
        let entry_flags = bytes.u16(at + 2)?;
        if entry_flags & ENTRY_FLAG_COMPACT != 0 {
            entries.insert(index, ((entry_flags >> 8) as u8, bytes.u32(at + 4)?));
        } else if entry_flags & ENTRY_FLAG_COMPLEX != 0 {
            // bags (styles, plurals) never name an application
            continue;
        } else {
            let value = at + size;
            entries.insert(index, (bytes.u8(value + 3)?, bytes.u32(value + 4)?));
        }
    }

    Ok(TypeChunk {
        id,
        language,
        country,
        entries,
    })
}
