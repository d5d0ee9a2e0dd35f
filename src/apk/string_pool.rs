//! `ResStringPool` decoding for UTF-8 and UTF-16 pools.
use super::chunk::{value_type, Bytes, ChunkHeader, ResValue, RES_STRING_POOL_TYPE};
use crate::error::ApkError;

const UTF8_FLAG: u32 = 1 << 8;
const POOL_HEADER_SIZE: usize = 28;

#[derive(Debug, Default, Clone)]
pub struct StringPool {
    strings: Vec<String>,
}

impl StringPool {
    pub fn parse(bytes: &Bytes<'_>, header: &ChunkHeader) -> Result<Self, ApkError> {
        if header.kind != RES_STRING_POOL_TYPE {
            return Err(bytes.error(header.offset, format!("expected string pool, found 0x{:04x}", header.kind)));
        }
        if header.header_size < POOL_HEADER_SIZE {
            return Err(bytes.error(header.offset, "string pool header too small"));
        }
        let base = header.offset;
        let count = bytes.u32(base + 8)? as usize;
        let flags = bytes.u32(base + 16)?;
        let strings_start = bytes.u32(base + 20)? as usize;
        let utf8 = flags & UTF8_FLAG != 0;

        let offsets_at = header.body();
        if offsets_at + count * 4 > header.end() {
            return Err(bytes.error(base, format!("{} string offsets do not fit in pool", count)));
        }
        let data_start = base + strings_start;
        let mut strings = Vec::with_capacity(count);
        for i in 0..count {
            let offset = bytes.u32(offsets_at + i * 4)? as usize;
            let at = data_start + offset;
            if at >= header.end() {
                return Err(bytes.error(at, format!("string {} starts past end of pool", i)));
            }
            let s = if utf8 {
                read_utf8(bytes, at)?
            } else {
                read_utf16(bytes, at)?
            };
            strings.push(s);
        }
        Ok(Self { strings })
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Decodes a `Res_value` whose string data, if any, lives in this pool.
    pub fn value(&self, data_type: u8, data: u32) -> ResValue {
        match data_type {
            value_type::NULL => ResValue::Null,
            value_type::REFERENCE => ResValue::Reference(data),
            value_type::STRING => match self.get(data) {
                Some(s) => ResValue::String(s.to_string()),
                None => ResValue::Null,
            },
            value_type::INT_DEC | value_type::INT_HEX => ResValue::Int(data),
            value_type::INT_BOOLEAN => ResValue::Bool(data != 0),
            _ => ResValue::Other { data_type, data },
        }
    }
}

fn read_utf8(bytes: &Bytes<'_>, at: usize) -> Result<String, ApkError> {
    // utf-16 length first, then the utf-8 byte length we actually need
    let (_, skip) = utf8_length(bytes, at)?;
    let (len, skip2) = utf8_length(bytes, at + skip)?;
    let start = at + skip + skip2;
    let raw = bytes.slice(start, start + len)?;
    Ok(String::from_utf8_lossy(raw).into_owned())
}

fn utf8_length(bytes: &Bytes<'_>, at: usize) -> Result<(usize, usize), ApkError> {
    let first = bytes.u8(at)? as usize;
    if first & 0x80 != 0 {
        let second = bytes.u8(at + 1)? as usize;
        Ok((((first & 0x7f) << 8) | second, 2))
    } else {
        Ok((first, 1))
    }
}

fn read_utf16(bytes: &Bytes<'_>, at: usize) -> Result<String, ApkError> {
    let first = bytes.u16(at)? as usize;
    let (len, skip) = if first & 0x8000 != 0 {
        let second = bytes.u16(at + 2)? as usize;
        ((((first & 0x7fff) << 16) | second), 4)
    } else {
        (first, 2)
    };
    let start = at + skip;
    let raw = bytes.slice(start, start + len * 2)?;
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units))
}
