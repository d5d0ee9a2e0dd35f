//! Little-endian reads and the resource chunk header shared by binary XML and
//! the resource table.
use crate::error::ApkError;

pub const RES_STRING_POOL_TYPE: u16 = 0x0001;
pub const RES_TABLE_TYPE: u16 = 0x0002;
pub const RES_XML_TYPE: u16 = 0x0003;

pub const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
pub const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
pub const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
pub const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
pub const RES_XML_CDATA_TYPE: u16 = 0x0104;
pub const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;

pub const RES_TABLE_PACKAGE_TYPE: u16 = 0x0200;
pub const RES_TABLE_TYPE_TYPE: u16 = 0x0201;
pub const RES_TABLE_TYPE_SPEC_TYPE: u16 = 0x0202;

pub const CHUNK_HEADER_SIZE: usize = 8;

/// Bounds-checked view over a byte slice.
#[derive(Clone, Copy)]
pub struct Bytes<'a> {
    data: &'a [u8],
    what: &'static str,
}

impl<'a> Bytes<'a> {
    pub fn new(data: &'a [u8], what: &'static str) -> Self {
        Self { data, what }
    }

    pub fn slice(&self, start: usize, end: usize) -> Result<&'a [u8], ApkError> {
        if start > end || end > self.data.len() {
            return Err(ApkError::malformed(
                self.what,
                start,
                format!("range {}..{} past end ({} bytes)", start, end, self.data.len()),
            ));
        }
        Ok(&self.data[start..end])
    }

    pub fn u8(&self, offset: usize) -> Result<u8, ApkError> {
        Ok(self.slice(offset, offset + 1)?[0])
    }

    pub fn u16(&self, offset: usize) -> Result<u16, ApkError> {
        let b = self.slice(offset, offset + 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&self, offset: usize) -> Result<u32, ApkError> {
        let b = self.slice(offset, offset + 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn chunk(&self, offset: usize) -> Result<ChunkHeader, ApkError> {
        let header = ChunkHeader {
            offset,
            kind: self.u16(offset)?,
            header_size: self.u16(offset + 2)? as usize,
            size: self.u32(offset + 4)? as usize,
        };
        if header.header_size < CHUNK_HEADER_SIZE || header.size < header.header_size {
            return Err(ApkError::malformed(
                self.what,
                offset,
                format!(
                    "chunk 0x{:04x} has header size {} and size {}",
                    header.kind, header.header_size, header.size
                ),
            ));
        }
        if offset + header.size > self.data.len() {
            return Err(ApkError::malformed(
                self.what,
                offset,
                format!("chunk 0x{:04x} runs past end of data", header.kind),
            ));
        }
        Ok(header)
    }

    /// Iterates the chunks laid out back to back in `start..end`.
    pub fn chunks(&self, start: usize, end: usize) -> Chunks<'a> {
        Chunks {
            bytes: *self,
            pos: start,
            end: end.min(self.data.len()),
        }
    }

    pub fn error(&self, offset: usize, reason: impl Into<String>) -> ApkError {
        ApkError::malformed(self.what, offset, reason)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkHeader {
    pub offset: usize,
    pub kind: u16,
    pub header_size: usize,
    pub size: usize,
}

impl ChunkHeader {
    /// Offset of the first byte after the chunk header.
    pub fn body(&self) -> usize {
        self.offset + self.header_size
    }

    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

pub struct Chunks<'a> {
    bytes: Bytes<'a>,
    pos: usize,
    end: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<ChunkHeader, ApkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos + CHUNK_HEADER_SIZE > self.end {
            return None;
        }
        match self.bytes.chunk(self.pos) {
            Ok(header) => {
                self.pos = header.end();
                Some(Ok(header))
            }
            Err(e) => {
                self.pos = self.end;
                Some(Err(e))
            }
        }
    }
}

/// Value types stored in `Res_value.dataType`.
pub mod value_type {
    pub const NULL: u8 = 0x00;
    pub const REFERENCE: u8 = 0x01;
    pub const STRING: u8 = 0x03;
    pub const INT_DEC: u8 = 0x10;
    pub const INT_HEX: u8 = 0x11;
    pub const INT_BOOLEAN: u8 = 0x12;
}

/// A typed value as stored in binary XML attributes and resource entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResValue {
    Null,
    Reference(u32),
    String(String),
    Int(u32),
    Bool(bool),
    Other { data_type: u8, data: u32 },
}

impl ResValue {
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            ResValue::Int(v) => Some(*v),
            ResValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}
