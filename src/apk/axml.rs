//! Android binary XML (the compiled `AndroidManifest.xml`).
use tracing::debug;

use super::chunk::{
    Bytes, ResValue, RES_STRING_POOL_TYPE, RES_XML_CDATA_TYPE, RES_XML_END_ELEMENT_TYPE,
    RES_XML_END_NAMESPACE_TYPE, RES_XML_RESOURCE_MAP_TYPE, RES_XML_START_ELEMENT_TYPE,
    RES_XML_START_NAMESPACE_TYPE, RES_XML_TYPE,
};
use super::string_pool::StringPool;
use crate::error::ApkError;

const NO_INDEX: u32 = u32::MAX;

pub const ATTR_LABEL: u32 = 0x0101_0001;
pub const ATTR_VERSION_CODE: u32 = 0x0101_021b;
pub const ATTR_VERSION_NAME: u32 = 0x0101_021c;

#[derive(Debug, Clone)]
pub struct XmlAttribute {
    pub name: String,
    pub resource_id: Option<u32>,
    pub value: ResValue,
}

#[derive(Debug, Clone)]
pub struct XmlElement {
    pub name: String,
    pub depth: usize,
    pub attributes: Vec<XmlAttribute>,
}

impl XmlElement {
    /// Looks an attribute up by its android resource id, falling back to the
    /// attribute name for attributes that carry no id.
    pub fn attribute(&self, resource_id: Option<u32>, name: &str) -> Option<&ResValue> {
        if let Some(id) = resource_id {
            if let Some(attr) = self.attributes.iter().find(|a| a.resource_id == Some(id)) {
                return Some(&attr.value);
            }
        }
        self.attributes
            .iter()
            .find(|a| a.resource_id.is_none() && a.name == name)
            .map(|a| &a.value)
    }
}

/// Elements of a binary XML document in document order.
#[derive(Debug, Default)]
pub struct XmlDocument {
    pub elements: Vec<XmlElement>,
}

impl XmlDocument {
    pub fn parse(data: &[u8]) -> Result<Self, ApkError> {
        let bytes = Bytes::new(data, "binary XML");
        let root = bytes.chunk(0)?;
        if root.kind != RES_XML_TYPE {
            return Err(bytes.error(0, format!("not binary XML (chunk type 0x{:04x})", root.kind)));
        }

        let mut pool = StringPool::default();
        let mut resource_ids: Vec<u32> = Vec::new();
        let mut elements = Vec::new();
        let mut depth = 0usize;

        for chunk in bytes.chunks(root.body(), root.end()) {
            let chunk = chunk?;
            match chunk.kind {
                RES_STRING_POOL_TYPE => pool = StringPool::parse(&bytes, &chunk)?,
                RES_XML_RESOURCE_MAP_TYPE => {
                    resource_ids = (chunk.body()..chunk.end())
                        .step_by(4)
                        .map(|at| bytes.u32(at))
                        .collect::<Result<_, _>>()?;
                }
                RES_XML_START_ELEMENT_TYPE => {
                    let element = parse_start_element(&bytes, chunk.body(), depth, &pool, &resource_ids)?;
                    elements.push(element);
                    depth += 1;
                }
                RES_XML_END_ELEMENT_TYPE => depth = depth.saturating_sub(1),
                RES_XML_START_NAMESPACE_TYPE | RES_XML_END_NAMESPACE_TYPE | RES_XML_CDATA_TYPE => {}
                other => debug!("Skipping binary XML chunk 0x{:04x}", other),
            }
        }
        Ok(Self { elements })
    }

    pub fn find(&self, name: &str, depth: usize) -> Option<&XmlElement> {
        self.elements.iter().find(|e| e.depth == depth && e.name == name)
    }
}

fn parse_start_element(
    bytes: &Bytes<'_>,
    ext: usize,
    depth: usize,
    pool: &StringPool,
    resource_ids: &[u32],
) -> Result<XmlElement, ApkError> {
    let name = pool.get(bytes.u32(ext + 4)?).unwrap_or_default().to_string();
    let attribute_start = bytes.u16(ext + 8)? as usize;
    let attribute_size = bytes.u16(ext + 10)? as usize;
    let attribute_count = bytes.u16(ext + 12)? as usize;
    if attribute_count > 0 && attribute_size < 20 {
        return Err(bytes.error(ext, format!("attribute size {} too small", attribute_size)));
    }

    let mut attributes = Vec::with_capacity(attribute_count);
    for i in 0..attribute_count {
        let at = ext + attribute_start + i * attribute_size;
        let name_index = bytes.u32(at + 4)?;
        let raw_value = bytes.u32(at + 8)?;
        let data_type = bytes.u8(at + 15)?;
        let data = bytes.u32(at + 16)?;

        let value = match pool.value(data_type, data) {
            ResValue::Null if raw_value != NO_INDEX => pool
                .get(raw_value)
                .map(|s| ResValue::String(s.to_string()))
                .unwrap_or(ResValue::Null),
            value => value,
        };
        attributes.push(XmlAttribute {
            name: pool.get(name_index).unwrap_or_default().to_string(),
            resource_id: resource_ids.get(name_index as usize).copied(),
            value,
        });
    }
    Ok(XmlElement {
        name,
        depth,
        attributes,
    })
}

/// The manifest fields needed to name a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub package: String,
    pub version_code: Option<u32>,
    pub version_name: Option<ResValue>,
    pub label: Option<ResValue>,
}

impl Manifest {
    pub fn parse(data: &[u8]) -> Result<Self, ApkError> {
        Self::from_document(&XmlDocument::parse(data)?)
    }

    pub fn from_document(doc: &XmlDocument) -> Result<Self, ApkError> {
        let manifest = doc.find("manifest", 0).ok_or(ApkError::MissingPackageName)?;
        let package = match manifest.attribute(None, "package") {
            Some(ResValue::String(p)) if !p.is_empty() => p.clone(),
            _ => return Err(ApkError::MissingPackageName),
        };
        let version_code = manifest
            .attribute(Some(ATTR_VERSION_CODE), "versionCode")
            .and_then(ResValue::as_u32);
        let version_name = manifest
            .attribute(Some(ATTR_VERSION_NAME), "versionName")
            .filter(|v| **v != ResValue::Null)
            .cloned();
        let label = doc
            .find("application", 1)
            .and_then(|app| app.attribute(Some(ATTR_LABEL), "label"))
            .filter(|v| **v != ResValue::Null)
            .cloned();
        debug!(
            "Manifest package={} versionCode={:?} versionName={:?} label={:?}",
            package, version_code, version_name, label
        );
        Ok(Self {
            package,
            version_code,
            version_name,
            label,
        })
    }
}
