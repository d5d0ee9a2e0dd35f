//! Encoders for synthetic binary XML, resource tables and package archives
//! used by the tests.
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::Path;

use zip::write::FileOptions;
use zip::ZipWriter;

use super::chunk::value_type;

pub const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";
pub const ATTR_LABEL: u32 = 0x0101_0001;
pub const ATTR_VERSION_CODE: u32 = 0x0101_021b;
pub const ATTR_VERSION_NAME: u32 = 0x0101_021c;

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn pad4(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

fn chunk(kind: u16, header: &[u8], body: &[u8]) -> Vec<u8> {
    let header_size = 8 + header.len();
    let mut out = Vec::new();
    put_u16(&mut out, kind);
    put_u16(&mut out, header_size as u16);
    put_u32(&mut out, (header_size + body.len()) as u32);
    out.extend_from_slice(header);
    out.extend_from_slice(body);
    out
}

pub fn string_pool(strings: &[&str], utf8: bool) -> Vec<u8> {
    let mut data = Vec::new();
    let mut offsets = Vec::new();
    for s in strings {
        offsets.push(data.len() as u32);
        if utf8 {
            let chars = s.encode_utf16().count();
            for len in [chars, s.len()] {
                if len > 0x7f {
                    data.push(0x80 | (len >> 8) as u8);
                    data.push((len & 0xff) as u8);
                } else {
                    data.push(len as u8);
                }
            }
            data.extend_from_slice(s.as_bytes());
            data.push(0);
        } else {
            let units: Vec<u16> = s.encode_utf16().collect();
            put_u16(&mut data, units.len() as u16);
            for unit in units {
                put_u16(&mut data, unit);
            }
            put_u16(&mut data, 0);
        }
    }
    pad4(&mut data);

    let strings_start = 28 + 4 * strings.len() as u32;
    let mut header = Vec::new();
    put_u32(&mut header, strings.len() as u32);
    put_u32(&mut header, 0);
    put_u32(&mut header, if utf8 { 1 << 8 } else { 0 });
    put_u32(&mut header, strings_start);
    put_u32(&mut header, 0);

    let mut body = Vec::new();
    for offset in offsets {
        put_u32(&mut body, offset);
    }
    body.extend_from_slice(&data);
    chunk(0x0001, &header, &body)
}

#[derive(Debug, Clone)]
pub enum Value {
    Str(&'static str),
    Int(u32),
    Ref(u32),
    Bool(bool),
}

#[derive(Debug, Clone)]
pub struct Attr {
    pub name: &'static str,
    pub resource_id: Option<u32>,
    pub value: Value,
}

impl Attr {
    pub fn android(name: &'static str, resource_id: u32, value: Value) -> Self {
        Self {
            name,
            resource_id: Some(resource_id),
            value,
        }
    }

    pub fn plain(name: &'static str, value: Value) -> Self {
        Self {
            name,
            resource_id: None,
            value,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    pub name: &'static str,
    pub attrs: Vec<Attr>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: &'static str, attrs: Vec<Attr>, children: Vec<Element>) -> Self {
        Self {
            name,
            attrs,
            children,
        }
    }
}

struct Strings {
    list: Vec<String>,
    index: BTreeMap<String, u32>,
}

impl Strings {
    fn intern(&mut self, s: &str) -> u32 {
        if let Some(i) = self.index.get(s) {
            return *i;
        }
        let i = self.list.len() as u32;
        self.list.push(s.to_string());
        self.index.insert(s.to_string(), i);
        i
    }
}

fn collect_attrs<'a>(element: &'a Element, out: &mut Vec<&'a Attr>) {
    out.extend(element.attrs.iter());
    for child in &element.children {
        collect_attrs(child, out);
    }
}

/// Encodes an element tree as Android binary XML.
pub fn binary_xml(root: &Element) -> Vec<u8> {
    let mut strings = Strings {
        list: Vec::new(),
        index: BTreeMap::new(),
    };
    // resource-mapped attribute names must occupy the first pool slots
    let mut attrs = Vec::new();
    collect_attrs(root, &mut attrs);
    let mut resource_ids = Vec::new();
    for attr in &attrs {
        if let Some(id) = attr.resource_id {
            if !strings.index.contains_key(attr.name) {
                strings.intern(attr.name);
                resource_ids.push(id);
            }
        }
    }
    let prefix = strings.intern("android");
    let uri = strings.intern(ANDROID_NS);

    let mut nodes = Vec::new();
    encode_element(root, uri, &mut strings, &mut nodes);

    let list: Vec<&str> = strings.list.iter().map(String::as_str).collect();
    let mut body = string_pool(&list, false);

    let mut map = Vec::new();
    for id in &resource_ids {
        put_u32(&mut map, *id);
    }
    body.extend(chunk(0x0180, &[], &map));

    let mut ns = Vec::new();
    put_u32(&mut ns, prefix);
    put_u32(&mut ns, uri);
    body.extend(chunk(0x0100, &node_header(1), &ns));
    body.extend(nodes);
    body.extend(chunk(0x0101, &node_header(1), &ns));

    chunk(0x0003, &[], &body)
}

fn node_header(line: u32) -> Vec<u8> {
    let mut h = Vec::new();
    put_u32(&mut h, line);
    put_u32(&mut h, u32::MAX);
    h
}

fn encode_element(element: &Element, uri: u32, strings: &mut Strings, out: &mut Vec<u8>) {
    let name = strings.intern(element.name);
    let mut ext = Vec::new();
    put_u32(&mut ext, u32::MAX);
    put_u32(&mut ext, name);
    put_u16(&mut ext, 20);
    put_u16(&mut ext, 20);
    put_u16(&mut ext, element.attrs.len() as u16);
    put_u16(&mut ext, 0);
    put_u16(&mut ext, 0);
    put_u16(&mut ext, 0);
    for attr in &element.attrs {
        let ns = if attr.resource_id.is_some() { uri } else { u32::MAX };
        put_u32(&mut ext, ns);
        put_u32(&mut ext, strings.intern(attr.name));
        let (raw, data_type, data) = match &attr.value {
            Value::Str(s) => {
                let i = strings.intern(s);
                (i, value_type::STRING, i)
            }
            Value::Int(v) => (u32::MAX, value_type::INT_DEC, *v),
            Value::Ref(id) => (u32::MAX, value_type::REFERENCE, *id),
            Value::Bool(b) => (u32::MAX, value_type::INT_BOOLEAN, if *b { u32::MAX } else { 0 }),
        };
        put_u32(&mut ext, raw);
        put_u16(&mut ext, 8);
        ext.push(0);
        ext.push(data_type);
        put_u32(&mut ext, data);
    }
    out.extend(chunk(0x0102, &node_header(1), &ext));

    for child in &element.children {
        encode_element(child, uri, strings, out);
    }

    let mut end = Vec::new();
    put_u32(&mut end, u32::MAX);
    put_u32(&mut end, name);
    out.extend(chunk(0x0103, &node_header(1), &end));
}

/// Manifest with `package`, `versionCode`, `versionName` and an application
/// label.
pub fn manifest(package: &'static str, version_code: u32, version_name: Option<Value>, label: Option<Value>) -> Vec<u8> {
    let mut attrs = vec![
        Attr::android("versionCode", ATTR_VERSION_CODE, Value::Int(version_code)),
        Attr::plain("package", Value::Str(package)),
    ];
    if let Some(v) = version_name {
        attrs.insert(1, Attr::android("versionName", ATTR_VERSION_NAME, v));
    }
    let mut app_attrs = vec![Attr::android("debuggable", 0x0101_000f, Value::Bool(false))];
    if let Some(l) = label {
        app_attrs.push(Attr::android("label", ATTR_LABEL, l));
    }
    let root = Element::new(
        "manifest",
        attrs,
        vec![
            Element::new(
                "uses-sdk",
                vec![Attr::android("minSdkVersion", 0x0101_020c, Value::Int(21))],
                vec![],
            ),
            Element::new(
                "application",
                app_attrs,
                vec![Element::new(
                    "activity",
                    vec![Attr::android("label", ATTR_LABEL, Value::Str("Main Screen"))],
                    vec![],
                )],
            ),
        ],
    );
    binary_xml(&root)
}

#[derive(Debug, Clone)]
pub enum TableValue {
    Str(&'static str),
    Ref(u32),
}

#[derive(Debug, Clone)]
pub struct TableEntry {
    pub type_id: u8,
    pub entry: u16,
    pub language: Option<&'static str>,
    pub value: TableValue,
}

impl TableEntry {
    pub fn string(id: u32, language: Option<&'static str>, value: &'static str) -> Self {
        Self {
            type_id: ((id >> 16) & 0xff) as u8,
            entry: (id & 0xffff) as u16,
            language,
            value: TableValue::Str(value),
        }
    }

    pub fn reference(id: u32, target: u32) -> Self {
        Self {
            type_id: ((id >> 16) & 0xff) as u8,
            entry: (id & 0xffff) as u16,
            language: None,
            value: TableValue::Ref(target),
        }
    }
}

/// Entry offset layout used for type chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Dense,
    Sparse,
    /// 16-bit offsets, `0xffff` for a missing entry.
    Offset16,
    /// Dense offsets pointing at 8-byte compact entries.
    Compact,
}

/// Encodes a resource table holding a single package with id 0x7f.
pub fn resource_table(entries: &[TableEntry], layout: Layout) -> Vec<u8> {
    let mut values = Strings {
        list: Vec::new(),
        index: BTreeMap::new(),
    };
    for e in entries {
        if let TableValue::Str(s) = e.value {
            values.intern(s);
        }
    }
    let value_list: Vec<&str> = values.list.iter().map(String::as_str).collect();
    let global = string_pool(&value_list, true);

    let max_type = entries.iter().map(|e| e.type_id).max().unwrap_or(1);
    let type_names: Vec<String> = (1..=max_type).map(|t| format!("type{}", t)).collect();
    let type_refs: Vec<&str> = type_names.iter().map(String::as_str).collect();
    let type_pool = string_pool(&type_refs, false);

    let max_entry = entries.iter().map(|e| e.entry).max().unwrap_or(0);
    let key_names: Vec<String> = (0..=max_entry).map(|k| format!("key{}", k)).collect();
    let key_refs: Vec<&str> = key_names.iter().map(String::as_str).collect();
    let key_pool = string_pool(&key_refs, false);

    let mut groups: BTreeMap<(u8, &str), Vec<&TableEntry>> = BTreeMap::new();
    for e in entries {
        groups.entry((e.type_id, e.language.unwrap_or(""))).or_default().push(e);
    }

    let mut type_chunks = Vec::new();
    let mut spec_written = Vec::new();
    for ((type_id, language), group) in &groups {
        let entry_count = max_entry as u32 + 1;
        if !spec_written.contains(type_id) {
            spec_written.push(*type_id);
            let mut header = vec![*type_id, 0];
            put_u16(&mut header, 0);
            put_u32(&mut header, entry_count);
            let mut body = Vec::new();
            for _ in 0..entry_count {
                put_u32(&mut body, 0);
            }
            type_chunks.extend(chunk(0x0202, &header, &body));
        }

        let mut entry_data = Vec::new();
        let mut offsets: BTreeMap<u16, u32> = BTreeMap::new();
        for e in group {
            offsets.insert(e.entry, entry_data.len() as u32);
            let (data_type, data) = match e.value {
                TableValue::Str(s) => (value_type::STRING, values.index[s]),
                TableValue::Ref(target) => (value_type::REFERENCE, target),
            };
            if let Layout::Compact = layout {
                put_u16(&mut entry_data, e.entry);
                put_u16(&mut entry_data, 0x0008 | (data_type as u16) << 8);
                put_u32(&mut entry_data, data);
                continue;
            }
            put_u16(&mut entry_data, 8);
            put_u16(&mut entry_data, 0);
            put_u32(&mut entry_data, e.entry as u32);
            put_u16(&mut entry_data, 8);
            entry_data.push(0);
            entry_data.push(data_type);
            put_u32(&mut entry_data, data);
        }

        let mut offset_table = Vec::new();
        let (flags, count) = match layout {
            Layout::Dense | Layout::Compact => {
                for i in 0..entry_count as u16 {
                    put_u32(&mut offset_table, offsets.get(&i).copied().unwrap_or(u32::MAX));
                }
                (0u8, entry_count)
            }
            Layout::Sparse => {
                for (i, off) in &offsets {
                    put_u16(&mut offset_table, *i);
                    put_u16(&mut offset_table, (*off / 4) as u16);
                }
                (0x01u8, offsets.len() as u32)
            }
            Layout::Offset16 => {
                for i in 0..entry_count as u16 {
                    let off = offsets.get(&i).map(|off| (*off / 4) as u16).unwrap_or(0xffff);
                    put_u16(&mut offset_table, off);
                }
                (0x02u8, entry_count)
            }
        };
        pad4(&mut offset_table);

        let mut config = vec![0u8; 64];
        config[0..4].copy_from_slice(&64u32.to_le_bytes());
        if let [a, b] = language.as_bytes() {
            config[8] = *a;
            config[9] = *b;
        }

        let header_size = 8 + 12 + config.len();
        let mut header = vec![*type_id, flags];
        put_u16(&mut header, 0);
        put_u32(&mut header, count);
        put_u32(&mut header, (header_size + offset_table.len()) as u32);
        header.extend_from_slice(&config);

        let mut body = offset_table;
        body.extend(entry_data);
        type_chunks.extend(chunk(0x0201, &header, &body));
    }

    let package_header_size = 288u32;
    let mut header = Vec::new();
    put_u32(&mut header, 0x7f);
    let mut name = [0u8; 256];
    for (i, unit) in "com.example".encode_utf16().enumerate() {
        name[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    header.extend_from_slice(&name);
    put_u32(&mut header, package_header_size);
    put_u32(&mut header, max_type as u32);
    put_u32(&mut header, package_header_size + type_pool.len() as u32);
    put_u32(&mut header, max_entry as u32 + 1);
    put_u32(&mut header, 0);

    let mut package_body = type_pool;
    package_body.extend(key_pool);
    package_body.extend(type_chunks);
    let package = chunk(0x0200, &header, &package_body);

    let mut table_header = Vec::new();
    put_u32(&mut table_header, 1);
    let mut body = global;
    body.extend(package);
    chunk(0x0002, &table_header, &body)
}

/// Zips the given entries into an in-memory archive.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Writes an APK whose label is a plain string.
pub fn write_apk(path: &Path, package: &'static str, label: &'static str, version: &'static str) {
    let manifest = manifest(package, 1, Some(Value::Str(version)), Some(Value::Str(label)));
    std::fs::write(path, zip_bytes(&[("AndroidManifest.xml", &manifest), ("classes.dex", b"dex\n035")])).unwrap();
}
