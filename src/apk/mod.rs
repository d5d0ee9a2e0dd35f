//! Reads the application label and version out of package archives.
//!
//! An `.apk` is a zip archive holding a compiled `AndroidManifest.xml` and,
//! when the label is a `@string/...` reference, a `resources.arsc` table to
//! resolve it against. An `.xapk` bundle carries a `manifest.json` describing
//! the app, or at least one nested `.apk`.
pub mod arsc;
pub mod axml;
pub mod chunk;
pub mod string_pool;

#[cfg(test)]
pub(crate) mod fixtures;

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use self::arsc::ResourceTable;
use self::axml::Manifest;
use self::chunk::ResValue;
use crate::app::App;
use crate::error::ApkError;

const MANIFEST_ENTRY: &str = "AndroidManifest.xml";
/// Largest buffer reserved up front for an entry; the declared size comes
/// from the archive and is not trusted.
const MAX_PREALLOC: u64 = 16 << 20;
const RESOURCES_ENTRY: &str = "resources.arsc";
const BUNDLE_MANIFEST_ENTRY: &str = "manifest.json";

/// Reads the app metadata of the package at `path`.
pub fn read_app(path: &Path) -> Result<App, ApkError> {
    let file = File::open(path).map_err(|source| ApkError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let is_bundle = path
        .extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case("xapk"))
        .unwrap_or(false);
    let app = if is_bundle {
        read_bundle(reader)?
    } else {
        read_apk(reader)?
    };
    debug!("The label of {} is: {}", path.display(), app.label_and_version());
    Ok(app)
}

/// Reads a single APK from any seekable source.
pub fn read_apk<R: Read + Seek>(reader: R) -> Result<App, ApkError> {
    let mut archive = ZipArchive::new(reader)?;
    let manifest = Manifest::parse(&read_entry(&mut archive, MANIFEST_ENTRY)?)?;

    let needs_table = matches!(manifest.label, Some(ResValue::Reference(_)))
        || matches!(manifest.version_name, Some(ResValue::Reference(_)));
    let table = if needs_table {
        match read_entry(&mut archive, RESOURCES_ENTRY).and_then(|data| ResourceTable::parse(&data)) {
            Ok(table) => Some(table),
            Err(e) => {
                warn!("Could not load resources of {}: {}", manifest.package, e);
                None
            }
        }
    } else {
        None
    };

    let label = text_value(manifest.label.as_ref(), table.as_ref(), &manifest.package, "label");
    let version_name = text_value(manifest.version_name.as_ref(), table.as_ref(), &manifest.package, "versionName");
    Ok(App::new(&manifest.package, label.as_deref()).with_version(version_name, manifest.version_code))
}

fn text_value(value: Option<&ResValue>, table: Option<&ResourceTable>, package: &str, what: &str) -> Option<String> {
    match value? {
        ResValue::String(s) => Some(s.clone()),
        ResValue::Int(v) => Some(v.to_string()),
        ResValue::Reference(id) => {
            let resolved = table.map(|t| t.resolve_string(*id));
            match resolved {
                Some(Ok(s)) => Some(s),
                Some(Err(e)) => {
                    warn!("{} of {}: {}", what, package, e);
                    None
                }
                None => None,
            }
        }
        other => {
            debug!("Ignoring {} of {}: {:?}", what, package, other);
            None
        }
    }
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>, ApkError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Err(ApkError::MissingEntry(name.to_string())),
        Err(e) => return Err(e.into()),
    };
    let mut data = Vec::with_capacity(initial_capacity(entry.size()));
    entry.read_to_end(&mut data).map_err(|source| ApkError::Io {
        path: name.into(),
        source,
    })?;
    Ok(data)
}

fn initial_capacity(declared: u64) -> usize {
    declared.min(MAX_PREALLOC) as usize
}

#[derive(Debug, Deserialize)]
struct BundleManifest {
    package_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version_name: Option<String>,
    #[serde(default)]
    version_code: Option<serde_json::Value>,
}

impl BundleManifest {
    fn version_code(&self) -> Option<u32> {
        match self.version_code.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Reads an `.xapk` bundle.
pub fn read_bundle<R: Read + Seek>(reader: R) -> Result<App, ApkError> {
    let mut archive = ZipArchive::new(reader)?;
    match read_entry(&mut archive, BUNDLE_MANIFEST_ENTRY) {
        Ok(data) => {
            let manifest: BundleManifest = serde_json::from_slice(&data)?;
            let version_code = manifest.version_code();
            Ok(App::new(&manifest.package_name, manifest.name.as_deref())
                .with_version(manifest.version_name, version_code))
        }
        Err(ApkError::MissingEntry(_)) => {
            let nested = nested_apk_name(&archive).ok_or_else(|| ApkError::MissingEntry(BUNDLE_MANIFEST_ENTRY.to_string()))?;
            debug!("Bundle has no {}, reading {}", BUNDLE_MANIFEST_ENTRY, nested);
            let data = read_entry(&mut archive, &nested)?;
            read_apk(Cursor::new(data))
        }
        Err(e) => Err(e),
    }
}

fn nested_apk_name<R: Read + Seek>(archive: &ZipArchive<R>) -> Option<String> {
    let apks: Vec<&str> = archive
        .file_names()
        .filter(|n| n.to_ascii_lowercase().ends_with(".apk"))
        .collect();
    apks.iter()
        .find(|n| n.eq_ignore_ascii_case("base.apk"))
        .or_else(|| apks.first())
        .map(|n| n.to_string())
}
