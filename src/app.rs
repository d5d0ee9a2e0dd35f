//! Contains the App struct and related logic.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    pub package_name: String,
    pub app_name: String,
    pub version_name: Option<String>,
    pub version_code: Option<u32>,
}

impl App {
    pub fn new(package_name: &str, app_name: Option<&str>) -> Self {
        let app_name = match app_name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => package_name.to_string(),
        };
        Self {
            package_name: package_name.to_string(),
            app_name,
            version_name: None,
            version_code: None,
        }
    }

    pub fn with_version(mut self, version_name: Option<String>, version_code: Option<u32>) -> Self {
        self.version_name = version_name.filter(|v| !v.trim().is_empty());
        self.version_code = version_code;
        self
    }

    /// Version shown to the user: the version name, or the version code when
    /// the package has no name.
    pub fn version(&self) -> Option<String> {
        self.version_name
            .as_ref()
            .map(|v| v.trim().to_string())
            .or_else(|| self.version_code.map(|c| c.to_string()))
    }

    pub fn label_and_version(&self) -> String {
        match self.version() {
            Some(version) => format!("{} {}", self.app_name, version),
            None => self.app_name.clone(),
        }
    }
}
