/// Settings applied to file-backed stores.
///
/// Same builder shape as the rest of the crate's configuration types:
///
/// ```
/// use rustmemostore::StoreConfig;
///
/// let config = StoreConfig::new().pretty_json(false).fsync(false);
/// assert!(!config.pretty_json);
/// assert_eq!(config.extension(), "json");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Indent the JSON written to backing files.
    pub pretty_json: bool,

    /// `fsync` the temp file before it replaces the backing file.
    pub fsync: bool,

    /// Extension for backing files created by a registry (default `json`).
    pub file_extension: Option<String>,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self {
            pretty_json: true,
            fsync: true,
            file_extension: None,
        }
    }

    pub fn pretty_json(mut self, pretty: bool) -> Self {
        self.pretty_json = pretty;
        self
    }

    pub fn fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }

    pub fn file_extension(mut self, extension: &str) -> Self {
        self.file_extension = Some(extension.trim_start_matches('.').to_string());
        self
    }

    pub fn extension(&self) -> &str {
        self.file_extension.as_deref().unwrap_or("json")
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
