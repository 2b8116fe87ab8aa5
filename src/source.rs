use crate::ByteSource;
use std::path::Path;
use std::sync::Arc;

/// Audio file contents together with the name it should be exported under.
#[derive(Clone, Debug)]
pub struct AudioFile {
    pub name: String,
    pub bytes: ByteSource,
}

impl AudioFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<ByteSource>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads the whole file into memory.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("audio"));

        Ok(Self {
            name,
            bytes: Arc::from(bytes),
        })
    }

    /// Writes the bytes to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, &self.bytes)
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.name)
    }

    /// Whether two files share the same underlying bytes.
    pub fn same_source(&self, other: &AudioFile) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}
