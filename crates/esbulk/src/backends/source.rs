//! 📂 Where the documents come from: a file, or stdin.
//!
//! 🧠 Knowledge graph:
//! - `data_source = "-"` → stdin. Anything else → a path.
//! - The parser reads synchronously on a blocking thread, so the reader here is a plain
//!   `std::io::Read`, not a tokio one. `serde_json` wants `Read`, and we let it have `Read`.
//! - The opened reader is moved into the parser task and dropped when that task ends,
//!   whichever way it ends. The file handle does not outlive the parse. 🦆

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use crate::app_config::SENTINEL;
use crate::error::LoadError;

/// 🚰 The two faucets we know how to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InputSource {
    Stdin,
    File(PathBuf),
}

/// 📦 An opened input: a name for the progress display, a size if we know it, and the
/// bytes themselves.
pub(crate) struct OpenedInput {
    pub(crate) name: String,
    /// 📏 0 means "no idea", which is always the answer for stdin.
    pub(crate) size: u64,
    pub(crate) reader: Box<dyn Read + Send>,
}

impl std::fmt::Debug for OpenedInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedInput")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish()
    }
}

impl OpenedInput {
    /// 🧪 Wrap any reader, for callers who already hold their bytes.
    pub(crate) fn from_reader(name: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Self {
            name: name.into(),
            size: 0,
            reader: Box::new(reader),
        }
    }
}

impl InputSource {
    pub(crate) fn from_config(data_source: &str) -> Self {
        if data_source == SENTINEL {
            InputSource::Stdin
        } else {
            InputSource::File(PathBuf::from(data_source))
        }
    }

    /// 🚪 Open the faucet. A path that won't open is a configuration problem, not an I/O
    /// hiccup: nothing has been sent yet and nothing will be.
    pub(crate) fn open(&self) -> Result<OpenedInput> {
        match self {
            InputSource::Stdin => {
                debug!("📥 reading documents from stdin");
                Ok(OpenedInput {
                    name: "stdin".to_string(),
                    size: 0,
                    reader: Box::new(BufReader::new(std::io::stdin())),
                })
            }
            InputSource::File(path) => {
                let file = File::open(path)
                    .map_err(|err| {
                        LoadError::Config(format!(
                            "could not open data source '{}': {err}",
                            path.display()
                        ))
                    })
                    .context(format!(
                        "💀 The door to '{}' would not budge. We knocked. We checked if it exists \
                         (it might not). We checked permissions (they might be wrong).",
                        path.display()
                    ))?;
                // -- 📏 if metadata fails we fly blind, the progress bar just stops guessing percentages
                let size = file.metadata().map(|m| m.len()).unwrap_or(0);
                debug!("📥 reading documents from '{}' ({} bytes)", path.display(), size);
                Ok(OpenedInput {
                    name: path.display().to_string(),
                    size,
                    reader: Box::new(BufReader::new(file)),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn the_one_where_the_dash_means_stdin() {
        assert_eq!(InputSource::from_config("-"), InputSource::Stdin);
        assert_eq!(
            InputSource::from_config("docs.json"),
            InputSource::File(PathBuf::from("docs.json"))
        );
    }

    #[test]
    fn the_one_where_a_real_file_opens_and_knows_its_size() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, r#"{{"id":"a"}}"#)?;
        let source = InputSource::File(file.path().to_path_buf());

        let mut opened = source.open()?;
        assert_eq!(opened.size, 10);
        let mut contents = String::new();
        opened.reader.read_to_string(&mut contents)?;
        assert_eq!(contents, r#"{"id":"a"}"#);
        Ok(())
    }

    #[test]
    fn the_one_where_a_missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("💀 no temp dir, no test");
        let source = InputSource::File(dir.path().join("nope.json"));
        let err = source.open().expect_err("💀 a missing file should not open");
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::Config(_))
        ));
    }
}
