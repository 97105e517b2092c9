//! Buffered output files with atomic commit.
//!
//! Generated content is collected in memory and only reaches the destination
//! when [`OutputFile::commit`] is called. The content is written to a
//! temporary file in the destination directory and renamed into place, so
//! tools watching the directory never see a half-written file. Dropping an
//! uncommitted file discards its content.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io::{self, Write};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// UTF-8 byte-order mark.
const BOM: &str = "\u{feff}";

/// Line terminator used when a file is committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineEnding {
    /// `\n`
    #[default]
    Unix,
    /// `\r\n`
    Windows,
}

/// What [`OutputFile::commit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The file was created or replaced.
    Written,
    /// The existing file already had this content and was left untouched.
    Unchanged,
}

/// An output file being generated.
#[derive(Debug)]
pub struct OutputFile {
    path: Utf8PathBuf,
    eol: LineEnding,
    bom: bool,
    content: String,
}

impl OutputFile {
    /// Start generating `path` with Unix line endings.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            eol: LineEnding::Unix,
            bom: false,
            content: String::new(),
        }
    }

    /// Use `eol` as the line terminator.
    #[must_use]
    pub const fn with_line_ending(mut self, eol: LineEnding) -> Self {
        self.eol = eol;
        self
    }

    /// Start the file with a UTF-8 byte-order mark.
    #[must_use]
    pub const fn with_bom(mut self) -> Self {
        self.bom = true;
        self
    }

    /// Destination path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Content written so far, with `\n` line endings.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Append `text`. Lines are separated by `\n` regardless of the final
    /// line ending.
    pub fn write(&mut self, text: &str) {
        self.content.push_str(text);
    }

    fn rendered(&self) -> String {
        let body = match self.eol {
            LineEnding::Unix => self.content.clone(),
            LineEnding::Windows => self.content.replace('\n', "\r\n"),
        };
        if self.bom {
            format!("{BOM}{body}")
        } else {
            body
        }
    }

    /// Write the content to the destination atomically.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while creating the parent directory,
    /// writing the temporary file or moving it into place.
    pub fn commit(self) -> io::Result<CommitOutcome> {
        let data = self.rendered();
        if fs::read(&self.path).is_ok_and(|existing| existing == data.as_bytes()) {
            debug!("{} is up to date", self.path);
            return Ok(CommitOutcome::Unchanged);
        }
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let handle = tmp.as_file_mut();
            handle.write_all(data.as_bytes())?;
            handle.flush()?;
            handle.sync_all()?;
        }
        tmp.persist(&self.path).map_err(|err| err.error)?;
        info!("Wrote {}", self.path);
        Ok(CommitOutcome::Written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::tempdir;

    fn utf8(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir")
    }

    #[rstest]
    fn commit_creates_parent_directories() {
        let dir = tempdir().expect("temp dir");
        let path = utf8(&dir).join("sub/out.mk");
        let mut file = OutputFile::new(&path);
        file.write("all:\n");
        assert_eq!(file.commit().expect("commit"), CommitOutcome::Written);
        assert_eq!(fs::read_to_string(&path).expect("read"), "all:\n");
    }

    #[rstest]
    fn windows_files_get_crlf_and_bom() {
        let dir = tempdir().expect("temp dir");
        let path = utf8(&dir).join("a.sln");
        let mut file = OutputFile::new(&path)
            .with_line_ending(LineEnding::Windows)
            .with_bom();
        file.write("one\ntwo\n");
        file.commit().expect("commit");
        let bytes = fs::read(&path).expect("read");
        assert_eq!(bytes, b"\xef\xbb\xbfone\r\ntwo\r\n");
    }

    #[rstest]
    fn identical_content_is_left_untouched() {
        let dir = tempdir().expect("temp dir");
        let path = utf8(&dir).join("GNUmakefile");
        let mut first = OutputFile::new(&path);
        first.write("x:\n");
        first.commit().expect("commit");
        let mut second = OutputFile::new(&path);
        second.write("x:\n");
        assert_eq!(second.commit().expect("commit"), CommitOutcome::Unchanged);
    }

    #[rstest]
    fn dropped_files_leave_nothing_behind() {
        let dir = tempdir().expect("temp dir");
        let path = utf8(&dir).join("never.mk");
        let mut file = OutputFile::new(&path);
        file.write("partial");
        drop(file);
        assert!(!path.exists());
        let leftovers = fs::read_dir(dir.path()).expect("list").count();
        assert_eq!(leftovers, 0);
    }
}
