//! Source files with double-checked phase flags.
//!
//! Two workers can race on the same file (one loading it for a `#import`,
//! another for the root module). The rule: fast-path flag test, then lock,
//! then re-test. The winner does the work exactly once; the loser proceeds
//! as soon as the lock is released.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Handle to a source file.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct FileId(pub u32);

/// One source file and its pipeline progress flags.
pub struct SourceFile {
    id: FileId,
    path: PathBuf,
    buffer: Mutex<String>,
    loaded: AtomicBool,
    lexed: AtomicBool,
    parsed: AtomicBool,
}

impl SourceFile {
    /// Create an unloaded file.
    pub fn new(id: FileId, path: impl Into<PathBuf>) -> Self {
        SourceFile {
            id,
            path: path.into(),
            buffer: Mutex::new(String::new()),
            loaded: AtomicBool::new(false),
            lexed: AtomicBool::new(false),
            parsed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn id(&self) -> FileId {
        self.id
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_lexed(&self) -> bool {
        self.lexed.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_parsed(&self) -> bool {
        self.parsed.load(Ordering::Acquire)
    }

    /// Install the file contents directly and mark it loaded.
    pub fn load_buffer(&self, text: impl Into<String>) {
        *self.buffer.lock() = text.into();
        self.loaded.store(true, Ordering::Release);
    }

    /// Load the file through `loader` unless another worker already did.
    ///
    /// Returns `Ok(true)` when this call performed the load, `Ok(false)`
    /// when the flag was already set (possibly after briefly waiting on the
    /// winner's lock).
    pub fn ensure_loaded<F>(&self, loader: F) -> io::Result<bool>
    where
        F: FnOnce() -> io::Result<String>,
    {
        if self.is_loaded() {
            return Ok(false);
        }
        let mut buffer = self.buffer.lock();
        // Re-check under the lock: the winner may have finished while we
        // were blocked on it.
        if self.is_loaded() {
            return Ok(false);
        }
        *buffer = loader()?;
        self.loaded.store(true, Ordering::Release);
        Ok(true)
    }

    /// Same double-checked discipline for lexing: `lexer` runs exactly once
    /// per lexed generation of the buffer.
    pub fn ensure_lexed<F>(&self, lexer: F) -> bool
    where
        F: FnOnce(&str),
    {
        if self.is_lexed() {
            return false;
        }
        let buffer = self.buffer.lock();
        if self.is_lexed() {
            return false;
        }
        lexer(&buffer);
        self.lexed.store(true, Ordering::Release);
        true
    }

    /// Mark the file parsed.
    pub fn set_parsed(&self) {
        self.parsed.store(true, Ordering::Release);
    }

    /// Append metaprogram-generated source text and clear the lexed flag so
    /// the file is scheduled for re-lexing.
    pub fn splice_generated_source(&self, text: &str) {
        debug_assert!(text.ends_with('\n'), "generated source must end in a newline");
        self.buffer.lock().push_str(text);
        self.lexed.store(false, Ordering::Release);
        self.parsed.store(false, Ordering::Release);
    }

    /// Run `f` over the current contents.
    pub fn with_text<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        f(&self.buffer.lock())
    }
}

// Skips the buffer: file contents are not log material.
impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("loaded", &self.is_loaded())
            .field("lexed", &self.is_lexed())
            .field("parsed", &self.is_parsed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn load_buffer_sets_flag() {
        let file = SourceFile::new(FileId(0), "main.sb");
        assert!(!file.is_loaded());
        file.load_buffer("x := 1\n");
        assert!(file.is_loaded());
        file.with_text(|text| assert_eq!(text, "x := 1\n"));
    }

    #[test]
    fn racing_loads_run_the_loader_once() {
        let file = SourceFile::new(FileId(0), "main.sb");
        let runs = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let result = file.ensure_loaded(|| {
                        runs.fetch_add(1, Ordering::SeqCst);
                        Ok("source\n".to_owned())
                    });
                    assert!(result.is_ok());
                });
            }
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(file.is_loaded());
    }

    #[test]
    fn splice_resets_lex_progress() {
        let file = SourceFile::new(FileId(0), "main.sb");
        file.load_buffer("x := 1\n");
        assert!(file.ensure_lexed(|_| {}));
        assert!(file.is_lexed());

        file.splice_generated_source("y := 2\n");
        assert!(!file.is_lexed());
        file.with_text(|text| assert_eq!(text, "x := 1\ny := 2\n"));
        // Re-lexing picks up the appended text.
        assert!(file.ensure_lexed(|_| {}));
    }

    #[test]
    fn lexing_twice_is_a_no_op() {
        let file = SourceFile::new(FileId(0), "main.sb");
        file.load_buffer("x := 1\n");
        assert!(file.ensure_lexed(|_| {}));
        assert!(!file.ensure_lexed(|_| panic!("must not re-lex")));
    }
}
