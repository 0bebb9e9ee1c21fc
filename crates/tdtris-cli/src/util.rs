use std::{
    fs::File,
    io::{self, BufReader, BufWriter, StdoutLock, Write},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use serde::{Serialize, de::DeserializeOwned};

/// Where a command writes its results: stdout, or the file named by an
/// `--output`/`--report` flag.
#[derive(Debug)]
pub(crate) enum Output {
    Stdout(StdoutLock<'static>),
    File {
        path: PathBuf,
        writer: BufWriter<File>,
    },
}

impl Output {
    pub(crate) fn from_output_path(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::Stdout(io::stdout().lock()));
        };
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Self::File {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Writes `value` as a single pretty-printed JSON document.
    pub(crate) fn save_json<T>(value: &T, path: Option<PathBuf>) -> anyhow::Result<()>
    where
        T: Serialize + ?Sized,
    {
        let mut output = Self::from_output_path(path)?;
        serde_json::to_writer_pretty(&mut output, value)
            .with_context(|| format!("Failed to write JSON to {}", output.display_path()))?;
        output.end_line()?;
        output
            .flush()
            .with_context(|| format!("Failed to flush output to {}", output.display_path()))
    }

    pub(crate) fn display_path(&self) -> String {
        match self {
            Self::Stdout(_) => "stdout".to_owned(),
            Self::File { path, .. } => path.display().to_string(),
        }
    }

    /// Appends `value` as compact JSON on its own line; not flushed.
    pub(crate) fn write_json_line<T>(&mut self, value: &T) -> anyhow::Result<()>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_writer(&mut *self, value)
            .with_context(|| format!("Failed to write JSON to {}", self.display_path()))?;
        self.end_line()
    }

    /// Appends `text` plus a newline and flushes, so frames show up as they
    /// are produced.
    pub(crate) fn write_text(&mut self, text: &str) -> anyhow::Result<()> {
        self.write_all(text.as_bytes())
            .with_context(|| format!("Failed to write to {}", self.display_path()))?;
        self.end_line()?;
        self.flush()
            .with_context(|| format!("Failed to flush output to {}", self.display_path()))
    }

    fn end_line(&mut self) -> anyhow::Result<()> {
        self.write_all(b"\n")
            .with_context(|| format!("Failed to write to {}", self.display_path()))
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdout(writer) => writer.write(buf),
            Self::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdout(writer) => writer.flush(),
            Self::File { writer, .. } => writer.flush(),
        }
    }
}

/// Parses the JSON file at `path`; `what` names the file in error messages.
pub(crate) fn read_json<T>(path: &Path, what: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let file = File::open(path)
        .with_context(|| format!("Failed to open {what} file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {what} file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_read_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        Output::save_json(&[1, 2, 3], Some(path.clone())).unwrap();
        let value: Vec<i32> = read_json(&path, "test").unwrap();
        assert_eq!(value, vec![1, 2, 3]);
        assert!(std::fs::read_to_string(&path).unwrap().ends_with("]\n"));
    }

    #[test]
    fn test_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let mut output = Output::from_output_path(Some(path.clone())).unwrap();
        output.write_json_line("a").unwrap();
        output.write_json_line("b").unwrap();
        output.flush().unwrap();
        drop(output);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "\"a\"\n\"b\"\n");
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let err = read_json::<Vec<i32>>(&path, "weights").unwrap_err();
        assert!(err.to_string().contains("Failed to parse weights file"));
    }
}
