use std::any::Any;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;

use anyhow::{Context, anyhow, bail};
use camino::{Utf8Path, Utf8PathBuf};

use crate::error::PortError;
use crate::port::{PortId, Value, downcast, value};
use crate::simple::{Procedure, Simple};

use super::{CSV, RESET, ROW_COUNTER};

/// Turns the value of a column into the text of a CSV cell.
pub type Renderer = Box<dyn Fn(&(dyn Any + Send + Sync)) -> String + Send>;

struct Column {
    id: PortId,
    renderer: Renderer,
    value: Option<Value>,
}

/// Appends one CSV row per execution, with one column per declared input.
///
/// The file is given through the [`CSV`] input. When it already exists, a
/// trailing partial line is trimmed, the header is kept and the rows already
/// present are counted. The [`ROW_COUNTER`] output, a `u64`, is always set.
pub struct CsvSink {
    columns: Vec<Column>,
    separator: String,
    path: Option<Utf8PathBuf>,
    file: Option<File>,
    header_written: bool,
    rows: u64,
}

impl CsvSink {
    /// Creates a sink recording `columns`, in order, separated by commas.
    ///
    /// # Errors
    ///
    /// [`PortError::Reserved`] if a column uses the id [`CSV`], [`RESET`] or
    /// [`ROW_COUNTER`].
    pub fn new<I>(columns: I) -> Result<Self, PortError>
    where
        I: IntoIterator,
        I::Item: Into<PortId>,
    {
        let mut sink = Self {
            columns: Vec::new(),
            separator: ",".to_string(),
            path: None,
            file: None,
            header_written: false,
            rows: 0,
        };

        for id in columns {
            let id = id.into();
            if [CSV, RESET, ROW_COUNTER].contains(&id) {
                return Err(PortError::Reserved(id));
            }
            if sink.columns.iter().all(|column| column.id != id) {
                sink.columns.push(Column {
                    id,
                    renderer: Box::new(render_default),
                    value: None,
                });
            }
        }

        Ok(sink)
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Replaces the renderer of `column`.
    ///
    /// # Errors
    ///
    /// [`PortError::NoSuchInput`] if `column` is not recorded by this sink.
    pub fn with_renderer<F>(
        mut self,
        column: impl Into<PortId>,
        renderer: F,
    ) -> Result<Self, PortError>
    where
        F: Fn(&(dyn Any + Send + Sync)) -> String + Send + 'static,
    {
        let id = column.into();
        let column = self
            .columns
            .iter_mut()
            .find(|column| column.id == id)
            .ok_or(PortError::NoSuchInput(id))?;
        column.renderer = Box::new(renderer);
        Ok(self)
    }

    pub fn task(self) -> Simple<Self> {
        Simple::new(self).with_reset(RESET)
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    fn open(&mut self) -> anyhow::Result<()> {
        if self.file.is_some() {
            return Ok(());
        }

        let path = self
            .path
            .as_ref()
            .ok_or_else(|| anyhow!("No CSV file received"))?;

        let lines = trim_partial_line(path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {path}"))?;

        self.header_written = lines >= 1;
        self.rows = lines.saturating_sub(1);
        self.file = Some(file);
        Ok(())
    }

    fn join(&self, cells: impl Iterator<Item = String>) -> String {
        cells.collect::<Vec<_>>().join(&self.separator)
    }
}

impl fmt::Debug for CsvSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvSink")
            .field("columns", &self.columns.iter().map(|c| &c.id).collect::<Vec<_>>())
            .field("path", &self.path)
            .field("rows", &self.rows)
            .finish()
    }
}

impl Procedure for CsvSink {
    fn inputs(&self) -> Vec<PortId> {
        let mut ids = vec![CSV];
        ids.extend(self.columns.iter().map(|column| column.id.clone()));
        ids
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![ROW_COUNTER]
    }

    fn write(&mut self, id: &PortId, value: Value) -> Result<(), PortError> {
        if *id == CSV {
            let path: Utf8PathBuf = downcast(id, &value)?;
            self.path = Some(path);
            self.file = None;
            self.header_written = false;
            self.rows = 0;
            // An unreadable file is reported again when the task executes.
            if let Err(error) = self.open() {
                tracing::warn!("CSV file not ready: {error:#}");
            }
            return Ok(());
        }

        let column = self
            .columns
            .iter_mut()
            .find(|column| column.id == *id)
            .ok_or_else(|| PortError::NoSuchInput(id.clone()))?;
        column.value = Some(value);
        Ok(())
    }

    fn read(&self, _: &PortId) -> Result<Option<Value>, PortError> {
        Ok(Some(value(self.rows)))
    }

    fn run(&mut self) -> anyhow::Result<()> {
        self.open()?;

        let mut text = String::new();
        if !self.header_written {
            text += &self.join(self.columns.iter().map(|column| column.id.to_string()));
            text.push('\n');
        }
        text += &self.join(self.columns.iter().map(|column| {
            column
                .value
                .as_deref()
                .map(|item| (column.renderer)(item))
                .unwrap_or_default()
        }));
        text.push('\n');

        let Some(file) = self.file.as_mut() else {
            bail!("CSV file is not open");
        };
        file.write_all(text.as_bytes())
            .context("Failed to append a CSV row")?;

        self.header_written = true;
        self.rows += 1;
        Ok(())
    }
}

/// Drops an unterminated last line, then returns the number of lines left.
fn trim_partial_line(path: &Utf8Path) -> anyhow::Result<u64> {
    if !path.exists() {
        return Ok(0);
    }

    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    let complete = content.rfind('\n').map_or(0, |index| index + 1);

    if complete < content.len() {
        OpenOptions::new()
            .write(true)
            .open(path)
            .and_then(|file| file.set_len(complete as u64))
            .with_context(|| format!("Failed to trim {path}"))?;
        tracing::debug!(path = %path, "Trimmed partial CSV line");
    }

    Ok(content[..complete].matches('\n').count() as u64)
}

fn render_default(item: &(dyn Any + Send + Sync)) -> String {
    macro_rules! display {
        ($($ty:ty),+) => {
            $(
                if let Some(item) = item.downcast_ref::<$ty>() {
                    return item.to_string();
                }
            )+
        };
    }

    display!(
        String, &'static str, Utf8PathBuf, bool, char, u8, u16, u32, u64, u128, usize, i8, i16,
        i32, i64, i128, isize, f32, f64
    );
    "?".to_string()
}
