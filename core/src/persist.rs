//! JSON reports of an index, its document lengths, and query results.
//!
//! Output is pretty-printed with two-space indentation and every floating point value is
//! written with exactly eight decimal places. Reports are never read back.

use crate::index::InvertedIndex;
use crate::query::ResultCache;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};
use std::fs::{create_dir_all, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// [`PrettyFormatter`] with fixed-precision floats.
pub struct ReportFormatter<'a> {
    pretty: PrettyFormatter<'a>,
}

impl Default for ReportFormatter<'_> {
    fn default() -> Self {
        Self { pretty: PrettyFormatter::with_indent(b"  ") }
    }
}

impl Formatter for ReportFormatter<'_> {
    fn write_f64<W: ?Sized + Write>(&mut self, writer: &mut W, value: f64) -> io::Result<()> {
        write!(writer, "{value:.8}")
    }

    fn write_f32<W: ?Sized + Write>(&mut self, writer: &mut W, value: f32) -> io::Result<()> {
        write!(writer, "{value:.8}")
    }

    fn begin_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_array(writer)
    }

    fn end_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.pretty.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object(writer)
    }

    fn end_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.pretty.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object_value(writer)
    }
}

pub fn to_writer<W: Write, T: Serialize + ?Sized>(writer: W, value: &T) -> Result<()> {
    let mut ser = serde_json::Serializer::with_formatter(writer, ReportFormatter::default());
    value.serialize(&mut ser)?;
    Ok(())
}

pub fn to_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    to_writer(&mut buf, value)?;
    Ok(String::from_utf8(buf)?)
}

fn save<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        create_dir_all(dir)?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    to_writer(&mut out, value)?;
    out.flush()?;
    tracing::debug!(path = %path.display(), "report written");
    Ok(())
}

/// term -> location -> positions.
pub fn write_index(index: &InvertedIndex, path: &Path) -> Result<()> {
    save(index.postings(), path)
}

/// location -> word count.
pub fn write_counts(index: &InvertedIndex, path: &Path) -> Result<()> {
    save(index.counts(), path)
}

/// canonical query -> ordered results.
pub fn write_results(results: &ResultCache, path: &Path) -> Result<()> {
    save(results, path)
}
