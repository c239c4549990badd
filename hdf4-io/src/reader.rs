//! Random-access reader for HDF4 files

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use hdf4_format::constants::{TAG_CHUNK, TAG_COMPRESSED, TAG_LINKED};
use hdf4_format::{DataType, FormatError, Result, TagKey, TagRecord, Values};
use tracing::{debug, info};

use crate::access;
use crate::construct::{self, ClaimIndex, Claimant};
use crate::directory::TagDirectory;
use crate::layout::{LayoutInfo, Resolver};
use crate::model::{Dataset, VarId};
use crate::section::Section;
use crate::source::{ByteSource, FileSource, MemorySource};
use crate::{DecodeOptions, Diagnostic};

/// An opened HDF4 file: its tags, its object model and lazy data access
pub struct Hdf4File {
    source: Box<dyn ByteSource>,
    directory: TagDirectory,
    dataset: Dataset,
    claims: ClaimIndex,
    diagnostics: Vec<Diagnostic>,
    opts: DecodeOptions,
    resolutions: AtomicUsize,
}

impl Hdf4File {
    /// Open a file on disk
    pub fn open<P: AsRef<Path>>(path: P, opts: DecodeOptions) -> Result<Self> {
        let source: FileSource<File> = FileSource::open(path)?;
        Self::from_source(Box::new(source), opts)
    }

    /// Open an in-memory image
    pub fn from_bytes(data: impl Into<Bytes>, opts: DecodeOptions) -> Result<Self> {
        Self::from_source(Box::new(MemorySource::new(data)), opts)
    }

    /// Open any seekable reader
    pub fn from_reader<R>(reader: R, opts: DecodeOptions) -> Result<Self>
    where
        R: Read + Seek + Send + 'static,
    {
        Self::from_source(Box::new(FileSource::new(reader)?), opts)
    }

    /// Open an arbitrary byte source
    pub fn from_source(source: Box<dyn ByteSource>, opts: DecodeOptions) -> Result<Self> {
        let mut diagnostics = Vec::new();
        let directory = TagDirectory::read(source.as_ref(), &opts, &mut diagnostics)?;
        let built = construct::build(source.as_ref(), &directory, &opts)?;
        diagnostics.extend(built.diagnostics);
        info!(
            tags = directory.len(),
            variables = built.dataset.variables().count(),
            diagnostics = diagnostics.len(),
            "opened HDF4 file"
        );
        Ok(Self {
            source,
            directory,
            dataset: built.dataset,
            claims: built.claims,
            diagnostics,
            opts,
            resolutions: AtomicUsize::new(0),
        })
    }

    /// The object model.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// The tag directory.
    pub fn directory(&self) -> &TagDirectory {
        &self.directory
    }

    /// All tags in directory order.
    pub fn tags(&self) -> &[TagRecord] {
        self.directory.tags()
    }

    /// Tag by key.
    pub fn tag(&self, key: TagKey) -> Option<&TagRecord> {
        self.directory.get(key)
    }

    /// Model object owning `key`, if any.
    pub fn claimant(&self, key: TagKey) -> Option<Claimant> {
        self.claims.get(key)
    }

    /// Tags no model object took, excluding storage-only tags (linked
    /// blocks, compressed data and chunks) which are reached through their
    /// owners' layouts.
    pub fn orphan_tags(&self) -> impl Iterator<Item = &TagRecord> {
        self.directory.tags().iter().filter(|record| {
            let key = record.entry.key();
            !self.claims.is_claimed(key)
                && !matches!(key.code, TAG_LINKED | TAG_COMPRESSED | TAG_CHUNK)
        })
    }

    /// Conditions recorded while opening.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Options the file was opened with.
    pub fn options(&self) -> &DecodeOptions {
        &self.opts
    }

    /// Variable by slash-separated path.
    pub fn variable(&self, path: &str) -> Option<VarId> {
        self.dataset.find_variable(path)
    }

    /// Layout of a variable, resolved on first use and cached.
    pub fn resolve_layout(&self, var: VarId) -> Result<Arc<LayoutInfo>> {
        let variable = self.dataset.variable(var);
        let mut slot = variable
            .layout
            .0
            .lock()
            .map_err(|_| FormatError::Corrupt("layout cache poisoned".to_string()))?;
        if let Some(layout) = slot.as_ref() {
            return Ok(Arc::clone(layout));
        }
        let resolver = Resolver::new(self.source.as_ref(), &self.directory, &self.opts);
        let layout = Arc::new(resolver.resolve(variable)?);
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        debug!(variable = %variable.name, layout = layout.kind.name(), "resolved layout");
        *slot = Some(Arc::clone(&layout));
        Ok(layout)
    }

    /// Number of layouts resolved so far.
    pub fn resolution_count(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }

    /// Read a section of a variable as big-endian element bytes; `None`
    /// reads everything.
    pub fn read(&self, var: VarId, section: Option<&Section>) -> Result<Bytes> {
        let variable = self.dataset.variable(var);
        let full;
        let section = match section {
            Some(section) => section,
            None => {
                full = Section::full(&variable.shape);
                &full
            }
        };
        let layout = self.resolve_layout(var)?;
        let bytes = access::read_section(
            self.source.as_ref(),
            &layout,
            &variable.shape,
            section,
            &self.opts,
        )?;
        Ok(Bytes::from(bytes))
    }

    /// Read a section decoded into typed values.
    ///
    /// Char data of rank two or more comes back as one string per row of
    /// the last dimension.
    pub fn read_values(&self, var: VarId, section: Option<&Section>) -> Result<Values> {
        let variable = self.dataset.variable(var);
        if variable.is_compound() {
            return Err(FormatError::InvalidSection(format!(
                "'{}' is compound; read its members",
                variable.name
            )));
        }
        let bytes = self.read(var, section)?;
        if variable.data_type.is_char() && variable.rank() >= 2 {
            let width = match section {
                Some(section) => section.ranges().last().map_or(1, |r| r.count),
                None => variable.shape.last().copied().unwrap_or(1),
            };
            return Ok(Values::strings_from_bytes(&bytes, width));
        }
        Values::from_be_bytes(variable.data_type, &bytes)
    }

    /// Read one member of a compound variable over a section of records.
    pub fn read_member(&self, var: VarId, member: &str, section: Option<&Section>) -> Result<Values> {
        let variable = self.dataset.variable(var);
        let field = variable.member(member).ok_or_else(|| {
            FormatError::InvalidSection(format!("'{}' has no member '{member}'", variable.name))
        })?;
        let records = self.read(var, section)?;
        let bytes = access::extract_member(&records, variable.element_size, field.offset, field.size())?;
        if field.data_type == DataType::Char {
            return Ok(Values::strings_from_bytes(&bytes, field.size()));
        }
        Values::from_be_bytes(field.data_type, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_file_is_send_and_sync() {
        assert_send_sync::<Hdf4File>();
    }

    #[test]
    fn test_not_hdf4() {
        let result = Hdf4File::from_bytes(vec![0u8; 600], DecodeOptions::default());
        assert!(matches!(result, Err(FormatError::NotRecognized)));
    }
}
