//! Data access: turns a resolved layout and a section into element bytes

use std::io::{self, Read};

use hdf4_codec::decompress;
use hdf4_format::{FormatError, Result};
use tracing::trace;

use crate::layout::{ChunkLayout, Compression, ElementLayout, LayoutInfo, LayoutKind, Segment};
use crate::section::{pitches, Section};
use crate::source::ByteSource;
use crate::DecodeOptions;

/// Sequential reader over one byte range of a source
pub struct RegionReader<'a> {
    source: &'a dyn ByteSource,
    offset: u64,
    end: u64,
}

impl<'a> RegionReader<'a> {
    /// Read `length` bytes from `offset`
    pub fn new(source: &'a dyn ByteSource, offset: u64, length: u64) -> Self {
        Self {
            source,
            offset,
            end: offset.saturating_add(length),
        }
    }
}

impl Read for RegionReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = (self.end.saturating_sub(self.offset) as usize).min(buf.len());
        if n == 0 {
            return Ok(0);
        }
        self.source
            .read_at(self.offset, &mut buf[..n])
            .map_err(|e| io::Error::new(io::ErrorKind::UnexpectedEof, e.to_string()))?;
        self.offset += n as u64;
        Ok(n)
    }
}

/// Reader presenting a linked-block chain as one byte stream.
///
/// Zero-length segments are skipped.
pub struct SegmentReader<'a> {
    source: &'a dyn ByteSource,
    segments: &'a [Segment],
    // logical start of each segment
    starts: Vec<u64>,
    total: u64,
    position: u64,
}

impl<'a> SegmentReader<'a> {
    /// Create a reader over `segments` in chain order
    pub fn new(source: &'a dyn ByteSource, segments: &'a [Segment]) -> Self {
        let mut starts = Vec::with_capacity(segments.len());
        let mut total = 0u64;
        for segment in segments {
            starts.push(total);
            total += segment.length;
        }
        Self {
            source,
            segments,
            starts,
            total,
            position: 0,
        }
    }

    /// Total logical length
    pub fn len(&self) -> u64 {
        self.total
    }

    /// Whether the chain holds no bytes
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Fill `buf` from logical offset `offset`; `buf` must lie within the chain.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if offset + buf.len() as u64 > self.total {
            return Err(FormatError::Truncated {
                offset,
                needed: buf.len() as u64,
            });
        }
        // last segment starting at or before offset, then skip empty ones
        let mut index = self.starts.partition_point(|&s| s <= offset).saturating_sub(1);
        let mut logical = offset;
        let mut filled = 0usize;
        while filled < buf.len() {
            let segment = self.segments[index];
            let within = logical - self.starts[index];
            if within >= segment.length {
                index += 1;
                continue;
            }
            let n = ((segment.length - within) as usize).min(buf.len() - filled);
            self.source
                .read_at(segment.offset + within, &mut buf[filled..filled + n])?;
            filled += n;
            logical += n as u64;
            index += 1;
        }
        Ok(())
    }
}

impl Read for SegmentReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = (self.total.saturating_sub(self.position) as usize).min(buf.len());
        if n == 0 {
            return Ok(0);
        }
        self.read_at(self.position, &mut buf[..n])
            .map_err(|e| io::Error::new(io::ErrorKind::UnexpectedEof, e.to_string()))?;
        self.position += n as u64;
        Ok(n)
    }
}

/// Bytes of one stored element, ready for logical reads
enum Stored<'a> {
    Empty,
    Region {
        source: &'a dyn ByteSource,
        offset: u64,
        length: u64,
    },
    Segments(SegmentReader<'a>),
    Memory(Vec<u8>),
}

impl<'a> Stored<'a> {
    fn open(
        source: &'a dyn ByteSource,
        placement: &'a LayoutKind,
        compression: Option<&Compression>,
        opts: &DecodeOptions,
    ) -> Result<Self> {
        let stored = match placement {
            LayoutKind::NoData => Stored::Empty,
            LayoutKind::Contiguous { offset, length } => Stored::Region {
                source,
                offset: *offset,
                length: *length,
            },
            LayoutKind::Linked { segments } => Stored::Segments(SegmentReader::new(source, segments)),
            LayoutKind::Chunked { .. } => {
                return Err(FormatError::Corrupt(
                    "chunked layout read as a single element".to_string(),
                ))
            }
        };
        let Some(compression) = compression else {
            return Ok(stored);
        };
        if !compression.codec.is_supported() {
            return Err(FormatError::UnsupportedCompression(compression.codec.code()));
        }
        let length = compression.uncompressed_length as usize;
        let decoded = match stored {
            Stored::Empty => Vec::new(),
            Stored::Region {
                source,
                offset,
                length: stored_length,
            } => decompress(
                &compression.codec,
                RegionReader::new(source, offset, stored_length),
                length,
                &opts.decompress_opts(),
            )?,
            Stored::Segments(reader) => {
                decompress(&compression.codec, reader, length, &opts.decompress_opts())?
            }
            Stored::Memory(bytes) => bytes,
        };
        trace!(
            codec = compression.codec.name(),
            bytes = decoded.len(),
            "decompressed element"
        );
        Ok(Stored::Memory(decoded))
    }

    fn len(&self) -> u64 {
        match self {
            Stored::Empty => 0,
            Stored::Region { length, .. } => *length,
            Stored::Segments(reader) => reader.len(),
            Stored::Memory(bytes) => bytes.len() as u64,
        }
    }

    /// Copy from logical `offset`; bytes past the stored end take `fill`.
    fn copy(&self, offset: u64, out: &mut [u8], fill: &[u8]) -> Result<()> {
        let available = (self.len().saturating_sub(offset) as usize).min(out.len());
        if available > 0 {
            let head = &mut out[..available];
            match self {
                Stored::Empty => {}
                Stored::Region {
                    source,
                    offset: base,
                    ..
                } => source.read_at(base + offset, head)?,
                Stored::Segments(reader) => reader.read_at(offset, head)?,
                Stored::Memory(bytes) => {
                    let start = offset as usize;
                    head.copy_from_slice(&bytes[start..start + available]);
                }
            }
        }
        if !fill.is_empty() {
            for (i, byte) in out[available..].iter_mut().enumerate() {
                *byte = fill[(offset as usize + available + i) % fill.len()];
            }
        }
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.len() as usize];
        self.copy(0, &mut out, &[0])?;
        Ok(out)
    }
}

/// Read a whole stored element, decompressed.
pub fn read_element(
    source: &dyn ByteSource,
    element: &ElementLayout,
    opts: &DecodeOptions,
) -> Result<Vec<u8>> {
    let stored = element.placement.stored_length() as usize;
    opts.limits.check_payload(stored)?;
    Stored::open(source, &element.placement, element.compression.as_ref(), opts)?.read_all()
}

fn fill_buffer(out: &mut [u8], fill: &[u8]) {
    if fill.is_empty() {
        return;
    }
    for chunk in out.chunks_mut(fill.len()) {
        chunk.copy_from_slice(&fill[..chunk.len()]);
    }
}

/// Read `section` of a variable with `shape` laid out as `layout`.
///
/// Output is big-endian elements in row-major section order.
pub fn read_section(
    source: &dyn ByteSource,
    layout: &LayoutInfo,
    shape: &[usize],
    section: &Section,
    opts: &DecodeOptions,
) -> Result<Vec<u8>> {
    section.validate(shape)?;
    let element_size = layout.element_size;
    shape
        .iter()
        .try_fold(element_size.max(1), |acc, &len| acc.checked_mul(len))
        .ok_or_else(|| FormatError::Corrupt(format!("shape {shape:?} overflows")))?;
    let total = section
        .ranges()
        .iter()
        .try_fold(element_size, |acc, r| acc.checked_mul(r.count))
        .ok_or_else(|| FormatError::InvalidSection("section too large".to_string()))?;
    if total > opts.limits.max_decompressed_bytes {
        return Err(FormatError::LimitExceeded(format!(
            "Read of {} bytes exceeds limit {}",
            total, opts.limits.max_decompressed_bytes
        )));
    }
    let fill = layout.fill_element();
    let mut out = vec![0u8; total];

    match &layout.kind {
        LayoutKind::NoData => fill_buffer(&mut out, &fill),
        LayoutKind::Chunked {
            chunk_shape,
            chunks,
        } => {
            fill_buffer(&mut out, &fill);
            read_chunks(source, layout, shape, chunk_shape, chunks, section, &fill, &mut out, opts)?;
        }
        placement => {
            let stored = Stored::open(source, placement, layout.compression.as_ref(), opts)?;
            let mut cursor = 0usize;
            for (start, count) in section.runs(shape) {
                let n = count * element_size;
                stored.copy(
                    (start * element_size) as u64,
                    &mut out[cursor..cursor + n],
                    &fill,
                )?;
                cursor += n;
            }
        }
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn read_chunks(
    source: &dyn ByteSource,
    layout: &LayoutInfo,
    shape: &[usize],
    chunk_shape: &[usize],
    chunks: &[ChunkLayout],
    section: &Section,
    fill: &[u8],
    out: &mut [u8],
    opts: &DecodeOptions,
) -> Result<()> {
    let rank = shape.len();
    if chunk_shape.len() != rank || chunk_shape.iter().any(|&c| c == 0) {
        return Err(FormatError::InconsistentShape(format!(
            "chunk shape {:?} does not fit variable shape {:?}",
            chunk_shape, shape
        )));
    }
    let element_size = layout.element_size;
    let chunk_bytes = chunk_shape
        .iter()
        .try_fold(element_size, |acc, &len| acc.checked_mul(len))
        .ok_or_else(|| FormatError::Corrupt(format!("chunk shape {chunk_shape:?} overflows")))?;
    opts.limits.check_decompressed(chunk_bytes)?;
    let out_pitch = pitches(&section.shape());
    let chunk_pitch = pitches(chunk_shape);
    let ranges = section.ranges();

    for chunk in chunks {
        // section positions falling inside this chunk, per dimension
        let windows: Vec<std::ops::Range<usize>> = (0..rank)
            .map(|d| {
                let origin = chunk.origin[d];
                ranges[d].positions_within(origin, origin.saturating_add(chunk_shape[d]))
            })
            .collect();
        if windows.iter().any(|w| w.is_empty()) {
            continue;
        }
        trace!(tag = %chunk.tag, origin = ?chunk.origin, "reading chunk");

        let stored = Stored::open(source, &chunk.placement, chunk.compression.as_ref(), opts)?;
        let mut data = vec![0u8; chunk_bytes];
        stored.copy(0, &mut data, fill)?;

        let mut position: Vec<usize> = windows.iter().map(|w| w.start).collect();
        loop {
            let mut out_index = 0usize;
            let mut chunk_index = 0usize;
            for d in 0..rank {
                let index = ranges[d].start + position[d] * ranges[d].stride;
                out_index += position[d] * out_pitch[d];
                chunk_index += (index - chunk.origin[d]) * chunk_pitch[d];
            }
            let src = chunk_index * element_size;
            let dst = out_index * element_size;
            out[dst..dst + element_size].copy_from_slice(&data[src..src + element_size]);

            // odometer over the windows, innermost first
            let mut d = rank;
            let finished = loop {
                if d == 0 {
                    break true;
                }
                d -= 1;
                position[d] += 1;
                if position[d] < windows[d].end {
                    break false;
                }
                position[d] = windows[d].start;
            };
            if finished {
                break;
            }
        }
    }
    Ok(())
}

/// Extract one member from records of `record_size` bytes.
pub fn extract_member(records: &[u8], record_size: usize, offset: usize, size: usize) -> Result<Vec<u8>> {
    if record_size == 0 || offset + size > record_size {
        return Err(FormatError::Corrupt(format!(
            "member at {offset}+{size} outside record of {record_size} bytes"
        )));
    }
    Ok(records
        .chunks_exact(record_size)
        .flat_map(|record| &record[offset..offset + size])
        .copied()
        .collect())
}
