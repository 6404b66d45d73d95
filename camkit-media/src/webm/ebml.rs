//! Minimal EBML reading and writing

use super::RepairError;

/// EBML header
pub const EBML: u32 = 0x1A45_DFA3;
/// Segment
pub const SEGMENT: u32 = 0x1853_8067;
/// SeekHead
pub const SEEK_HEAD: u32 = 0x114D_9B74;
/// Seek
pub const SEEK: u32 = 0x4DBB;
/// SeekID
pub const SEEK_ID: u32 = 0x53AB;
/// SeekPosition
pub const SEEK_POSITION: u32 = 0x53AC;
/// Info
pub const INFO: u32 = 0x1549_A966;
/// TimecodeScale
pub const TIMECODE_SCALE: u32 = 0x2A_D7B1;
/// Duration
pub const DURATION: u32 = 0x4489;
/// Tracks
pub const TRACKS: u32 = 0x1654_AE6B;
/// TrackEntry
pub const TRACK_ENTRY: u32 = 0xAE;
/// TrackNumber
pub const TRACK_NUMBER: u32 = 0xD7;
/// TrackType
pub const TRACK_TYPE: u32 = 0x83;
/// Cues
pub const CUES: u32 = 0x1C53_BB6B;
/// CuePoint
pub const CUE_POINT: u32 = 0xBB;
/// CueTime
pub const CUE_TIME: u32 = 0xB3;
/// CueTrackPositions
pub const CUE_TRACK_POSITIONS: u32 = 0xB7;
/// CueTrack
pub const CUE_TRACK: u32 = 0xF7;
/// CueClusterPosition
pub const CUE_CLUSTER_POSITION: u32 = 0xF1;
/// Cluster
pub const CLUSTER: u32 = 0x1F43_B675;
/// Cluster Timecode
pub const TIMECODE: u32 = 0xE7;
/// SimpleBlock
pub const SIMPLE_BLOCK: u32 = 0xA3;
/// BlockGroup
pub const BLOCK_GROUP: u32 = 0xA0;
/// Block
pub const BLOCK: u32 = 0xA1;
/// ReferenceBlock
pub const REFERENCE_BLOCK: u32 = 0xFB;
/// Void
pub const VOID: u32 = 0xEC;
/// Tags
pub const TAGS: u32 = 0x1254_C367;
/// Chapters
pub const CHAPTERS: u32 = 0x1043_A770;
/// Attachments
pub const ATTACHMENTS: u32 = 0x1941_A469;

/// TrackType value for video tracks
pub const TRACK_TYPE_VIDEO: u64 = 1;
/// Matroska default TimecodeScale, one millisecond in nanoseconds
pub const DEFAULT_TIMECODE_SCALE: u64 = 1_000_000;

/// Whether `id` is a direct child of Segment
pub fn is_top_level(id: u32) -> bool {
    matches!(
        id,
        SEEK_HEAD | INFO | TRACKS | CUES | CLUSTER | TAGS | CHAPTERS | ATTACHMENTS
    )
}

/// Position and extent of one element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    /// Element ID, marker bits included
    pub id: u32,
    /// Offset of the first ID byte
    pub start: usize,
    /// Offset of the first payload byte
    pub data_start: usize,
    /// Payload size, `None` when unknown
    pub size: Option<u64>,
}

impl ElementHeader {
    /// End of the payload, clamped to `limit`
    pub fn end(&self, limit: usize) -> usize {
        match self.size {
            Some(size) => usize::try_from(size)
                .ok()
                .and_then(|s| self.data_start.checked_add(s))
                .map_or(limit, |end| end.min(limit)),
            None => limit,
        }
    }

    /// Payload bytes, clamped to `limit`
    ///
    /// Fails when the header itself already runs past `limit`.
    pub fn payload<'a>(&self, data: &'a [u8], limit: usize) -> Result<&'a [u8], RepairError> {
        data.get(self.data_start..self.end(limit))
            .ok_or_else(|| self.overrun(limit))
    }

    /// Header and payload bytes, clamped to `limit`
    pub fn bytes<'a>(&self, data: &'a [u8], limit: usize) -> Result<&'a [u8], RepairError> {
        data.get(self.start..self.end(limit))
            .filter(|_| self.data_start <= limit)
            .ok_or_else(|| self.overrun(limit))
    }

    /// Fail when the header runs past `limit`
    pub fn ensure_within(&self, limit: usize) -> Result<(), RepairError> {
        if self.data_start > limit {
            return Err(self.overrun(limit));
        }
        Ok(())
    }

    fn overrun(&self, limit: usize) -> RepairError {
        RepairError::Malformed {
            reason: format!(
                "element {:#x} at offset {} overruns its parent ending at {}",
                self.id, self.start, limit
            ),
        }
    }

    /// Whether the declared payload runs past `limit`
    pub fn is_truncated(&self, limit: usize) -> bool {
        match self.size {
            Some(size) => (self.data_start as u64).saturating_add(size) > limit as u64,
            None => false,
        }
    }
}

/// Read the element header at `pos`
pub fn read_header(data: &[u8], pos: usize) -> Result<ElementHeader, RepairError> {
    let (id, id_len) = read_vint(data, pos, true)?;
    if id_len > 4 {
        return Err(RepairError::InvalidVint { offset: pos });
    }
    let (size, size_len) = read_vint(data, pos + id_len, false)?;
    let unknown = size == (1u64 << (7 * size_len)) - 1;

    Ok(ElementHeader {
        id: id as u32,
        start: pos,
        data_start: pos + id_len + size_len,
        size: (!unknown).then_some(size),
    })
}

/// Read a variable-length integer, keeping the length marker for IDs
pub fn read_vint(data: &[u8], pos: usize, keep_marker: bool) -> Result<(u64, usize), RepairError> {
    let first = *data.get(pos).ok_or(RepairError::Truncated { offset: pos })?;
    if first == 0 {
        return Err(RepairError::InvalidVint { offset: pos });
    }

    let len = first.leading_zeros() as usize + 1;
    let bytes = data
        .get(pos..pos + len)
        .ok_or(RepairError::Truncated { offset: pos })?;

    let mut value = if keep_marker {
        first as u64
    } else {
        (first & 0xFFu8.checked_shr(len as u32).unwrap_or(0)) as u64
    };
    for b in &bytes[1..] {
        value = (value << 8) | *b as u64;
    }
    Ok((value, len))
}

/// Big-endian unsigned integer payload
pub fn read_uint(payload: &[u8]) -> Result<u64, RepairError> {
    if payload.len() > 8 {
        return Err(RepairError::Malformed {
            reason: format!("{}-byte unsigned integer", payload.len()),
        });
    }
    Ok(payload.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
}

/// Iterate the direct children of a master element's payload
///
/// Fails on the first child that cannot be read, whose size is unknown or
/// whose header spills past `end`.
pub fn children(data: &[u8], start: usize, end: usize) -> Result<Vec<ElementHeader>, RepairError> {
    let mut out = Vec::new();
    let mut pos = start;
    while pos < end {
        let header = read_header(data, pos)?;
        if header.size.is_none() {
            return Err(RepairError::UnknownSize { id: header.id });
        }
        header.ensure_within(end)?;
        pos = header.end(end);
        out.push(header);
    }
    Ok(out)
}

/// Append an element ID
pub fn write_id(buf: &mut Vec<u8>, id: u32) {
    let bytes = id.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count().min(3);
    buf.extend_from_slice(&bytes[skip..]);
}

/// Append a size as a vint of the shortest length
pub fn write_size(buf: &mut Vec<u8>, size: u64) {
    let len = (1..=8usize)
        .find(|len| size < (1u64 << (7 * len)) - 1)
        .unwrap_or(8);
    write_size_with_len(buf, size, len);
}

/// Append a size as an 8-byte vint
pub fn write_size_fixed(buf: &mut Vec<u8>, size: u64) {
    write_size_with_len(buf, size, 8);
}

fn write_size_with_len(buf: &mut Vec<u8>, size: u64, len: usize) {
    let marked = size | (1u64 << (7 * len));
    buf.extend_from_slice(&marked.to_be_bytes()[8 - len..]);
}

/// Append a master or binary element
pub fn write_element(buf: &mut Vec<u8>, id: u32, payload: &[u8]) {
    write_id(buf, id);
    write_size(buf, payload.len() as u64);
    buf.extend_from_slice(payload);
}

/// Append an unsigned integer element with a fixed 8-byte payload
pub fn write_uint(buf: &mut Vec<u8>, id: u32, value: u64) {
    write_element(buf, id, &value.to_be_bytes());
}

/// Append a float element with an 8-byte payload
pub fn write_float(buf: &mut Vec<u8>, id: u32, value: f64) {
    write_element(buf, id, &value.to_be_bytes());
}
