use super::ebml::{self, ElementHeader};
use super::RepairError;
use bytes::Bytes;

/// A keyframe index entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CuePoint {
    /// Cluster timecode, in TimecodeScale units
    pub time: u64,
    /// Track the keyframe belongs to
    pub track: u64,
    /// Cluster offset from the first cluster
    pub cluster_offset: u64,
}

/// What a parse of a WebM file found
#[derive(Debug, Clone, PartialEq)]
pub struct WebmInfo {
    /// Nanoseconds per timecode tick
    pub timecode_scale: u64,
    /// Timecode of the last block, in ticks
    pub duration: f64,
    /// Duration element already present in Info
    pub declared_duration: Option<f64>,
    /// Track used for cue points
    pub cue_track: Option<u64>,
    /// One entry per cluster holding a keyframe of the cue track
    pub cues: Vec<CuePoint>,
    /// Bytes before the first cluster
    pub metadata_size: usize,
    /// Number of clusters
    pub cluster_count: usize,
}

impl WebmInfo {
    /// Duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.duration * self.timecode_scale as f64 / 1_000_000.0
    }
}

struct Layout<'a> {
    header: &'a [u8],
    info_children: Vec<&'a [u8]>,
    tracks: Option<&'a [u8]>,
    extra: Vec<&'a [u8]>,
    body: &'a [u8],
    trailing: &'a [u8],
    info: WebmInfo,
}

/// Parse a WebM file and compute its duration and cue points
pub fn probe(data: &[u8]) -> Result<WebmInfo, RepairError> {
    parse(data).map(|layout| layout.info)
}

/// Rewrite the segment header so the file is seekable
///
/// The result is the EBML header, a sized Segment holding SeekHead, Info
/// with Duration, Tracks, any other metadata and Cues, followed by the
/// original cluster bytes.
pub fn make_seekable(data: &[u8]) -> Result<Bytes, RepairError> {
    let layout = parse(data)?;

    let mut info = Vec::new();
    for child in &layout.info_children {
        info.extend_from_slice(child);
    }
    ebml::write_float(&mut info, ebml::DURATION, layout.info.duration);
    let mut info_element = Vec::new();
    ebml::write_element(&mut info_element, ebml::INFO, &info);

    let tracks = layout.tracks.unwrap_or_default();
    let extra: Vec<u8> = layout.extra.concat();

    let mut ids = vec![ebml::INFO];
    if !tracks.is_empty() {
        ids.push(ebml::TRACKS);
    }
    if !layout.info.cues.is_empty() {
        ids.push(ebml::CUES);
    }

    // Positions are written fixed-width, so sizes do not depend on values
    let placeholders: Vec<(u32, u64)> = ids.iter().map(|id| (*id, 0)).collect();
    let seek_head_len = encode_seek_head(&placeholders).len();
    let cues_len = encode_cues(&layout.info.cues, 0).len();

    let info_pos = seek_head_len as u64;
    let tracks_pos = info_pos + info_element.len() as u64;
    let cues_pos = tracks_pos + tracks.len() as u64 + extra.len() as u64;
    let clusters_pos = cues_pos + cues_len as u64;

    let entries: Vec<(u32, u64)> = ids
        .iter()
        .map(|id| match *id {
            ebml::INFO => (*id, info_pos),
            ebml::TRACKS => (*id, tracks_pos),
            _ => (*id, cues_pos),
        })
        .collect();
    let seek_head = encode_seek_head(&entries);
    let cues = encode_cues(&layout.info.cues, clusters_pos);

    let mut segment = Vec::with_capacity(clusters_pos as usize + layout.body.len());
    segment.extend_from_slice(&seek_head);
    segment.extend_from_slice(&info_element);
    segment.extend_from_slice(tracks);
    segment.extend_from_slice(&extra);
    segment.extend_from_slice(&cues);
    segment.extend_from_slice(layout.body);

    let mut out = Vec::with_capacity(layout.header.len() + 12 + segment.len() + layout.trailing.len());
    out.extend_from_slice(layout.header);
    ebml::write_id(&mut out, ebml::SEGMENT);
    ebml::write_size_fixed(&mut out, segment.len() as u64);
    out.extend_from_slice(&segment);
    out.extend_from_slice(layout.trailing);
    Ok(Bytes::from(out))
}

fn encode_seek_head(entries: &[(u32, u64)]) -> Vec<u8> {
    let mut payload = Vec::new();
    for (id, position) in entries {
        let mut id_bytes = Vec::new();
        ebml::write_id(&mut id_bytes, *id);

        let mut seek = Vec::new();
        ebml::write_element(&mut seek, ebml::SEEK_ID, &id_bytes);
        ebml::write_uint(&mut seek, ebml::SEEK_POSITION, *position);
        ebml::write_element(&mut payload, ebml::SEEK, &seek);
    }

    let mut out = Vec::new();
    ebml::write_element(&mut out, ebml::SEEK_HEAD, &payload);
    out
}

fn encode_cues(cues: &[CuePoint], clusters_pos: u64) -> Vec<u8> {
    if cues.is_empty() {
        return Vec::new();
    }

    let mut payload = Vec::new();
    for cue in cues {
        let mut positions = Vec::new();
        ebml::write_uint(&mut positions, ebml::CUE_TRACK, cue.track);
        ebml::write_uint(
            &mut positions,
            ebml::CUE_CLUSTER_POSITION,
            clusters_pos + cue.cluster_offset,
        );

        let mut point = Vec::new();
        ebml::write_uint(&mut point, ebml::CUE_TIME, cue.time);
        ebml::write_element(&mut point, ebml::CUE_TRACK_POSITIONS, &positions);
        ebml::write_element(&mut payload, ebml::CUE_POINT, &point);
    }

    let mut out = Vec::new();
    ebml::write_element(&mut out, ebml::CUES, &payload);
    out
}

fn parse(data: &[u8]) -> Result<Layout<'_>, RepairError> {
    let header = ebml::read_header(data, 0)?;
    if header.id != ebml::EBML {
        return Err(RepairError::NotWebm {
            reason: format!("first element is {:#x}", header.id),
        });
    }
    if header.size.is_none() || header.is_truncated(data.len()) {
        return Err(RepairError::NotWebm {
            reason: "incomplete EBML header".to_string(),
        });
    }
    let header_end = header.end(data.len());

    let segment = ebml::read_header(data, header_end)?;
    if segment.id != ebml::SEGMENT {
        return Err(RepairError::NotWebm {
            reason: format!("expected Segment, found {:#x}", segment.id),
        });
    }
    let segment_end = segment.end(data.len());

    let mut timecode_scale = ebml::DEFAULT_TIMECODE_SCALE;
    let mut declared_duration = None;
    let mut info_children = Vec::new();
    let mut tracks = None;
    let mut extra = Vec::new();
    let mut cue_track = None;
    let mut first_cluster = None;

    let mut pos = segment.data_start;
    while pos < segment_end {
        let element = ebml::read_header(data, pos)?;
        if element.id == ebml::CLUSTER {
            first_cluster = Some(element.start);
            break;
        }
        if element.size.is_none() {
            return Err(RepairError::UnknownSize { id: element.id });
        }
        element.ensure_within(segment_end)?;
        let end = element.end(segment_end);

        match element.id {
            ebml::INFO => {
                for child in ebml::children(data, element.data_start, end)? {
                    let payload = child.payload(data, end)?;
                    match child.id {
                        ebml::DURATION => declared_duration = read_float(payload),
                        ebml::TIMECODE_SCALE => {
                            timecode_scale = ebml::read_uint(payload)?.max(1);
                            info_children.push(child.bytes(data, end)?);
                        }
                        _ => info_children.push(child.bytes(data, end)?),
                    }
                }
            }
            ebml::TRACKS => {
                cue_track = find_cue_track(data, &element, end)?;
                tracks = Some(element.bytes(data, segment_end)?);
            }
            ebml::SEEK_HEAD | ebml::CUES | ebml::VOID => {}
            _ => extra.push(element.bytes(data, segment_end)?),
        }
        pos = end;
    }

    let first_cluster = first_cluster.ok_or_else(|| RepairError::Malformed {
        reason: "no clusters".to_string(),
    })?;

    let scan = scan_clusters(data, first_cluster, segment_end, cue_track)?;

    Ok(Layout {
        header: &data[..header_end],
        info_children,
        tracks,
        extra,
        body: &data[first_cluster..segment_end],
        trailing: &data[segment_end..],
        info: WebmInfo {
            timecode_scale,
            duration: scan.last_block_time as f64,
            declared_duration,
            cue_track,
            cues: scan.cues,
            metadata_size: first_cluster,
            cluster_count: scan.cluster_count,
        },
    })
}

fn read_float(payload: &[u8]) -> Option<f64> {
    match payload.len() {
        4 => <[u8; 4]>::try_from(payload).ok().map(|b| f32::from_be_bytes(b) as f64),
        8 => <[u8; 8]>::try_from(payload).ok().map(f64::from_be_bytes),
        _ => None,
    }
}

/// First video track, or the first track when there is no video
fn find_cue_track(data: &[u8], tracks: &ElementHeader, end: usize) -> Result<Option<u64>, RepairError> {
    let mut first = None;
    for entry in ebml::children(data, tracks.data_start, end)? {
        if entry.id != ebml::TRACK_ENTRY {
            continue;
        }
        let entry_end = entry.end(end);
        let mut number = None;
        let mut kind = None;
        for field in ebml::children(data, entry.data_start, entry_end)? {
            let payload = field.payload(data, entry_end)?;
            match field.id {
                ebml::TRACK_NUMBER => number = Some(ebml::read_uint(payload)?),
                ebml::TRACK_TYPE => kind = Some(ebml::read_uint(payload)?),
                _ => {}
            }
        }

        if let Some(number) = number {
            if kind == Some(ebml::TRACK_TYPE_VIDEO) {
                return Ok(Some(number));
            }
            first.get_or_insert(number);
        }
    }
    Ok(first)
}

struct ClusterScan {
    cues: Vec<CuePoint>,
    last_block_time: u64,
    cluster_count: usize,
}

fn scan_clusters(
    data: &[u8],
    first_cluster: usize,
    segment_end: usize,
    cue_track: Option<u64>,
) -> Result<ClusterScan, RepairError> {
    let mut scan = ClusterScan {
        cues: Vec::new(),
        last_block_time: 0,
        cluster_count: 0,
    };

    let mut pos = first_cluster;
    while pos < segment_end {
        let element = match ebml::read_header(data, pos) {
            Ok(element) => element,
            // Recording stopped mid-element
            Err(RepairError::Truncated { .. }) => break,
            Err(e) => return Err(e),
        };

        if element.id != ebml::CLUSTER {
            if element.size.is_none() {
                return Err(RepairError::UnknownSize { id: element.id });
            }
            pos = element.end(segment_end);
            continue;
        }

        scan.cluster_count += 1;
        let mut cluster_time = 0u64;
        let mut has_keyframe = false;
        let limit = element.end(segment_end);

        let mut child_pos = element.data_start;
        while child_pos < limit {
            let child = match ebml::read_header(data, child_pos) {
                Ok(child) => child,
                Err(RepairError::Truncated { .. }) => {
                    child_pos = limit;
                    break;
                }
                Err(e) => return Err(e),
            };
            if element.size.is_none() && ebml::is_top_level(child.id) {
                break;
            }
            if child.size.is_none() {
                return Err(RepairError::UnknownSize { id: child.id });
            }
            let child_end = child.end(limit);
            let payload = child.payload(data, limit)?;

            match child.id {
                ebml::TIMECODE => cluster_time = ebml::read_uint(payload)?,
                ebml::SIMPLE_BLOCK if !child.is_truncated(limit) => {
                    let block = read_block(payload)?;
                    scan.last_block_time = scan.last_block_time.max(block.time(cluster_time));
                    if block.flags & 0x80 != 0 && Some(block.track) == cue_track {
                        has_keyframe = true;
                    }
                }
                ebml::BLOCK_GROUP if !child.is_truncated(limit) => {
                    let mut block = None;
                    let mut referenced = false;
                    for part in ebml::children(data, child.data_start, child_end)? {
                        match part.id {
                            ebml::BLOCK => {
                                block = Some(read_block(part.payload(data, child_end)?)?)
                            }
                            ebml::REFERENCE_BLOCK => referenced = true,
                            _ => {}
                        }
                    }
                    if let Some(block) = block {
                        scan.last_block_time = scan.last_block_time.max(block.time(cluster_time));
                        if !referenced && Some(block.track) == cue_track {
                            has_keyframe = true;
                        }
                    }
                }
                _ => {}
            }
            child_pos = child_end;
        }

        if has_keyframe {
            if let Some(track) = cue_track {
                scan.cues.push(CuePoint {
                    time: cluster_time,
                    track,
                    cluster_offset: (element.start - first_cluster) as u64,
                });
            }
        }

        pos = match element.size {
            Some(_) => limit,
            None => child_pos,
        };
    }

    Ok(scan)
}

struct BlockHeader {
    track: u64,
    relative_time: i16,
    flags: u8,
}

impl BlockHeader {
    fn time(&self, cluster_time: u64) -> u64 {
        (cluster_time as i64 + self.relative_time as i64).max(0) as u64
    }
}

fn read_block(payload: &[u8]) -> Result<BlockHeader, RepairError> {
    let (track, len) = ebml::read_vint(payload, 0, false)?;
    let header = payload
        .get(len..len + 3)
        .ok_or(RepairError::Truncated { offset: len })?;

    Ok(BlockHeader {
        track,
        relative_time: i16::from_be_bytes([header[0], header[1]]),
        flags: header[2],
    })
}
