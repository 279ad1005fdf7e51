//! Write-ahead log
//!
//! The write path is WAL-first: a frame is appended (and, in
//! [`SyncMode::Durable`], synced) before the caller touches RAM. On open the
//! segments are replayed in sequence order to rebuild the RAM table.
//!
//! Segments are named `wal-<seq as 16 hex digits>.ldb`, so a lexicographic
//! sort is a sequence sort.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::{Config, SyncMode};
use crate::durability::{durable_sync, sync_dir};
use crate::error::{EngineError, EngineResult};
use crate::format::{decode_frame, declared_payload_len, encode_frame, Frame, Limits, Operation, HEADER_SIZE, MAGIC};

const SEGMENT_PREFIX: &str = "wal-";
const SEGMENT_SUFFIX: &str = ".ldb";

fn segment_name(seq: u64) -> String {
    format!("{}{:016x}{}", SEGMENT_PREFIX, seq, SEGMENT_SUFFIX)
}

fn parse_segment_name(name: &str) -> Option<u64> {
    let hex = name.strip_prefix(SEGMENT_PREFIX)?.strip_suffix(SEGMENT_SUFFIX)?;
    u64::from_str_radix(hex, 16).ok()
}

/// Existing segments in sequence order.
pub fn list_segments(wal_dir: &Path) -> EngineResult<Vec<(u64, PathBuf)>> {
    let entries = fs::read_dir(wal_dir)
        .map_err(|e| EngineError::io_at(wal_dir, "Failed to read WAL directory", e))?;

    let mut segments = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::io_at(wal_dir, "Failed to read directory entry", e))?;
        let path = entry.path();
        let seq = path.file_name().and_then(|n| n.to_str()).and_then(parse_segment_name);
        if let Some(seq) = seq {
            segments.push((seq, path));
        }
    }
    segments.sort_by_key(|(seq, _)| *seq);
    Ok(segments)
}

fn open_append(path: &Path) -> EngineResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| EngineError::io_at(path, "Failed to open WAL segment", e))
}

/// Appends frames to the active segment.
///
/// Invariant: when `append` returns `Ok` under [`SyncMode::Durable`], the
/// frame survives power loss.
pub struct WalWriter {
    file: File,
    path: PathBuf,
    size: u64,
    wal_dir: PathBuf,
    sequence: u64,
    rotation_size: u64,
    sync_mode: SyncMode,
    limits: Limits,
}

impl WalWriter {
    /// Open the highest-numbered segment in `wal_dir` for appending, creating
    /// segment 0 when the directory is empty.
    pub fn new<P: AsRef<Path>>(wal_dir: P, config: &Config) -> EngineResult<Self> {
        let wal_dir = wal_dir.as_ref().to_path_buf();
        fs::create_dir_all(&wal_dir)
            .map_err(|e| EngineError::io_at(&wal_dir, "Failed to create WAL directory", e))?;

        let sequence = list_segments(&wal_dir)?.last().map(|(seq, _)| *seq).unwrap_or(0);
        let path = wal_dir.join(segment_name(sequence));
        let file = open_append(&path)?;
        let size = file
            .metadata()
            .map_err(|e| EngineError::io_at(&path, "Failed to stat WAL segment", e))?
            .len();

        Ok(Self {
            file,
            path,
            size,
            wal_dir,
            sequence,
            rotation_size: config.wal_rotation_size_bytes,
            sync_mode: config.sync_mode,
            limits: Limits {
                max_key_size: config.max_key_size,
                max_value_size: config.max_value_size,
            },
        })
    }

    /// Append one frame.
    ///
    /// Order: encode (size limits checked, no I/O) → rotate if the segment
    /// is full → write → sync when durable. The caller updates RAM only
    /// after this returns `Ok`.
    pub fn append(&mut self, key: &[u8], value: &[u8], op: Operation) -> EngineResult<()> {
        let frame = encode_frame(key, value, op, &self.limits)?;

        if self.size > 0 && self.size + frame.len() as u64 > self.rotation_size {
            self.rotate()?;
        }

        self.file
            .write_all(&frame)
            .map_err(|e| EngineError::io_at(&self.path, "WAL write failed", e))?;
        self.size += frame.len() as u64;

        if self.sync_mode == SyncMode::Durable {
            self.sync()?;
        }
        Ok(())
    }

    /// Flush the active segment to persistent storage.
    pub fn sync(&self) -> EngineResult<()> {
        durable_sync(&self.file).map_err(|e| EngineError::io_at(&self.path, "WAL sync failed", e))
    }

    fn rotate(&mut self) -> EngineResult<()> {
        self.sync()?;

        self.sequence += 1;
        let path = self.wal_dir.join(segment_name(self.sequence));
        self.file = open_append(&path)?;
        self.path = path;
        self.size = 0;
        sync_dir(&self.wal_dir).map_err(|e| EngineError::io_at(&self.wal_dir, "WAL directory sync failed", e))?;

        debug!(segment = %self.path.display(), "rotated WAL segment");
        Ok(())
    }

    /// Replace every segment with a single one holding only `live` entries.
    ///
    /// The new segment is written under a temporary name, synced, then
    /// renamed into place before older segments are unlinked. A crash before
    /// the rename leaves the old segments authoritative; a crash after it
    /// replays old segments followed by the full live set, which converges
    /// to the same state.
    pub fn checkpoint<'a, I>(&mut self, live: I) -> EngineResult<usize>
    where
        I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
    {
        self.sync()?;
        let old_segments = list_segments(&self.wal_dir)?;

        let next_seq = self.sequence + 1;
        let final_path = self.wal_dir.join(segment_name(next_seq));
        let tmp_path = final_path.with_extension("ldb.tmp");

        let mut written = 0usize;
        let mut size = 0u64;
        {
            let mut tmp = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .map_err(|e| EngineError::io_at(&tmp_path, "Failed to create checkpoint segment", e))?;

            for (key, value) in live {
                let frame = encode_frame(key, value, Operation::Put, &self.limits)?;
                tmp.write_all(&frame)
                    .map_err(|e| EngineError::io_at(&tmp_path, "Checkpoint write failed", e))?;
                size += frame.len() as u64;
                written += 1;
            }
            durable_sync(&tmp).map_err(|e| EngineError::io_at(&tmp_path, "Checkpoint sync failed", e))?;
        }

        fs::rename(&tmp_path, &final_path)
            .map_err(|e| EngineError::io_at(&final_path, "Failed to install checkpoint segment", e))?;
        sync_dir(&self.wal_dir).map_err(|e| EngineError::io_at(&self.wal_dir, "WAL directory sync failed", e))?;

        self.file = open_append(&final_path)?;
        self.path = final_path;
        self.size = size;
        self.sequence = next_seq;

        for (_, path) in old_segments {
            fs::remove_file(&path)
                .map_err(|e| EngineError::io_at(&path, "Failed to remove old WAL segment", e))?;
        }
        sync_dir(&self.wal_dir).map_err(|e| EngineError::io_at(&self.wal_dir, "WAL directory sync failed", e))?;

        Ok(written)
    }

    /// Active segment path
    pub fn current_path(&self) -> &Path {
        &self.path
    }

    /// Active segment size in bytes
    pub fn current_size(&self) -> u64 {
        self.size
    }
}

/// What replay found: the frames to apply and where the log really ends.
pub struct Recovery {
    /// Recoverable frames in write order
    pub frames: Vec<Frame>,
    /// Last segment and the offset just past its last intact frame
    pub tail: Option<(PathBuf, u64)>,
}

impl Recovery {
    /// Cut the last segment back to its last intact frame.
    ///
    /// Must run before a [`WalWriter`] reopens the segment: frames appended
    /// behind a torn header would be swallowed by its length on the next
    /// replay. Returns the number of bytes dropped.
    pub fn truncate_tail(&self) -> EngineResult<u64> {
        let Some((path, valid_len)) = &self.tail else {
            return Ok(0);
        };

        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| EngineError::io_at(path, "Failed to open WAL segment for truncation", e))?;
        let len = file
            .metadata()
            .map_err(|e| EngineError::io_at(path, "Failed to stat WAL segment", e))?
            .len();
        if len <= *valid_len {
            return Ok(0);
        }

        file.set_len(*valid_len)
            .map_err(|e| EngineError::io_at(path, "Failed to truncate WAL segment", e))?;
        durable_sync(&file).map_err(|e| EngineError::io_at(path, "WAL sync failed", e))?;
        Ok(len - valid_len)
    }
}

/// Replays segments during recovery.
pub struct WalReader {
    wal_dir: PathBuf,
}

impl WalReader {
    pub fn new<P: AsRef<Path>>(wal_dir: P) -> Self {
        Self { wal_dir: wal_dir.as_ref().to_path_buf() }
    }

    /// All recoverable frames, in write order.
    ///
    /// Per segment: a frame with bad magic, a bad checksum or an impossible
    /// length is skipped by scanning for the next magic; an incomplete frame
    /// with nothing after it is the crash point and ends that segment.
    pub fn recover_frames(&self) -> EngineResult<Recovery> {
        let mut frames = Vec::new();
        let mut tail = None;
        for (_, path) in list_segments(&self.wal_dir)? {
            let (segment_frames, valid_len) = Self::recover_segment(&path)?;
            frames.extend(segment_frames);
            tail = Some((path, valid_len));
        }
        Ok(Recovery { frames, tail })
    }

    fn recover_segment(path: &Path) -> EngineResult<(Vec<Frame>, u64)> {
        let buffer = fs::read(path).map_err(|e| EngineError::io_at(path, "Failed to read WAL segment", e))?;

        let mut frames = Vec::new();
        let mut offset = 0usize;
        let mut valid_len = 0usize;

        while offset + HEADER_SIZE <= buffer.len() {
            if buffer[offset..offset + 4] != MAGIC {
                warn!(segment = %path.display(), offset, "bad magic, scanning for next frame");
                match find_next_magic(&buffer, offset + 1) {
                    Some(next) => { offset = next; continue; }
                    None => break,
                }
            }

            let total = HEADER_SIZE + declared_payload_len(&buffer[offset..]);
            if offset + total > buffer.len() {
                // A later frame means this length field is damaged, not torn
                if let Some(next) = find_next_magic(&buffer, offset + 1) {
                    warn!(
                        segment = %path.display(),
                        offset,
                        declared = total,
                        "frame length runs past segment end, scanning for next frame"
                    );
                    offset = next;
                    continue;
                }
                warn!(
                    segment = %path.display(),
                    offset,
                    needed = total,
                    available = buffer.len() - offset,
                    "torn write at end of segment"
                );
                break;
            }

            match decode_frame(&buffer[offset..offset + total], path, offset as u64) {
                Ok((frame, used)) => {
                    frames.push(frame);
                    offset += used;
                    valid_len = offset;
                }
                Err(err) => {
                    warn!(segment = %path.display(), offset, error = %err, "skipping corrupt frame");
                    match find_next_magic(&buffer, offset + 1) {
                        Some(next) => { offset = next; continue; }
                        None => break,
                    }
                }
            }
        }

        Ok((frames, valid_len as u64))
    }
}

fn find_next_magic(buffer: &[u8], start: usize) -> Option<usize> {
    buffer
        .get(start..)?
        .windows(MAGIC.len())
        .position(|w| w == MAGIC)
        .map(|pos| start + pos)
}
