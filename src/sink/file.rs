//! Append-only log file with size-based rotation.
//!
//! When a write would grow the active file past `roll_size`, the file is renamed to
//! `<stem>-<timestamp>.<ext>` next to it, optionally gzip-compressed, and a fresh file
//! is opened. Old backups are pruned by count (`roll_keep`) and by age (`roll_keep_for`).

use chrono::{Local, NaiveDateTime, Utc};
use flate2::{write::GzEncoder, Compression};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

use super::LogSink;
use crate::config::RollConfig;
use crate::error::SinkError;

const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";

struct ActiveFile {
    file: File,
    size: u64,
}

impl ActiveFile {
    fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let size = file.metadata()?.len();
        Ok(Self { file, size })
    }
}

/// Rotating file sink.
pub struct FileSink {
    path: PathBuf,
    roll: RollConfig,
    active: Mutex<Option<ActiveFile>>,
}

impl FileSink {
    /// Open `path` for appending, creating missing parent directories.
    pub fn open(path: impl Into<PathBuf>, roll: RollConfig) -> Result<Self, SinkError> {
        let path = path.into();
        let opened = || -> io::Result<ActiveFile> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            ActiveFile::open(&path)
        };
        let active = opened().map_err(|source| SinkError::Open {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), size = active.size, "Opened log file");
        Ok(Self {
            path,
            roll,
            active: Mutex::new(Some(active)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn should_rotate(&self, current: u64, incoming: usize) -> bool {
        !self.roll.roll_disabled
            && current > 0
            && current.saturating_add(incoming as u64) > self.roll.roll_size
    }

    fn rotate(&self, slot: &mut Option<ActiveFile>) -> Result<(), SinkError> {
        if let Some(mut old) = slot.take() {
            old.file.flush()?;
        }

        let backup = self.backup_path();
        let renamed = fs::rename(&self.path, &backup);
        *slot = Some(ActiveFile::open(&self.path).map_err(|source| SinkError::Open {
            path: self.path.clone(),
            source,
        })?);
        if let Err(e) = renamed {
            warn!(backup = %backup.display(), error = %e, "Failed to rotate log file");
            return Ok(());
        }
        debug!(backup = %backup.display(), "Rotated log file");

        if !self.roll.roll_uncompressed {
            if let Err(e) = compress(&backup) {
                warn!(backup = %backup.display(), error = %e, "Failed to compress rotated log file");
            }
        }
        if let Err(e) = self.prune() {
            warn!(error = %e, "Failed to prune rotated log files");
        }
        Ok(())
    }

    fn name_parts(&self) -> (String, Option<String>) {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = self
            .path
            .extension()
            .map(|e| e.to_string_lossy().into_owned());
        (stem, ext)
    }

    fn backup_path(&self) -> PathBuf {
        let stamp = if self.roll.roll_local_time {
            Local::now().format(BACKUP_TIME_FORMAT).to_string()
        } else {
            Utc::now().format(BACKUP_TIME_FORMAT).to_string()
        };
        let (stem, ext) = self.name_parts();

        let mut attempt = 0;
        loop {
            let suffix = if attempt == 0 {
                stamp.clone()
            } else {
                format!("{stamp}.{attempt}")
            };
            let name = match &ext {
                Some(ext) => format!("{stem}-{suffix}.{ext}"),
                None => format!("{stem}-{suffix}"),
            };
            let candidate = self.path.with_file_name(name);
            let gz = gz_path(&candidate);
            if !candidate.exists() && !gz.exists() {
                return candidate;
            }
            attempt += 1;
        }
    }

    /// Timestamp and collision index encoded in a backup's file name, or `None` when
    /// the file was not produced by [`FileSink::backup_path`].
    fn backup_stamp(&self, file_name: &str) -> Option<(NaiveDateTime, u32)> {
        let (stem, ext) = self.name_parts();
        let name = file_name.strip_suffix(".gz").unwrap_or(file_name);
        let rest = name.strip_prefix(stem.as_str())?.strip_prefix('-')?;
        let stamp = match &ext {
            Some(ext) => rest.strip_suffix(ext.as_str())?.strip_suffix('.')?,
            None => rest,
        };

        if let Ok(time) = NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_FORMAT) {
            return Some((time, 0));
        }
        let (stamp, attempt) = stamp.rsplit_once('.')?;
        let attempt = attempt.parse().ok()?;
        let time = NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_FORMAT).ok()?;
        Some((time, attempt))
    }

    /// Rotated files belonging to this sink, newest first.
    fn backups(&self) -> io::Result<Vec<PathBuf>> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut backups: Vec<((NaiveDateTime, u32), PathBuf)> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.file_name() != self.path.file_name())
            .filter_map(|path| {
                let file_name = path.file_name()?.to_string_lossy().into_owned();
                Some((self.backup_stamp(&file_name)?, path))
            })
            .collect();
        backups.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(backups.into_iter().map(|(_, path)| path).collect())
    }

    fn prune(&self) -> io::Result<()> {
        let now = SystemTime::now();
        for (index, backup) in self.backups()?.into_iter().enumerate() {
            let over_count = self.roll.roll_keep > 0 && index >= self.roll.roll_keep;
            let too_old = !self.roll.roll_keep_for.is_zero()
                && fs::metadata(&backup)
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|modified| now.duration_since(modified).ok())
                    .is_some_and(|age| age > self.roll.roll_keep_for);
            if over_count || too_old {
                debug!(backup = %backup.display(), "Removing old log file");
                fs::remove_file(&backup)?;
            }
        }
        Ok(())
    }
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

fn compress(path: &Path) -> io::Result<()> {
    let mut source = File::open(path)?;
    let mut encoder = GzEncoder::new(File::create(gz_path(path))?, Compression::default());
    io::copy(&mut source, &mut encoder)?;
    encoder.finish()?;
    fs::remove_file(path)
}

impl LogSink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn write_line(&self, line: &str) -> Result<(), SinkError> {
        let mut slot = self.active.lock();
        let current = slot.as_ref().ok_or(SinkError::Closed)?.size;
        if self.should_rotate(current, line.len()) {
            self.rotate(&mut slot)?;
        }

        let active = slot.as_mut().ok_or(SinkError::Closed)?;
        active.file.write_all(line.as_bytes())?;
        active.size += line.len() as u64;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        if let Some(active) = self.active.lock().as_mut() {
            active.file.flush()?;
        }
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        if let Some(mut active) = self.active.lock().take() {
            active.file.flush()?;
            debug!(path = %self.path.display(), "Closed log file");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use std::time::Duration;

    fn roll(size: u64) -> RollConfig {
        RollConfig {
            roll_size: size,
            roll_keep: 0,
            roll_keep_for: Duration::ZERO,
            roll_local_time: false,
            roll_uncompressed: true,
            roll_disabled: false,
        }
    }

    fn backups(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.file_name().unwrap() != "access.log")
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_appends_lines_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/logs/access.log");
        let sink = FileSink::open(&path, roll(1024)).unwrap();

        sink.write_line("first\n").unwrap();
        sink.write_line("second\n").unwrap();
        sink.close().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        fs::write(&path, "existing\n").unwrap();

        let sink = FileSink::open(&path, roll(1024)).unwrap();
        sink.write_line("new\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "existing\nnew\n");
    }

    #[test]
    fn test_open_failure_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();

        let err = FileSink::open(blocker.join("access.log"), roll(1024))
            .err()
            .unwrap();
        assert!(matches!(err, SinkError::Open { .. }));
    }

    #[test]
    fn test_writes_after_close_fail() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::open(dir.path().join("access.log"), roll(1024)).unwrap();
        sink.close().unwrap();
        assert!(matches!(sink.write_line("late\n"), Err(SinkError::Closed)));
    }

    #[test]
    fn test_rotation_keeps_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        let sink = FileSink::open(&path, roll(16)).unwrap();

        sink.write_line("0123456789\n").unwrap();
        sink.write_line("abcdefghij\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "abcdefghij\n");
        let rotated = backups(dir.path());
        assert_eq!(rotated.len(), 1);
        let name = rotated[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("access-") && name.ends_with(".log"), "{name}");
        assert_eq!(fs::read_to_string(&rotated[0]).unwrap(), "0123456789\n");
    }

    #[test]
    fn test_rotated_files_are_compressed_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        let sink = FileSink::open(
            &path,
            RollConfig {
                roll_uncompressed: false,
                ..roll(16)
            },
        )
        .unwrap();

        sink.write_line("0123456789\n").unwrap();
        sink.write_line("abcdefghij\n").unwrap();

        let rotated = backups(dir.path());
        assert_eq!(rotated.len(), 1);
        assert_eq!(rotated[0].extension().unwrap(), "gz");

        let mut decoded = String::new();
        GzDecoder::new(File::open(&rotated[0]).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "0123456789\n");
    }

    #[test]
    fn test_roll_disabled_never_rotates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        let sink = FileSink::open(
            &path,
            RollConfig {
                roll_disabled: true,
                ..roll(4)
            },
        )
        .unwrap();

        for _ in 0..5 {
            sink.write_line("0123456789\n").unwrap();
        }
        assert!(backups(dir.path()).is_empty());
        assert_eq!(fs::metadata(&path).unwrap().len(), 55);
    }

    #[test]
    fn test_roll_keep_limits_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        let sink = FileSink::open(
            &path,
            RollConfig {
                roll_keep: 2,
                ..roll(8)
            },
        )
        .unwrap();

        for i in 0..5 {
            sink.write_line(&format!("line {i:03}\n")).unwrap();
            std::thread::sleep(Duration::from_millis(5));
        }

        let rotated = backups(dir.path());
        assert_eq!(rotated.len(), 2);
        // Newest backups survive.
        assert_eq!(fs::read_to_string(&rotated[0]).unwrap(), "line 002\n");
        assert_eq!(fs::read_to_string(&rotated[1]).unwrap(), "line 003\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "line 004\n");
    }

    #[test]
    fn test_roll_keep_for_removes_old_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        let sink = FileSink::open(
            &path,
            RollConfig {
                roll_keep_for: Duration::from_millis(1),
                ..roll(8)
            },
        )
        .unwrap();

        sink.write_line("old line\n").unwrap();
        std::thread::sleep(Duration::from_millis(50));
        sink.write_line("new line\n").unwrap();

        assert!(backups(dir.path()).is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "new line\n");
    }

    #[test]
    fn test_backup_names_are_recognized() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::open(dir.path().join("access.log"), roll(1024)).unwrap();

        let (time, attempt) = sink
            .backup_stamp("access-2024-03-09T14-05-07.123.log")
            .unwrap();
        assert_eq!(time.to_string(), "2024-03-09 14:05:07.123");
        assert_eq!(attempt, 0);
        assert_eq!(
            sink.backup_stamp("access-2024-03-09T14-05-07.123.2.log.gz")
                .map(|(_, attempt)| attempt),
            Some(2)
        );

        for foreign in [
            "access-0.log",
            "access-errors.log",
            "access-2024-03-09.log",
            "access-2024-03-09T14-05-07.123.x.log",
            "other-2024-03-09T14-05-07.123.log",
            "access-2024-03-09T14-05-07.123.txt",
        ] {
            assert!(sink.backup_stamp(foreign).is_none(), "{foreign}");
        }
    }

    #[test]
    fn test_collision_suffix_sorts_as_newer() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::open(dir.path().join("access.log"), roll(1024)).unwrap();
        for name in [
            "access-2024-03-09T14-05-07.123.log",
            "access-2024-03-09T14-05-07.123.1.log",
            "access-2024-03-08T00-00-00.000.log",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }

        let names: Vec<String> = sink
            .backups()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "access-2024-03-09T14-05-07.123.1.log",
                "access-2024-03-09T14-05-07.123.log",
                "access-2024-03-08T00-00-00.000.log",
            ]
        );
    }

    #[test]
    fn test_similarly_named_files_survive_pruning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        fs::write(dir.path().join("access-0.log"), "keep me").unwrap();
        fs::write(dir.path().join("access-errors.log"), "keep me too").unwrap();
        let sink = FileSink::open(
            &path,
            RollConfig {
                roll_keep: 1,
                roll_keep_for: Duration::from_millis(1),
                ..roll(8)
            },
        )
        .unwrap();

        for i in 0..3 {
            sink.write_line(&format!("line {i:03}\n")).unwrap();
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(
            fs::read_to_string(dir.path().join("access-0.log")).unwrap(),
            "keep me"
        );
        assert!(dir.path().join("access-errors.log").exists());
    }

    #[test]
    fn test_failed_rename_still_writes_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        let sink = FileSink::open(&path, roll(8)).unwrap();

        sink.write_line("first line\n").unwrap();
        // Nothing left to rename at the next rotation.
        fs::remove_file(&path).unwrap();
        sink.write_line("second line\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second line\n");
    }

    #[test]
    fn test_unrelated_files_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        fs::write(dir.path().join("other.log"), "keep me").unwrap();
        let sink = FileSink::open(
            &path,
            RollConfig {
                roll_keep: 1,
                ..roll(8)
            },
        )
        .unwrap();

        for i in 0..3 {
            sink.write_line(&format!("line {i:03}\n")).unwrap();
            std::thread::sleep(Duration::from_millis(5));
        }

        assert!(dir.path().join("other.log").exists());
    }
}
