//! Dictionary fetcher.
//!
//! Downloads a zipped dictionary index, unpacks it entry by entry straight
//! into the target directory and reports progress while doing so. A fetch
//! that fails or is cancelled never leaves a partial directory behind.

use crate::core::archive::ZipStreamReader;
use crate::core::progress::{ProgressObserver, CONNECTING_TITLE};
use crate::core::source::{ByteSource, HttpSource};
use crate::error::{AedictError, Result};
use crate::utils::fs;
use reqwest::Url;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const BUFFER_SIZE: usize = 32768;
pub const REPORT_EACH_XTH_BYTE: u64 = BUFFER_SIZE as u64 * 8;

/// A single dictionary to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Location of the zipped index.
    pub source: Url,
    /// Unzip the files here. Must not be shared with a concurrent fetch.
    pub target_dir: PathBuf,
    /// Display name of the dictionary.
    pub name: String,
    /// Fallback progress bound, in bytes.
    pub expected_size: u64,
}

impl FetchRequest {
    pub fn new(
        source: Url,
        target_dir: impl Into<PathBuf>,
        name: impl Into<String>,
        expected_size: u64,
    ) -> Self {
        Self {
            source,
            target_dir: target_dir.into(),
            name: name.into(),
            expected_size,
        }
    }
}

/// One event of the progress stream.
#[derive(Debug, Clone)]
pub enum FetchProgress {
    Status {
        /// New title; `None` keeps the current one.
        message: Option<String>,
        /// Kilobytes written so far; `None` while the amount is unknown.
        kilobytes: Option<u64>,
        /// New upper bound in kilobytes, if it changed.
        max_kilobytes: Option<u64>,
    },
    Error {
        message: Option<String>,
        error: Arc<AedictError>,
    },
}

impl FetchProgress {
    pub fn connecting() -> Self {
        FetchProgress::Status {
            message: Some(CONNECTING_TITLE.to_string()),
            kilobytes: None,
            max_kilobytes: None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FetchProgress::Error { .. })
    }

    pub fn kilobytes(&self) -> Option<u64> {
        match self {
            FetchProgress::Status { kilobytes, .. } => *kilobytes,
            FetchProgress::Error { .. } => None,
        }
    }
}

/// How a fetch ended.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The target directory was already complete; nothing was downloaded.
    AlreadyComplete,
    Downloaded { bytes: u64, entries: usize },
    Cancelled,
    Failed(Arc<AedictError>),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            FetchOutcome::AlreadyComplete | FetchOutcome::Downloaded { .. }
        )
    }
}

/// Cooperative cancellation flag shared between a fetch and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Checks whether a dictionary directory is present and non-empty.
///
/// A regular file sitting where the directory should be is deleted.
pub fn is_complete(dir: &Path) -> bool {
    if !dir.exists() {
        return false;
    }
    if !dir.is_dir() {
        if let Err(e) = std::fs::remove_file(dir) {
            tracing::warn!(path = %dir.display(), error = %e, "Failed to delete stray file");
        }
        return false;
    }
    match std::fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_some(),
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "Failed to list directory");
            false
        }
    }
}

pub struct Fetcher {
    source: Arc<dyn ByteSource>,
}

impl Fetcher {
    pub fn new(source: Arc<dyn ByteSource>) -> Self {
        Self { source }
    }

    pub fn http() -> Result<Self> {
        Ok(Self::new(Arc::new(HttpSource::new()?)))
    }

    /// Downloads and unpacks `request`, blocking until done.
    ///
    /// Failures are reported once: as an error event to `observer` and as
    /// the returned outcome. Cancellation only produces an info log.
    pub fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancelHandle,
        observer: &mut dyn ProgressObserver,
    ) -> FetchOutcome {
        if is_complete(&request.target_dir) {
            tracing::info!(dictionary = %request.name, "Dictionary already downloaded");
            return FetchOutcome::AlreadyComplete;
        }

        match self.download_and_unpack(request, cancel, observer) {
            Ok((bytes, entries)) => {
                tracing::info!(dictionary = %request.name, bytes, entries, "Dictionary downloaded");
                FetchOutcome::Downloaded { bytes, entries }
            }
            Err(e) if e.is_cancellation() || cancel.is_cancelled() => {
                tracing::info!(dictionary = %request.name, "Download interrupted");
                fs::remove_dir_quietly(&request.target_dir);
                FetchOutcome::Cancelled
            }
            Err(e) => {
                tracing::error!(dictionary = %request.name, error = %e, "Download failed");
                let error = Arc::new(e);
                observer.on_progress(FetchProgress::Error {
                    message: Some(format!(
                        "Failed to download dictionary {}: {}",
                        request.name, error
                    )),
                    error: Arc::clone(&error),
                });
                fs::remove_dir_quietly(&request.target_dir);
                FetchOutcome::Failed(error)
            }
        }
    }

    fn download_and_unpack(
        &self,
        request: &FetchRequest,
        cancel: &CancelHandle,
        observer: &mut dyn ProgressObserver,
    ) -> Result<(u64, usize)> {
        observer.on_progress(FetchProgress::connecting());
        let input = self.source.open(&request.source)?;
        create_target_dir(&request.target_dir)?;

        // Dropping the reader closes the connection on every exit path.
        let input = BufReader::with_capacity(
            BUFFER_SIZE,
            CancelAwareReader {
                inner: input,
                cancel,
            },
        );
        observer.on_progress(FetchProgress::Status {
            message: Some(format!("Downloading dictionary {}", request.name)),
            kilobytes: Some(0),
            max_kilobytes: None,
        });

        let mut copier = EntryCopier::new(request, cancel, observer);
        let mut archive = ZipStreamReader::new(input);
        let mut entries = 0;
        while let Some(mut entry) = archive.next_entry()? {
            let Some(relative) = entry.enclosed_name() else {
                tracing::warn!(entry = entry.name(), "Skipping entry with unsafe path");
                entry.finish()?;
                continue;
            };
            let out_path = request.target_dir.join(relative);

            if entry.is_dir() {
                fs::ensure_dir_exists(&out_path)?;
                entry.finish()?;
                continue;
            }
            if let Some(parent) = out_path.parent() {
                fs::ensure_dir_exists(parent)?;
            }

            let declared = entry.size();
            tracing::debug!(entry = entry.name(), size = ?declared, "Unpacking entry");
            let mut out = File::create(&out_path)?;
            copier.copy_entry(&mut entry, &mut out, declared)?;
            out.flush()?;
            entry.finish()?;
            entries += 1;
        }

        copier.finish();
        Ok((copier.written, entries))
    }
}

fn create_target_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|source| AedictError::DirectoryCreation {
        path: dir.to_path_buf(),
        source,
    })
}

/// Fails reads once cancellation is requested, so that an abandoned
/// archive entry is not drained from the network.
struct CancelAwareReader<'a, R> {
    inner: R,
    cancel: &'a CancelHandle,
}

impl<R: Read> Read for CancelAwareReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(std::io::Error::other("download cancelled"));
        }
        self.inner.read(buf)
    }
}

/// Copies archive entries in fixed-size chunks, polling for cancellation
/// and publishing cumulative progress.
struct EntryCopier<'a> {
    request: &'a FetchRequest,
    cancel: &'a CancelHandle,
    observer: &'a mut dyn ProgressObserver,
    buf: Vec<u8>,
    written: u64,
    max_kilobytes: Option<u64>,
}

impl<'a> EntryCopier<'a> {
    fn new(
        request: &'a FetchRequest,
        cancel: &'a CancelHandle,
        observer: &'a mut dyn ProgressObserver,
    ) -> Self {
        Self {
            request,
            cancel,
            observer,
            buf: vec![0; BUFFER_SIZE],
            written: 0,
            max_kilobytes: None,
        }
    }

    fn copy_entry(
        &mut self,
        input: &mut dyn Read,
        out: &mut File,
        declared: Option<u64>,
    ) -> Result<()> {
        let size = declared.unwrap_or(self.request.expected_size);
        self.max_kilobytes = Some((self.written + size) / 1024);
        self.publish();

        let mut countdown = REPORT_EACH_XTH_BYTE as i64;
        loop {
            let len = match input.read(&mut self.buf) {
                Ok(0) => break,
                Ok(len) => len,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if self.cancel.is_cancelled() {
                return Err(AedictError::Cancelled);
            }
            out.write_all(&self.buf[..len])?;
            self.written += len as u64;

            countdown -= len as i64;
            if countdown <= 0 {
                self.publish();
                countdown = REPORT_EACH_XTH_BYTE as i64;
            }
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.publish();
    }

    fn publish(&mut self) {
        self.observer.on_progress(FetchProgress::Status {
            message: None,
            kilobytes: Some(self.written / 1024),
            max_kilobytes: self.max_kilobytes,
        });
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_is_complete_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("index");

        assert!(!is_complete(&missing));
        assert!(!missing.exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_is_complete_deletes_stray_file() {
        let tmp = tempfile::tempdir().unwrap();
        let stray = tmp.path().join("index");
        std::fs::write(&stray, b"not a directory").unwrap();

        assert!(!is_complete(&stray));
        assert!(!stray.exists());
    }

    #[test]
    fn test_is_complete_empty_and_populated_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("index");
        std::fs::create_dir(&dir).unwrap();
        assert!(!is_complete(&dir));

        std::fs::write(dir.join("segments.gen"), b"x").unwrap();
        assert!(is_complete(&dir));
    }

    #[test]
    fn test_fetch_skips_complete_dictionary() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("index");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("segments.gen"), b"x").unwrap();

        let source = Arc::new(MemorySource::new(Vec::new()));
        let fetcher = Fetcher::new(source.clone());
        let mut events: Vec<FetchProgress> = Vec::new();

        let outcome = fetcher.fetch(&request(&target), &CancelHandle::new(), &mut events);

        assert!(matches!(outcome, FetchOutcome::AlreadyComplete));
        assert_eq!(source.open_count(), 0);
        assert!(events.is_empty());
    }

    #[test]
    fn test_fetch_unpacks_all_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("dicts").join("index");
        let big = vec![7u8; 600 * 1024 + 123];
        let archive = zip_bytes(&[("_0.cfs", &big[..]), ("segments.gen", &b"gen"[..])]);

        let fetcher = Fetcher::new(Arc::new(MemorySource::new(archive)));
        let mut events: Vec<FetchProgress> = Vec::new();
        let outcome = fetcher.fetch(&request(&target), &CancelHandle::new(), &mut events);

        let total = big.len() as u64 + 3;
        match outcome {
            FetchOutcome::Downloaded { bytes, entries } => {
                assert_eq!(bytes, total);
                assert_eq!(entries, 2);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(is_complete(&target));
        assert_eq!(std::fs::read(target.join("_0.cfs")).unwrap(), big);
        assert_eq!(std::fs::read(target.join("segments.gen")).unwrap(), b"gen");

        assert!(events.iter().all(|e| !e.is_error()));
        let values: Vec<u64> = events.iter().filter_map(FetchProgress::kilobytes).collect();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(values.last().copied(), Some(total / 1024));
        // At least two periodic reports fall inside the 600 KiB entry.
        let intermediate = values
            .iter()
            .filter(|&&v| v >= 256 && v < total / 1024)
            .count();
        assert!(intermediate >= 2, "progress values: {values:?}");
    }

    #[test]
    fn test_fetch_progress_bound_uses_entry_size() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("index");
        let data = vec![1u8; 5000];
        let archive = zip_bytes(&[("a", &data[..])]);

        let fetcher = Fetcher::new(Arc::new(MemorySource::new(archive)));
        let mut events: Vec<FetchProgress> = Vec::new();
        fetcher.fetch(&request(&target), &CancelHandle::new(), &mut events);

        let max = events.iter().find_map(|e| match e {
            FetchProgress::Status { max_kilobytes, .. } => *max_kilobytes,
            FetchProgress::Error { .. } => None,
        });
        // 5000 / 1024 truncates to 4.
        assert_eq!(max, Some(4));
    }

    fn max_kilobytes(events: &[FetchProgress]) -> Vec<u64> {
        events
            .iter()
            .filter_map(|e| match e {
                FetchProgress::Status { max_kilobytes, .. } => *max_kilobytes,
                FetchProgress::Error { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_fetch_unpacks_data_descriptor_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("index");
        let big: Vec<u8> = (0..400 * 1024u32).map(|i| (i % 253) as u8).collect();
        let archive = streamed_zip_bytes(&[("_0.cfs", &big[..]), ("segments.gen", &b"gen"[..])]);

        let fetcher = Fetcher::new(Arc::new(MemorySource::new(archive)));
        let mut events: Vec<FetchProgress> = Vec::new();
        let outcome = fetcher.fetch(&request(&target), &CancelHandle::new(), &mut events);

        assert!(
            matches!(outcome, FetchOutcome::Downloaded { entries: 2, .. }),
            "{outcome:?}"
        );
        assert_eq!(std::fs::read(target.join("_0.cfs")).unwrap(), big);
        assert_eq!(std::fs::read(target.join("segments.gen")).unwrap(), b"gen");
        assert!(events.iter().all(|e| !e.is_error()));
    }

    #[test]
    fn test_fetch_unknown_entry_size_uses_expected_size_bound() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("index");
        let archive = streamed_zip_bytes(&[("a", &[5u8; 3000][..])]);

        let fetcher = Fetcher::new(Arc::new(MemorySource::new(archive)));
        let mut events: Vec<FetchProgress> = Vec::new();
        let req = request(&target);
        fetcher.fetch(&req, &CancelHandle::new(), &mut events);

        assert_eq!(max_kilobytes(&events).first(), Some(&(req.expected_size / 1024)));
    }

    #[test]
    fn test_fetch_empty_entry_keeps_zero_bound() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("index");
        let archive = zip_bytes(&[("empty", &b""[..])]);

        let fetcher = Fetcher::new(Arc::new(MemorySource::new(archive)));
        let mut events: Vec<FetchProgress> = Vec::new();
        let outcome = fetcher.fetch(&request(&target), &CancelHandle::new(), &mut events);

        assert!(outcome.is_success());
        assert_eq!(max_kilobytes(&events), vec![0, 0]);
    }

    #[test]
    fn test_fetch_cancelled_cleans_up_without_error_event() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("index");
        let archive = zip_bytes(&[("_0.cfs", &vec![0u8; 300 * 1024][..])]);
        let cancel = CancelHandle::new();

        let fetcher = Fetcher::new(Arc::new(CancellingSource {
            data: archive,
            cancel: cancel.clone(),
        }));
        let mut events: Vec<FetchProgress> = Vec::new();
        let outcome = fetcher.fetch(&request(&target), &cancel, &mut events);

        assert!(matches!(outcome, FetchOutcome::Cancelled));
        assert!(!target.exists());
        assert!(events.iter().all(|e| !e.is_error()));
    }

    #[test]
    fn test_fetch_transfer_failure_cleans_up_and_reports_once() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("index");
        let archive = zip_bytes(&[("_0.cfs", &vec![0u8; 300 * 1024][..])]);

        let fetcher = Fetcher::new(Arc::new(FailingSource {
            data: archive,
            fail_after: 100_000,
        }));
        let mut events: Vec<FetchProgress> = Vec::new();
        let outcome = fetcher.fetch(&request(&target), &CancelHandle::new(), &mut events);

        assert!(!target.exists());
        let errors: Vec<&FetchProgress> = events.iter().filter(|e| e.is_error()).collect();
        assert_eq!(errors.len(), 1);
        match (errors[0], outcome) {
            (FetchProgress::Error { message, error }, FetchOutcome::Failed(failed)) => {
                assert!(Arc::ptr_eq(error, &failed));
                assert!(message
                    .as_deref()
                    .unwrap()
                    .starts_with("Failed to download dictionary EDICT: "));
                assert!(error.to_string().contains("connection reset"));
            }
            (_, other) => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_fetch_directory_creation_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("storage");
        std::fs::write(&blocker, b"read-only medium").unwrap();
        let target = blocker.join("index");

        let archive = zip_bytes(&[("a", &b"data"[..])]);
        let fetcher = Fetcher::new(Arc::new(MemorySource::new(archive)));
        let mut events: Vec<FetchProgress> = Vec::new();
        let outcome = fetcher.fetch(&request(&target), &CancelHandle::new(), &mut events);

        match outcome {
            FetchOutcome::Failed(error) => {
                assert!(matches!(*error, AedictError::DirectoryCreation { .. }));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(events.iter().filter(|e| e.is_error()).count(), 1);
        assert!(blocker.is_file());
    }

    #[test]
    fn test_fetch_is_idempotent_after_success() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("index");
        let source = Arc::new(MemorySource::new(zip_bytes(&[("a", &b"data"[..])])));
        let fetcher = Fetcher::new(source.clone());

        let mut events: Vec<FetchProgress> = Vec::new();
        assert!(fetcher
            .fetch(&request(&target), &CancelHandle::new(), &mut events)
            .is_success());
        let outcome = fetcher.fetch(&request(&target), &CancelHandle::new(), &mut events);

        assert!(matches!(outcome, FetchOutcome::AlreadyComplete));
        assert_eq!(source.open_count(), 1);
    }
}
