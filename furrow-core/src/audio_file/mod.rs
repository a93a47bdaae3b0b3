//! Reference-counted audio source cache.
//!
//! Regions never open files themselves. They ask the [`AudioFileCache`] for a
//! handle, which is shared between every region referencing the same
//! canonical path unless the container seeks poorly (see [`is_poor_seeker`]).
//! Files no decoder recognizes still get a handle: a dummy that reads as
//! silence and reports no peaks, so an unreadable source shows up as an empty
//! region instead of an error.

pub mod decoder;
mod peaks;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use furrow_types::{Frame, Peak};

use decoder::{Decoder, DummyDecoder};
pub use decoder::DecodeError;
pub use peaks::Peaks;

static SHARED: LazyLock<Arc<AudioFileCache>> = LazyLock::new(|| Arc::new(AudioFileCache::new()));

/// Containers whose random access is expensive enough that every region gets
/// its own decoder. Matched on the file name suffix only.
pub fn is_poor_seeker(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("ogg") || e.eq_ignore_ascii_case("flac"))
        .unwrap_or(false)
}

/// Result of a successful peak query.
#[derive(Debug, Clone)]
pub struct PeakRead {
    /// Number of pixel columns.
    pub peaks: usize,
    pub channels: usize,
    /// `peaks * channels` pairs, interleaved by channel.
    pub buffer: Arc<[Peak]>,
}

struct Inner {
    decoder: Box<dyn Decoder>,
    peaks: Peaks,
    closed: bool,
}

pub struct AudioFile {
    path: PathBuf,
    refs: AtomicUsize,
    channels: usize,
    frames: Frame,
    sample_rate: u32,
    dummy: bool,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for AudioFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFile")
            .field("path", &self.path)
            .field("refs", &self.refs())
            .field("channels", &self.channels)
            .field("frames", &self.frames)
            .field("dummy", &self.dummy)
            .finish()
    }
}

impl AudioFile {
    fn new(path: PathBuf, decoder: Box<dyn Decoder>) -> Self {
        Self {
            channels: decoder.channels(),
            frames: decoder.frames(),
            sample_rate: decoder.sample_rate(),
            dummy: decoder.is_dummy(),
            path,
            refs: AtomicUsize::new(1),
            inner: Mutex::new(Inner {
                decoder,
                peaks: Peaks::new(),
                closed: false,
            }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Length in frames; zero for dummies.
    pub fn frames(&self) -> Frame {
        self.frames
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_dummy(&self) -> bool {
        self.dummy
    }

    /// Number of regions currently holding this handle.
    pub fn refs(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.inner().closed
    }

    /// Read interleaved frames `[start, end)`. Returns frames read.
    pub fn read(&self, buf: &mut [f32], start: Frame, end: Frame) -> Frame {
        let mut inner = self.inner();
        if inner.closed {
            return 0;
        }
        inner.decoder.read(buf, start, end)
    }

    pub fn write(&self, buf: &[f32], frames: Frame) -> Frame {
        let mut inner = self.inner();
        if inner.closed {
            return 0;
        }
        inner.decoder.write(buf, frames)
    }

    /// Min/max peaks for `[start, end)` at `fpp` frames per pixel.
    ///
    /// Dummies report `None`. The buffer stays valid for as long as the
    /// caller holds it, even after later queries replace the cached window.
    pub fn read_peaks(&self, fpp: f64, start: Frame, end: Frame) -> Option<PeakRead> {
        if self.dummy {
            return None;
        }
        let mut inner = self.inner();
        if inner.closed {
            return None;
        }
        let Inner { decoder, peaks, .. } = &mut *inner;
        let count = peaks.fill_buffer(decoder.as_mut(), fpp, start, end);
        Some(PeakRead {
            peaks: count,
            channels: self.channels,
            buffer: peaks.peakbuf(),
        })
    }

    fn close(&self) {
        let mut inner = self.inner();
        if !inner.closed {
            inner.decoder.close();
            inner.peaks.invalidate();
            inner.closed = true;
        }
    }
}

/// Registry from canonical path to shared handle.
pub struct AudioFileCache {
    open: Mutex<HashMap<PathBuf, Arc<AudioFile>>>,
}

impl Default for AudioFileCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioFileCache {
    pub fn new() -> Self {
        Self {
            open: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide cache.
    pub fn shared() -> Arc<AudioFileCache> {
        Arc::clone(&SHARED)
    }

    fn open_files(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<AudioFile>>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open `path`, sharing an existing handle when the format allows it.
    pub fn from_file(&self, path: &Path) -> Arc<AudioFile> {
        let started = Instant::now();
        let path = canonical(path);
        let poor_seeker = is_poor_seeker(&path);

        let mut open = self.open_files();

        if !poor_seeker {
            if let Some(file) = open.get(&path) {
                file.refs.fetch_add(1, Ordering::AcqRel);
                return Arc::clone(file);
            }
        }

        let decoder: Box<dyn Decoder> = match decoder::open(&path) {
            Ok(d) => d,
            Err(e) => {
                log::warn!(target: "audio_file", "creating dummy source for \"{}\": {}", path.display(), e);
                Box::new(DummyDecoder)
            }
        };

        let file = Arc::new(AudioFile::new(path.clone(), decoder));
        if !poor_seeker {
            open.insert(path, Arc::clone(&file));
        }

        log::debug!(
            target: "audio_file",
            "opened \"{}\" in {:?}",
            file.path().display(),
            started.elapsed()
        );
        file
    }

    /// A handle for another region: independent for poor seekers, shared otherwise.
    pub fn duplicate(&self, file: &Arc<AudioFile>) -> Arc<AudioFile> {
        if is_poor_seeker(file.path()) {
            self.from_file(file.path())
        } else {
            file.refs.fetch_add(1, Ordering::AcqRel);
            Arc::clone(file)
        }
    }

    /// Drop one reference. The last one closes the decoder and frees the slot.
    pub fn release(&self, file: Arc<AudioFile>) {
        let mut open = self.open_files();
        let previous = file
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| r.checked_sub(1))
            .unwrap_or(0);
        if previous == 0 {
            log::warn!(target: "audio_file", "release of unreferenced \"{}\"", file.path().display());
            return;
        }
        if previous == 1 {
            log::debug!(target: "audio_file", "freeing audio file \"{}\"", file.path().display());
            if open
                .get(file.path())
                .map_or(false, |f| Arc::ptr_eq(f, &file))
            {
                open.remove(file.path());
            }
            drop(open);
            file.close();
        }
    }

    /// The shared handle currently open for `path`, if any.
    pub fn lookup(&self, path: &Path) -> Option<Arc<AudioFile>> {
        self.open_files().get(&canonical(path)).cloned()
    }

    /// Number of shared handles currently open.
    pub fn open_count(&self) -> usize {
        self.open_files().len()
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poor_seekers_by_suffix() {
        assert!(is_poor_seeker(Path::new("a.flac")));
        assert!(is_poor_seeker(Path::new("a.OGG")));
        assert!(!is_poor_seeker(Path::new("a.wav")));
        assert!(!is_poor_seeker(Path::new("flac")));
    }

    #[test]
    fn missing_file_becomes_dummy() {
        let cache = AudioFileCache::new();
        let f = cache.from_file(Path::new("/nonexistent/furrow/missing.wav"));
        assert!(f.is_dummy());
        assert_eq!(f.frames(), 0);
        assert!(f.read_peaks(256.0, 0, 1000).is_none());
        let mut buf = [0.0f32; 8];
        assert_eq!(f.read(&mut buf, 0, 4), 0);
        assert_eq!(f.write(&buf, 4), 4);
        cache.release(f);
        assert_eq!(cache.open_count(), 0);
    }

    #[test]
    fn over_release_is_harmless() {
        let cache = AudioFileCache::new();
        let f = cache.from_file(Path::new("/nonexistent/furrow/x.wav"));
        let extra = Arc::clone(&f);
        cache.release(f);
        cache.release(extra);
        assert_eq!(cache.open_count(), 0);
    }
}
