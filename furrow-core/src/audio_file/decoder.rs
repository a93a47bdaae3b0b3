//! Decoder backends behind an [`AudioFile`](super::AudioFile).

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use furrow_types::Frame;

/// Error opening a decoder.
#[derive(Debug)]
pub enum DecodeError {
    Io(std::io::Error),
    Wav(hound::Error),
    Unsupported(PathBuf),
}

impl From<std::io::Error> for DecodeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<hound::Error> for DecodeError {
    fn from(e: hound::Error) -> Self {
        Self::Wav(e)
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Wav(e) => write!(f, "WAV error: {}", e),
            Self::Unsupported(p) => write!(f, "no decoder for {}", p.display()),
        }
    }
}

impl std::error::Error for DecodeError {}

/// A sample source the cache can share between regions.
pub trait Decoder: Send {
    fn channels(&self) -> usize;
    fn frames(&self) -> Frame;
    fn sample_rate(&self) -> u32;

    /// Read interleaved frames `[start, end)` into `buf`. Returns frames read.
    fn read(&mut self, buf: &mut [f32], start: Frame, end: Frame) -> Frame;

    /// Accept interleaved frames for writing. Returns frames consumed.
    fn write(&mut self, _buf: &[f32], _frames: Frame) -> Frame {
        0
    }

    fn close(&mut self);

    fn is_dummy(&self) -> bool {
        false
    }
}

/// Try every concrete decoder in turn.
pub fn open(path: &Path) -> Result<Box<dyn Decoder>, DecodeError> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav") || e.eq_ignore_ascii_case("wave"))
        .unwrap_or(false);

    if is_wav {
        return Ok(Box::new(WavDecoder::open(path)?));
    }

    Err(DecodeError::Unsupported(path.to_path_buf()))
}

pub struct WavDecoder {
    reader: Option<hound::WavReader<BufReader<File>>>,
    spec: hound::WavSpec,
    frames: Frame,
    scale: f32,
}

impl WavDecoder {
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        let reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let frames = reader.duration() as Frame;
        let scale = match spec.sample_format {
            hound::SampleFormat::Int => (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32,
            hound::SampleFormat::Float => 1.0,
        };
        Ok(Self {
            reader: Some(reader),
            spec,
            frames,
            scale,
        })
    }
}

impl Decoder for WavDecoder {
    fn channels(&self) -> usize {
        self.spec.channels as usize
    }

    fn frames(&self) -> Frame {
        self.frames
    }

    fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    fn read(&mut self, buf: &mut [f32], start: Frame, end: Frame) -> Frame {
        let channels = self.channels().max(1);
        let end = end.min(self.frames);
        if start >= end {
            return 0;
        }
        let Some(reader) = self.reader.as_mut() else {
            return 0;
        };
        let wanted = ((end - start) as usize).min(buf.len() / channels);
        if wanted == 0 {
            return 0;
        }
        let Ok(start32) = u32::try_from(start) else {
            return 0;
        };
        if let Err(e) = reader.seek(start32) {
            log::warn!(target: "audio_file", "seek to {} failed: {}", start, e);
            return 0;
        }

        let wanted_samples = wanted * channels;
        let mut n = 0;
        match self.spec.sample_format {
            hound::SampleFormat::Int => {
                for s in reader.samples::<i32>().take(wanted_samples) {
                    match s {
                        Ok(s) => {
                            buf[n] = s as f32 / self.scale;
                            n += 1;
                        }
                        Err(_) => break,
                    }
                }
            }
            hound::SampleFormat::Float => {
                for s in reader.samples::<f32>().take(wanted_samples) {
                    match s {
                        Ok(s) => {
                            buf[n] = s;
                            n += 1;
                        }
                        Err(_) => break,
                    }
                }
            }
        }
        (n / channels) as Frame
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

/// Stand-in for files no decoder recognizes: silent, zero-length, and
/// swallowing writes.
pub struct DummyDecoder;

impl Decoder for DummyDecoder {
    fn channels(&self) -> usize {
        0
    }

    fn frames(&self) -> Frame {
        0
    }

    fn sample_rate(&self) -> u32 {
        0
    }

    fn read(&mut self, _buf: &mut [f32], _start: Frame, _end: Frame) -> Frame {
        0
    }

    fn write(&mut self, _buf: &[f32], frames: Frame) -> Frame {
        frames
    }

    fn close(&mut self) {}

    fn is_dummy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(path, spec).unwrap();
        for s in samples {
            w.write_sample(*s).unwrap();
        }
        w.finalize().unwrap();
    }

    #[test]
    fn wav_reads_normalized_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.wav");
        write_wav(&path, &[0, 8192, 16384, -16384, -32768]);

        let mut d = open(&path).unwrap();
        assert_eq!(d.channels(), 1);
        assert_eq!(d.frames(), 5);
        assert_eq!(d.sample_rate(), 8000);

        let mut buf = [0.0f32; 8];
        let n = d.read(&mut buf, 1, 4);
        assert_eq!(n, 3);
        assert!((buf[0] - 0.25).abs() < 1e-6);
        assert!((buf[1] - 0.5).abs() < 1e-6);
        assert!((buf[2] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn read_past_end_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        write_wav(&path, &[1, 2, 3]);

        let mut d = open(&path).unwrap();
        let mut buf = [0.0f32; 16];
        assert_eq!(d.read(&mut buf, 2, 100), 1);
        assert_eq!(d.read(&mut buf, 3, 100), 0);
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = open(Path::new("/tmp/thing.xyz")).err().unwrap();
        assert!(matches!(err, DecodeError::Unsupported(_)));
    }

    #[test]
    fn dummy_reads_nothing_and_accepts_writes() {
        let mut d = DummyDecoder;
        let mut buf = [0.0f32; 4];
        assert_eq!(d.read(&mut buf, 0, 4), 0);
        assert_eq!(d.write(&buf, 4), 4);
        assert!(d.is_dummy());
    }
}
