use std::sync::Arc;

use furrow_types::{Frame, Peak};

use super::decoder::Decoder;

#[derive(Debug, Clone, Copy, PartialEq)]
struct PeakKey {
    fpp_bits: u64,
    start: Frame,
    end: Frame,
}

/// Min/max peaks of the last requested window, one pair per pixel column per
/// channel, interleaved by channel.
pub struct Peaks {
    key: Option<PeakKey>,
    buffer: Arc<[Peak]>,
    count: usize,
    scratch: Vec<f32>,
}

impl Default for Peaks {
    fn default() -> Self {
        Self::new()
    }
}

impl Peaks {
    pub fn new() -> Self {
        Self {
            key: None,
            buffer: Arc::from(Vec::new()),
            count: 0,
            scratch: Vec::new(),
        }
    }

    /// Compute peaks for `[start, end)` at `fpp` frames per pixel, reusing the
    /// previous result when the request is identical. Returns the column count.
    pub fn fill_buffer(
        &mut self,
        decoder: &mut dyn Decoder,
        fpp: f64,
        start: Frame,
        end: Frame,
    ) -> usize {
        let fpp = if fpp.is_finite() && fpp >= 1.0 { fpp } else { 1.0 };
        let key = PeakKey {
            fpp_bits: fpp.to_bits(),
            start,
            end,
        };
        if self.key == Some(key) {
            return self.count;
        }

        let channels = decoder.channels();
        let end = end.min(decoder.frames());
        if channels == 0 || start >= end {
            self.store(key, Vec::new(), 0);
            return 0;
        }

        let columns = ((end - start) as f64 / fpp).ceil() as usize;
        let mut peaks = Vec::with_capacity(columns * channels);

        for col in 0..columns {
            let s = start + (col as f64 * fpp) as Frame;
            let e = (start + ((col + 1) as f64 * fpp) as Frame).min(end).max(s + 1);
            let frames = (e - s) as usize;
            self.scratch.resize(frames * channels, 0.0);
            let read = decoder.read(&mut self.scratch, s, e) as usize;

            let mut column = vec![
                Peak {
                    min: f32::INFINITY,
                    max: f32::NEG_INFINITY,
                };
                channels
            ];
            for frame in self.scratch[..read * channels].chunks(channels) {
                for (ch, sample) in frame.iter().enumerate() {
                    column[ch].accumulate(*sample);
                }
            }
            if read == 0 {
                column.fill(Peak::default());
            }
            peaks.extend(column);
        }

        self.store(key, peaks, columns);
        columns
    }

    fn store(&mut self, key: PeakKey, peaks: Vec<Peak>, count: usize) {
        self.key = Some(key);
        self.buffer = Arc::from(peaks);
        self.count = count;
    }

    pub fn peakbuf(&self) -> Arc<[Peak]> {
        Arc::clone(&self.buffer)
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two-channel source where left = frame index and right = -frame index.
    struct Ramp {
        frames: Frame,
        reads: usize,
    }

    impl Decoder for Ramp {
        fn channels(&self) -> usize {
            2
        }
        fn frames(&self) -> Frame {
            self.frames
        }
        fn sample_rate(&self) -> u32 {
            48000
        }
        fn read(&mut self, buf: &mut [f32], start: Frame, end: Frame) -> Frame {
            self.reads += 1;
            let end = end.min(self.frames);
            let mut n = 0;
            for f in start..end {
                buf[n * 2] = f as f32;
                buf[n * 2 + 1] = -(f as f32);
                n += 1;
            }
            n as Frame
        }
        fn close(&mut self) {}
    }

    #[test]
    fn one_pair_per_column_per_channel() {
        let mut src = Ramp { frames: 100, reads: 0 };
        let mut peaks = Peaks::new();
        let n = peaks.fill_buffer(&mut src, 10.0, 0, 40);
        assert_eq!(n, 4);
        let buf = peaks.peakbuf();
        assert_eq!(buf.len(), 8);
        // column 1, left channel covers frames 10..20
        assert_eq!(buf[2], Peak { min: 10.0, max: 19.0 });
        // column 1, right channel
        assert_eq!(buf[3], Peak { min: -19.0, max: -10.0 });
    }

    #[test]
    fn identical_request_is_cached() {
        let mut src = Ramp { frames: 100, reads: 0 };
        let mut peaks = Peaks::new();
        peaks.fill_buffer(&mut src, 25.0, 0, 100);
        let reads = src.reads;
        peaks.fill_buffer(&mut src, 25.0, 0, 100);
        assert_eq!(src.reads, reads);
        peaks.fill_buffer(&mut src, 50.0, 0, 100);
        assert!(src.reads > reads);
    }

    #[test]
    fn window_is_clamped_to_source() {
        let mut src = Ramp { frames: 30, reads: 0 };
        let mut peaks = Peaks::new();
        assert_eq!(peaks.fill_buffer(&mut src, 10.0, 0, 1000), 3);
        assert_eq!(peaks.fill_buffer(&mut src, 10.0, 50, 1000), 0);
    }
}
