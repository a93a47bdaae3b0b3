//! Audio-visible projection of the timeline.
//!
//! The editing model lives on the GUI thread. What the audio thread needs,
//! the committed timing of every widget, is published into a [`TimingMap`]
//! behind a single reader/writer lock. Writers only take the lock to swap in
//! fresh lanes: at drag commit, structural changes, nudges and sorts.
//! Staged drag positions are never published.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use furrow_types::{Frame, Range};

use super::{SequenceId, WidgetId};
use crate::audio_file::AudioFile;

/// Published timing of one widget.
#[derive(Debug, Clone)]
pub struct Placement {
    pub id: WidgetId,
    pub range: Range,
    /// Control points only.
    pub control: Option<f32>,
    /// Region gain. Regions only.
    pub scale: Option<f32>,
    /// Regions with an audio source only.
    pub source: Option<Arc<AudioFile>>,
}

#[derive(Debug, Default)]
pub struct TimingMap {
    lanes: HashMap<SequenceId, Vec<Placement>>,
    owners: HashMap<WidgetId, SequenceId>,
}

impl TimingMap {
    /// Placements of `seq` in start order.
    pub fn lane(&self, seq: SequenceId) -> &[Placement] {
        self.lanes.get(&seq).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn range(&self, id: WidgetId) -> Option<Range> {
        let seq = self.owners.get(&id)?;
        self.lane(*seq)
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.range)
    }

    pub fn sequence_of(&self, id: WidgetId) -> Option<SequenceId> {
        self.owners.get(&id).copied()
    }

    pub fn sequences(&self) -> impl Iterator<Item = SequenceId> + '_ {
        self.lanes.keys().copied()
    }

    /// Replace the published contents of `seq`.
    pub fn publish_lane(&mut self, seq: SequenceId, placements: Vec<Placement>) {
        if let Some(old) = self.lanes.get(&seq) {
            for p in old {
                if self.owners.get(&p.id) == Some(&seq) {
                    self.owners.remove(&p.id);
                }
            }
        }
        for p in &placements {
            self.owners.insert(p.id, seq);
        }
        self.lanes.insert(seq, placements);
    }

    pub fn remove_lane(&mut self, seq: SequenceId) {
        self.publish_lane(seq, Vec::new());
        self.lanes.remove(&seq);
    }

    /// Automation value of a control lane at `frame`, interpolated linearly
    /// between neighbouring points and held flat past either end.
    pub fn control_value_at(&self, seq: SequenceId, frame: Frame) -> Option<f32> {
        let mut prev: Option<(Frame, f32)> = None;
        let mut next: Option<(Frame, f32)> = None;

        for p in self.lane(seq) {
            let Some(value) = p.control else { continue };
            if p.range.start <= frame {
                prev = Some((p.range.start, value));
            } else {
                next = Some((p.range.start, value));
                break;
            }
        }

        match (prev, next) {
            (Some((_, v)), None) | (None, Some((_, v))) => Some(v),
            (Some((pf, pv)), Some(_)) if pf == frame => Some(pv),
            (Some((pf, pv)), Some((nf, nv))) => {
                let t = (frame - pf) as f32 / (nf - pf) as f32;
                Some(pv + (nv - pv) * t)
            }
            (None, None) => None,
        }
    }
}

/// Shared handle to the timing map.
#[derive(Debug, Clone, Default)]
pub struct SequenceLock(Arc<RwLock<TimingMap>>);

impl SequenceLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, TimingMap> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, TimingMap> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// A read-only handle for the audio thread.
    pub fn reader(&self) -> TimingReader {
        TimingReader { lock: self.clone() }
    }
}

/// Read side of a [`SequenceLock`]. Cheap to clone and `Send`.
#[derive(Debug, Clone)]
pub struct TimingReader {
    lock: SequenceLock,
}

impl TimingReader {
    pub fn range(&self, id: WidgetId) -> Option<Range> {
        self.lock.read().range(id)
    }

    pub fn lane(&self, seq: SequenceId) -> Vec<Placement> {
        self.lock.read().lane(seq).to_vec()
    }

    pub fn control_value_at(&self, seq: SequenceId, frame: Frame) -> Option<f32> {
        self.lock.read().control_value_at(seq, frame)
    }

    /// Run `f` with the read lock held.
    pub fn with_map<R>(&self, f: impl FnOnce(&TimingMap) -> R) -> R {
        f(&self.lock.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use furrow_types::ObjectId;

    fn point(id: u32, start: Frame, control: f32) -> Placement {
        Placement {
            id: ObjectId::new(id),
            range: Range::at(start),
            control: Some(control),
            scale: None,
            source: None,
        }
    }

    #[test]
    fn republishing_moves_ownership() {
        let lock = SequenceLock::new();
        let a = ObjectId::new(1);
        let b = ObjectId::new(2);
        lock.write().publish_lane(a, vec![point(10, 0, 0.0)]);
        assert_eq!(lock.read().sequence_of(ObjectId::new(10)), Some(a));

        let mut w = lock.write();
        w.publish_lane(b, vec![point(10, 5, 0.0)]);
        w.publish_lane(a, Vec::new());
        drop(w);

        let reader = lock.reader();
        assert_eq!(reader.range(ObjectId::new(10)), Some(Range::at(5)));
        assert_eq!(lock.read().sequence_of(ObjectId::new(10)), Some(b));
    }

    #[test]
    fn control_interpolates_between_points() {
        let lock = SequenceLock::new();
        let seq = ObjectId::new(1);
        lock.write()
            .publish_lane(seq, vec![point(2, 100, 0.0), point(3, 200, 1.0)]);
        let r = lock.reader();
        assert_eq!(r.control_value_at(seq, 0), Some(0.0));
        assert_eq!(r.control_value_at(seq, 150), Some(0.5));
        assert_eq!(r.control_value_at(seq, 200), Some(1.0));
        assert_eq!(r.control_value_at(seq, 10_000), Some(1.0));
        assert_eq!(r.control_value_at(ObjectId::new(9), 0), None);
    }

    #[test]
    fn removed_lane_forgets_owners() {
        let lock = SequenceLock::new();
        let seq = ObjectId::new(1);
        lock.write().publish_lane(seq, vec![point(4, 0, 0.5)]);
        lock.write().remove_lane(seq);
        assert_eq!(lock.read().range(ObjectId::new(4)), None);
        assert_eq!(lock.read().sequences().count(), 0);
    }
}
