mod common;

use std::path::Path;
use std::sync::Arc;

use furrow_core::audio_file::AudioFileCache;
use furrow_core::journal::Journal;
use furrow_core::timeline::{SequenceKind, Timeline};

use common::{lane, write_wav};

#[test]
fn test_wav_handles_are_shared() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kick.wav");
    write_wav(&path, 4800);
    let cache = AudioFileCache::new();

    let a = cache.from_file(&path);
    let b = cache.from_file(&path);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.refs(), 2);
    assert_eq!(a.frames(), 4800);
    assert_eq!(a.sample_rate(), 48000);
    assert!(!a.is_dummy());
    assert_eq!(cache.open_count(), 1);

    cache.release(b);
    assert!(!a.is_closed());
    cache.release(Arc::clone(&a));
    assert!(a.is_closed());
    assert_eq!(cache.open_count(), 0);
    assert!(cache.lookup(&path).is_none());

    // a fresh open after the last release gets a new handle
    let c = cache.from_file(&path);
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(c.refs(), 1);
}

#[test]
fn test_poor_seekers_get_their_own_handle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loop.flac");
    std::fs::write(&path, b"not really flac").unwrap();
    let cache = AudioFileCache::new();

    let a = cache.from_file(&path);
    let b = cache.from_file(&path);
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(a.is_dummy() && b.is_dummy());
    assert_eq!(cache.open_count(), 0);
    assert!(a.read_peaks(10.0, 0, 100).is_none());

    let c = cache.duplicate(&a);
    assert!(!Arc::ptr_eq(&a, &c));
}

#[test]
fn test_peaks_follow_the_signal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ramp.wav");
    write_wav(&path, 1000);
    let cache = AudioFileCache::new();
    let file = cache.from_file(&path);

    let read = file.read_peaks(100.0, 0, 1000).unwrap();
    assert_eq!(read.peaks, 10);
    assert_eq!(read.channels, 1);
    assert_eq!(read.buffer.len(), 10);
    assert!(read.buffer.iter().all(|p| p.min <= p.max));
    assert!(read.buffer[9].max > read.buffer[0].max);

    // an earlier result stays usable after the window moves
    let held = Arc::clone(&read.buffer);
    let again = file.read_peaks(50.0, 0, 500).unwrap();
    assert_eq!(again.peaks, 10);
    assert_eq!(held.len(), 10);
    assert!(held[9].max > again.buffer[9].max);
}

#[test]
fn test_regions_take_and_return_references() {
    let dir = tempfile::tempdir().unwrap();
    write_wav(&dir.path().join("sources").join("kick.wav"), 2400);
    let cache = Arc::new(AudioFileCache::new());

    let mut tl = Timeline::with_cache(common::settings(), Journal::new(10), Arc::clone(&cache));
    tl.set_project_dir(dir.path());
    let seq = lane(&mut tl, SequenceKind::Audio, 0);

    let a = tl.add_audio_region(seq, Path::new("kick.wav"), 0).unwrap();
    assert_eq!(tl.widget(a).unwrap().length(), 2400);
    let file = cache
        .lookup(&dir.path().join("sources").join("kick.wav"))
        .unwrap();
    assert_eq!(file.refs(), 1);

    let b = tl.duplicate(a).unwrap();
    assert_eq!(file.refs(), 2);
    assert!(Arc::ptr_eq(tl.widget(b).unwrap().source().unwrap(), &file));
    let published = tl.reader().lane(seq);
    assert!(published.iter().all(|p| p.source.is_some()));

    tl.destroy_widget(b);
    assert_eq!(file.refs(), 1);

    drop(published);
    drop(tl);
    assert!(file.is_closed());
    assert_eq!(cache.open_count(), 0);
}

#[test]
fn test_missing_source_becomes_empty_region() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(AudioFileCache::new());
    let mut tl = Timeline::with_cache(common::settings(), Journal::new(10), cache);
    tl.set_project_dir(dir.path());
    let seq = lane(&mut tl, SequenceKind::Audio, 0);

    let id = tl.add_audio_region(seq, Path::new("gone.wav"), 100).unwrap();
    let w = tl.widget(id).unwrap();
    assert_eq!(w.length(), 0);
    assert!(w.source().unwrap().is_dummy());

    let control = lane(&mut tl, SequenceKind::Control, 100);
    assert!(tl.add_audio_region(control, Path::new("gone.wav"), 0).is_none());
}
