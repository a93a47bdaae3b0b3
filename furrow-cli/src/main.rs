//! `furrow`: lay audio files out on a lane, print their peak overview, and
//! replay or snapshot journals without a GUI attached.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use furrow_core::audio_file::AudioFile;
use furrow_core::config::Config;
use furrow_core::journal::JournalError;
use furrow_core::paths;
use furrow_core::timeline::{SequenceKind, Timeline};
use furrow_types::Frame;

const USAGE: &str = "usage: furrow [-v|--verbose] [--project DIR] [--replay JOURNAL] [--snapshot OUT] [FILE...]";

/// Columns printed per region.
const OVERVIEW_COLUMNS: usize = 16;

struct Args {
    verbose: bool,
    project: Option<PathBuf>,
    replay: Option<PathBuf>,
    snapshot: Option<PathBuf>,
    files: Vec<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args {
        verbose: false,
        project: None,
        replay: None,
        snapshot: None,
        files: Vec::new(),
    };
    let mut it = args.iter().skip(1);
    while let Some(arg) = it.next() {
        let mut value = |flag: &str| {
            it.next()
                .map(PathBuf::from)
                .ok_or_else(|| format!("{} needs a value", flag))
        };
        match arg.as_str() {
            "-v" | "--verbose" => parsed.verbose = true,
            "--project" => parsed.project = Some(value("--project")?),
            "--replay" => parsed.replay = Some(value("--replay")?),
            "--snapshot" => parsed.snapshot = Some(value("--snapshot")?),
            "-h" | "--help" => return Err(USAGE.to_string()),
            flag if flag.starts_with('-') => return Err(format!("unknown option {}\n{}", flag, USAGE)),
            file => parsed.files.push(PathBuf::from(file)),
        }
    }
    Ok(parsed)
}

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = paths::log_path();
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("cannot create log file {}: {}", log_path.display(), e);
            return;
        }
    };

    if WriteLogger::init(log_level, simplelog::Config::default(), log_file).is_err() {
        eprintln!("logger already initialized");
        return;
    }

    log::info!("furrow starting (log level: {:?})", log_level);
}

fn main() {
    let argv: Vec<String> = std::env::args().collect();
    let args = match parse_args(&argv) {
        Ok(a) => a,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(2);
        }
    };
    init_logging(args.verbose);

    let config = Config::load();
    let mut timeline = match build_timeline(&config, &args) {
        Ok(t) => t,
        Err(e) => {
            let journal = args.replay.as_deref().unwrap_or(Path::new("-"));
            eprintln!("cannot replay {}: {}", journal.display(), e);
            std::process::exit(1);
        }
    };

    if !args.files.is_empty() {
        lay_out_files(&mut timeline, &args.files);
    }

    print_timeline(&timeline);

    if let Some(out) = &args.snapshot {
        if let Err(e) = timeline.write_snapshot(out) {
            eprintln!("cannot write snapshot {}: {}", out.display(), e);
            std::process::exit(1);
        }
        println!("snapshot written to {}", out.display());
    }
}

/// Timeline from config, with the project directory set before any replay so
/// relative sources in the journal resolve under `<project>/sources/`.
fn build_timeline(config: &Config, args: &Args) -> Result<Timeline, JournalError> {
    let mut timeline = Timeline::from_config(config);
    if let Some(dir) = &args.project {
        timeline.set_project_dir(dir);
    }
    if let Some(path) = &args.replay {
        timeline.replay_file(path)?;
    }
    Ok(timeline)
}

/// Place `files` end to end on a new audio lane.
fn lay_out_files(timeline: &mut Timeline, files: &[PathBuf]) {
    let seq = timeline.add_sequence("files", SequenceKind::Audio);
    let mut at: Frame = 0;
    for file in files {
        let name = absolute(file);
        match timeline.add_audio_region(seq, &name, at) {
            Some(id) => {
                if let Some(w) = timeline.widget(id) {
                    at = w.end();
                }
            }
            None => eprintln!("skipping {}", file.display()),
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|d| d.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn print_timeline(timeline: &Timeline) {
    for seq in timeline.sequences() {
        println!(
            "{} {} ({:?}, {} widget(s))",
            seq.id(),
            seq.name,
            seq.kind(),
            seq.widgets().len()
        );
        for id in seq.widgets() {
            let Some(w) = timeline.widget(*id) else {
                continue;
            };
            match (w.control(), w.source()) {
                (Some(value), _) => println!("  {} @{} value {:.3}", id, w.start(), value),
                (None, source) => {
                    let name = source
                        .map(|f| f.path().display().to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "  {} @{} len {} offset {} {}",
                        id,
                        w.start(),
                        w.length(),
                        w.offset(),
                        name
                    );
                    if let Some(file) = source {
                        print_overview(file, w.offset(), w.length());
                    }
                }
            }
        }
    }
}

fn print_overview(file: &Arc<AudioFile>, offset: Frame, length: Frame) {
    if length == 0 {
        return;
    }
    let fpp = (length as f64 / OVERVIEW_COLUMNS as f64).max(1.0);
    let Some(read) = file.read_peaks(fpp, offset, offset + length) else {
        println!("    (no peaks)");
        return;
    };
    const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    for ch in 0..read.channels {
        let line: String = (0..read.peaks)
            .map(|col| {
                let p = read.buffer[col * read.channels + ch];
                let level = p.max.abs().max(p.min.abs()).min(1.0);
                BARS[((level * (BARS.len() - 1) as f32).round() as usize).min(BARS.len() - 1)]
            })
            .collect();
        println!("    ch{} {}", ch, line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use furrow_core::journal::{JournalWriter, LogAction, LogRecord, Transaction};
    use furrow_types::{LogEntry, ObjectId};

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("furrow")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn parses_flags_and_files() {
        let a = parse_args(&argv(&["-v", "--replay", "j.jsonl", "a.wav", "b.wav"])).unwrap();
        assert!(a.verbose);
        assert_eq!(a.replay, Some(PathBuf::from("j.jsonl")));
        assert_eq!(a.files, vec![PathBuf::from("a.wav"), PathBuf::from("b.wav")]);
        assert!(a.snapshot.is_none());
    }

    #[test]
    fn replay_resolves_sources_under_project() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("sources").join("kick.wav");
        std::fs::create_dir_all(wav.parent().unwrap()).unwrap();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(&wav, spec).unwrap();
        for i in 0..480 {
            w.write_sample(i as i16).unwrap();
        }
        w.finalize().unwrap();

        let mut lane = LogEntry::new();
        lane.add(":name", "drums");
        lane.add(":kind", "audio");
        let mut region = LogEntry::new();
        region.add(":start", 0);
        region.add_id(":sequence", Some(ObjectId::new(1)));
        region.add(":offset", 0);
        region.add(":length", 480);
        region.add(":source", "kick.wav");
        let create = |id: u32, class: &str, entry: LogEntry| LogRecord {
            id: ObjectId::new(id),
            class: class.to_string(),
            action: LogAction::Create,
            old: None,
            new: Some(entry),
        };
        let journal = dir.path().join("session.jsonl");
        let tx = Transaction {
            records: vec![create(1, "Sequence", lane), create(2, "Region", region)],
        };
        JournalWriter::write_snapshot(&journal, &tx).unwrap();

        let args = Args {
            verbose: false,
            project: Some(dir.path().to_path_buf()),
            replay: Some(journal),
            snapshot: None,
            files: Vec::new(),
        };
        let timeline = build_timeline(&Config::embedded(), &args).unwrap();
        let source = timeline.widget(ObjectId::new(2)).unwrap().source().unwrap();
        assert!(!source.is_dummy());
        assert_eq!(source.frames(), 480);
    }

    #[test]
    fn flag_without_value_is_an_error() {
        assert!(parse_args(&argv(&["--project"])).is_err());
        assert!(parse_args(&argv(&["--bogus"])).is_err());
    }
}
