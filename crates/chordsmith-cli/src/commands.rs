//! CLI command implementations

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chordsmith::{
    exact_match_accuracy, CorpusBuilder, CorpusReport, Harmonizer, ModelArtifact, RenderOptions,
};
use midi_tracks::{InstrumentTrack, MidiFile, NoteEvent};
use smithconf::{ChordsmithConfig, ConfigSources, RenderConfig};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Top-level `.mid` / `.midi` files of `dir`, sorted by file name.
fn midi_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if entry.file_type().is_file() && is_midi(entry.path()) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

fn is_midi(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("mid") || ext.eq_ignore_ascii_case("midi"))
        .unwrap_or(false)
}

/// `song.mid` -> `song.chords.mid`
fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("chords.mid")
}

fn render_options(render: &RenderConfig) -> RenderOptions {
    RenderOptions {
        pitch_offset: render.pitch_offset,
        velocity: render.velocity,
        program: render.program,
        fallback_slot_seconds: render.fallback_slot_seconds,
    }
}

/// Machine-readable training outcome for `train --json`.
fn train_summary(
    report: &CorpusReport,
    train_rows: usize,
    holdout_rows: usize,
    holdout_accuracy: Option<f64>,
) -> serde_json::Value {
    serde_json::json!({
        "corpus": report,
        "train_rows": train_rows,
        "holdout_rows": holdout_rows,
        "holdout_accuracy": holdout_accuracy,
    })
}

/// Build a corpus from `dir`, train, and save the artifact to `model_path`.
pub fn train(dir: &Path, model_path: &Path, seq_length: usize, holdout: f64, json: bool) -> Result<()> {
    let files = midi_files(dir)?;
    if files.is_empty() {
        bail!("No .mid or .midi files found in {}", dir.display());
    }
    info!(dir = %dir.display(), files = files.len(), seq_length, "building training corpus");

    let builder = CorpusBuilder::new(seq_length)?;
    let set = files
        .iter()
        .fold(builder, |builder, path| {
            builder.absorb(path.display().to_string(), MidiFile::open(path))
        })
        .finish()
        .with_context(|| format!("No usable training data in {}", dir.display()))?;

    let (train_table, holdout_table) = set.table.split_holdout(holdout);
    let artifact = ModelArtifact::train(&train_table)?;
    let accuracy = holdout_table
        .as_ref()
        .map(|table| exact_match_accuracy(&artifact.classifier, table))
        .transpose()?;

    artifact
        .save(model_path)
        .with_context(|| format!("Failed to save model to {}", model_path.display()))?;

    if json {
        let holdout_rows = holdout_table.as_ref().map_or(0, |table| table.len());
        let summary = train_summary(&set.report, train_table.len(), holdout_rows, accuracy);
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "Trained on {} rows from {} files ({} skipped)",
        train_table.len(),
        set.report.files_used.len(),
        set.report.skipped.len()
    );
    println!(
        "  sequence length: {}, chord width: {}",
        set.report.seq_length, set.report.max_chord_width
    );
    for skipped in &set.report.skipped {
        println!("  skipped {}: {}", skipped.source, skipped.reason);
    }
    match (accuracy, holdout_table) {
        (Some(accuracy), Some(table)) => println!(
            "  holdout exact-match accuracy: {:.1}% over {} rows",
            accuracy * 100.0,
            table.len()
        ),
        _ => println!("  no holdout rows"),
    }
    println!("Model saved to {}", model_path.display());

    Ok(())
}

/// Predict chords for `input` and write the melody plus chord track.
pub fn harmonize(
    input: &Path,
    model_path: &Path,
    output: Option<PathBuf>,
    config: &ChordsmithConfig,
) -> Result<()> {
    let artifact = ModelArtifact::load(model_path)
        .with_context(|| format!("Failed to load model from {}", model_path.display()))?;
    if artifact.seq_length != config.sequence.seq_length {
        warn!(
            model = artifact.seq_length,
            configured = config.sequence.seq_length,
            "model was trained with a different sequence length; using the model's"
        );
    }

    let harmonizer = Harmonizer::from_artifact(artifact, render_options(&config.render))?;
    let file = MidiFile::open(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let result = harmonizer
        .harmonize(&file)
        .with_context(|| format!("Failed to harmonize {}", input.display()))?;

    let output = output.unwrap_or_else(|| default_output_path(input));
    std::fs::write(&output, result.to_midi_bytes())
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let timeline = &result.timeline;
    println!(
        "{} chords predicted, {} placed on {}",
        result.predicted.len(),
        timeline.placed,
        timeline.timing
    );
    for (slot, names) in timeline.slots.iter().zip(result.chord_names()) {
        let label = if names.is_empty() {
            "-".to_string()
        } else {
            names.join(" ")
        };
        println!("  {:>8.2}s  {}", slot.start, label);
    }
    if result.predicted.len() > timeline.placed {
        println!(
            "  ({} chords had no slot and were dropped)",
            result.predicted.len() - timeline.placed
        );
    }
    println!("Wrote {}", output.display());

    Ok(())
}

/// Print what chordsmith reads from a file.
pub fn inspect(input: &Path) -> Result<()> {
    let file = MidiFile::open(input).with_context(|| format!("Failed to read {}", input.display()))?;

    println!("{}", input.display());
    println!("  ppq: {}, length: {:.2}s", file.ppq(), file.end_time());

    for change in file.tempo_map.changes() {
        println!("  tempo @{}: {:.1} bpm", change.tick, change.bpm());
    }
    for ts in &file.time_signatures {
        println!("  time signature @{}: {}/{}", ts.tick, ts.numerator, ts.denominator);
    }

    println!("  instruments:");
    for inst in &file.instruments {
        println!("    {}", instrument_line(inst));
    }

    match file.select_tracks() {
        Ok(selection) => {
            println!("  melody: instrument {}", selection.melody);
            match selection.harmony {
                Some(index) => println!("  harmony: instrument {index}"),
                None => println!("  harmony: none (chords go on downbeats)"),
            }
        }
        Err(e) => println!("  selection: {e}"),
    }

    let downbeats = file.downbeats();
    let preview: Vec<String> = downbeats.iter().take(8).map(|t| format!("{t:.2}")).collect();
    println!(
        "  downbeats: {} [{}{}]",
        downbeats.len(),
        preview.join(", "),
        if downbeats.len() > preview.len() { ", ..." } else { "" }
    );

    Ok(())
}

fn instrument_line(inst: &InstrumentTrack) -> String {
    let mean_length = if inst.notes.is_empty() {
        0.0
    } else {
        inst.notes.iter().map(NoteEvent::duration).sum::<f64>() / inst.notes.len() as f64
    };
    format!(
        "[{}] track {} ch {} program {}{} - {} notes, ends {:.2}s, mean length {:.2}s{}",
        inst.index,
        inst.source_track,
        inst.channel,
        inst.program,
        inst.name
            .as_deref()
            .map(|n| format!(" \"{n}\""))
            .unwrap_or_default(),
        inst.notes.len(),
        inst.end_time(),
        mean_length,
        if inst.is_drum { " (drums)" } else { "" }
    )
}

pub fn show_config(config: &ChordsmithConfig, sources: &ConfigSources) {
    print!("{}", config.to_toml());

    println!();
    if sources.files.is_empty() {
        println!("# No config files found; using defaults");
    }
    for file in &sources.files {
        println!("# Loaded from {}", file.display());
    }
    for var in &sources.env_overrides {
        println!("# Overridden by ${var}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midi_tracks::{tracks_to_midi, TempoMap, TrackSpec, DEFAULT_TEMPO};

    fn write_song(path: &Path, with_chords: bool) {
        let pitches = [60u8, 64, 67, 72, 67, 64, 60, 62, 64, 65];
        let melody = TrackSpec {
            name: "Melody".to_string(),
            program: 0,
            is_drum: false,
            notes: pitches
                .iter()
                .enumerate()
                .map(|(i, &p)| NoteEvent::new(p, i as f64 * 0.5, (i + 1) as f64 * 0.5, 90))
                .collect(),
        };
        let mut specs = vec![melody];
        if with_chords {
            specs.push(TrackSpec {
                name: "Chords".to_string(),
                program: 0,
                is_drum: false,
                notes: pitches
                    .iter()
                    .enumerate()
                    .flat_map(|(i, &p)| {
                        [p - 24, p - 20].map(|q| NoteEvent::new(q, i as f64 * 0.5, (i + 1) as f64 * 0.5, 70))
                    })
                    .collect(),
            });
        }
        let bytes = tracks_to_midi(&specs, &TempoMap::constant(480, DEFAULT_TEMPO), &[]);
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn midi_extension_check() {
        assert!(is_midi(Path::new("a.mid")));
        assert!(is_midi(Path::new("b.MIDI")));
        assert!(!is_midi(Path::new("c.txt")));
        assert!(!is_midi(Path::new("mid")));
    }

    #[test]
    fn output_defaults_next_to_input() {
        assert_eq!(
            default_output_path(Path::new("/songs/tune.mid")),
            PathBuf::from("/songs/tune.chords.mid")
        );
    }

    #[test]
    fn lists_only_top_level_midi_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.mid"), b"").unwrap();
        std::fs::write(dir.path().join("a.midi"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/c.mid"), b"").unwrap();

        let files = midi_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.midi".to_string(), "b.mid".to_string()]);
    }

    #[test]
    fn train_then_harmonize() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus");
        std::fs::create_dir(&corpus).unwrap();
        write_song(&corpus.join("one.mid"), true);
        write_song(&corpus.join("two.mid"), true);
        std::fs::write(corpus.join("broken.mid"), b"not midi").unwrap();

        let model = dir.path().join("model.json");
        train(&corpus, &model, 4, 0.2, false).unwrap();
        assert!(model.exists());

        let input = dir.path().join("lead.mid");
        write_song(&input, false);
        let output = dir.path().join("lead.out.mid");

        let mut config = ChordsmithConfig::default();
        config.sequence.seq_length = 4;
        harmonize(&input, &model, Some(output.clone()), &config).unwrap();

        let rendered = MidiFile::open(&output).unwrap();
        assert_eq!(rendered.instruments.len(), 2);
        assert!(!rendered.instruments[1].notes.is_empty());
    }

    #[test]
    fn json_summary_carries_holdout_results() {
        let report = CorpusReport {
            seq_length: 4,
            max_chord_width: 3,
            rows: 10,
            files_used: vec!["one.mid".to_string()],
            skipped: Vec::new(),
        };

        let summary = train_summary(&report, 8, 2, Some(0.5));
        assert_eq!(summary["train_rows"], 8);
        assert_eq!(summary["holdout_rows"], 2);
        assert_eq!(summary["holdout_accuracy"], 0.5);
        assert_eq!(summary["corpus"]["rows"], 10);

        let summary = train_summary(&report, 10, 0, None);
        assert!(summary["holdout_accuracy"].is_null());
    }

    #[test]
    fn instrument_line_shows_length() {
        let inst = InstrumentTrack {
            index: 0,
            source_track: 1,
            channel: 0,
            program: 0,
            name: Some("Lead".to_string()),
            is_drum: false,
            notes: vec![NoteEvent::new(60, 0.0, 0.5, 90), NoteEvent::new(62, 0.5, 2.0, 90)],
        };
        assert_eq!(
            instrument_line(&inst),
            "[0] track 1 ch 0 program 0 \"Lead\" - 2 notes, ends 2.00s, mean length 1.00s"
        );
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.json");
        assert!(train(dir.path(), &model, 4, 0.2, false).is_err());
        assert!(!model.exists());
    }
}
