//! Chord timeline synthesis.
//!
//! Predicted label vectors are placed onto time slots taken from the
//! source file's harmony track when it has one, or from its downbeats
//! otherwise, then rendered next to the original melody.

use std::collections::{BTreeSet, HashSet};

use midi_tracks::{
    tracks_to_midi, InstrumentTrack, MidiFile, NoteEvent, TempoMap, TimeSignature, TrackSelection,
    TrackSpec,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pitch::pitch_name;
use crate::types::LabelVector;
use crate::{Error, Result};

/// Highest valid MIDI pitch.
const MAX_PITCH: u16 = 127;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Added to every predicted value to form the output pitch.
    pub pitch_offset: u8,
    pub velocity: u8,
    /// GM program for the chord track.
    pub program: u8,
    /// Slot length when slots come from downbeats.
    pub fallback_slot_seconds: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            pitch_offset: 24,
            velocity: 75,
            program: 0,
            fallback_slot_seconds: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChordSlot {
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingSource {
    HarmonyTrack,
    DownbeatGrid,
}

impl std::fmt::Display for TimingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimingSource::HarmonyTrack => f.write_str("harmony track onsets"),
            TimingSource::DownbeatGrid => f.write_str("downbeat grid"),
        }
    }
}

/// One slot per distinct onset, in order of first occurrence.
///
/// Each slot ends where the first note with that onset ends.
pub fn harmony_slots(notes: &[NoteEvent]) -> Vec<ChordSlot> {
    let mut seen = HashSet::new();
    notes
        .iter()
        .filter(|n| seen.insert(n.start.to_bits()))
        .map(|n| ChordSlot {
            start: n.start,
            end: n.end,
        })
        .collect()
}

/// Fixed-length slots starting at each distinct downbeat.
pub fn downbeat_slots(downbeats: &[f64], slot_seconds: f64) -> Vec<ChordSlot> {
    let mut seen = HashSet::new();
    downbeats
        .iter()
        .filter(|beat| seen.insert(beat.to_bits()))
        .map(|&beat| ChordSlot {
            start: beat,
            end: beat + slot_seconds,
        })
        .collect()
}

/// Pick the slot grid for a file: harmony onsets first, downbeats otherwise.
pub fn select_slots(
    file: &MidiFile,
    selection: &TrackSelection,
    options: &RenderOptions,
) -> (TimingSource, Vec<ChordSlot>) {
    match selection.harmony.and_then(|index| file.instrument(index)) {
        Some(harmony) => (TimingSource::HarmonyTrack, harmony_slots(&harmony.notes)),
        None => (
            TimingSource::DownbeatGrid,
            downbeat_slots(&file.downbeats(), options.fallback_slot_seconds),
        ),
    }
}

/// Absolute pitches for one predicted chord: offset, deduplicated, sorted.
///
/// Results at or below the offset are padding and results above 127 are not
/// playable; both are dropped.
pub fn reconstruct_pitches(chord: &LabelVector, pitch_offset: u8) -> Vec<u8> {
    let offset = pitch_offset as u16;
    chord
        .as_slice()
        .iter()
        .map(|&v| v as u16 + offset)
        .filter(|&p| p > offset && p <= MAX_PITCH)
        .map(|p| p as u8)
        .collect::<BTreeSet<u8>>()
        .into_iter()
        .collect()
}

/// Up to three distinct note names for a predicted chord, in label order.
pub fn chord_names(chord: &LabelVector, pitch_offset: u8) -> Vec<String> {
    let valid = reconstruct_pitches(chord, pitch_offset);
    let mut names: Vec<String> = Vec::new();

    for &v in chord.as_slice() {
        let pitch = v as u16 + pitch_offset as u16;
        if pitch > MAX_PITCH || !valid.contains(&(pitch as u8)) {
            continue;
        }
        let name = pitch_name(pitch as u8);
        if !names.contains(&name) {
            names.push(name);
        }
        if names.len() == 3 {
            break;
        }
    }

    names
}

/// Chord `i` goes to slot `i`; chords without a slot are dropped.
pub fn place_chords(
    chords: &[LabelVector],
    slots: &[ChordSlot],
    options: &RenderOptions,
) -> Vec<NoteEvent> {
    chords
        .iter()
        .zip(slots)
        .flat_map(|(chord, slot)| {
            reconstruct_pitches(chord, options.pitch_offset)
                .into_iter()
                .map(move |pitch| NoteEvent::new(pitch, slot.start, slot.end, options.velocity))
        })
        .collect()
}

/// Melody plus synthesized chords, ready to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChordTimeline {
    pub timing: TimingSource,
    pub slots: Vec<ChordSlot>,
    /// Chord slots that received a prediction.
    pub placed: usize,
    pub melody: InstrumentTrack,
    pub chord_notes: Vec<NoteEvent>,
    pub program: u8,
    tempo_map: TempoMap,
    time_signatures: Vec<TimeSignature>,
}

impl ChordTimeline {
    /// Format 1 MIDI: tempo track, original melody, then the chord track.
    pub fn to_midi_bytes(&self) -> Vec<u8> {
        let melody = TrackSpec {
            name: self
                .melody
                .name
                .clone()
                .unwrap_or_else(|| "Melody".to_string()),
            program: self.melody.program,
            is_drum: self.melody.is_drum,
            notes: self.melody.notes.clone(),
        };
        let chords = TrackSpec {
            name: "Chords".to_string(),
            program: self.program,
            is_drum: false,
            notes: self.chord_notes.clone(),
        };

        tracks_to_midi(&[melody, chords], &self.tempo_map, &self.time_signatures)
    }
}

/// Place predicted chords onto the source file's timeline.
pub fn synthesize(
    file: &MidiFile,
    selection: &TrackSelection,
    predicted: &[LabelVector],
    options: &RenderOptions,
) -> Result<ChordTimeline> {
    let melody = file
        .instrument(selection.melody)
        .ok_or_else(|| Error::MissingTrack(format!("instrument {}", selection.melody)))?
        .clone();

    let (timing, slots) = select_slots(file, selection, options);
    let chord_notes = place_chords(predicted, &slots, options);
    let placed = predicted.len().min(slots.len());

    debug!(
        timing = %timing,
        slots = slots.len(),
        predicted = predicted.len(),
        placed,
        notes = chord_notes.len(),
        "synthesized chord timeline"
    );

    Ok(ChordTimeline {
        timing,
        slots,
        placed,
        melody,
        chord_notes,
        program: options.program,
        tempo_map: file.tempo_map.clone(),
        time_signatures: file.time_signatures.clone(),
    })
}
