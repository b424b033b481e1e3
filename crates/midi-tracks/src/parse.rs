use crate::note::{select_tracks, InstrumentTrack, NoteEvent, TrackSelection, DRUM_CHANNEL};
use crate::tempo::{TempoChange, TempoMap, TimeSignature};
use midly::{MetaMessage, MidiMessage, Smf, TrackEventKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// A parsed MIDI file: timing context plus its note-bearing instruments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidiFile {
    pub tempo_map: TempoMap,
    pub time_signatures: Vec<TimeSignature>,
    pub instruments: Vec<InstrumentTrack>,
    /// Tick of the last note-off.
    pub end_tick: u64,
}

/// A note paired from on/off events, still in ticks.
struct TickNote {
    onset: u64,
    offset: u64,
    pitch: u8,
    velocity: u8,
}

/// Notes and metadata accumulated for one (track, channel) pair.
#[derive(Default)]
struct ChannelNotes {
    program: Option<u8>,
    notes: Vec<TickNote>,
}

impl MidiFile {
    pub fn open(path: &Path) -> crate::Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| crate::Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&bytes)
    }

    pub fn parse(midi_bytes: &[u8]) -> crate::Result<Self> {
        let smf = Smf::parse(midi_bytes).map_err(|e| crate::Error::MidiParse(e.to_string()))?;
        Ok(Self::from_smf(&smf))
    }

    pub fn from_smf(smf: &Smf) -> Self {
        let ppq = match smf.header.timing {
            midly::Timing::Metrical(ticks) => ticks.as_int(),
            midly::Timing::Timecode(_, _) => 480,
        };

        let mut tempo_changes = Vec::new();
        let mut time_signatures = Vec::new();
        let mut end_tick: u64 = 0;
        let mut raw_instruments: Vec<(usize, u8, Option<String>, ChannelNotes)> = Vec::new();

        for (track_index, track) in smf.tracks.iter().enumerate() {
            let mut current_tick: u64 = 0;
            let mut name = None;
            // Channels in the order their first note appears
            let mut channel_order: Vec<u8> = Vec::new();
            let mut channels: HashMap<u8, ChannelNotes> = HashMap::new();
            let mut programs: HashMap<u8, u8> = HashMap::new();
            // (channel, pitch) -> open (onset_tick, velocity) pairs
            let mut pending: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();

            for event in track {
                current_tick += event.delta.as_int() as u64;

                match event.kind {
                    TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                        tempo_changes.push(TempoChange {
                            tick: current_tick,
                            microseconds_per_beat: tempo.as_int(),
                        });
                    }
                    TrackEventKind::Meta(MetaMessage::TimeSignature(num, denom_pow, _, _)) => {
                        time_signatures.push(TimeSignature {
                            tick: current_tick,
                            numerator: num.max(1),
                            denominator: 1u8.checked_shl(denom_pow as u32).unwrap_or(4),
                        });
                    }
                    TrackEventKind::Meta(MetaMessage::TrackName(bytes)) => {
                        name = String::from_utf8(bytes.to_vec()).ok();
                    }
                    TrackEventKind::Midi { channel, message } => {
                        let ch = channel.as_int();
                        match message {
                            MidiMessage::ProgramChange { program } => {
                                programs.insert(ch, program.as_int());
                            }
                            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                                if !channel_order.contains(&ch) {
                                    channel_order.push(ch);
                                    channels.entry(ch).or_default().program =
                                        programs.get(&ch).copied();
                                }
                                pending
                                    .entry((ch, key.as_int()))
                                    .or_default()
                                    .push((current_tick, vel.as_int()));
                            }
                            MidiMessage::NoteOff { key, .. } | MidiMessage::NoteOn { key, .. } => {
                                // vel=0 NoteOn is NoteOff. Closes every open note of
                                // the key that began before this tick. Notes begun on
                                // this tick stay open, unless nothing else was open, in
                                // which case they are zero-length and dropped.
                                let key = (ch, key.as_int());
                                let Some(open) = pending.get_mut(&key) else {
                                    continue;
                                };
                                let (closing, starting_now): (Vec<_>, Vec<_>) = std::mem::take(open)
                                    .into_iter()
                                    .partition(|(onset, _)| *onset != current_tick);
                                if !closing.is_empty() {
                                    *open = starting_now;
                                }
                                let notes = &mut channels.entry(ch).or_default().notes;
                                for (onset, velocity) in closing {
                                    notes.push(TickNote {
                                        onset,
                                        offset: current_tick,
                                        pitch: key.1,
                                        velocity,
                                    });
                                }
                            }
                            _ => {}
                        }
                    }
                    _ => {}
                }
            }

            // Close any unclosed notes at the track's final tick
            for ((ch, pitch), stack) in pending {
                for (onset, velocity) in stack {
                    channels.entry(ch).or_default().notes.push(TickNote {
                        onset,
                        offset: current_tick,
                        pitch,
                        velocity,
                    });
                }
            }

            for ch in channel_order {
                if let Some(notes) = channels.remove(&ch) {
                    if let Some(last) = notes.notes.iter().map(|n| n.offset).max() {
                        end_tick = end_tick.max(last);
                    }
                    raw_instruments.push((track_index, ch, name.clone(), notes));
                }
            }
        }

        let tempo_map = TempoMap::new(ppq, tempo_changes);

        time_signatures.sort_by_key(|t| t.tick);
        time_signatures.dedup_by(|a, b| a.tick == b.tick);

        let instruments: Vec<InstrumentTrack> = raw_instruments
            .into_iter()
            .filter(|(_, _, _, notes)| !notes.notes.is_empty())
            .enumerate()
            .map(|(index, (source_track, channel, name, mut channel_notes))| {
                channel_notes
                    .notes
                    .sort_by(|a, b| a.onset.cmp(&b.onset).then(a.pitch.cmp(&b.pitch)));

                let notes = channel_notes
                    .notes
                    .iter()
                    .map(|n| NoteEvent {
                        pitch: n.pitch,
                        start: tempo_map.tick_to_seconds(n.onset),
                        end: tempo_map.tick_to_seconds(n.offset),
                        velocity: n.velocity,
                    })
                    .collect();

                InstrumentTrack {
                    index,
                    source_track,
                    channel,
                    program: channel_notes.program.unwrap_or(0),
                    name,
                    is_drum: channel == DRUM_CHANNEL,
                    notes,
                }
            })
            .collect();

        debug!(
            ppq,
            instruments = instruments.len(),
            tempo_changes = tempo_map.changes().len(),
            "parsed MIDI file"
        );

        Self {
            tempo_map,
            time_signatures,
            instruments,
            end_tick,
        }
    }

    pub fn ppq(&self) -> u16 {
        self.tempo_map.ppq()
    }

    /// Seconds at which the last note ends.
    pub fn end_time(&self) -> f64 {
        self.tempo_map.tick_to_seconds(self.end_tick)
    }

    pub fn select_tracks(&self) -> crate::Result<TrackSelection> {
        select_tracks(&self.instruments)
    }

    pub fn instrument(&self, index: usize) -> Option<&InstrumentTrack> {
        self.instruments.get(index)
    }

    /// Measure start times in seconds, strictly before the end of the last note.
    ///
    /// Bars restart at every time signature change; 4/4 applies until the
    /// first one.
    pub fn downbeats(&self) -> Vec<f64> {
        downbeat_ticks(self.ppq(), &self.time_signatures, self.end_tick)
            .into_iter()
            .map(|tick| self.tempo_map.tick_to_seconds(tick))
            .collect()
    }
}

fn downbeat_ticks(ppq: u16, time_signatures: &[TimeSignature], end_tick: u64) -> Vec<u64> {
    let mut signatures: Vec<TimeSignature> = time_signatures.to_vec();
    if signatures.first().map_or(true, |ts| ts.tick != 0) {
        signatures.insert(0, TimeSignature::common_time(0));
    }

    let mut ticks = Vec::new();
    for (i, ts) in signatures.iter().enumerate() {
        let segment_end = signatures
            .get(i + 1)
            .map(|next| next.tick)
            .unwrap_or(end_tick)
            .min(end_tick);

        let beat_ticks = (ppq as u64 * 4) / ts.denominator.max(1) as u64;
        let bar_ticks = (beat_ticks * ts.numerator as u64).max(1);

        let mut tick = ts.tick;
        while tick < segment_end {
            ticks.push(tick);
            tick += bar_ticks;
        }
    }

    ticks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn push_track(buf: &mut Vec<u8>, track: &[u8]) {
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track.len() as u32).to_be_bytes());
        buf.extend_from_slice(track);
    }

    fn header(buf: &mut Vec<u8>, format: u16, tracks: u16, ppq: u16) {
        buf.extend_from_slice(b"MThd");
        buf.extend_from_slice(&6u32.to_be_bytes());
        buf.extend_from_slice(&format.to_be_bytes());
        buf.extend_from_slice(&tracks.to_be_bytes());
        buf.extend_from_slice(&ppq.to_be_bytes());
    }

    /// Format 1: tempo track, melody (C4 E4 G4), chord track (C+E then G).
    fn make_melody_and_chords() -> Vec<u8> {
        let mut buf = Vec::new();
        header(&mut buf, 1, 3, 480);

        let mut track0 = Vec::new();
        // 120 BPM
        track0.extend_from_slice(&[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);
        // 4/4
        track0.extend_from_slice(&[0x00, 0xFF, 0x58, 0x04, 0x04, 0x02, 0x18, 0x08]);
        track0.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        push_track(&mut buf, &track0);

        let mut track1 = Vec::new();
        track1.extend_from_slice(&[0x00, 0xFF, 0x03, 0x06]);
        track1.extend_from_slice(b"Melody");
        for pitch in [60u8, 64, 67] {
            track1.extend_from_slice(&[0x00, 0x90, pitch, 100]);
            track1.extend_from_slice(&[0x83, 0x60, 0x80, pitch, 0]);
        }
        track1.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        push_track(&mut buf, &track1);

        let mut track2 = Vec::new();
        track2.extend_from_slice(&[0x00, 0xC1, 24]);
        track2.extend_from_slice(&[0x00, 0x91, 48, 80]);
        track2.extend_from_slice(&[0x00, 0x91, 52, 80]);
        // vel=0 NoteOn closes
        track2.extend_from_slice(&[0x87, 0x40, 0x91, 48, 0]);
        track2.extend_from_slice(&[0x00, 0x81, 52, 0]);
        track2.extend_from_slice(&[0x00, 0x91, 55, 80]);
        track2.extend_from_slice(&[0x83, 0x60, 0x81, 55, 0]);
        track2.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        push_track(&mut buf, &track2);

        buf
    }

    #[test]
    fn tempo_track_is_not_an_instrument() {
        let file = MidiFile::parse(&make_melody_and_chords()).unwrap();
        assert_eq!(file.instruments.len(), 2);
        assert_eq!(file.instruments[0].source_track, 1);
        assert_eq!(file.instruments[0].name.as_deref(), Some("Melody"));
        assert_eq!(file.instruments[1].program, 24);
    }

    #[test]
    fn notes_are_in_seconds() {
        let file = MidiFile::parse(&make_melody_and_chords()).unwrap();
        let melody = &file.instruments[0];
        let pitches: Vec<u8> = melody.notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![60, 64, 67]);
        assert!((melody.notes[1].start - 0.5).abs() < 1e-9);
        assert!((melody.notes[2].end - 1.5).abs() < 1e-9);
    }

    #[test]
    fn chord_notes_share_onset() {
        let file = MidiFile::parse(&make_melody_and_chords()).unwrap();
        let chords = &file.instruments[1];
        assert_eq!(chords.notes.len(), 3);
        assert_eq!(chords.notes[0].start, chords.notes[1].start);
        assert!((chords.notes[2].start - 1.0).abs() < 1e-9);
        assert!((file.end_time() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn selection_uses_melody_then_harmony() {
        let file = MidiFile::parse(&make_melody_and_chords()).unwrap();
        let selection = file.select_tracks().unwrap();
        assert_eq!(selection.melody, 0);
        assert_eq!(selection.harmony, Some(1));
    }

    #[test]
    fn format0_channels_split_into_instruments() {
        let mut buf = Vec::new();
        header(&mut buf, 0, 1, 480);
        let mut track = Vec::new();
        track.extend_from_slice(&[0x00, 0x99, 36, 100]); // kick on drum channel
        track.extend_from_slice(&[0x00, 0x90, 72, 100]);
        track.extend_from_slice(&[0x83, 0x60, 0x89, 36, 0]);
        track.extend_from_slice(&[0x00, 0x80, 72, 0]);
        track.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        push_track(&mut buf, &track);

        let file = MidiFile::parse(&buf).unwrap();
        assert_eq!(file.instruments.len(), 2);
        assert!(file.instruments[0].is_drum);
        assert!(!file.instruments[1].is_drum);

        let selection = file.select_tracks().unwrap();
        assert_eq!(selection.melody, 1);
        assert_eq!(selection.harmony, None);
    }

    #[test]
    fn unclosed_note_ends_at_track_end() {
        let mut buf = Vec::new();
        header(&mut buf, 0, 1, 480);
        let mut track = Vec::new();
        track.extend_from_slice(&[0x00, 0x90, 60, 100]);
        track.extend_from_slice(&[0x83, 0x60, 0xFF, 0x2F, 0x00]);
        push_track(&mut buf, &track);

        let file = MidiFile::parse(&buf).unwrap();
        assert!((file.instruments[0].notes[0].end - 0.5).abs() < 1e-9);
    }

    #[test]
    fn note_off_closes_every_earlier_retrigger() {
        // C4 struck at 0 and again at 240, one note-off at 480
        let mut buf = Vec::new();
        header(&mut buf, 0, 1, 480);
        let mut track = Vec::new();
        track.extend_from_slice(&[0x00, 0x90, 60, 100]);
        track.extend_from_slice(&[0x81, 0x70, 0x90, 60, 90]);
        track.extend_from_slice(&[0x81, 0x70, 0x80, 60, 0]);
        track.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        push_track(&mut buf, &track);

        let file = MidiFile::parse(&buf).unwrap();
        let notes = &file.instruments[0].notes;
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|n| (n.end - 0.5).abs() < 1e-9));
        assert!((notes[1].start - 0.25).abs() < 1e-9);
    }

    #[test]
    fn note_on_at_off_tick_stays_open() {
        // Off and retrigger land on tick 480; the second note runs to 960
        let mut buf = Vec::new();
        header(&mut buf, 0, 1, 480);
        let mut track = Vec::new();
        track.extend_from_slice(&[0x00, 0x90, 60, 100]);
        track.extend_from_slice(&[0x83, 0x60, 0x90, 60, 100]);
        track.extend_from_slice(&[0x00, 0x80, 60, 0]);
        track.extend_from_slice(&[0x83, 0x60, 0x80, 60, 0]);
        track.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        push_track(&mut buf, &track);

        let file = MidiFile::parse(&buf).unwrap();
        let notes = &file.instruments[0].notes;
        assert_eq!(notes.len(), 2);
        assert!((notes[0].end - 0.5).abs() < 1e-9);
        assert!((notes[1].start - 0.5).abs() < 1e-9);
        assert!((notes[1].end - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_length_note_is_dropped() {
        let mut buf = Vec::new();
        header(&mut buf, 0, 1, 480);
        let mut track = Vec::new();
        track.extend_from_slice(&[0x00, 0x90, 60, 100]);
        track.extend_from_slice(&[0x00, 0x80, 60, 0]);
        track.extend_from_slice(&[0x00, 0x90, 62, 100]);
        track.extend_from_slice(&[0x83, 0x60, 0x80, 62, 0]);
        track.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        push_track(&mut buf, &track);

        let file = MidiFile::parse(&buf).unwrap();
        let pitches: Vec<u8> = file.instruments[0].notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![62]);
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(matches!(
            MidiFile::parse(b"not a midi file"),
            Err(crate::Error::MidiParse(_))
        ));
    }

    #[test]
    fn downbeats_in_common_time() {
        // 480 ppq, 4/4: one bar = 1920 ticks
        assert_eq!(downbeat_ticks(480, &[], 5000), vec![0, 1920, 3840]);
    }

    #[test]
    fn downbeats_follow_signature_changes() {
        let signatures = vec![
            TimeSignature::common_time(0),
            TimeSignature {
                tick: 1920,
                numerator: 3,
                denominator: 4,
            },
        ];
        assert_eq!(
            downbeat_ticks(480, &signatures, 4800),
            vec![0, 1920, 3360]
        );
    }

    #[test]
    fn downbeats_use_denominator_beat_unit() {
        let signatures = vec![TimeSignature {
            tick: 0,
            numerator: 6,
            denominator: 8,
        }];
        // 6/8 at 480 ppq: 6 eighths = 1440 ticks
        assert_eq!(downbeat_ticks(480, &signatures, 3000), vec![0, 1440, 2880]);
    }

    #[test]
    fn downbeats_in_seconds() {
        let file = MidiFile::parse(&make_melody_and_chords()).unwrap();
        // 1.5 s of music at 120 BPM is shorter than one bar
        assert_eq!(file.downbeats(), vec![0.0]);
    }

    #[test]
    fn empty_file_has_no_downbeats() {
        assert!(downbeat_ticks(480, &[], 0).is_empty());
    }
}
