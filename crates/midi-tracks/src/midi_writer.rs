use crate::note::{NoteEvent, DRUM_CHANNEL};
use crate::tempo::{TempoMap, TimeSignature};
use serde::{Deserialize, Serialize};

/// One output track: a named instrument and the notes it plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSpec {
    pub name: String,
    pub program: u8,
    /// Render on the percussion channel instead of an allocated one.
    pub is_drum: bool,
    pub notes: Vec<NoteEvent>,
}

/// Write tracks to Standard MIDI File format 1 bytes.
///
/// Track 0 carries the tempo map and time signatures; every `TrackSpec`
/// follows as its own track with a name, a program change and its notes.
/// Note times in seconds are mapped back to ticks through `tempo_map`.
pub fn tracks_to_midi(
    tracks: &[TrackSpec],
    tempo_map: &TempoMap,
    time_signatures: &[TimeSignature],
) -> Vec<u8> {
    let mut melodic = (0u8..16).filter(|&ch| ch != DRUM_CHANNEL);
    let mut last_melodic = 0u8;

    let mut file = smf_header(tempo_map.ppq(), tracks.len() + 1);
    push_chunk(&mut file, b"MTrk", &encode_track(tempo_events(tempo_map, time_signatures)));

    for spec in tracks {
        let channel = if spec.is_drum {
            DRUM_CHANNEL
        } else {
            // Past 15 melodic tracks share the last channel
            last_melodic = melodic.next().unwrap_or(last_melodic);
            last_melodic
        };
        push_chunk(&mut file, b"MTrk", &encode_track(note_events(spec, channel, tempo_map)));
    }

    file
}

/// An event at an absolute tick. `rank` orders events sharing a tick.
struct RawEvent {
    tick: u64,
    rank: u8,
    bytes: Vec<u8>,
}

impl RawEvent {
    fn meta(tick: u64, kind: u8, payload: &[u8]) -> Self {
        let mut bytes = vec![0xFF, kind];
        write_vlq(&mut bytes, payload.len() as u32);
        bytes.extend_from_slice(payload);
        Self { tick, rank: 0, bytes }
    }
}

fn tempo_events(tempo_map: &TempoMap, time_signatures: &[TimeSignature]) -> Vec<RawEvent> {
    let tempos = tempo_map.changes().iter().map(|change| {
        let [_, hi, mid, lo] = change.microseconds_per_beat.to_be_bytes();
        RawEvent::meta(change.tick, 0x51, &[hi, mid, lo])
    });

    let signatures = time_signatures.iter().map(|ts| {
        let denominator_power = ts.denominator.max(1).trailing_zeros() as u8;
        // 24 clocks per click, 8 thirty-seconds per quarter
        RawEvent::meta(ts.tick, 0x58, &[ts.numerator, denominator_power, 24, 8])
    });

    tempos.chain(signatures).collect()
}

fn note_events(spec: &TrackSpec, channel: u8, tempo_map: &TempoMap) -> Vec<RawEvent> {
    let status = |kind: u8| kind | (channel & 0x0F);
    let mut events = vec![RawEvent::meta(0, 0x03, spec.name.as_bytes())];

    if !spec.is_drum {
        events.push(RawEvent {
            tick: 0,
            rank: 0,
            bytes: vec![status(0xC0), spec.program & 0x7F],
        });
    }

    for note in &spec.notes {
        let on = tempo_map.seconds_to_tick(note.start);
        let off = tempo_map.seconds_to_tick(note.end).max(on);
        let key = note.pitch & 0x7F;

        events.push(RawEvent {
            tick: on,
            rank: 2,
            bytes: vec![status(0x90), key, note.velocity.clamp(1, 127)],
        });
        // Offs rank ahead of ons so back-to-back notes don't cut each other
        events.push(RawEvent {
            tick: off,
            rank: 1,
            bytes: vec![status(0x80), key, 0],
        });
    }

    events
}

/// Delta-encode events in time order and append end-of-track.
fn encode_track(mut events: Vec<RawEvent>) -> Vec<u8> {
    events.sort_by_key(|e| (e.tick, e.rank));

    let mut data = Vec::new();
    let mut previous = 0u64;
    for event in events {
        let delta = (event.tick - previous).min(0x0FFF_FFFF);
        write_vlq(&mut data, delta as u32);
        data.extend_from_slice(&event.bytes);
        previous = event.tick;
    }

    data.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
    data
}

fn smf_header(ppq: u16, track_count: usize) -> Vec<u8> {
    let mut header = Vec::with_capacity(6);
    header.extend_from_slice(&1u16.to_be_bytes());
    header.extend_from_slice(&(track_count as u16).to_be_bytes());
    header.extend_from_slice(&ppq.to_be_bytes());

    let mut file = Vec::new();
    push_chunk(&mut file, b"MThd", &header);
    file
}

fn push_chunk(out: &mut Vec<u8>, tag: &[u8; 4], body: &[u8]) {
    out.extend_from_slice(tag);
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
}

/// Append `value` as a MIDI variable-length quantity (at most 28 bits).
fn write_vlq(out: &mut Vec<u8>, value: u32) {
    let value = value & 0x0FFF_FFFF;
    let mut groups = [0u8; 4];
    let mut len = 0;
    let mut rest = value;
    loop {
        groups[len] = (rest & 0x7F) as u8;
        len += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }

    for i in (0..len).rev() {
        let continuation = if i > 0 { 0x80 } else { 0x00 };
        out.push(groups[i] | continuation);
    }
}
