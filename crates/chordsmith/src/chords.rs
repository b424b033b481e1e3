use midi_tracks::NoteEvent;

use crate::types::ChordEvent;

/// Group harmony notes into chords by identical onset time.
///
/// Notes are scanned in the order given; a new chord starts whenever a
/// note's start differs from the open chord's start, so the input must
/// already be in onset order.
pub fn group_chords(notes: &[NoteEvent]) -> Vec<ChordEvent> {
    let mut chords = Vec::new();
    let mut current: Option<ChordEvent> = None;

    for note in notes {
        match current.as_mut() {
            Some(chord) if chord.start == note.start => chord.pitches.push(note.pitch),
            _ => {
                chords.extend(current.take());
                current = Some(ChordEvent {
                    start: note.start,
                    end: note.end,
                    pitches: vec![note.pitch],
                });
            }
        }
    }

    chords.extend(current);
    chords
}
