use serde::{Deserialize, Serialize};

/// Microseconds per quarter note at 120 BPM.
pub const DEFAULT_TEMPO: u32 = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoChange {
    pub tick: u64,
    pub microseconds_per_beat: u32,
}

impl TempoChange {
    pub fn bpm(&self) -> f64 {
        60_000_000.0 / self.microseconds_per_beat as f64
    }

    fn seconds_per_tick(&self, ppq: u16) -> f64 {
        self.microseconds_per_beat as f64 / 1_000_000.0 / ppq.max(1) as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub tick: u64,
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    pub fn common_time(tick: u64) -> Self {
        Self {
            tick,
            numerator: 4,
            denominator: 4,
        }
    }
}

/// Piecewise-constant tempo map converting between ticks and seconds.
///
/// Always holds an entry at tick 0 (120 BPM when the file sets none).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoMap {
    ppq: u16,
    changes: Vec<TempoChange>,
}

impl TempoMap {
    pub fn new(ppq: u16, mut changes: Vec<TempoChange>) -> Self {
        changes.sort_by_key(|c| c.tick);

        // Several tracks may repeat a tempo at one tick; the last one read wins.
        let mut merged: Vec<TempoChange> = Vec::with_capacity(changes.len() + 1);
        for mut change in changes {
            // A zero tempo would stop time; treat it as the fastest one.
            change.microseconds_per_beat = change.microseconds_per_beat.max(1);
            match merged.last_mut() {
                Some(last) if last.tick == change.tick => *last = change,
                _ => merged.push(change),
            }
        }

        if merged.first().map_or(true, |c| c.tick != 0) {
            merged.insert(
                0,
                TempoChange {
                    tick: 0,
                    microseconds_per_beat: DEFAULT_TEMPO,
                },
            );
        }

        Self {
            ppq,
            changes: merged,
        }
    }

    pub fn constant(ppq: u16, microseconds_per_beat: u32) -> Self {
        Self::new(
            ppq,
            vec![TempoChange {
                tick: 0,
                microseconds_per_beat,
            }],
        )
    }

    pub fn ppq(&self) -> u16 {
        self.ppq
    }

    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    pub fn tick_to_seconds(&self, tick: u64) -> f64 {
        let mut elapsed = 0.0;
        for (i, change) in self.changes.iter().enumerate() {
            let spt = change.seconds_per_tick(self.ppq);
            match self.changes.get(i + 1) {
                Some(next) if tick > next.tick => {
                    elapsed += (next.tick - change.tick) as f64 * spt;
                }
                _ => return elapsed + (tick - change.tick) as f64 * spt,
            }
        }
        elapsed
    }

    pub fn seconds_to_tick(&self, seconds: f64) -> u64 {
        let seconds = seconds.max(0.0);
        let mut elapsed = 0.0;
        for (i, change) in self.changes.iter().enumerate() {
            let spt = change.seconds_per_tick(self.ppq);
            if let Some(next) = self.changes.get(i + 1) {
                let segment = (next.tick - change.tick) as f64 * spt;
                if seconds >= elapsed + segment {
                    elapsed += segment;
                    continue;
                }
            }
            // Float to int casts saturate; NaN becomes 0.
            let ticks = ((seconds - elapsed) / spt).round() as u64;
            return change.tick.saturating_add(ticks);
        }
        0
    }
}
