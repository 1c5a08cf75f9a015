//! Word cues the demo pairs with signs.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lyric {
    /// Offset from the start of the song
    pub at: Duration,
    pub text: &'static str,
    /// Name of the sign to perform for this word
    pub sign: &'static str,
}

impl Lyric {
    const fn new(seconds: u64, text: &'static str, sign: &'static str) -> Self {
        Self {
            at: Duration::from_secs(seconds),
            text,
            sign,
        }
    }

    /// The last cue that has started by `elapsed`
    ///
    /// Cues must be sorted by start time.
    pub fn active(cues: &[Lyric], elapsed: Duration) -> Option<&Lyric> {
        let started = cues.partition_point(|cue| cue.at <= elapsed);
        started.checked_sub(1).map(|index| &cues[index])
    }
}

pub static DEMO_SONG: [Lyric; 4] = [
    Lyric::new(0, "hello", "hello"),
    Lyric::new(5, "world", "world"),
    Lyric::new(10, "learn", "learn"),
    Lyric::new(15, "asl", "asl"),
];
