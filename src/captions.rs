//! Human-readable count, duration and size captions.
//!
//! Every countable noun has three message forms: one for zero, one for exactly one, and one for
//! everything else with a `%1` placeholder for the number. Selection is by exact count, so a
//! translation table can phrase "No song." and "1 song." however the language wants.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Noun {
    Song,
    Result,
    Minute,
    Hour,
    /// Hour form used when a minute part follows, e.g. "1 hour and ".
    HourAnd,
    /// Song form used as the prefix of a playlist summary, e.g. "3 songs, ".
    SongSummary,
    BrokenPlaylist,
}

impl Noun {
    pub fn from_config_key(key: &str) -> Option<Noun> {
        Some(match key {
            "song" => Noun::Song,
            "result" => Noun::Result,
            "minute" => Noun::Minute,
            "hour" => Noun::Hour,
            "hour_and" => Noun::HourAnd,
            "song_summary" => Noun::SongSummary,
            "broken_playlist" => Noun::BrokenPlaylist,
            _ => return None,
        })
    }
}

const SIZE_UNITS: [&str; 4] = ["Byte", "KB", "MB", "GB"];

fn default_forms(noun: Noun) -> [&'static str; 3] {
    match noun {
        Noun::Song => ["No song.", "1 song.", "%1 songs."],
        Noun::Result => ["No result.", "1 result.", "%1 results."],
        Noun::Minute => ["0 minute.", "1 minute.", "%1 minutes."],
        Noun::Hour => ["0 hour.", "1 hour.", "%1 hours."],
        Noun::HourAnd => ["", "1 hour and ", "%1 hours and "],
        Noun::SongSummary => ["No song.", "1 song, ", "%1 songs, "],
        Noun::BrokenPlaylist => ["", "1 playlist cannot be loaded.", "%1 playlists cannot be loaded."],
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptionTable {
    overrides: HashMap<Noun, [String; 3]>,
}

impl CaptionTable {
    pub fn with_overrides(overrides: HashMap<Noun, [String; 3]>) -> CaptionTable {
        CaptionTable { overrides }
    }

    fn form(&self, noun: Noun, index: usize) -> &str {
        match self.overrides.get(&noun) {
            Some(forms) => &forms[index],
            None => default_forms(noun)[index],
        }
    }

    /// Render the caption for `count` items of `noun`.
    pub fn count(&self, noun: Noun, count: u64) -> String {
        match count {
            0 => self.form(noun, 0).to_string(),
            1 => self.form(noun, 1).to_string(),
            n => self.form(noun, 2).replace("%1", &n.to_string()),
        }
    }

    /// Render a duration in whole minutes and hours. Seconds are truncated.
    pub fn duration(&self, seconds: u64) -> String {
        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;
        match (hours, minutes) {
            (0, m) => self.count(Noun::Minute, m),
            (h, 0) => self.count(Noun::Hour, h),
            (h, m) => format!("{}{}", self.count(Noun::HourAnd, h), self.count(Noun::Minute, m)),
        }
    }

    /// Render a byte count with the largest base-1024 unit that keeps the number at least one.
    pub fn size(&self, bytes: u64) -> String {
        if bytes < 1024 {
            return format!("{bytes} {}", SIZE_UNITS[0]);
        }
        let mut value = bytes as f64;
        let mut unit = 0;
        while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        }
        format!("{value:.2} {}", SIZE_UNITS[unit])
    }

    /// "3 songs, 1 hour and 1 minute." style caption for a playlist; just "No song." when empty.
    pub fn playlist_summary(&self, songs: u64, seconds: u64) -> String {
        if songs == 0 {
            return self.count(Noun::SongSummary, 0);
        }
        format!("{}{}", self.count(Noun::SongSummary, songs), self.duration(seconds))
    }
}
