//! The song record: one canonical record per indexed audio file. Records arrive complete from the
//! metadata extractor; this module only validates them and derives the fallback values used as
//! grouping keys.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{normalize_path, or_fallback, NO_ALBUM, NO_ARTIST, NO_GENRE};
use crate::error::{MuExpectedError, Result};
use crate::genres::resolve_genre;

const SUFFIX_KINDS: &[(&str, &str)] = &[
    ("mp3", "MPEG Audio Layer III (mp3)"),
    ("m4a", "MPEG-4 Part 14 (m4a)"),
    ("wav", "Waveform Audio File Format (wav)"),
    ("flac", "Free Lossless Audio Codec (flac)"),
    ("ape", "Monkey's Audio (ape)"),
    ("ogg", "Ogg Vorbis Audio (ogg)"),
    ("tta", "True Audio Codec (tta)"),
    ("aiff", "Audio Interchange File Format (aiff)"),
    ("aifc", "Audio Interchange File Format (aifc)"),
    ("aif", "Audio Interchange File Format (aif)"),
    ("caf", "Core Audio Format (caf)"),
    ("dsd", "Direct Stream Digital (dsd)"),
    ("mp4", "MPEG-4 Part 14 (mp4)"),
    ("mpa", "MPEG Audio Layer II (mpa)"),
    ("mp2", "MPEG Audio Layer II (mp2)"),
    ("mp1", "MPEG Audio Layer I (mp1)"),
    ("midi", "Musical Instrument Digital Interface (midi)"),
    ("mid", "Musical Instrument Digital Interface (mid)"),
    ("mp3pro", "MPEG Audio Layer III with SBR (mp3pro)"),
    ("mpc", "Musepack Lossy Audio Codec (mpc)"),
    ("aac", "Advanced Audio Coding (aac)"),
    ("wma", "Windows Media Audio (wma)"),
    ("fla", "Flash Audio (fla)"),
    ("tak", "Tom's lossless Audio Kompressor (tak)"),
    ("ofr", "OptimFROG (ofr)"),
    ("spx", "Speex Audio Codec (spx)"),
    ("mp+", "Musepack Lossy Audio Codec (mp+)"),
    ("aa", "Audible Audio File (aa)"),
    ("ra", "Real Audio (ra)"),
    ("mac", "Monkey's Audio (mac)"),
    ("rmi", "Musical Instrument Digital Interface (rmi)"),
    ("dtswav", "DTS Audio Codec (dtswav)"),
    ("dts", "DTS Audio Codec (dts)"),
    ("opus", "Opus Audio Codec (opus)"),
    ("snd", "SouND Audio (snd)"),
    ("au", "Au File Format (au)"),
    ("ac3", "Dolby Surround Audio Coding-3 (ac3)"),
    ("xm", "Fast Tracker Module (xm)"),
    ("umx", "Unreal Engine 1 Music Format (umx)"),
    ("wv", "WavPack compression (wv)"),
];

pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SongRecord {
    pub path: PathBuf,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_artist: String,
    pub composer: String,
    pub genre: String,
    pub comment: String,
    pub track_number: u32,
    pub track_count: u32,
    pub disc_number: u32,
    pub disc_count: u32,
    pub year: Option<u32>,
    /// 0 to 5 stars.
    pub rating: u8,
    pub play_count: u32,
    pub last_played: Option<DateTime<Utc>>,
    pub date_added: Option<DateTime<Utc>>,
    pub date_modified: Option<DateTime<Utc>>,
    /// Kilobits per second.
    pub bit_rate: u32,
    /// Hertz.
    pub sample_rate: u32,
    pub file_size: u64,
    pub duration_ms: u64,
}

impl SongRecord {
    pub fn new(path: impl Into<PathBuf>) -> SongRecord {
        SongRecord {
            path: path.into(),
            ..SongRecord::default()
        }
    }

    /// Validate a record coming from the ingestion boundary and bring it into canonical form: the
    /// path is lexically normalized, the rating clamped and indexed genres resolved.
    pub fn normalized(mut self) -> Result<SongRecord> {
        if self.path.as_os_str().is_empty() {
            return Err(MuExpectedError::InvalidRecord {
                reason: "record has an empty path".to_string(),
            }
            .into());
        }
        if !self.path.is_absolute() {
            return Err(MuExpectedError::InvalidRecord {
                reason: format!("record path {} is not absolute", self.path.display()),
            }
            .into());
        }
        self.path = normalize_path(&self.path);
        self.rating = self.rating.min(MAX_RATING);
        self.genre = resolve_genre(&self.genre);
        Ok(self)
    }

    pub fn file_name(&self) -> String {
        self.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    }

    /// The title tag, or the file stem when the tag is empty.
    pub fn display_title(&self) -> String {
        let title = self.title.trim();
        if !title.is_empty() {
            return title.to_string();
        }
        self.path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
    }

    pub fn artist_key(&self) -> &str {
        or_fallback(&self.artist, NO_ARTIST)
    }

    pub fn album_key(&self) -> &str {
        or_fallback(&self.album, NO_ALBUM)
    }

    pub fn genre_key(&self) -> &str {
        or_fallback(&self.genre, NO_GENRE)
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration_ms / 1000
    }

    /// The file kind description, e.g. "MPEG Audio Layer III (mp3)". Empty for unknown suffixes.
    pub fn kind(&self) -> &'static str {
        kind_of(&self.path)
    }
}

pub fn kind_of(path: &Path) -> &'static str {
    let Some(ext) = path.extension() else {
        return "";
    };
    let ext = ext.to_string_lossy().to_lowercase();
    SUFFIX_KINDS.iter().find(|(suffix, _)| *suffix == ext).map(|(_, kind)| *kind).unwrap_or("")
}
