pub mod captions;
pub mod catalog;
pub mod categories;
pub mod codec_itunes;
pub mod codec_m3u;
pub mod codec_native;
pub mod codec_ttpl;
pub mod codec_wpl;
pub mod codec_xspf;
pub mod codecs;
pub mod common;
pub mod config;
pub mod error;
pub mod genres;
pub mod library;
pub mod playlists;
pub mod search;
pub mod search_parser;
pub mod songs;
mod xml;

pub use captions::{CaptionTable, Noun};
pub use categories::{Aggregate, CategoryDelta, Dimension};
pub use codecs::{CodecRegistry, PlaylistFormat, TrackRef};
pub use config::Config;
pub use error::{MuError, MuExpectedError, Result};
pub use library::{Library, LibraryChange, LibrarySnapshot};
pub use playlists::PlaylistManager;
pub use search::Searcher;
pub use songs::SongRecord;

#[cfg(test)]
mod testing;

#[cfg(test)]
mod config_test;
#[cfg(test)]
mod playlists_test;
#[cfg(test)]
mod search_parser_test;
