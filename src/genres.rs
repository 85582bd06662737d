//! The ID3v1 indexed genre table. Older taggers store the genre as a numeric index into this list,
//! either bare (`17`) or parenthesized (`(17)`, sometimes followed by a refinement).

use std::collections::HashMap;

use once_cell::sync::Lazy;

pub const INDEXED_GENRES: &[&str] = &[
    "Blues",
    "Classic Rock",
    "Country",
    "Dance",
    "Disco",
    "Funk",
    "Grunge",
    "Hip-Hop",
    "Jazz",
    "Metal",
    "New Age",
    "Oldies",
    "Other",
    "Pop",
    "R&B",
    "Rap",
    "Reggae",
    "Rock",
    "Techno",
    "Industrial",
    "Alternative",
    "Ska",
    "Death Metal",
    "Pranks",
    "Soundtrack",
    "Euro-Techno",
    "Ambient",
    "Trip-Hop",
    "Vocal",
    "Jazz+Funk",
    "Fusion",
    "Trance",
    "Classical",
    "Instrumental",
    "Acid",
    "House",
    "Game",
    "Sound Clip",
    "Gospel",
    "Noise",
    "Alternative Rock",
    "Bass",
    "Soul",
    "Punk",
    "Space",
    "Meditative",
    "Instrumental Pop",
    "Instrumental Rock",
    "Ethnic",
    "Gothic",
    "Darkwave",
    "Techno-Industrial",
    "Electronic",
    "Pop-Folk",
    "Eurodance",
    "Dream",
    "Southern Rock",
    "Comedy",
    "Cult",
    "Gangsta",
    "Top 40",
    "Christian Rap",
    "Pop/Funk",
    "Jungle",
    "Native US",
    "Cabaret",
    "New Wave",
    "Psychadelic",
    "Rave",
    "Showtunes",
    "Trailer",
    "Lo-Fi",
    "Tribal",
    "Acid Punk",
    "Acid Jazz",
    "Polka",
    "Retro",
    "Musical",
    "Rock & Roll",
    "Hard Rock",
    "Folk",
    "Folk-Rock",
    "National Folk",
    "Swing",
    "Fast Fusion",
    "Bebob",
    "Latin",
    "Revival",
    "Celtic",
    "Bluegrass",
    "Avantgarde",
    "Gothic Rock",
    "Progressive Rock",
    "Psychedelic Rock",
    "Symphonic Rock",
    "Slow Rock",
    "Big Band",
    "Chorus",
    "Easy Listening",
    "Acoustic",
    "Humour",
    "Speech",
    "Chanson",
    "Opera",
    "Chamber Music",
    "Sonata",
    "Symphony",
    "Booty Bass",
    "Primus",
    "Porn Groove",
    "Satire",
    "Slow Jam",
    "Club",
    "Tango",
    "Samba",
    "Folklore",
    "Ballad",
    "Power Ballad",
    "Rhythmic Soul",
    "Freestyle",
    "Duet",
    "Punk Rock",
    "Drum Solo",
    "Acapella",
    "Euro-House",
    "Dance Hall",
    "Goa",
    "Drum & Bass",
    "Club House",
    "Hardcore",
    "Terror",
    "Indie",
    "BritPop",
    "Negerpunk",
    "Polsk Punk",
    "Beat",
    "Christian Gangsta Rap",
    "Heavy Metal",
    "Black Metal",
    "Crossover",
    "Contemporary Christian",
    "Christian Rock",
    "Merengue",
    "Salsa",
    "Thrash Metal",
    "Anime",
    "JPop",
    "Synthpop",
];

static GENRE_INDEX: Lazy<HashMap<String, usize>> =
    Lazy::new(|| INDEXED_GENRES.iter().enumerate().map(|(i, g)| (g.to_lowercase(), i)).collect());

pub fn indexed_genre(index: usize) -> Option<&'static str> {
    INDEXED_GENRES.get(index).copied()
}

/// The ID3v1 index of a genre name, compared case-insensitively.
pub fn genre_index(genre: &str) -> Option<usize> {
    GENRE_INDEX.get(&genre.trim().to_lowercase()).copied()
}

/// Resolve a raw genre tag. Numeric references are mapped through the indexed table; a
/// parenthesized index followed by text (`(17)Hard Rock`) keeps the text. Anything else is
/// returned trimmed.
pub fn resolve_genre(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(index) = raw.parse::<usize>() {
        return indexed_genre(index).map(str::to_string).unwrap_or_else(|| raw.to_string());
    }
    if let Some(rest) = raw.strip_prefix('(') {
        if let Some((digits, refinement)) = rest.split_once(')') {
            if let Ok(index) = digits.parse::<usize>() {
                let refinement = refinement.trim();
                if !refinement.is_empty() {
                    return refinement.to_string();
                }
                if let Some(name) = indexed_genre(index) {
                    return name.to_string();
                }
            }
        }
    }
    raw.to_string()
}
