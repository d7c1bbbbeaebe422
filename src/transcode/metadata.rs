//! Output metadata

use std::collections::BTreeMap;

use ffmpeg_next as ffmpeg;

/// Tag map written to the output container and stream
pub type Metadata = BTreeMap<String, String>;

/// Source tags overlaid with the caller's; the caller's value wins on a
/// shared key. Keys compare case-insensitively, as FFmpeg's do.
pub fn merge_metadata<'a, I>(source: I, overrides: &Metadata) -> Metadata
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut merged: Metadata = source
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    for (k, v) in overrides {
        merged.retain(|key, _| !key.eq_ignore_ascii_case(k));
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Build an FFmpeg dictionary from a tag map
pub fn to_dictionary(metadata: &Metadata) -> ffmpeg::Dictionary<'static> {
    let mut dict = ffmpeg::Dictionary::new();
    for (k, v) in metadata {
        dict.set(k, v);
    }
    dict
}

/// Parse a `key=value` pair as given on the command line
pub fn parse_tag(arg: &str) -> Option<(String, String)> {
    let (key, value) = arg.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}
