//! M3U playlist parser
//! Extracts the display name and `tvg-id` from each `#EXTINF:` line; that is
//! all the merge stage needs to cross-reference a playlist against an EPG.

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistChannel {
    pub name: String,
    /// EPG channel identifier from the `tvg-id` attribute, when present.
    pub tvg_id: Option<String>,
}

/// Parse M3U text into playlist channels.
/// Non-`#EXTINF:` lines (header, URLs, blanks, stray comments) are skipped
/// rather than treated as errors, so a malformed record drops only itself.
pub fn parse_playlist(content: &str) -> Vec<PlaylistChannel> {
    let mut channels = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if !line.starts_with("#EXTINF:") {
            continue;
        }

        // Display name is everything after the last comma.
        let Some(comma) = line.rfind(',') else {
            continue;
        };
        let name = line[comma + 1..].trim();
        if name.is_empty() {
            continue;
        }

        let tvg_id = extract_tvg_id(&line[..comma]);
        channels.push(PlaylistChannel {
            name: name.to_string(),
            tvg_id,
        });
    }

    channels
}

/// Scan space-separated tokens of the attribute section for `tvg-id="..."`
/// and return the quote-delimited value exactly as written.
fn extract_tvg_id(attrs: &str) -> Option<String> {
    for token in attrs.split(' ') {
        if let Some(rest) = token.strip_prefix("tvg-id=") {
            return rest.split('"').nth(1).map(str::to_string);
        }
    }
    None
}
