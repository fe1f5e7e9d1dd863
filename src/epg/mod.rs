//! EPG (Electronic Program Guide) module
//!
//! Streaming XMLTV parser plus the playlist/guide merger.

mod merge;
mod parser;

pub use merge::{merge, MergeOutcome};
pub use parser::{parse_epg, parse_epg_reader, EpgGuide, Programme};
