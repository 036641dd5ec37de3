mod hls_engine;
mod playlist;

pub use hls_engine::{HlsEngine, HlsEngineFactory};
pub use playlist::{parse as parse_playlist, MediaPlaylist, Playlist, SegmentRef, VariantStream};
