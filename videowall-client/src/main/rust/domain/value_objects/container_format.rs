/// Media segment containers the playback engine can feed to a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    MpegTs,
    Fmp4,
    Aac,
}

impl ContainerFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerFormat::MpegTs => "MPEG-TS",
            ContainerFormat::Fmp4 => "fMP4",
            ContainerFormat::Aac => "AAC",
        }
    }

    /// Classify a segment by the extension of its URI path
    pub fn from_path(path: &str) -> Option<Self> {
        let extension = path.rsplit_once('.')?.1.to_ascii_lowercase();
        match extension.as_str() {
            "ts" => Some(ContainerFormat::MpegTs),
            "m4s" | "mp4" | "m4v" => Some(ContainerFormat::Fmp4),
            "aac" => Some(ContainerFormat::Aac),
            _ => None,
        }
    }
}

impl Default for ContainerFormat {
    fn default() -> Self {
        ContainerFormat::MpegTs
    }
}
