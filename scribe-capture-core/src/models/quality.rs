use serde::Serialize;

/// A named set of capture parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualityPreset {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub size_per_min: &'static str,
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_frames: usize,
}

const QUICK: QualityPreset = QualityPreset {
    key: "quick",
    name: "Quick (16kHz Mono)",
    description: "Smaller files, good for voice notes",
    size_per_min: "2 MB/min",
    sample_rate: 16000,
    channels: 1,
    buffer_frames: 2048,
};

const STANDARD: QualityPreset = QualityPreset {
    key: "standard",
    name: "Standard (44.1kHz Stereo)",
    description: "CD quality, balanced file size",
    size_per_min: "10 MB/min",
    sample_rate: 44100,
    channels: 2,
    buffer_frames: 4096,
};

const PROFESSIONAL: QualityPreset = QualityPreset {
    key: "professional",
    name: "Professional (48kHz Stereo)",
    description: "Professional quality for meetings",
    size_per_min: "11 MB/min",
    sample_rate: 48000,
    channels: 2,
    buffer_frames: 4096,
};

const HIGH: QualityPreset = QualityPreset {
    key: "high",
    name: "High (96kHz Stereo)",
    description: "Maximum quality, larger files",
    size_per_min: "22 MB/min",
    sample_rate: 96000,
    channels: 2,
    buffer_frames: 8192,
};

const ALL: [QualityPreset; 4] = [QUICK, STANDARD, PROFESSIONAL, HIGH];

impl QualityPreset {
    pub const fn quick() -> Self {
        QUICK
    }

    pub const fn standard() -> Self {
        STANDARD
    }

    pub const fn professional() -> Self {
        PROFESSIONAL
    }

    pub const fn high() -> Self {
        HIGH
    }

    /// All presets, smallest to largest.
    pub fn all() -> &'static [QualityPreset] {
        &ALL
    }

    /// Look up a preset by key (case-insensitive). Unknown names resolve to `professional`.
    pub fn get(name: &str) -> Self {
        let name = name.trim();
        ALL.iter()
            .find(|preset| preset.key.eq_ignore_ascii_case(name))
            .copied()
            .unwrap_or(PROFESSIONAL)
    }
}

impl Default for QualityPreset {
    fn default() -> Self {
        PROFESSIONAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_key() {
        assert_eq!(QualityPreset::get("quick").sample_rate, 16000);
        assert_eq!(QualityPreset::get("Standard").sample_rate, 44100);
        assert_eq!(QualityPreset::get(" HIGH ").buffer_frames, 8192);
    }

    #[test]
    fn unknown_resolves_to_professional() {
        assert_eq!(QualityPreset::get("lossless"), QualityPreset::professional());
        assert_eq!(QualityPreset::get(""), QualityPreset::professional());
    }

    #[test]
    fn table_is_complete() {
        let keys: Vec<_> = QualityPreset::all().iter().map(|p| p.key).collect();
        assert_eq!(keys, ["quick", "standard", "professional", "high"]);
        assert_eq!(QualityPreset::quick().channels, 1);
        assert_eq!(QualityPreset::default().key, "professional");
    }
}
