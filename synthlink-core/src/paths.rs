use std::path::PathBuf;

use synthlink_types::TuningKind;

/// Resolve the data directory (patches, tuning library).
///
/// Fallback chain:
/// 1. `SYNTHLINK_DATA_DIR` env var
/// 2. `<platform data dir>/synthlink`
/// 3. `./data` relative to CWD
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SYNTHLINK_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|d| d.join("synthlink"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// `~/.config/synthlink/`, or `.` when there is no config dir.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("synthlink"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Bundled tuning files of one kind under a data directory.
pub fn tuning_library_dir(data_dir: &std::path::Path, kind: TuningKind) -> PathBuf {
    data_dir.join("tuning_library").join(kind.library_subdir())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuning_library_dir() {
        let base = PathBuf::from("/opt/synthlink");
        assert_eq!(
            tuning_library_dir(&base, TuningKind::Scale),
            PathBuf::from("/opt/synthlink/tuning_library/SCL")
        );
        assert_eq!(
            tuning_library_dir(&base, TuningKind::Mapping),
            PathBuf::from("/opt/synthlink/tuning_library/KBM Concert Pitch")
        );
    }
}
