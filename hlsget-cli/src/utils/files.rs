use std::path::PathBuf;

/// Directory used when no output directory is given: the platform download
/// directory, else `~/Downloads`, else the working directory.
pub fn default_output_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
}
