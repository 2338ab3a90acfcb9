use clap::Parser;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "HLS video-on-demand downloader",
    long_about = "Downloads every segment of an HLS (m3u8) video-on-demand stream, decrypts\n\
                  AES-128 encrypted segments and joins them, in order, into a single file.\n\
                  \n\
                  Master playlists are resolved to their first variant. Segments already\n\
                  downloaded by an interrupted run of the same URL are reused."
)]
pub struct CliArgs {
    /// Playlist URL
    #[arg(short, long, help = "URL of the m3u8 playlist to download")]
    pub url: String,

    /// Output directory
    #[arg(
        short,
        long,
        help = "Directory where the output file is saved (default: the system downloads directory)"
    )]
    pub output_dir: Option<PathBuf>,

    /// Output file name
    #[arg(
        short = 'n',
        long = "name",
        default_value = "output",
        help = "Output file name; \".mp4\" is appended when it has no extension"
    )]
    pub name: String,

    /// Number of concurrent segment downloads
    #[arg(
        short,
        long,
        default_value = "100",
        help = "Maximum number of segments downloaded at the same time"
    )]
    pub concurrency: usize,

    /// Attempts per segment
    #[arg(
        long,
        default_value = "10",
        help = "Attempts per segment before it is left out of the output (0 retries forever)"
    )]
    pub max_attempts: u32,

    /// Overall request timeout in seconds
    #[arg(
        long,
        default_value = "60",
        help = "Overall timeout in seconds for each HTTP request (0 disables it)"
    )]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value = "10",
        help = "Connection timeout in seconds (time to establish initial connection)"
    )]
    pub connect_timeout: u64,

    /// Custom HTTP headers for download requests
    #[arg(
        long = "header",
        short = 'H',
        help = "Add custom HTTP header to requests (can be used multiple times). Format: 'Name: Value'",
        value_name = "HEADER"
    )]
    pub headers: Vec<String>,

    /// Hide progress bars
    #[arg(long, help = "Do not show progress bars")]
    pub no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["hlsget", "-u", "https://cdn.test/index.m3u8"]).unwrap();
        assert_eq!(args.url, "https://cdn.test/index.m3u8");
        assert_eq!(args.name, "output");
        assert_eq!(args.concurrency, 100);
        assert_eq!(args.max_attempts, 10);
        assert_eq!(args.timeout, 60);
        assert!(args.output_dir.is_none());
        assert!(args.headers.is_empty());
        assert!(!args.no_progress);
    }

    #[test]
    fn test_url_is_required() {
        assert!(CliArgs::try_parse_from(["hlsget"]).is_err());
    }

    #[test]
    fn test_repeated_headers() {
        let args = CliArgs::try_parse_from([
            "hlsget",
            "--url",
            "https://cdn.test/index.m3u8",
            "-H",
            "Referer: https://site.test",
            "-H",
            "Origin: https://site.test",
            "-o",
            "/tmp/videos",
            "-n",
            "clip.ts",
            "-c",
            "8",
        ])
        .unwrap();
        assert_eq!(args.headers.len(), 2);
        assert_eq!(args.output_dir, Some(PathBuf::from("/tmp/videos")));
        assert_eq!(args.name, "clip.ts");
        assert_eq!(args.concurrency, 8);
    }
}
