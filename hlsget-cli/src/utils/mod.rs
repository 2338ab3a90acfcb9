mod files;
mod headers;
pub mod progress;

// Export utility functions
pub use self::files::default_output_dir;
pub use self::headers::parse_headers;
