//! Constants shared across the packaging pipeline.

/// Current archive format version.
pub const FORMAT_VERSION: u32 = 1;

/// Prefix of the archive version tag; `packfs.v1` opens a version-1 archive.
pub const FORMAT_PREFIX: &str = "packfs.v";

/// First token of the archive end marker. The full marker line carries the
/// SHA-256 digest of everything written before it.
pub const FORMAT_END: &str = "packfs.end";

/// File name of the generated artifact.
pub const ARTIFACT_NAME: &str = "packed.rs";

/// Manifest file probed for the build context.
pub const MANIFEST_NAME: &str = "Cargo.toml";

/// Function names the resolver treats as include-style calls when they take
/// a literal path argument.
pub const SCANNED_CALLS: &[&str] = &[
    "open",
    "create",
    "stat",
    "read_dir",
    "walk",
    "remove",
    "mkdir_all",
    "include",
];

/// Directory names excluded from the source scan, in addition to hidden
/// directories.
pub const EXCLUDED_DIRS: &[&str] = &["target", "vendor", "node_modules"];

/// Permission bits used for files when the host cannot report any.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Permission bits used for directories when the host cannot report any,
/// and for directory entries synthesized while decoding.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Version tag line opening an archive of the given version.
pub fn format_tag(version: u32) -> String {
    format!("{}{}", FORMAT_PREFIX, version)
}
