//! # Utility Functions Module
//!
//! Helpers for building external process command lines.

/// Builds a process argument vector from mixed `&str`, `String` and `&Path` items.
///
/// # Example
/// ```rust
/// use resolve_assistant::args;
///
/// let preset = "Preset1280x720";
/// let source = std::path::Path::new("in.mov");
/// let argv = args!["--preset", preset, "--source", source];
/// assert_eq!(argv.len(), 4);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        vec![$(::std::ffi::OsString::from(::std::convert::AsRef::<::std::ffi::OsStr>::as_ref(&$item))),*]
    };
}
