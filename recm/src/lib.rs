//! Shared plumbing for the `bin2ecm` and `ecm2bin` frontends.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

/// Work budget handed to the codec per step; one megabyte keeps the
/// progress repaint responsive without measurable call overhead.
pub const MAX_STEP_IN_BYTES: usize = 1024 * 1024;

/// Default encode output: the input name with `.ecm` appended.
pub fn default_encoded_name(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(".ecm");
    PathBuf::from(name)
}

/// Default decode output: strip a case-insensitive `.ecm` suffix, falling
/// back to appending `.unecm`.
pub fn default_decoded_name(input: &Path) -> PathBuf {
    let name = input.to_string_lossy();
    if name.len() > 4 {
        if let Some(suffix) = name.get(name.len() - 4..) {
            if suffix.eq_ignore_ascii_case(".ecm") {
                return PathBuf::from(name[..name.len() - 4].to_string());
            }
        }
    }
    let mut fallback = input.as_os_str().to_os_string();
    fallback.push(".unecm");
    PathBuf::from(fallback)
}

/// Refuse to clobber an existing output file.
pub fn check_overwrite(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} exists; refusing to overwrite", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_name_appends_suffix() {
        assert_eq!(
            default_encoded_name(Path::new("game.bin")),
            PathBuf::from("game.bin.ecm")
        );
    }

    #[test]
    fn decoded_name_strips_suffix_case_insensitively() {
        assert_eq!(
            default_decoded_name(Path::new("game.bin.ecm")),
            PathBuf::from("game.bin")
        );
        assert_eq!(
            default_decoded_name(Path::new("GAME.ECM")),
            PathBuf::from("GAME")
        );
        assert_eq!(
            default_decoded_name(Path::new("image.img")),
            PathBuf::from("image.img.unecm")
        );
        assert_eq!(default_decoded_name(Path::new(".ecm")), PathBuf::from(".ecm.unecm"));
    }
}
