//! Media discovery
//!
//! Turns a root path into a lazy stream of [`TestItem`]s. Walk order is
//! whatever the directory walk yields; counts and cleanup never depend on it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// What a file is to the harness, judged by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaRole {
    /// Compressed elementary stream (h264, hevc, ...), the decoder's input
    Bitstream,
    /// JPEG / MJPEG stills
    StillImage,
    /// IVF container (VP8/VP9)
    Container,
    /// Raw YUV frames, the encoder's input
    RawFrames,
    /// Reference hash file
    Reference,
}

impl MediaRole {
    /// Classify a path by its extension (case-insensitive)
    #[must_use]
    pub fn classify(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "yuv" | "i420" | "nv12" => Self::RawFrames,
            "md5" => Self::Reference,
            "jpg" | "jpeg" | "mjpeg" => Self::StillImage,
            "ivf" => Self::Container,
            _ => Self::Bitstream,
        }
    }

    /// Whether the decoder may be pointed at this file
    #[must_use]
    pub const fn is_decodable(self) -> bool {
        matches!(self, Self::Bitstream | Self::StillImage | Self::Container)
    }
}

/// Frame dimensions carried in a file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

static DIMENSIONS: LazyLock<Regex> = LazyLock::new(|| {
    // Literal pattern, cannot fail to compile
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^(?P<width>\d+)[xX](?P<height>\d+)$").unwrap()
});

/// Parse `..._<width>x<height>.<ext>` into a [`Geometry`]
///
/// Only the segment after the last `_` counts, with everything from its
/// first `.` stripped. Zero dimensions are rejected.
///
/// # Errors
///
/// Returns [`Error::Geometry`] if the name does not follow the convention.
pub fn parse_geometry(file_name: &str) -> Result<Geometry> {
    let fail = |reason: &str| Error::Geometry {
        file_name: file_name.to_string(),
        reason: reason.to_string(),
    };

    let Some((_, last)) = file_name.rsplit_once('_') else {
        return Err(fail("no '_' separator before the dimensions"));
    };
    let stem = last.split('.').next().unwrap_or_default();
    let caps = DIMENSIONS
        .captures(stem)
        .ok_or_else(|| fail(&format!("'{stem}' is not <width>x<height>")))?;

    let width: u32 = caps["width"]
        .parse()
        .map_err(|_| fail("width out of range"))?;
    let height: u32 = caps["height"]
        .parse()
        .map_err(|_| fail("height out of range"))?;
    if width == 0 || height == 0 {
        return Err(fail("zero dimension"));
    }
    Ok(Geometry { width, height })
}

/// One input media file under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestItem {
    /// Absolute path
    pub path: PathBuf,
    /// File name without directories
    pub base_name: String,
    /// Role inferred from the extension
    pub role: MediaRole,
}

impl TestItem {
    /// Build an item from a path
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let base_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let role = MediaRole::classify(&path);
        Self {
            path,
            base_name,
            role,
        }
    }

    /// Frame geometry encoded in the file name
    ///
    /// # Errors
    ///
    /// Returns [`Error::Geometry`] if the name carries no dimensions.
    pub fn geometry(&self) -> Result<Geometry> {
        parse_geometry(&self.base_name)
    }

    /// Directory holding the item
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }
}

/// Lazy walk over every regular file below a root
pub struct MediaWalk {
    inner: walkdir::IntoIter,
}

impl Iterator for MediaWalk {
    type Item = TestItem;

    fn next(&mut self) -> Option<TestItem> {
        loop {
            match self.inner.next()? {
                Ok(entry) => {
                    // is_file() follows symlinks to files; directories stay unfollowed
                    if entry.path().is_file() {
                        return Some(TestItem::new(entry.into_path()));
                    }
                }
                Err(e) => tracing::warn!("skipping unreadable entry: {e}"),
            }
        }
    }
}

/// Start a walk at `root`, a single file or a directory tree
///
/// # Errors
///
/// Returns [`Error::InputNotFound`] if `root` does not exist. This is the
/// only check; unreadable entries found during the walk are skipped.
pub fn discover(root: &Path) -> Result<MediaWalk> {
    if !root.exists() {
        return Err(Error::InputNotFound(root.to_path_buf()));
    }
    let root = std::path::absolute(root)?;
    Ok(MediaWalk {
        inner: WalkDir::new(root).into_iter(),
    })
}
