//! Mode controller
//!
//! Test modes are data. Each entry point (plain decode, plain encode, the
//! combined hardware-interface sweep) is a [`Preset`]: a list of passes, each
//! naming a toolset, a direction, the submodes to run and which media roles
//! qualify. A [`TestPlan`] is one pass resolved against the run options.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::media::MediaRole;

/// Code direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Bitstream in, frames out
    Decode,
    /// Raw frames in, bitstream out
    Encode,
}

/// Tool-specific test variant within a direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Submode {
    /// Dump decoded frames to a file (`-m 0`); the only hashed artifact
    FrameDump,
    /// Per-frame and whole-stream MD5 printed to a side file (`-m -2`)
    StreamDigest,
    /// Decode without rendering (`-m -1`)
    SkipRender,
    /// Render to an X window (`-m 1`)
    RenderWindow,
    /// Render to a pixmap and texture from it (`-m 2`)
    RenderPixmap,
    /// Export frames as DRM names and texture from them (`-m 3`)
    ExportDrmName,
    /// Export frames as dma_buf and texture from them (`-m 4`)
    ExportDmaBuf,
    /// Quit right after decoding (`-w 0`)
    NoWait,
    /// Tool decides whether to wait before quitting (`-w 1`)
    AutoWait,
    /// The single AVC encode profile (`-c AVC`)
    EncodeAvc,
}

impl Submode {
    /// Every submode, in flag-table order
    pub const ALL: [Self; 10] = [
        Self::FrameDump,
        Self::StreamDigest,
        Self::SkipRender,
        Self::RenderWindow,
        Self::RenderPixmap,
        Self::ExportDrmName,
        Self::ExportDmaBuf,
        Self::NoWait,
        Self::AutoWait,
        Self::EncodeAvc,
    ];

    /// Command-line flag and value selecting this submode
    #[must_use]
    pub const fn flag(self) -> (&'static str, &'static str) {
        match self {
            Self::FrameDump => ("-m", "0"),
            Self::StreamDigest => ("-m", "-2"),
            Self::SkipRender => ("-m", "-1"),
            Self::RenderWindow => ("-m", "1"),
            Self::RenderPixmap => ("-m", "2"),
            Self::ExportDrmName => ("-m", "3"),
            Self::ExportDmaBuf => ("-m", "4"),
            Self::NoWait => ("-w", "0"),
            Self::AutoWait => ("-w", "1"),
            Self::EncodeAvc => ("-c", "AVC"),
        }
    }

    /// Direction this submode belongs to
    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            Self::EncodeAvc => Direction::Encode,
            _ => Direction::Decode,
        }
    }

    /// Whether the artifact of this submode is compared against reference hashes
    #[must_use]
    pub const fn is_hashed(self) -> bool {
        matches!(self, Self::FrameDump)
    }
}

impl fmt::Display for Submode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (flag, value) = self.flag();
        write!(f, "{flag} {value}")
    }
}

/// Raw frame layout handed to the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Planar 4:2:0
    I420,
    /// Semi-planar 4:2:0
    NV12,
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I420 => f.write_str("I420"),
            Self::NV12 => f.write_str("NV12"),
        }
    }
}

/// Family of codec tool binaries exercising one API surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toolset {
    /// C++ API tools (`yamidecode`, `yamiencode`)
    Yami,
    /// C API tools (`decodecapi`, `encodecapi`)
    Capi,
    /// V4L2 interface tools (`v4l2decode`, `v4l2encode`)
    V4l2,
}

/// When the correctness oracle runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparePolicy {
    /// Always judge with the oracle
    Always,
    /// Smoke test only: exit status decides
    Never,
    /// Oracle unless artifacts are being saved for inspection
    UnlessSaving,
}

impl ComparePolicy {
    /// Resolve against the save flag
    #[must_use]
    pub const fn resolve(self, save_artifacts: bool) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::UnlessSaving => !save_artifacts,
        }
    }
}

/// One traversal pass of a preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSpec {
    /// Tool family to invoke
    pub toolset: Toolset,
    /// Code direction
    pub direction: Direction,
    /// Submodes, run in order for every qualifying item
    pub submodes: &'static [Submode],
    /// Media roles this pass accepts
    pub roles: &'static [MediaRole],
    /// Oracle policy
    pub compare: ComparePolicy,
    /// Encoder input layout (ignored when decoding)
    pub pixel_format: PixelFormat,
}

/// Named entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    /// Mode token given on the command line
    pub name: &'static str,
    /// One-line description
    pub description: &'static str,
    /// Passes, run in order over the same root
    pub passes: &'static [PassSpec],
}

const DECODABLE: &[MediaRole] = &[
    MediaRole::Bitstream,
    MediaRole::StillImage,
    MediaRole::Container,
];
const STILLS: &[MediaRole] = &[MediaRole::StillImage];
const STREAMS: &[MediaRole] = &[MediaRole::Bitstream, MediaRole::Container];
const PLAIN_STREAMS: &[MediaRole] = &[MediaRole::Bitstream];
const RAW: &[MediaRole] = &[MediaRole::RawFrames];

const SWEEP_RENDER: &[Submode] = &[
    Submode::FrameDump,
    Submode::ExportDrmName,
    Submode::ExportDmaBuf,
];
const FULL_RENDER: &[Submode] = &[
    Submode::SkipRender,
    Submode::FrameDump,
    Submode::RenderWindow,
    Submode::RenderPixmap,
    Submode::ExportDrmName,
    Submode::ExportDmaBuf,
];

const fn decode_pass(
    toolset: Toolset,
    submodes: &'static [Submode],
    roles: &'static [MediaRole],
    compare: ComparePolicy,
) -> PassSpec {
    PassSpec {
        toolset,
        direction: Direction::Decode,
        submodes,
        roles,
        compare,
        pixel_format: PixelFormat::I420,
    }
}

const fn encode_pass(
    toolset: Toolset,
    pixel_format: PixelFormat,
    compare: ComparePolicy,
) -> PassSpec {
    PassSpec {
        toolset,
        direction: Direction::Encode,
        submodes: &[Submode::EncodeAvc],
        roles: RAW,
        compare,
        pixel_format,
    }
}

/// The four sweep passes for one toolset
macro_rules! sweep_passes {
    ($toolset:expr, $render:expr, $pixel_format:expr) => {
        [
            decode_pass($toolset, &[Submode::NoWait], STILLS, ComparePolicy::Never),
            decode_pass($toolset, &[Submode::AutoWait], STREAMS, ComparePolicy::Never),
            decode_pass($toolset, $render, PLAIN_STREAMS, ComparePolicy::Never),
            encode_pass($toolset, $pixel_format, ComparePolicy::Never),
        ]
    };
}

/// yami, capi then v4l2, each with its own render submodes
macro_rules! sweep {
    ($yami_render:expr, $capi_render:expr, $v4l2_render:expr) => {{
        let yami = sweep_passes!(Toolset::Yami, $yami_render, PixelFormat::NV12);
        let capi = sweep_passes!(Toolset::Capi, $capi_render, PixelFormat::NV12);
        let v4l2 = sweep_passes!(Toolset::V4l2, $v4l2_render, PixelFormat::I420);
        [
            yami[0], yami[1], yami[2], yami[3], capi[0], capi[1], capi[2], capi[3], v4l2[0],
            v4l2[1], v4l2[2], v4l2[3],
        ]
    }};
}

const SWEEP: [PassSpec; 12] = sweep!(SWEEP_RENDER, SWEEP_RENDER, SWEEP_RENDER);

/// yami and capi also cover the no-render and X11 paths
const RENDER_SWEEP: [PassSpec; 12] = sweep!(FULL_RENDER, FULL_RENDER, SWEEP_RENDER);

/// Every entry point the harness knows
pub const PRESETS: &[Preset] = &[
    Preset {
        name: "decode",
        description: "decode each bitstream, compare the frame dump MD5 with bits.md5",
        passes: &[decode_pass(
            Toolset::Yami,
            &[Submode::FrameDump],
            DECODABLE,
            ComparePolicy::Always,
        )],
    },
    Preset {
        name: "decode-full",
        description: "frame dump plus MD5 digest mode; hashes only when not saving",
        passes: &[decode_pass(
            Toolset::Yami,
            &[Submode::FrameDump, Submode::StreamDigest],
            DECODABLE,
            ComparePolicy::UnlessSaving,
        )],
    },
    Preset {
        name: "encode",
        description: "encode raw frames to AVC, re-decode and check PSNR",
        passes: &[encode_pass(
            Toolset::Yami,
            PixelFormat::I420,
            ComparePolicy::Always,
        )],
    },
    Preset {
        name: "v4l2",
        description: "smoke sweep over the yami, capi and v4l2 tool families",
        passes: &SWEEP,
    },
    Preset {
        name: "v4l2-render",
        description: "v4l2 sweep with every render path of the yami and capi tools",
        passes: &RENDER_SWEEP,
    },
];

/// Look up a preset by mode token
///
/// # Errors
///
/// Returns [`Error::UnknownPreset`] for an unknown token.
pub fn preset(name: &str) -> Result<&'static Preset> {
    PRESETS
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| Error::UnknownPreset(name.to_string()))
}

/// Where the reference hash oracle looks up expected digests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceSource {
    /// A file with this name next to each input
    Sibling(String),
    /// One file for the whole run
    Explicit(PathBuf),
}

impl ReferenceSource {
    /// Reference file consulted for an input living in `input_dir`
    #[must_use]
    pub fn resolve(&self, input_dir: &Path) -> PathBuf {
        match self {
            Self::Sibling(name) => input_dir.join(name),
            Self::Explicit(path) => path.clone(),
        }
    }
}

impl Default for ReferenceSource {
    fn default() -> Self {
        Self::Sibling("bits.md5".to_string())
    }
}

/// Active run configuration for one traversal pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPlan {
    /// Tool family
    pub toolset: Toolset,
    /// Code direction
    pub direction: Direction,
    /// Submodes in order
    pub submodes: Vec<Submode>,
    /// Accepted media roles
    pub roles: Vec<MediaRole>,
    /// Keep artifacts instead of deleting them
    pub save_artifacts: bool,
    /// Judge with the oracle rather than exit status alone
    pub compare: bool,
    /// Reference hash lookup
    pub reference: ReferenceSource,
    /// Encoder input layout
    pub pixel_format: PixelFormat,
    /// Threshold handed to the quality tool
    pub quality_threshold: f64,
}

impl TestPlan {
    /// Resolve a pass against run options
    #[must_use]
    pub fn from_pass(
        pass: &PassSpec,
        save_artifacts: bool,
        reference: ReferenceSource,
        quality_threshold: f64,
    ) -> Self {
        Self {
            toolset: pass.toolset,
            direction: pass.direction,
            submodes: pass.submodes.to_vec(),
            roles: pass.roles.to_vec(),
            save_artifacts,
            compare: pass.compare.resolve(save_artifacts),
            reference,
            pixel_format: pass.pixel_format,
            quality_threshold,
        }
    }

    /// Whether an item of this role takes part in the pass
    ///
    /// Raw frames and reference files never reach the decoder, whatever
    /// roles the plan lists.
    #[must_use]
    pub fn accepts(&self, role: MediaRole) -> bool {
        let eligible = match self.direction {
            Direction::Decode => role.is_decodable(),
            Direction::Encode => true,
        };
        eligible && self.roles.contains(&role)
    }
}
