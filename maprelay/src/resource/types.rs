//! Resource identity types.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Category of a fetchable resource.
///
/// The kind is part of a resource's identity: the same URL requested as a
/// `Tile` and as a `Source` are two different fetch targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceKind {
    #[default]
    Unknown,
    Style,
    Source,
    Tile,
    Glyphs,
    SpriteImage,
    SpriteJson,
}

impl ResourceKind {
    /// All kinds, in declaration order.
    pub const ALL: [ResourceKind; 7] = [
        Self::Unknown,
        Self::Style,
        Self::Source,
        Self::Tile,
        Self::Glyphs,
        Self::SpriteImage,
        Self::SpriteJson,
    ];

    /// Returns the stable lowercase name used in config files and on the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Style => "style",
            Self::Source => "source",
            Self::Tile => "tile",
            Self::Glyphs => "glyphs",
            Self::SpriteImage => "sprite-image",
            Self::SpriteJson => "sprite-json",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown resource kind name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown resource kind '{0}'")]
pub struct ParseResourceKindError(pub String);

impl FromStr for ResourceKind {
    type Err = ParseResourceKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ParseResourceKindError(s.to_string()))
    }
}

/// A fetchable target, identified by URL and kind.
///
/// Resources are immutable values. Two resources are the same fetch target
/// iff both the URL and the kind match; the coordinator uses this equality
/// as its coalescing key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    url: String,
    kind: ResourceKind,
}

impl Resource {
    /// Creates a resource from a URL and kind.
    pub fn new(url: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    pub fn style(url: impl Into<String>) -> Self {
        Self::new(url, ResourceKind::Style)
    }

    pub fn source(url: impl Into<String>) -> Self {
        Self::new(url, ResourceKind::Source)
    }

    pub fn tile(url: impl Into<String>) -> Self {
        Self::new(url, ResourceKind::Tile)
    }

    pub fn glyphs(url: impl Into<String>) -> Self {
        Self::new(url, ResourceKind::Glyphs)
    }

    pub fn sprite_image(url: impl Into<String>) -> Self {
        Self::new(url, ResourceKind::SpriteImage)
    }

    pub fn sprite_json(url: impl Into<String>) -> Self {
        Self::new(url, ResourceKind::SpriteJson)
    }

    /// Returns the resource URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the resource kind.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Returns the URL scheme (the part before `://`), if any.
    pub fn scheme(&self) -> Option<&str> {
        self.url.split_once("://").map(|(scheme, _)| scheme)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.kind)
    }
}
