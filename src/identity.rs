use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// The kinds of non-paper entity the graph stores.
///
/// The discriminant doubles as the key prefix in the entity and edge tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Author,
    Topic,
    Keyword,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] =
        [EntityKind::Author, EntityKind::Topic, EntityKind::Keyword];

    pub fn code(self) -> u8 {
        match self {
            EntityKind::Author => 0,
            EntityKind::Topic => 1,
            EntityKind::Keyword => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(EntityKind::Author),
            1 => Some(EntityKind::Topic),
            2 => Some(EntityKind::Keyword),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Author => "author",
            EntityKind::Topic => "topic",
            EntityKind::Keyword => "keyword",
        }
    }

    /// Display form of the per-kind sentinel node that absorbs empty or
    /// unusable raw strings, so a missing field never aborts an ingest.
    pub fn sentinel_display(self) -> &'static str {
        match self {
            EntityKind::Author => "Unknown Author",
            EntityKind::Topic => "Unknown Topic",
            EntityKind::Keyword => "Unknown Keyword",
        }
    }
}

/// Normalization key of the sentinel node for every kind.
pub const SENTINEL_KEY: &str = "unknown";

/// Reduce a raw string to its normalization key: NFKD with combining marks
/// dropped, lower-cased, internal whitespace collapsed to single spaces,
/// leading/trailing punctuation stripped.
///
/// Two raw strings with equal keys resolve to the same graph node. Returns
/// an empty string for input with no usable characters; callers that need a
/// node fall back to [`SENTINEL_KEY`] via [`resolve_key`].
pub fn normalize_key(raw: &str) -> String {
    let folded: String = raw
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    folded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_string()
}

/// Resolve a raw string to the `(key, display)` pair for an entity node of
/// the given kind. Empty or punctuation-only input resolves to the kind's
/// sentinel node rather than failing.
pub fn resolve_key(kind: EntityKind, raw: &str) -> (String, String) {
    let key = normalize_key(raw);
    if key.is_empty() {
        (SENTINEL_KEY.to_string(), kind.sentinel_display().to_string())
    } else {
        // Display keeps the raw casing but collapses stray whitespace.
        let display = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        (key, display)
    }
}

/// Content-addressed paper identity: the blake3 hash of the source file's
/// bytes. Independent of filename and metadata, so re-ingesting an unchanged
/// file always resolves to the same paper.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PaperId {
    hex: String,
}

impl PaperId {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            hex: blake3::hash(bytes).to_hex().to_string(),
        }
    }

    /// Rebuild an id from its stored hex form.
    pub fn from_hex(hex: &str) -> Self {
        Self {
            hex: hex.to_string(),
        }
    }

    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    /// The short hex prefix used for human display (e.g. "#a1b2c3d4e5f6").
    pub fn short(&self) -> &str {
        &self.hex[..12.min(self.hex.len())]
    }
}

impl std::fmt::Display for PaperId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.short())
    }
}

impl serde::Serialize for PaperId {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex)
    }
}
