use serde::{Deserialize, Serialize};

/// The fixed vocabulary of typed, directed edges between items.
///
/// Each kind has a single-character display symbol used by the line grammar
/// (`⊢[install_ide]`) and, where the vocabulary contains one, a semantic
/// inverse: `a REQUIRES b` states the same fact as `b BLOCKS a`, and
/// `a ANYOF b` the same as `b SUFFICIENT a`. TOGETHER and CONFLICTS are
/// symmetric. SUPERCHARGES and INDICATES have no converse symbol.
///
/// Only REQUIRES and ANYOF edges participate in the acyclicity invariant
/// enforced by the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    Requires,
    AnyOf,
    Supercharges,
    Indicates,
    Together,
    Conflicts,
    Blocks,
    Sufficient,
}

impl RelationKind {
    /// Every kind, in canonical (serialization) order.
    pub const ALL: [RelationKind; 8] = [
        Self::Requires,
        Self::AnyOf,
        Self::Supercharges,
        Self::Indicates,
        Self::Together,
        Self::Conflicts,
        Self::Blocks,
        Self::Sufficient,
    ];

    pub fn symbol(&self) -> char {
        match self {
            Self::Requires => '⊢',
            Self::AnyOf => '⋲',
            Self::Supercharges => '≫',
            Self::Indicates => '∴',
            Self::Together => '∪',
            Self::Conflicts => '⊟',
            Self::Blocks => '►',
            Self::Sufficient => '≻',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '⊢' => Some(Self::Requires),
            '⋲' => Some(Self::AnyOf),
            '≫' => Some(Self::Supercharges),
            '∴' => Some(Self::Indicates),
            '∪' => Some(Self::Together),
            '⊟' => Some(Self::Conflicts),
            '►' => Some(Self::Blocks),
            '≻' => Some(Self::Sufficient),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requires => "REQUIRES",
            Self::AnyOf => "ANYOF",
            Self::Supercharges => "SUPERCHARGES",
            Self::Indicates => "INDICATES",
            Self::Together => "TOGETHER",
            Self::Conflicts => "CONFLICTS",
            Self::Blocks => "BLOCKS",
            Self::Sufficient => "SUFFICIENT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "REQUIRES" => Some(Self::Requires),
            "ANYOF" => Some(Self::AnyOf),
            "SUPERCHARGES" => Some(Self::Supercharges),
            "INDICATES" => Some(Self::Indicates),
            "TOGETHER" => Some(Self::Together),
            "CONFLICTS" => Some(Self::Conflicts),
            "BLOCKS" => Some(Self::Blocks),
            "SUFFICIENT" => Some(Self::Sufficient),
            _ => None,
        }
    }

    /// Semantic inverse, when the vocabulary contains one.
    pub fn inverse(&self) -> Option<Self> {
        match self {
            Self::Requires => Some(Self::Blocks),
            Self::Blocks => Some(Self::Requires),
            Self::AnyOf => Some(Self::Sufficient),
            Self::Sufficient => Some(Self::AnyOf),
            Self::Together => Some(Self::Together),
            Self::Conflicts => Some(Self::Conflicts),
            Self::Supercharges | Self::Indicates => None,
        }
    }

    /// Whether edges of this kind are constrained to be acyclic.
    pub fn is_dependency(&self) -> bool {
        matches!(self, Self::Requires | Self::AnyOf)
    }
}
