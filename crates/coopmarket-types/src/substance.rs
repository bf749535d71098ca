//! Catalog substances and the regulatory flags that gate their trade.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::SubstanceId;

/// Regulatory authorization kinds for controlled substances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum AuthorizationKind {
    /// Health-authority special authorization (AE).
    Ae,
    /// Federal-police license (PF).
    Pf,
}

impl fmt::Display for AuthorizationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ae => write!(f, "AE"),
            Self::Pf => write!(f, "PF"),
        }
    }
}

/// Which authorizations a substance demands of both counter-parties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubstanceFlags {
    pub requires_ae: bool,
    pub requires_pf: bool,
}

impl SubstanceFlags {
    /// The authorization kinds these flags demand, AE first.
    #[must_use]
    pub fn required_kinds(&self) -> Vec<AuthorizationKind> {
        let mut kinds = Vec::with_capacity(2);
        if self.requires_ae {
            kinds.push(AuthorizationKind::Ae);
        }
        if self.requires_pf {
            kinds.push(AuthorizationKind::Pf);
        }
        kinds
    }

    #[must_use]
    pub fn is_controlled(&self) -> bool {
        self.requires_ae || self.requires_pf
    }
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substance {
    pub id: SubstanceId,
    pub name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(flatten)]
    pub flags: SubstanceFlags,
}

impl Substance {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: SubstanceId::new(id),
            name: name.into(),
            synonyms: Vec::new(),
            flags: SubstanceFlags::default(),
        }
    }

    #[must_use]
    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms = synonyms.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: SubstanceFlags) -> Self {
        self.flags = flags;
        self
    }
}
