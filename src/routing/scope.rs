//! Protocol scope kinds.
//!
//! # Responsibilities
//! - Name the protocol family of an inbound connection (HTTP or WebSocket)
//! - Classify a request from its headers
//! - Represent the set of scope kinds a mount accepts
//!
//! # Design Decisions
//! - An empty scope set means "accepts everything"
//! - A malformed `Upgrade` header classifies as `None`, never as an error

use std::fmt;
use std::str::FromStr;

use axum::http::{header, HeaderMap};
use serde::{Serialize, Serializer};

/// Protocol family of an inbound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Plain request/response traffic.
    Http,
    /// Bidirectional streaming after an HTTP upgrade.
    WebSocket,
}

impl ScopeKind {
    /// All known scope kinds, in declaration order.
    pub const ALL: [ScopeKind; 2] = [ScopeKind::Http, ScopeKind::WebSocket];

    /// Classify a request by its `Upgrade` header.
    ///
    /// Returns `None` when the header holds bytes that cannot be read as a
    /// token. Upgrades other than `websocket` are ignored and the request is
    /// treated as plain HTTP.
    pub fn classify(headers: &HeaderMap) -> Option<Self> {
        let Some(value) = headers.get(header::UPGRADE) else {
            return Some(ScopeKind::Http);
        };

        let token = value.to_str().ok()?;
        if token
            .split(',')
            .any(|t| t.trim().eq_ignore_ascii_case("websocket"))
        {
            Some(ScopeKind::WebSocket)
        } else {
            Some(ScopeKind::Http)
        }
    }

    /// The textual tag of this scope kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Http => "http",
            ScopeKind::WebSocket => "websocket",
        }
    }

    fn bit(self) -> u8 {
        match self {
            ScopeKind::Http => 0b01,
            ScopeKind::WebSocket => 0b10,
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a scope tag is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scope kind: {0:?}")]
pub struct UnknownScope(pub String);

impl FromStr for ScopeKind {
    type Err = UnknownScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("http") {
            Ok(ScopeKind::Http)
        } else if s.eq_ignore_ascii_case("websocket") {
            Ok(ScopeKind::WebSocket)
        } else {
            Err(UnknownScope(s.to_string()))
        }
    }
}

/// Set of scope kinds accepted by a mount.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeSet(u8);

impl ScopeSet {
    /// Accepts every scope kind.
    pub const ALL: ScopeSet = ScopeSet(0b11);
    /// Accepts plain HTTP only.
    pub const HTTP: ScopeSet = ScopeSet(0b01);
    /// Accepts WebSocket only.
    pub const WEBSOCKET: ScopeSet = ScopeSet(0b10);

    /// Build a set from the given kinds. An empty input yields [`ScopeSet::ALL`].
    pub fn of(kinds: impl IntoIterator<Item = ScopeKind>) -> Self {
        let bits = kinds.into_iter().fold(0u8, |acc, k| acc | k.bit());
        if bits == 0 {
            Self::ALL
        } else {
            Self(bits)
        }
    }

    /// Whether the set accepts connections of `kind`.
    pub fn contains(&self, kind: ScopeKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Whether the set accepts every kind.
    pub fn is_unrestricted(&self) -> bool {
        *self == Self::ALL
    }

    /// Iterate over the kinds in this set.
    pub fn iter(&self) -> impl Iterator<Item = ScopeKind> + '_ {
        ScopeKind::ALL.into_iter().filter(|k| self.contains(*k))
    }
}

impl Default for ScopeSet {
    fn default() -> Self {
        Self::ALL
    }
}

impl From<ScopeKind> for ScopeSet {
    fn from(kind: ScopeKind) -> Self {
        Self(kind.bit())
    }
}

impl fmt::Debug for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.iter().map(|k| k.as_str()).collect();
        f.write_str(&tags.join(","))
    }
}

impl Serialize for ScopeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(|k| k.as_str()))
    }
}
