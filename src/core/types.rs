//! core::types
//!
//! Strong types for object ids and reference names.
//!
//! # Types
//!
//! - [`Oid`] - Content identifier (SHA-1 or SHA-256, hex)
//! - [`RefName`] - Validated full reference name (`refs/...`, `HEAD`)
//! - [`BranchName`] - Validated short branch name
//! - [`RefKind`] - Namespace a reference lives in
//!
//! # Validation
//!
//! Values are validated at construction time, so a resolver or tree walk
//! never has to re-check an id or a ref name it was handed.
//!
//! # Examples
//!
//! ```
//! use gitwork::core::types::{Oid, RefKind, RefName};
//!
//! let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
//! assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
//!
//! let tag = RefName::new("refs/tags/v1.0").unwrap();
//! assert_eq!(tag.kind(), RefKind::Tag);
//! assert_eq!(tag.shorthand(), "v1.0");
//!
//! assert!(Oid::new("not-a-sha").is_err());
//! assert!(RefName::new("refs/heads/bad..name").is_err());
//! ```

use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),
}

/// Namespace prefix for tags.
pub const TAGS_PREFIX: &str = "refs/tags/";
/// Namespace prefix for local branches.
pub const HEADS_PREFIX: &str = "refs/heads/";
/// Namespace prefix for remote-tracking branches.
pub const REMOTES_PREFIX: &str = "refs/remotes/";

/// A content identifier.
///
/// Equality is byte-wise over the lowercased hex form, so two ids compare
/// equal exactly when they name the same object.
///
/// # Example
///
/// ```
/// use gitwork::core::types::Oid;
///
/// let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
/// assert_eq!(oid.short(7), "abc123d");
/// assert_eq!(oid.hash_width(), 160);
/// assert!(Oid::zero().is_zero());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(String);

impl Oid {
    const ZERO_SHA1: &'static str = "0000000000000000000000000000000000000000";

    /// Create a new validated object id, normalized to lowercase.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` unless the input is 40 or 64 hex digits.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        Self::validate(&oid)?;
        Ok(Self(oid))
    }

    /// Check whether `text` would be accepted by [`Oid::new`].
    pub fn is_valid(text: &str) -> bool {
        Self::validate(text).is_ok()
    }

    /// The null id (40 zeros).
    pub fn zero() -> Self {
        Self(Self::ZERO_SHA1.to_string())
    }

    /// Check if this is the null id.
    pub fn is_zero(&self) -> bool {
        self.0.chars().all(|c| c == '0')
    }

    /// Width of the hash in bits (160 for SHA-1, 256 for SHA-256).
    pub fn hash_width(&self) -> usize {
        self.0.len() * 4
    }

    /// First `len` hex characters, or the full id if `len` is longer.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    fn validate(oid: &str) -> Result<(), TypeError> {
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(())
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Namespace of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RefKind {
    /// `refs/tags/*`
    Tag,
    /// `refs/heads/*`
    LocalBranch,
    /// `refs/remotes/*`
    RemoteBranch,
    /// Anything else (`HEAD`, `refs/notes/*`, ...)
    Other,
}

impl RefKind {
    /// Namespace prefix, if the kind has one.
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            RefKind::Tag => Some(TAGS_PREFIX),
            RefKind::LocalBranch => Some(HEADS_PREFIX),
            RefKind::RemoteBranch => Some(REMOTES_PREFIX),
            RefKind::Other => None,
        }
    }
}

/// A validated full reference name.
///
/// Ordering is lexicographic on the full name; the resolver's tie-breaks
/// rely on that.
///
/// # Example
///
/// ```
/// use gitwork::core::types::{BranchName, RefKind, RefName};
///
/// let branch = BranchName::new("feature/foo").unwrap();
/// let refname = RefName::for_branch(&branch);
/// assert_eq!(refname.as_str(), "refs/heads/feature/foo");
/// assert_eq!(refname.kind(), RefKind::LocalBranch);
/// assert_eq!(refname.shorthand(), "feature/foo");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefName(String);

impl RefName {
    /// Create a new validated ref name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` if the name violates refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        check_ref_format(&name, "ref name").map_err(TypeError::InvalidRefName)?;
        if name.starts_with('/') {
            return Err(TypeError::InvalidRefName(
                "ref name cannot start with '/'".into(),
            ));
        }
        Ok(Self(name))
    }

    /// `refs/heads/<branch>`
    pub fn for_branch(branch: &BranchName) -> Self {
        Self(format!("{}{}", HEADS_PREFIX, branch.as_str()))
    }

    /// Namespace this ref lives in.
    pub fn kind(&self) -> RefKind {
        if self.0.starts_with(TAGS_PREFIX) {
            RefKind::Tag
        } else if self.0.starts_with(HEADS_PREFIX) {
            RefKind::LocalBranch
        } else if self.0.starts_with(REMOTES_PREFIX) {
            RefKind::RemoteBranch
        } else {
            RefKind::Other
        }
    }

    /// Name with the namespace prefix removed (`refs/remotes/origin/x` -> `origin/x`).
    pub fn shorthand(&self) -> &str {
        self.kind()
            .prefix()
            .and_then(|p| self.0.strip_prefix(p))
            .unwrap_or(&self.0)
    }

    /// Strip a prefix from the ref name and return the remainder.
    pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
        self.0.strip_prefix(prefix)
    }

    /// Get the ref name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RefName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RefName> for String {
    fn from(name: RefName) -> Self {
        name.0
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated short branch name (no `refs/heads/` prefix).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates refname rules,
    /// starts with `-`, or is exactly `@`.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name == "@" {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be '@' (reserved)".into(),
            ));
        }
        if name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '-'".into(),
            ));
        }
        check_ref_format(&name, "branch name").map_err(TypeError::InvalidBranchName)?;
        Ok(Self(name))
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rules shared by ref and branch names (see `git check-ref-format`).
fn check_ref_format(name: &str, what: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("{what} cannot be empty"));
    }
    if name.ends_with('/') {
        return Err(format!("{what} cannot end with '/'"));
    }
    for bad in ["..", "@{", "//"] {
        if name.contains(bad) {
            return Err(format!("{what} cannot contain '{bad}'"));
        }
    }

    const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
    if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
        return Err(format!("{what} cannot contain '{c}'"));
    }
    if name.chars().any(|c| c.is_ascii_control()) {
        return Err(format!("{what} cannot contain control characters"));
    }

    for component in name.split('/').filter(|c| !c.is_empty()) {
        if component.starts_with('.') {
            return Err("path component cannot start with '.'".into());
        }
        if component.ends_with(".lock") {
            return Err("path component cannot end with '.lock'".into());
        }
    }

    Ok(())
}
