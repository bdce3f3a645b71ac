//! Domain library for the URL Shortener.
//!
//! Holds the domain types, ports (traits), and the error taxonomy shared by
//! adapters and apps. Keep IO concerns out of this crate: storage lives behind
//! [`LinkRepository`], randomness behind [`CodeGenerator`], time behind
//! [`Clock`].

use std::fmt::{Display, Formatter};
use std::time::SystemTime;

/// A short code identifying a link. Compared exactly (case-sensitive).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShortCode(String);

impl ShortCode {
    pub fn new<S: Into<String>>(s: S) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the user who created a link.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new<S: Into<String>>(s: S) -> Result<Self, CoreError> {
        let val = s.into();
        let trimmed = val.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidOwner);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Input data for creating a new short link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLink {
    pub target_url: String,
    /// Requested code. Blank values count as absent.
    pub custom_code: Option<String>,
    pub owner: Option<OwnerId>,
}

impl NewLink {
    pub fn new<S: Into<String>>(target_url: S) -> Self {
        Self {
            target_url: target_url.into(),
            custom_code: None,
            owner: None,
        }
    }

    pub fn with_custom_code<S: Into<String>>(mut self, code: S) -> Self {
        self.custom_code = Some(code.into());
        self
    }

    pub fn with_owner(mut self, owner: OwnerId) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// Stored short link mapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShortLink {
    pub code: ShortCode,
    pub target_url: String,
    /// Number of successful resolves. Only ever incremented by the store.
    pub clicks: u64,
    pub created_at: SystemTime,
    pub owner: Option<OwnerId>,
}

impl ShortLink {
    /// Create a new ShortLink with a zero click count.
    pub fn new(
        code: ShortCode,
        target_url: String,
        created_at: SystemTime,
        owner: Option<OwnerId>,
    ) -> Self {
        Self {
            code,
            target_url,
            clicks: 0,
            created_at,
            owner,
        }
    }

    /// Whether `owner` may see this link's analytics. Ownerless links are public.
    pub fn is_visible_to(&self, owner: Option<&OwnerId>) -> bool {
        match &self.owner {
            None => true,
            Some(o) => owner == Some(o),
        }
    }
}

/// Time source abstraction to make code testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall-clock [`Clock`] used by the binaries.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Source of candidate short codes. Uniqueness is checked by the service.
pub trait CodeGenerator: Send + Sync {
    fn next_code(&self) -> ShortCode;
}

/// Repository port for persisting and loading links.
///
/// Implementations must make `insert` an atomic check-and-insert and
/// `increment_clicks` an atomic increment; the service relies on both under
/// concurrent callers.
pub trait LinkRepository: Send + Sync {
    fn find_by_code(&self, code: &ShortCode) -> Result<Option<ShortLink>, RepoError>;
    /// Insert a new link, failing with [`RepoError::Conflict`] if the code is taken.
    fn insert(&self, link: ShortLink) -> Result<(), RepoError>;
    fn increment_clicks(&self, code: &ShortCode) -> Result<(), RepoError>;
    /// Newest links first.
    fn list(&self, limit: usize) -> Result<Vec<ShortLink>, RepoError>;
    /// Newest links of one owner first.
    fn list_by_owner(&self, owner: &OwnerId, limit: usize) -> Result<Vec<ShortLink>, RepoError>;
}

/// Errors reported by store adapters.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RepoError {
    #[error("unique constraint violated")]
    Conflict,
    #[error("no such record")]
    Missing,
    #[error("{0}")]
    Backend(String),
}

/// Why a target URL was rejected.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum UrlRejection {
    #[error("empty")]
    Empty,
    #[error("longer than {max} characters")]
    TooLong { max: usize },
    #[error("malformed: {0}")]
    Malformed(String),
    #[error("scheme '{0}' is not http or https")]
    UnsupportedScheme(String),
    #[error("missing host")]
    MissingHost,
}

/// Core domain errors. Each kind calls for a different reaction upstream, so
/// they are never collapsed into one another.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] UrlRejection),
    #[error("short code '{0}' is already taken")]
    DuplicateCode(String),
    #[error("no free short code after {attempts} attempts")]
    Exhausted { attempts: u32 },
    #[error("short code not found")]
    NotFound,
    #[error("invalid owner id")]
    InvalidOwner,
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl From<RepoError> for CoreError {
    fn from(e: RepoError) -> Self {
        CoreError::Persistence(e.to_string())
    }
}

/// Return a short about/version line for the binary to print.
pub fn about() -> String {
    let pkg = env!("CARGO_PKG_NAME");
    let ver = env!("CARGO_PKG_VERSION");
    format!("{} v{} - url shortener core", pkg, ver)
}

pub mod adapters;
pub mod codegen;
pub mod service;
pub mod validate;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_code_is_case_sensitive() {
        assert_ne!(ShortCode::new("abc123"), ShortCode::new("ABC123"));
        assert_eq!(ShortCode::new("abc123").as_str(), "abc123");
    }

    #[test]
    fn owner_id_rejects_blank() {
        assert!(OwnerId::new("alice").is_ok());
        assert_eq!(OwnerId::new("  bob ").unwrap().as_str(), "bob");
        assert!(matches!(OwnerId::new("   "), Err(CoreError::InvalidOwner)));
    }

    #[test]
    fn visibility_follows_owner() {
        let alice = OwnerId::new("alice").unwrap();
        let bob = OwnerId::new("bob").unwrap();
        let owned = ShortLink::new(
            ShortCode::new("a"),
            "https://e".into(),
            SystemTime::UNIX_EPOCH,
            Some(alice.clone()),
        );
        assert!(owned.is_visible_to(Some(&alice)));
        assert!(!owned.is_visible_to(Some(&bob)));
        assert!(!owned.is_visible_to(None));

        let public = ShortLink::new(
            ShortCode::new("b"),
            "https://e".into(),
            SystemTime::UNIX_EPOCH,
            None,
        );
        assert!(public.is_visible_to(None));
    }

    #[test]
    fn repo_errors_become_persistence() {
        let e: CoreError = RepoError::Backend("disk full".into()).into();
        assert!(matches!(e, CoreError::Persistence(ref m) if m == "disk full"));
    }
}
