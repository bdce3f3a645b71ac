use tracing::{debug, warn};

use crate::validate::{custom_code, normalize_target_url};
use crate::{
    Clock, CodeGenerator, CoreError, LinkRepository, NewLink, OwnerId, RepoError, ShortCode,
    ShortLink,
};

/// Default cap on generated candidates per `create`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1000;

/// Tunables for [`LinkService`].
#[derive(Clone, Copy, Debug)]
pub struct ServiceConfig {
    /// How many generated codes may collide before giving up with `Exhausted`.
    pub max_attempts: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Application service orchestrating creation and resolution of short links.
///
/// Generic over repository, code generator, and clock so every collaborator is
/// injected; the store is the only shared state and the single source of truth
/// for uniqueness and click counts.
pub struct LinkService<R: LinkRepository, G: CodeGenerator, C: Clock> {
    repo: R,
    codes: G,
    clock: C,
    config: ServiceConfig,
}

impl<R: LinkRepository, G: CodeGenerator, C: Clock> LinkService<R, G, C> {
    pub fn new(repo: R, codes: G, clock: C) -> Self {
        Self::with_config(repo, codes, clock, ServiceConfig::default())
    }

    pub fn with_config(repo: R, codes: G, clock: C, config: ServiceConfig) -> Self {
        Self {
            repo,
            codes,
            clock,
            config,
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Create a new short link.
    ///
    /// Writes to the store exactly once on success and never on failure.
    pub fn create(&self, input: NewLink) -> Result<ShortLink, CoreError> {
        let target_url = normalize_target_url(&input.target_url)?;

        if let Some(code) = custom_code(input.custom_code.as_deref()) {
            if self.repo.find_by_code(&code)?.is_some() {
                return Err(CoreError::DuplicateCode(code.as_str().to_string()));
            }
            let link = self.new_link(code, target_url, input.owner);
            return match self.repo.insert(link.clone()) {
                Ok(()) => Ok(link),
                // lost a race against a concurrent create with the same code
                Err(RepoError::Conflict) => {
                    Err(CoreError::DuplicateCode(link.code.as_str().to_string()))
                }
                Err(e) => Err(e.into()),
            };
        }

        for attempt in 1..=self.config.max_attempts {
            let code = self.codes.next_code();
            if self.repo.find_by_code(&code)?.is_some() {
                debug!(code = %code, attempt, "generated code collided");
                continue;
            }
            let link = self.new_link(code, target_url.clone(), input.owner.clone());
            match self.repo.insert(link.clone()) {
                Ok(()) => return Ok(link),
                Err(RepoError::Conflict) => {
                    debug!(code = %link.code, attempt, "generated code taken on insert");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(
            attempts = self.config.max_attempts,
            "could not find a free short code"
        );
        Err(CoreError::Exhausted {
            attempts: self.config.max_attempts,
        })
    }

    fn new_link(&self, code: ShortCode, target_url: String, owner: Option<OwnerId>) -> ShortLink {
        ShortLink::new(code, target_url, self.clock.now(), owner)
    }

    /// Resolve a code to its target URL, counting the visit.
    pub fn resolve(&self, code: &ShortCode) -> Result<String, CoreError> {
        let link = self.repo.find_by_code(code)?.ok_or(CoreError::NotFound)?;
        match self.repo.increment_clicks(code) {
            Ok(()) => Ok(link.target_url),
            Err(RepoError::Missing) => Err(CoreError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a link without counting a visit.
    pub fn get(&self, code: &ShortCode) -> Result<Option<ShortLink>, CoreError> {
        Ok(self.repo.find_by_code(code)?)
    }

    /// List short links, newest first, up to the given limit.
    pub fn list(&self, limit: usize) -> Result<Vec<ShortLink>, CoreError> {
        Ok(self.repo.list(limit)?)
    }

    /// List links created by `owner`, newest first.
    pub fn list_by_owner(&self, owner: &OwnerId, limit: usize) -> Result<Vec<ShortLink>, CoreError> {
        Ok(self.repo.list_by_owner(owner, limit)?)
    }
}
