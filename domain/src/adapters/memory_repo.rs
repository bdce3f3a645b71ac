use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::{LinkRepository, OwnerId, RepoError, ShortCode, ShortLink};

/// Simple in-memory repository for tests and local runs. Every operation runs
/// under one mutex, which makes insert and increment atomic.
pub struct InMemoryRepo {
    inner: Mutex<BTreeMap<String, ShortLink>>,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, ShortLink>>, RepoError> {
        self.inner
            .lock()
            .map_err(|_| RepoError::Backend("mutex poisoned".into()))
    }

    fn newest_first<'a>(
        links: impl Iterator<Item = &'a ShortLink>,
        limit: usize,
    ) -> Vec<ShortLink> {
        let mut items: Vec<_> = links.cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit);
        items
    }
}

impl Default for InMemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkRepository for InMemoryRepo {
    fn find_by_code(&self, code: &ShortCode) -> Result<Option<ShortLink>, RepoError> {
        Ok(self.lock()?.get(code.as_str()).cloned())
    }

    fn insert(&self, link: ShortLink) -> Result<(), RepoError> {
        let mut map = self.lock()?;
        let key = link.code.as_str().to_string();
        if map.contains_key(&key) {
            return Err(RepoError::Conflict);
        }
        map.insert(key, link);
        Ok(())
    }

    fn increment_clicks(&self, code: &ShortCode) -> Result<(), RepoError> {
        match self.lock()?.get_mut(code.as_str()) {
            Some(link) => {
                link.clicks += 1;
                Ok(())
            }
            None => Err(RepoError::Missing),
        }
    }

    fn list(&self, limit: usize) -> Result<Vec<ShortLink>, RepoError> {
        let map = self.lock()?;
        Ok(Self::newest_first(map.values(), limit))
    }

    fn list_by_owner(&self, owner: &OwnerId, limit: usize) -> Result<Vec<ShortLink>, RepoError> {
        let map = self.lock()?;
        Ok(Self::newest_first(
            map.values().filter(|l| l.owner.as_ref() == Some(owner)),
            limit,
        ))
    }
}
