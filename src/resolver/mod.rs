//! Entity resolution.
//!
//! Turns a free-form [`ChatReference`] into a [`ResolvedEntity`] by running a
//! short ordered sequence of lookup strategies against the remote directory:
//! cache, numeric ID variants, username, and finally a scan of the caller's
//! dialog list. The first hit wins; a miss reports every representation
//! attempted.

mod reference;

pub use reference::{
    ChatReference, has_supergroup_prefix, with_supergroup_prefix, without_supergroup_prefix,
};

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::directory::{Directory, RemoteError, ResolvedEntity};

/// Errors from a resolution attempt.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No strategy produced a match.
    #[error("no entity found, attempted: {}", attempted.join(", "))]
    NotFound {
        /// Every representation that was tried, for diagnostics.
        attempted: Vec<String>,
    },

    /// The directory failed in a way that is not a simple miss.
    #[error("directory error: {0}")]
    Remote(#[from] RemoteError),
}

/// Resolves chat references against a remote directory, caching hits for the
/// session.
///
/// The cache is append-only and keyed by every equivalent representation of
/// an entity, so resolving `1234` and `-1001234` converge on the same value.
pub struct Resolver<D> {
    directory: D,
    cache: Mutex<HashMap<String, ResolvedEntity>>,
}

impl<D: Directory> Resolver<D> {
    /// Creates a resolver over the given directory.
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the wrapped directory.
    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Resolves a reference, short-circuiting on the first strategy that
    /// succeeds.
    pub async fn resolve(&self, reference: &ChatReference) -> Result<ResolvedEntity, ResolveError> {
        let mut attempted = Vec::new();

        if let Some(entity) = self.lookup_cached(reference).await {
            trace!("cache hit for {}", reference);
            return Ok(entity);
        }

        // Numeric lookups: try every candidate representation.
        for candidate in reference.id_candidates() {
            attempted.push(candidate.to_string());
            match self.directory.entity_by_id(candidate).await {
                Ok(entity) => return Ok(self.remember(entity).await),
                Err(RemoteError::NotFound) => {}
                Err(RemoteError::Other(reason)) => {
                    debug!("id lookup {} failed: {}", candidate, reason);
                }
                Err(err) => return Err(err.into()),
            }
        }

        // Username lookup. Private invite slugs cannot resolve this way and
        // fall through to the dialog scan.
        if let ChatReference::Username(name) = reference {
            attempted.push(format!("@{name}"));
            match self.directory.entity_by_username(name).await {
                Ok(entity) => return Ok(self.remember(entity).await),
                Err(RemoteError::NotFound) => {}
                Err(RemoteError::Other(reason)) => {
                    debug!("username lookup @{} failed: {}", name, reason);
                }
                Err(err) => return Err(err.into()),
            }
        }

        // Fall back to scanning the caller's own chat list.
        attempted.push("dialog scan".to_owned());
        let dialogs = self.directory.dialogs().await?;
        for entity in dialogs {
            if reference_matches(reference, &entity) {
                debug!("resolved {} via dialog scan: {}", reference, entity.title);
                return Ok(self.remember(entity).await);
            }
        }

        Err(ResolveError::NotFound { attempted })
    }

    async fn lookup_cached(&self, reference: &ChatReference) -> Option<ResolvedEntity> {
        let cache = self.cache.lock().await;
        for key in reference_cache_keys(reference) {
            if let Some(entity) = cache.get(&key) {
                return Some(entity.clone());
            }
        }
        None
    }

    /// Stores the entity under every equivalent key and returns it.
    async fn remember(&self, entity: ResolvedEntity) -> ResolvedEntity {
        let mut cache = self.cache.lock().await;
        for key in entity_cache_keys(&entity) {
            cache.entry(key).or_insert_with(|| entity.clone());
        }
        entity
    }
}

/// Keys under which a reference may have been cached.
fn reference_cache_keys(reference: &ChatReference) -> Vec<String> {
    match reference {
        ChatReference::Id(_) => reference
            .id_candidates()
            .into_iter()
            .map(|id| id.to_string())
            .collect(),
        ChatReference::Username(name) => vec![name.clone()],
        ChatReference::InviteSlug(hash) => vec![hash.to_lowercase()],
    }
}

/// Keys under which a resolved entity is stored.
fn entity_cache_keys(entity: &ResolvedEntity) -> Vec<String> {
    let mut keys = vec![
        entity.id.to_string(),
        entity.id.unsigned_abs().to_string(),
    ];
    if let Some(prefixed) = with_supergroup_prefix(entity.id) {
        keys.push(prefixed.to_string());
    }
    if let Some(stripped) = without_supergroup_prefix(entity.id) {
        keys.push(stripped.to_string());
    }
    if let Some(name) = &entity.username {
        keys.push(name.to_lowercase());
    }
    keys
}

/// Whether a dialog entry matches the reference by ID, title, or username.
fn reference_matches(reference: &ChatReference, entity: &ResolvedEntity) -> bool {
    match reference {
        ChatReference::Id(_) => {
            let entity_forms = entity_cache_keys(entity);
            reference
                .id_candidates()
                .iter()
                .any(|candidate| entity_forms.contains(&candidate.to_string()))
        }
        ChatReference::Username(name) => {
            entity
                .username
                .as_deref()
                .is_some_and(|username| username.eq_ignore_ascii_case(name))
                || entity.title.eq_ignore_ascii_case(name)
        }
        ChatReference::InviteSlug(_) => false,
    }
}
