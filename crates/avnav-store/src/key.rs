//! Key registry and wildcard matching.
//!
//! Keys are dot-separated strings like "gps.lat". A registered key is either
//! exact or a wildcard pattern where `*` stands for one whole segment:
//! - Exact: "gps.lat"
//! - Trailing wildcard: "gps.signalk.*" (also matches deeper keys)
//! - Mid-path wildcard: "sky.*.elevation"
//!
//! Matching is segment based without regex; the regex is only used once per
//! registration to validate the key's character set.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use parking_lot::RwLock;
use regex::Regex;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::model::RegisteredKey;

/// Allowed key syntax: segments of `[A-Za-z0-9_]` or a lone `*`.
pub const KEY_PATTERN: &str = r"^(\*|[A-Za-z0-9_]+)(\.(\*|[A-Za-z0-9_]+))*$";

fn key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(KEY_PATTERN).expect("KEY_PATTERN is a valid regex"))
}

/// Check a key against the allowed syntax.
pub fn validate_key(key: &str) -> Result<()> {
    if key_regex().is_match(key) {
        Ok(())
    } else {
        Err(StoreError::InvalidKey {
            key: key.to_string(),
            pattern: KEY_PATTERN,
        })
    }
}

pub fn is_wildcard(key: &str) -> bool {
    key.contains('*')
}

/// Match pre-split key segments against pre-split pattern segments.
///
/// - A key shorter than the pattern never matches.
/// - A key longer than the pattern matches only if the pattern ends in `*`
///   and the leading segments match; the trailing wildcard absorbs any
///   remaining depth.
/// - Otherwise segments are compared pairwise and `*` matches any one segment.
pub fn wildcard_match<K: AsRef<str>, P: AsRef<str>>(key: &[K], pattern: &[P]) -> bool {
    if key.len() < pattern.len() {
        return false;
    }
    if key.len() > pattern.len() && pattern.last().map(|p| p.as_ref()) != Some("*") {
        return false;
    }
    // zip stops at the pattern's end, leaving the extra depth to the trailing `*`
    key.iter()
        .zip(pattern.iter())
        .all(|(k, p)| p.as_ref() == "*" || k.as_ref() == p.as_ref())
}

/// True if `prefix` is `key` itself or a whole-segment prefix of it.
fn is_refinement(key: &str, prefix: &str) -> bool {
    key == prefix
        || (key.len() > prefix.len()
            && key.starts_with(prefix)
            && key.as_bytes()[prefix.len()] == b'.')
}

fn split(key: &str) -> Vec<&str> {
    key.split('.').collect()
}

#[derive(Debug, Clone)]
struct Descriptor {
    description: String,
    owner: String,
}

#[derive(Debug, Clone)]
struct WildcardKey {
    pattern: String,
    segments: Vec<String>,
    descriptor: Descriptor,
}

#[derive(Debug, Default)]
struct RegistryInner {
    exact: HashMap<String, Descriptor>,
    wildcards: Vec<WildcardKey>,
    /// Concrete keys already approved through a wildcard. Only grows; the key
    /// space is bounded by the registered wildcards.
    approved: HashSet<String>,
}

impl RegistryInner {
    /// Find a descriptor the new key overlaps with, in either direction.
    ///
    /// Exact keys clash when equal or when one is a segment prefix of the
    /// other. Wildcards clash only by matching.
    fn find_conflict(&self, key: &str, segments: &[&str]) -> Option<(String, String)> {
        if !is_wildcard(key) {
            for (existing, descriptor) in &self.exact {
                if is_refinement(key, existing) || is_refinement(existing, key) {
                    return Some((existing.clone(), descriptor.owner.clone()));
                }
            }
        }
        for wildcard in &self.wildcards {
            if wildcard_match(segments, &wildcard.segments) {
                return Some((wildcard.pattern.clone(), wildcard.descriptor.owner.clone()));
            }
        }
        if is_wildcard(key) {
            for (existing, descriptor) in &self.exact {
                if wildcard_match(&split(existing), segments) {
                    return Some((existing.clone(), descriptor.owner.clone()));
                }
            }
            for wildcard in &self.wildcards {
                if wildcard_match(&wildcard.segments, segments) {
                    return Some((wildcard.pattern.clone(), wildcard.descriptor.owner.clone()));
                }
            }
        }
        None
    }

    fn matching_wildcard(&self, key: &str) -> Option<&WildcardKey> {
        let segments = split(key);
        self.wildcards
            .iter()
            .find(|w| wildcard_match(&segments, &w.segments))
    }
}

/// Owns the key namespace: who may write which keys.
///
/// Registration normally happens at component startup but may interleave
/// with writes from sources that are already running.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    inner: RwLock<RegistryInner>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an exact key or wildcard pattern for `owner`.
    ///
    /// Fails with `InvalidKey` on bad syntax and with `KeyConflict` if the key
    /// overlaps any registered descriptor.
    pub fn register(&self, key: &str, description: &str, owner: &str) -> Result<()> {
        validate_key(key)?;
        let segments = split(key);
        let mut inner = self.inner.write();

        if let Some((existing, existing_owner)) = inner.find_conflict(key, &segments) {
            return Err(StoreError::KeyConflict {
                key: key.to_string(),
                existing,
                owner: existing_owner,
            });
        }

        let descriptor = Descriptor {
            description: description.to_string(),
            owner: owner.to_string(),
        };
        if is_wildcard(key) {
            inner.wildcards.push(WildcardKey {
                pattern: key.to_string(),
                segments: segments.iter().map(|s| s.to_string()).collect(),
                descriptor,
            });
        } else {
            inner.exact.insert(key.to_string(), descriptor);
        }
        debug!("registered key {} for {}", key, owner);
        Ok(())
    }

    /// Check whether a concrete key may be written.
    ///
    /// A first wildcard hit is cached so later checks are a set lookup.
    pub fn is_allowed(&self, key: &str) -> bool {
        if key.split('.').any(str::is_empty) {
            return false;
        }
        {
            let inner = self.inner.read();
            if inner.exact.contains_key(key) || inner.approved.contains(key) {
                return true;
            }
            if is_wildcard(key) || inner.matching_wildcard(key).is_none() {
                return false;
            }
        }
        self.inner.write().approved.insert(key.to_string());
        true
    }

    /// Owner of an exact key or of the wildcard authorizing it.
    pub fn owner(&self, key: &str) -> Option<String> {
        let inner = self.inner.read();
        if let Some(descriptor) = inner.exact.get(key) {
            return Some(descriptor.owner.clone());
        }
        inner
            .matching_wildcard(key)
            .map(|w| w.descriptor.owner.clone())
    }

    /// Snapshot of exact and wildcard descriptors, sorted by key.
    pub fn snapshot(&self) -> Vec<RegisteredKey> {
        let inner = self.inner.read();
        let mut keys: Vec<RegisteredKey> = inner
            .exact
            .iter()
            .map(|(key, d)| RegisteredKey {
                key: key.clone(),
                description: d.description.clone(),
                owner: d.owner.clone(),
                wildcard: false,
            })
            .chain(inner.wildcards.iter().map(|w| RegisteredKey {
                key: w.pattern.clone(),
                description: w.descriptor.description.clone(),
                owner: w.descriptor.owner.clone(),
                wildcard: true,
            }))
            .collect();
        keys.sort_by(|a, b| a.key.cmp(&b.key));
        keys
    }
}
