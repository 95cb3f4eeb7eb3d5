//! # Element Store
//!
//! Content-addressed storage for decorated text snippets.
//!
//! An [`Element`] is an immutable (text, fill color) pair. The store
//! deduplicates by content: the same header text with the same fill,
//! encountered hundreds of times across a source grid, maps to a single
//! stable [`ElementId`]. Ids are UUIDv3 hashes of the content in the
//! store's namespace, so two importers reading the same semantic content
//! independently arrive at the same id — the property that makes JSON
//! round trips stable.
//!
//! The store keeps a forward map (id -> element) and an inverse map
//! (content key -> id) that are only ever updated together inside one
//! operation.

use crate::primitives::FILL_NONE;
use crate::types::{DecisError, ElementId};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

// =============================================================================
// ELEMENT
// =============================================================================

/// A referenceable atom of content with two dimensions: text and fill color.
///
/// Elements are immutable; "editing" one happens through
/// [`ElementStore::update`], which rebinds the id to new content.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Element {
    pub text: String,
    /// 8-hex-digit ARGB string. Anything else normalizes to [`FILL_NONE`].
    pub fill_color: String,
}

impl Element {
    /// Create an element, normalizing the fill color.
    #[must_use]
    pub fn new(text: impl Into<String>, fill_color: Option<&str>) -> Self {
        Self {
            text: text.into(),
            fill_color: normalize_fill(fill_color),
        }
    }

    /// The content key used for identity derivation and the inverse map.
    #[must_use]
    pub fn content_key(&self) -> String {
        format!("color[{}] text[{}]", self.fill_color, self.text)
    }
}

/// Normalize a fill color to an 8-hex-digit ARGB string.
fn normalize_fill(fill: Option<&str>) -> String {
    match fill {
        Some(f) if f.len() == 8 && f.chars().all(|c| c.is_ascii_hexdigit()) => {
            f.to_ascii_uppercase()
        }
        _ => FILL_NONE.to_string(),
    }
}

// =============================================================================
// ELEMENT STORE
// =============================================================================

/// A deduplicating, identity-assigning container of elements.
///
/// Invariant: for every id `k` in the store,
/// `index[elements[k].content_key()] == k`, and no two ids map to equal
/// content. Both maps are per-instance fields and are mutated only
/// together.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ElementStore {
    ns_uuid: Uuid,
    elements: BTreeMap<ElementId, Element>,
    index: BTreeMap<String, ElementId>,
}

impl ElementStore {
    /// Create an empty store with a fresh random namespace.
    #[must_use]
    pub fn new() -> Self {
        Self::with_namespace(Uuid::new_v4())
    }

    /// Create an empty store with a known namespace, as when re-importing
    /// a serialized document.
    #[must_use]
    pub fn with_namespace(ns_uuid: Uuid) -> Self {
        Self {
            ns_uuid,
            elements: BTreeMap::new(),
            index: BTreeMap::new(),
        }
    }

    /// The namespace UUID ids are derived in.
    #[must_use]
    pub const fn namespace(&self) -> Uuid {
        self.ns_uuid
    }

    /// Derive the content-addressed id for an element in this namespace.
    #[must_use]
    pub fn derive_id(&self, element: &Element) -> ElementId {
        ElementId(Uuid::new_v3(
            &self.ns_uuid,
            element.content_key().as_bytes(),
        ))
    }

    /// Look up or insert an element by content. Never produces two ids for
    /// equal content; calling twice with the same input returns the same id.
    pub fn get_or_create(&mut self, text: impl Into<String>, fill_color: Option<&str>) -> ElementId {
        let element = Element::new(text, fill_color);
        let key = element.content_key();
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = self.derive_id(&element);
        self.elements.insert(id, element);
        self.index.insert(key, id);
        id
    }

    /// Get an element by id.
    #[must_use]
    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    /// Rebind an id to new content. Passing `None` for the fill keeps the
    /// current fill color.
    ///
    /// Fails with [`DecisError::IdentityCollision`] if the new content
    /// already belongs to a *different* id; the caller must redirect
    /// references to the pre-existing id rather than have two identities
    /// silently merged.
    pub fn update(
        &mut self,
        id: ElementId,
        new_text: impl Into<String>,
        new_fill: Option<&str>,
    ) -> Result<(), DecisError> {
        let old = self
            .elements
            .get(&id)
            .ok_or(DecisError::ElementNotFound(id))?;

        let fill = match new_fill {
            Some(f) => normalize_fill(Some(f)),
            None => old.fill_color.clone(),
        };
        let replacement = Element::new(new_text, Some(&fill));
        let new_key = replacement.content_key();

        if let Some(&existing) = self.index.get(&new_key) {
            if existing != id {
                return Err(DecisError::IdentityCollision { existing });
            }
            // same id, same content: nothing to do
            return Ok(());
        }

        // Remove the old inverse entry and install both sides together.
        let old_key = old.content_key();
        self.index.remove(&old_key);
        self.index.insert(new_key, id);
        self.elements.insert(id, replacement);
        Ok(())
    }

    /// All ids whose text equals `text` exactly, any fill color.
    #[must_use]
    pub fn find(&self, text: &str) -> Vec<ElementId> {
        self.elements
            .iter()
            .filter(|(_, e)| e.text == text)
            .map(|(&id, _)| id)
            .collect()
    }

    /// Case-insensitive regex search over element text. When `within` is
    /// given, the result is intersected with that candidate set.
    pub fn search(
        &self,
        pattern: &str,
        within: Option<&BTreeSet<ElementId>>,
    ) -> Result<Vec<ElementId>, DecisError> {
        let re = regex::RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| DecisError::InvalidPattern(e.to_string()))?;

        Ok(self
            .elements
            .iter()
            .filter(|(id, e)| {
                re.is_match(&e.text) && within.is_none_or(|set| set.contains(*id))
            })
            .map(|(&id, _)| id)
            .collect())
    }

    /// Iterate over (id, element) in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &Element)> {
        self.elements.iter().map(|(&id, e)| (id, e))
    }

    /// Number of distinct elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the store holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Check the bidirectional-map invariant. Used by tests and the
    /// snapshot importer.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.elements.len() == self.index.len()
            && self
                .elements
                .iter()
                .all(|(id, e)| self.index.get(&e.content_key()) == Some(id))
    }
}

impl Default for ElementStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================
