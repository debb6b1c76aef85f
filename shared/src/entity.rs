use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Which admin list, endpoint set and form schema is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    #[default]
    Users,
    ArtPieces,
}

impl EntityType {
    pub const ALL: [EntityType; 2] = [EntityType::Users, EntityType::ArtPieces];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::ArtPieces => "art_pieces",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// List/selection projection of a backend entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowItem {
    pub id: String,
    pub name: String,
    pub subtitle: Option<String>,
}

impl RowItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, subtitle: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            subtitle,
        }
    }

    /// Empty or whitespace-only ids stand for "unset" and must never reach the backend.
    #[must_use]
    pub fn has_valid_id(&self) -> bool {
        is_valid_id(&self.id)
    }
}

#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    !id.trim().is_empty()
}

/// Display fields to overwrite on one row; `None` leaves a field as is.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowPatch {
    pub name: Option<String>,
    pub subtitle: Option<String>,
}

impl RowPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.subtitle.is_none()
    }

    /// Field by field, keeps `self` and fills the gaps from `fallback`.
    #[must_use]
    pub fn or(self, fallback: RowPatch) -> RowPatch {
        RowPatch {
            name: self.name.or(fallback.name),
            subtitle: self.subtitle.or(fallback.subtitle),
        }
    }

    fn apply(&self, row: &mut RowItem) {
        if let Some(name) = &self.name {
            row.name.clone_from(name);
        }
        if let Some(subtitle) = &self.subtitle {
            row.subtitle = Some(subtitle.clone());
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityListCache {
    lists: HashMap<EntityType, Vec<RowItem>>,
}

impl EntityListCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self, entity: EntityType) -> &[RowItem] {
        self.lists
            .get(&entity)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn get(&self, entity: EntityType, id: &str) -> Option<&RowItem> {
        self.rows(entity).iter().find(|row| row.id == id)
    }

    pub fn contains(&self, entity: EntityType, id: &str) -> bool {
        self.get(entity, id).is_some()
    }

    /// Full refresh. Keeps the first row for any repeated id.
    pub fn replace_all(&mut self, entity: EntityType, rows: Vec<RowItem>) {
        let mut unique: Vec<RowItem> = Vec::with_capacity(rows.len());
        for row in rows {
            if unique.iter().any(|kept| kept.id == row.id) {
                warn!(%entity, id = %row.id, "dropping duplicate row id");
                continue;
            }
            unique.push(row);
        }
        debug!(%entity, count = unique.len(), "list replaced");
        self.lists.insert(entity, unique);
    }

    /// Returns false (and changes nothing) when `id` is not cached.
    pub fn patch_one(&mut self, entity: EntityType, id: &str, patch: &RowPatch) -> bool {
        let Some(row) = self
            .lists
            .get_mut(&entity)
            .and_then(|rows| rows.iter_mut().find(|row| row.id == id))
        else {
            debug!(%entity, id, "patch skipped, row not cached");
            return false;
        };
        patch.apply(row);
        true
    }

    /// Returns false (and changes nothing) when `id` is not cached.
    pub fn remove_one(&mut self, entity: EntityType, id: &str) -> bool {
        let Some(rows) = self.lists.get_mut(&entity) else {
            return false;
        };
        let before = rows.len();
        rows.retain(|row| row.id != id);
        before != rows.len()
    }

    pub fn clear(&mut self) {
        self.lists.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(id: &str, name: &str) -> RowItem {
        RowItem::new(id, name, Some(format!("{name} street")))
    }

    #[test]
    fn test_replace_all_dedups_ids() {
        let mut cache = EntityListCache::new();
        cache.replace_all(
            EntityType::Users,
            vec![row("1", "Ann"), row("2", "Bob"), row("1", "Impostor")],
        );

        let rows = cache.rows(EntityType::Users);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Ann");
        assert!(cache.rows(EntityType::ArtPieces).is_empty());
    }

    #[test]
    fn test_patch_one_updates_only_given_fields() {
        let mut cache = EntityListCache::new();
        cache.replace_all(EntityType::ArtPieces, vec![row("5", "Mural X")]);

        let patched = cache.patch_one(
            EntityType::ArtPieces,
            "5",
            &RowPatch {
                name: Some("Mural Y".into()),
                subtitle: None,
            },
        );

        assert!(patched);
        let item = cache.get(EntityType::ArtPieces, "5").unwrap();
        assert_eq!(item.name, "Mural Y");
        assert_eq!(item.subtitle.as_deref(), Some("Mural X street"));
    }

    #[test]
    fn test_patch_missing_id_is_noop() {
        let mut cache = EntityListCache::new();
        cache.replace_all(EntityType::Users, vec![row("1", "Ann")]);
        let before = cache.clone();

        assert!(!cache.patch_one(EntityType::Users, "9", &RowPatch::default()));
        assert!(!cache.patch_one(EntityType::ArtPieces, "1", &RowPatch::default()));
        assert_eq!(cache, before);
    }

    #[test]
    fn test_remove_on_empty_cache() {
        let mut cache = EntityListCache::new();
        assert!(!cache.remove_one(EntityType::ArtPieces, "1"));
    }

    #[test]
    fn test_placeholder_ids() {
        assert!(!RowItem::new("", "x", None).has_valid_id());
        assert!(!RowItem::new("  ", "x", None).has_valid_id());
        assert!(RowItem::new("0", "x", None).has_valid_id());
    }

    fn arb_entity() -> impl Strategy<Value = EntityType> {
        prop_oneof![Just(EntityType::Users), Just(EntityType::ArtPieces)]
    }

    proptest! {
        #[test]
        fn remove_one_drops_exactly_the_id(
            entity in arb_entity(),
            ids in proptest::collection::hash_set("[a-z0-9]{1,6}", 0..20),
            target in "[a-z0-9]{1,6}",
        ) {
            let rows: Vec<RowItem> = ids.iter().map(|id| row(id, "n")).collect();
            let mut cache = EntityListCache::new();
            cache.replace_all(entity, rows.clone());

            let present = ids.contains(&target);
            let removed = cache.remove_one(entity, &target);

            prop_assert_eq!(removed, present);
            if present {
                prop_assert_eq!(cache.rows(entity).len(), rows.len() - 1);
                prop_assert!(!cache.contains(entity, &target));
            } else {
                prop_assert_eq!(cache.rows(entity), rows.as_slice());
            }
        }
    }
}
