/// Marker synchronizer
///
/// Keeps the markers shown by a MapWidget in exact correspondence with the
/// current set of find records. Markers are keyed by find id: a marker is
/// created when an unseen id appears and destroyed when a mapped id
/// disappears. A find whose id is already mapped is left untouched, since
/// lat/lng/rock_type are immutable once a find exists.
///
/// Runs only on the UI event loop, so a reconcile pass never races with
/// itself.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::finds::Find;
use crate::map::MapWidget;

/// Registry of live markers, keyed by find id.
///
/// Owns the widget's native handle for every marker it created; handles are
/// handed back to the widget for explicit removal before the entry is
/// dropped.
pub struct MarkerSynchronizer<H> {
    markers: HashMap<Uuid, H>,
}

impl<H> MarkerSynchronizer<H> {
    pub fn new() -> Self {
        MarkerSynchronizer {
            markers: HashMap::new(),
        }
    }

    /// Number of markers currently displayed
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Reconcile the widget's marker set against `finds`.
    ///
    /// 1. Remove markers whose find id is absent from `finds`
    /// 2. Add markers for finds whose id is not yet mapped
    /// 3. Leave already-mapped ids untouched
    ///
    /// The caller must not invoke this before the widget is ready.
    pub fn reconcile<W>(&mut self, finds: &[Find], widget: &mut W)
    where
        W: MapWidget<Handle = H>,
    {
        let ids: HashSet<Uuid> = finds.iter().map(|f| f.id).collect();

        // Remove markers whose find no longer exists (deleted or filtered out)
        let stale: Vec<Uuid> = self
            .markers
            .keys()
            .filter(|id| !ids.contains(id))
            .copied()
            .collect();
        for id in stale {
            if let Some(handle) = self.markers.remove(&id) {
                widget.remove_marker(handle);
            }
        }

        // Add markers for unseen finds
        for find in finds {
            if !self.markers.contains_key(&find.id) {
                let handle = widget.add_marker(find);
                self.markers.insert(find.id, handle);
            }
        }
    }

    /// Remove every marker (e.g. on sign-out)
    pub fn clear<W>(&mut self, widget: &mut W)
    where
        W: MapWidget<Handle = H>,
    {
        for (_, handle) in self.markers.drain() {
            widget.remove_marker(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finds::RockType;
    use chrono::Utc;

    /// Records every add/remove call and hands out sequential handles
    struct FakeWidget {
        next_handle: u32,
        added: Vec<(u32, Find)>,
        removed: Vec<u32>,
    }

    impl FakeWidget {
        fn new() -> Self {
            FakeWidget {
                next_handle: 0,
                added: Vec::new(),
                removed: Vec::new(),
            }
        }
    }

    impl MapWidget for FakeWidget {
        type Handle = u32;

        fn add_marker(&mut self, find: &Find) -> u32 {
            let handle = self.next_handle;
            self.next_handle += 1;
            self.added.push((handle, find.clone()));
            handle
        }

        fn remove_marker(&mut self, handle: u32) {
            self.removed.push(handle);
        }
    }

    fn find(rock_type: RockType, lat: f64, lng: f64) -> Find {
        Find {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            rock_type,
            note: None,
            photo_path: "test/photo.jpg".to_string(),
            lat,
            lng,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_adding_one_find_adds_one_marker() {
        let mut widget = FakeWidget::new();
        let mut sync = MarkerSynchronizer::new();

        let mut finds = vec![find(RockType::Quartz, 45.0, -85.0)];
        sync.reconcile(&finds, &mut widget);
        assert_eq!(widget.added.len(), 1);

        let added = find(RockType::Agate, 44.2, -86.1);
        finds.push(added.clone());
        sync.reconcile(&finds, &mut widget);

        // Exactly one marker added, none removed
        assert_eq!(widget.added.len(), 2);
        assert!(widget.removed.is_empty());
        let (_, last) = widget.added.last().unwrap();
        assert_eq!(last.id, added.id);
        assert_eq!((last.lat, last.lng), (44.2, -86.1));
        assert_eq!(last.rock_type, RockType::Agate);
    }

    #[test]
    fn test_removing_one_find_removes_its_marker() {
        let mut widget = FakeWidget::new();
        let mut sync = MarkerSynchronizer::new();

        let keep = find(RockType::Petoskey, 45.0, -85.0);
        let drop = find(RockType::Copper, 46.0, -87.0);
        sync.reconcile(&[keep.clone(), drop.clone()], &mut widget);

        let drop_handle = widget
            .added
            .iter()
            .find(|(_, f)| f.id == drop.id)
            .map(|(h, _)| *h)
            .unwrap();

        sync.reconcile(&[keep], &mut widget);

        assert_eq!(widget.removed, vec![drop_handle]);
        assert_eq!(widget.added.len(), 2);
        assert_eq!(sync.marker_count(), 1);
    }

    #[test]
    fn test_unchanged_collection_is_idempotent() {
        let mut widget = FakeWidget::new();
        let mut sync = MarkerSynchronizer::new();

        let finds = vec![
            find(RockType::Quartz, 45.0, -85.0),
            find(RockType::Other, 44.0, -84.0),
        ];
        sync.reconcile(&finds, &mut widget);
        let handles_before: HashMap<Uuid, u32> = widget
            .added
            .iter()
            .map(|(h, f)| (f.id, *h))
            .collect();

        sync.reconcile(&finds, &mut widget);
        sync.reconcile(&finds, &mut widget);

        // No adds, no removes, and every id still maps to its original handle
        assert_eq!(widget.added.len(), 2);
        assert!(widget.removed.is_empty());
        for (id, handle) in &handles_before {
            assert_eq!(sync.markers.get(id), Some(handle));
        }
    }

    #[test]
    fn test_five_distinct_finds_make_five_markers() {
        let mut widget = FakeWidget::new();
        let mut sync = MarkerSynchronizer::new();

        let finds: Vec<Find> = (0..5)
            .map(|i| find(RockType::Other, 44.0 + i as f64 * 0.1, -85.0))
            .collect();
        sync.reconcile(&finds, &mut widget);

        assert_eq!(sync.marker_count(), 5);
        assert_eq!(widget.added.len(), 5);
        let unique_ids: HashSet<Uuid> = sync.markers.keys().copied().collect();
        assert_eq!(unique_ids.len(), 5);
    }

    #[test]
    fn test_clear_removes_everything() {
        let mut widget = FakeWidget::new();
        let mut sync = MarkerSynchronizer::new();

        let finds = vec![
            find(RockType::Quartz, 45.0, -85.0),
            find(RockType::Copper, 44.0, -84.0),
        ];
        sync.reconcile(&finds, &mut widget);
        sync.clear(&mut widget);

        assert_eq!(sync.marker_count(), 0);
        assert_eq!(widget.removed.len(), 2);
    }
}
