use crate::models::resume::RecordId;
use crate::reviews::display::DisplayRegistry;
use crate::reviews::reconcile::DisplayedReview;

/// The canonical in-memory collection. Replaced wholesale by reconciliation
/// and shrunk one review at a time by deletion; nothing else mutates it.
#[derive(Debug, Default)]
pub struct ReviewCollection {
    reviews: Vec<DisplayedReview>,
}

impl ReviewCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reviews(&self) -> &[DisplayedReview] {
        &self.reviews
    }

    pub fn get(&self, id: &RecordId) -> Option<&DisplayedReview> {
        self.reviews.iter().find(|r| &r.record.id == id)
    }

    /// Swaps in a fresh collection, releasing every preview the old one held.
    /// Returns the number of previews released.
    pub fn replace(&mut self, reviews: Vec<DisplayedReview>, registry: &DisplayRegistry) -> usize {
        let previous = std::mem::replace(&mut self.reviews, reviews);
        registry.release_all(previous.into_iter().filter_map(|r| r.preview))
    }

    /// Removes a review, keeping the order of the rest.
    pub fn take(&mut self, id: &RecordId) -> Option<DisplayedReview> {
        let pos = self.reviews.iter().position(|r| &r.record.id == id)?;
        Some(self.reviews.remove(pos))
    }

    /// Releases everything, e.g. on shutdown.
    pub fn clear(&mut self, registry: &DisplayRegistry) -> usize {
        self.replace(Vec::new(), registry)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::models::resume::ResumeRecord;

    fn review(id: &str, registry: &DisplayRegistry) -> DisplayedReview {
        DisplayedReview {
            record: ResumeRecord::decode(&format!(r#"{{"id":"{id}"}}"#)).unwrap(),
            storage_key: format!("resume:{id}"),
            preview: Some(registry.register(Bytes::from_static(b"png"))),
        }
    }

    #[test]
    fn test_replace_releases_previous_previews() {
        let registry = DisplayRegistry::new();
        let mut collection = ReviewCollection::new();
        collection.replace(vec![review("a", &registry), review("b", &registry)], &registry);
        assert_eq!(registry.live_count(), 2);

        let released = collection.replace(vec![review("c", &registry)], &registry);

        assert_eq!(released, 2);
        assert_eq!(registry.live_count(), 1);
        assert_eq!(collection.reviews().len(), 1);
        assert_eq!(collection.clear(&registry), 1);
    }

    #[test]
    fn test_take_preserves_order() {
        let registry = DisplayRegistry::new();
        let mut collection = ReviewCollection::new();
        collection.replace(
            vec![
                review("a", &registry),
                review("b", &registry),
                review("c", &registry),
            ],
            &registry,
        );

        let taken = collection.take(&RecordId::from("b")).unwrap();
        registry.release(taken.preview.unwrap());

        let ids: Vec<_> = collection
            .reviews()
            .iter()
            .map(|r| r.record.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(collection.take(&RecordId::from("b")).is_none());
        assert!(collection.get(&RecordId::from("c")).is_some());
        collection.clear(&registry);
    }
}
