//! Channel Cache and Category Index.
//!
//! Both are populated by a fetch and replaced wholesale by the next one;
//! nothing here patches individual entries.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::api::{Category, CategoryBatches, Channel, StreamType};

/// Full unfiltered channel corpus, the search space for global search
#[derive(Debug, Clone)]
pub struct ChannelCache {
    channels: Arc<[Channel]>,
}

impl Default for ChannelCache {
    fn default() -> Self {
        Self {
            channels: Arc::from(Vec::new()),
        }
    }
}

impl ChannelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, channels: Vec<Channel>) {
        self.channels = channels.into();
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn find_by_id(&self, id: i64) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn find_by_url(&self, url: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.url == url)
    }
}

/// Categories of all three content types, tagged with their source type
#[derive(Debug, Clone, Default)]
pub struct CategoryIndex {
    categories: Vec<Category>,
}

impl CategoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_batches(batches: CategoryBatches) -> Self {
        let CategoryBatches { live, movie, series } = batches;
        let mut categories = Vec::with_capacity(live.len() + movie.len() + series.len());
        categories.extend(live.into_iter().map(|c| c.tagged(StreamType::Live)));
        categories.extend(movie.into_iter().map(|c| c.tagged(StreamType::Movie)));
        categories.extend(series.into_iter().map(|c| c.tagged(StreamType::Series)));
        Self { categories }
    }

    /// Categories of one type, ordered by display name ignoring case.
    pub fn by_type(&self, kind: StreamType) -> Vec<&Category> {
        let mut out: Vec<&Category> = self.categories.iter().filter(|c| c.kind == kind).collect();
        out.sort_by(|a, b| compare_names(&a.category_name, &b.category_name));
        out
    }

    /// Type of a category id. Unknown ids are treated as live.
    pub fn type_of(&self, category_id: i64) -> StreamType {
        self.categories
            .iter()
            .find(|c| c.category_id == category_id)
            .map(|c| c.kind)
            .unwrap_or(StreamType::Live)
    }

    pub fn get(&self, kind: StreamType, category_id: i64) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.kind == kind && c.category_id == category_id)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
