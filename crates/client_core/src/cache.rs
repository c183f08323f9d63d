use std::collections::{HashMap, VecDeque};

use crate::{pagination::PageResult, query::PageParams};

pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// Last page received per parameter set. Entries are replaced wholesale and the
/// oldest insertion is evicted once `capacity` is exceeded.
#[derive(Debug)]
pub struct QueryCache<T> {
    capacity: usize,
    entries: HashMap<PageParams, PageResult<T>>,
    order: VecDeque<PageParams>,
}

impl<T: Clone> QueryCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, params: &PageParams) -> Option<&PageResult<T>> {
        self.entries.get(params)
    }

    pub fn insert(&mut self, params: PageParams, page: PageResult<T>) {
        if self.entries.insert(params.clone(), page).is_some() {
            self.order.retain(|existing| existing != &params);
        }
        self.order.push_back(params);

        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
