// src/page.rs
use serde::{Deserialize, Serialize};

pub const MAX_PAGE_SIZE: u32 = 100;

/// 1-based page selector. Out-of-range values are pulled into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            items,
            pagination: Pagination {
                page: request.page(),
                limit: request.limit(),
                total,
                pages: total.div_ceil(request.limit() as u64),
            },
        }
    }

    /// Slice one page out of an already ordered collection.
    pub fn from_sorted(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.limit() as usize)
            .collect();
        Self::new(items, request, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_clamps() {
        let request = PageRequest::new(0, 1_000);
        assert_eq!(request.page(), 1);
        assert_eq!(request.limit(), MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(3, 0).limit(), 1);
        assert_eq!(PageRequest::new(3, 10).offset(), 20);
    }

    #[test]
    fn test_from_sorted() {
        let page = Page::from_sorted((1..=25).collect::<Vec<u32>>(), PageRequest::new(3, 10));
        assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.pagination.total, 25);
        assert_eq!(page.pagination.pages, 3);

        let empty = Page::from_sorted(Vec::<u32>::new(), PageRequest::new(1, 10));
        assert!(empty.items.is_empty());
        assert_eq!(empty.pagination.pages, 0);
    }
}
