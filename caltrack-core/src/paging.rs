//! Page-bounded bulk fetching.
//!
//! A hard page cap stops runaway pagination. Hitting the cap or a failing
//! page ends the fetch early; whatever was collected is still returned.

use std::future::Future;

use tracing::{debug, warn};

use crate::error::CalTrackResult;

/// One page of a bulk fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

/// Anything that can serve numbered pages, starting at 0.
pub trait PageSource {
    type Item;

    fn fetch_page(&self, page: usize) -> impl Future<Output = CalTrackResult<Page<Self::Item>>>;
}

/// Everything collected by [`collect_pages`].
#[derive(Debug, Clone, PartialEq)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub pages: usize,
    pub cap_reached: bool,
    /// Message of the page fetch that ended collection, if any.
    pub error: Option<String>,
}

impl<T> Paged<T> {
    /// True when every page was fetched.
    pub fn is_complete(&self) -> bool {
        !self.cap_reached && self.error.is_none()
    }
}

pub async fn collect_pages<S: PageSource>(source: &S, max_pages: usize) -> Paged<S::Item> {
    let mut paged = Paged {
        items: Vec::new(),
        pages: 0,
        cap_reached: false,
        error: None,
    };

    loop {
        if paged.pages >= max_pages {
            warn!(max_pages, items = paged.items.len(), "Page cap reached, results may be incomplete");
            paged.cap_reached = true;
            break;
        }

        match source.fetch_page(paged.pages).await {
            Ok(page) => {
                debug!(page = paged.pages, items = page.items.len(), "Fetched page");
                paged.pages += 1;
                paged.items.extend(page.items);
                if !page.has_more {
                    break;
                }
            }
            Err(e) => {
                warn!(page = paged.pages, error = %e, "Page fetch failed, keeping partial results");
                paged.error = Some(e.to_string());
                break;
            }
        }
    }

    paged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalTrackError;

    /// Serves `total` pages of two items; fails at `fail_at`.
    struct Pages {
        total: usize,
        fail_at: Option<usize>,
    }

    impl PageSource for Pages {
        type Item = usize;

        async fn fetch_page(&self, page: usize) -> CalTrackResult<Page<usize>> {
            if self.fail_at == Some(page) {
                return Err(CalTrackError::Lookup("429 Too Many Requests".into()));
            }
            Ok(Page {
                items: vec![page * 2, page * 2 + 1],
                has_more: page + 1 < self.total,
            })
        }
    }

    #[tokio::test]
    async fn test_collects_until_last_page() {
        let paged = collect_pages(&Pages { total: 3, fail_at: None }, 50).await;
        assert_eq!(paged.items, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(paged.pages, 3);
        assert!(paged.is_complete());
    }

    #[tokio::test]
    async fn test_cap_is_reported_not_fatal() {
        let paged = collect_pages(&Pages { total: 10, fail_at: None }, 2).await;
        assert_eq!(paged.items.len(), 4);
        assert!(paged.cap_reached);
        assert!(!paged.is_complete());
    }

    #[tokio::test]
    async fn test_failed_page_truncates() {
        let paged = collect_pages(&Pages { total: 5, fail_at: Some(2) }, 50).await;
        assert_eq!(paged.items, vec![0, 1, 2, 3]);
        assert!(paged.error.as_deref().unwrap().contains("429"));
        assert!(!paged.cap_reached);
    }
}
