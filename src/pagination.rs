//! Limit/offset pagination with `count/next/previous/results` envelopes.

use axum::http::Uri;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PageParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: usize,
    pub offset: usize,
}

impl PageParams {
    /// Falls back to `default_limit` when the limit is missing or zero.
    pub fn window(&self, default_limit: usize) -> Window {
        Window {
            limit: self.limit.filter(|l| *l > 0).unwrap_or(default_limit).max(1),
            offset: self.offset.unwrap_or(0),
        }
    }
}

impl Window {
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Builds the envelope; links keep every query parameter except limit/offset.
    pub fn new(count: usize, results: Vec<T>, window: Window, base_url: &str, uri: &Uri) -> Self {
        let next_offset = window.offset.saturating_add(window.limit);
        let next = (next_offset < count)
            .then(|| page_link(base_url, uri, window.limit, next_offset));
        let previous = (window.offset > 0).then(|| {
            let previous_offset = window.offset.saturating_sub(window.limit);
            page_link(base_url, uri, window.limit, previous_offset)
        });

        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

fn page_link(base_url: &str, uri: &Uri, limit: usize, offset: usize) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    if let Some(existing) = uri.query() {
        for (key, value) in form_urlencoded::parse(existing.as_bytes()) {
            if key != "limit" && key != "offset" {
                query.append_pair(&key, &value);
            }
        }
    }
    query.append_pair("limit", &limit.to_string());
    if offset > 0 {
        query.append_pair("offset", &offset.to_string());
    }

    format!(
        "{}{}?{}",
        base_url.trim_end_matches('/'),
        uri.path(),
        query.finish()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_defaults() {
        let params = PageParams::default();
        assert_eq!(params.window(6), Window { limit: 6, offset: 0 });

        let params = PageParams {
            limit: Some(0),
            offset: Some(4),
        };
        assert_eq!(params.window(6), Window { limit: 6, offset: 4 });
    }

    #[test]
    fn apply_slices() {
        let window = Window { limit: 2, offset: 1 };
        assert_eq!(window.apply(1..=5), vec![2, 3]);
    }

    #[test]
    fn links_keep_filters() {
        let uri: Uri = "/api/recipes/?tags=lunch&tags=dinner&limit=2&offset=2"
            .parse()
            .unwrap();
        let window = Window { limit: 2, offset: 2 };
        let page = Page::new(5, vec![3, 4], window, "http://localhost:8000", &uri);

        assert_eq!(
            page.next.as_deref(),
            Some("http://localhost:8000/api/recipes/?tags=lunch&tags=dinner&limit=2&offset=4")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("http://localhost:8000/api/recipes/?tags=lunch&tags=dinner&limit=2")
        );
    }

    #[test]
    fn last_page_has_no_next() {
        let uri: Uri = "/api/users/".parse().unwrap();
        let page = Page::new(3, vec![1, 2, 3], Window { limit: 6, offset: 0 }, "", &uri);
        assert!(page.next.is_none());
        assert!(page.previous.is_none());
    }

    #[test]
    fn huge_offsets_do_not_overflow() {
        let uri: Uri = "/api/users/?offset=18446744073709551615&limit=5".parse().unwrap();
        let params = PageParams {
            limit: Some(5),
            offset: Some(usize::MAX),
        };
        let window = params.window(6);
        assert!(window.apply(1..=3).is_empty());

        let page: Page<i32> = Page::new(3, Vec::new(), window, "", &uri);
        assert!(page.next.is_none());
        assert!(page.previous.is_some());

        let wide = Window {
            limit: usize::MAX,
            offset: 1,
        };
        assert!(Page::<i32>::new(3, Vec::new(), wide, "", &uri).next.is_none());
    }
}
