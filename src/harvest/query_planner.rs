//! Query planning for category harvests.
//!
//! This module turns a configured category name into the ordered sequence of
//! paged API requests that cover it. Planning is a pure function of the
//! configured page size and per-query result cap: no I/O happens here, and a
//! plan can be regenerated at any point of a restarted run.

use std::path::{Path, PathBuf};

/// One breed/class whose images are collected into its own output directory.
#[derive(Debug, Clone)]
pub struct Category {
    /// Display name as configured, used verbatim in queries.
    pub name: String,
    /// Filesystem-safe form of the name.
    pub slug: String,
    /// Directory the category's images land in.
    pub output_dir: PathBuf,
    /// Target image count, satisfied by pre-existing plus new files.
    pub quota: usize,
}

impl Category {
    pub fn new(name: &str, root_dir: &Path, quota: usize) -> Self {
        let slug = slugify(name);
        let output_dir = root_dir.join(&slug);
        Self {
            name: name.to_string(),
            slug,
            output_dir,
            quota,
        }
    }
}

/// A single page request against the search API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub query: String,
    /// 1-based result offset of the page.
    pub start_index: u32,
}

/// Plans the paged requests for each query string.
#[derive(Debug, Clone, Copy)]
pub struct QueryPlanner {
    page_size: u32,
    per_query_cap: u32,
}

impl QueryPlanner {
    pub fn new(page_size: u32, per_query_cap: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            per_query_cap,
        }
    }

    /// Returns the full page sequence for one query, bounded by the per-query
    /// result cap. Page `p` (0-based) starts at `p * page_size + 1`; the API
    /// indexes results from 1.
    pub fn plan(&self, query: &str) -> Vec<PageRequest> {
        let pages = self.per_query_cap.div_ceil(self.page_size);
        (0..pages)
            .map(|page| PageRequest {
                query: query.to_string(),
                start_index: page * self.page_size + 1,
            })
            .collect()
    }
}

/// Reduces a category name to a directory-safe slug: runs of characters that
/// are not alphanumeric collapse into a single space, case is preserved.
/// `"Chantilly-Tiffany"` becomes `"Chantilly Tiffany"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push(' ');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }
    slug
}
