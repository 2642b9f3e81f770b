// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page selection: turns user-supplied range and order specifications into
// validated sequences of zero-based page indices.

use std::collections::BTreeSet;

use blattwerk_core::SourceRef;
use blattwerk_core::error::{BlattwerkError, Result};
use tracing::{debug, instrument};

/// An ordered sequence of zero-based page indices, each below the page count
/// of the document it was validated against. Duplicates are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageIndexSet(Vec<usize>);

impl PageIndexSet {
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    /// Address these pages within source document number `source`.
    pub fn to_source_refs(&self, source: usize) -> Vec<SourceRef> {
        self.0.iter().map(|&page| SourceRef::new(source, page)).collect()
    }
}

/// Parses page range (`"1-3,5,8-10"`) and page order (`"[2,0,1]"`) specs.
pub struct PageSelector;

impl PageSelector {
    /// Parse a comma-separated list of 1-based page numbers and inclusive
    /// `N-M` ranges.
    ///
    /// The result is de-duplicated and in ascending order. Page numbers
    /// outside `1..=page_count` are dropped, and a range whose end precedes
    /// its start selects nothing. A token that is not an integer or range
    /// fails with [`BlattwerkError::InvalidRange`].
    #[instrument(skip(spec), fields(spec_len = spec.len()))]
    pub fn parse_range(spec: &str, page_count: usize) -> Result<PageIndexSet> {
        if spec.trim().is_empty() {
            return Err(BlattwerkError::InvalidInput("missing page range".into()));
        }

        let last_page = page_count as u64;
        let mut selected = BTreeSet::new();

        for raw in spec.split(',') {
            let token = raw.trim();
            if token.is_empty() {
                return Err(BlattwerkError::InvalidRange(format!(
                    "empty entry in {spec:?}"
                )));
            }

            match token.split_once('-') {
                Some((start, end)) => {
                    let start = parse_page_number(start, token)?;
                    let end = parse_page_number(end, token)?;
                    if end < start {
                        debug!(token, "descending range selects no pages");
                        continue;
                    }
                    for number in start.max(1)..=end.min(last_page) {
                        selected.insert((number - 1) as usize);
                    }
                }
                None => {
                    let number = parse_page_number(token, token)?;
                    if (1..=last_page).contains(&number) {
                        selected.insert((number - 1) as usize);
                    } else {
                        debug!(number, page_count, "dropping page outside document");
                    }
                }
            }
        }

        debug!(selected = selected.len(), "page range parsed");
        Ok(PageIndexSet(selected.into_iter().collect()))
    }

    /// Parse a JSON array of zero-based page indices, keeping the caller's
    /// order. Any index outside `0..page_count` fails with
    /// [`BlattwerkError::OutOfBounds`].
    #[instrument(skip(order_json), fields(json_len = order_json.len()))]
    pub fn parse_order(order_json: &str, page_count: usize) -> Result<PageIndexSet> {
        if order_json.trim().is_empty() {
            return Err(BlattwerkError::InvalidInput("missing page order".into()));
        }
        let indices: Vec<i64> = serde_json::from_str(order_json).map_err(|err| {
            BlattwerkError::InvalidInput(format!(
                "page order must be a JSON array of page indices: {err}"
            ))
        })?;
        Self::validate_order(&indices, page_count)
    }

    /// Bounds-check an explicit page order.
    pub fn validate_order(indices: &[i64], page_count: usize) -> Result<PageIndexSet> {
        if indices.is_empty() {
            return Err(BlattwerkError::InvalidInput("page order is empty".into()));
        }

        let mut pages = Vec::with_capacity(indices.len());
        for &index in indices {
            match usize::try_from(index) {
                Ok(page) if page < page_count => pages.push(page),
                _ => return Err(BlattwerkError::OutOfBounds { index, page_count }),
            }
        }
        Ok(PageIndexSet(pages))
    }

    /// Every page of a document, in order.
    pub fn all(page_count: usize) -> PageIndexSet {
        PageIndexSet((0..page_count).collect())
    }
}

fn parse_page_number(text: &str, token: &str) -> Result<u64> {
    text.trim()
        .parse::<u64>()
        .map_err(|_| BlattwerkError::InvalidRange(format!("{token:?} is not a page number or range")))
}
