//! Sequence engine: grow ordered chains across two collections.

use tracing::debug;

use crate::collection::{Element, QueryCollection};
use crate::error::Result;

impl QueryCollection {
    /// Extends every chain of `self` by the earliest element of `next` that
    /// continues it.
    ///
    /// Elements of `self` that are not chains yet start a chain of one.
    /// `pred(tail, candidate)` receives the chain's last element. Chains that
    /// find no continuation are dropped, so the result is never longer than
    /// `self`.
    ///
    /// With `window = Some(w)` only `w` positions of `next` are scanned,
    /// starting at the position of the most recent successful match (0 before
    /// the first one). The start never moves backwards. A window covering all
    /// of `next` behaves exactly like `None`.
    pub fn seq<F>(&self, next: &QueryCollection, mut pred: F, window: Option<usize>) -> Result<QueryCollection>
    where
        F: FnMut(&Element, &Element) -> Result<bool>,
    {
        let candidates = next.elements();
        let window = window.filter(|w| *w < candidates.len());
        let mut cursor = 0usize;
        let mut tested = 0usize;
        let mut out = Vec::new();

        for element in self.iter() {
            let chain = as_chain(element);
            let Some(tail) = chain.last() else {
                continue;
            };

            let (start, end) = match window {
                Some(w) => (cursor, (cursor + w).min(candidates.len())),
                None => (0, candidates.len()),
            };

            let mut found = None;
            for (offset, candidate) in candidates[start..end].iter().enumerate() {
                tested += 1;
                if pred(tail, candidate)? {
                    found = Some(start + offset);
                    break;
                }
            }

            if let Some(pos) = found {
                if window.is_some() {
                    cursor = pos;
                }
                let mut elements = chain.into_elements();
                elements.push(candidates[pos].clone());
                out.push(Element::Chain(QueryCollection::new(elements)));
            }
        }

        debug!(
            chains = self.len(),
            candidates = candidates.len(),
            tested,
            matched = out.len(),
            window = ?window,
            "seq"
        );
        Ok(QueryCollection::new(out))
    }
}

fn as_chain(element: &Element) -> QueryCollection {
    match element.as_chain() {
        Some(chain) => chain.clone(),
        None => QueryCollection::new(vec![element.clone()]),
    }
}
