//! Radix tree node.
//!
//! Each node is one path segment. Children are tried static first, then the
//! parameter child, then the wildcard child.

use crate::method_router::MethodRouter;
use crate::params::Params;

/// Kind of path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SegmentKind {
    /// Literal segment (e.g. `users`).
    Static,
    /// Named parameter (e.g. `{id}`).
    Param(String),
    /// Catch-all, last segment only (e.g. `*path`).
    Wildcard(String),
}

/// A node in the radix tree.
pub(crate) struct Node<H> {
    segment: String,
    kind: SegmentKind,
    methods: Option<MethodRouter<H>>,
    /// Sorted by segment for binary search.
    static_children: Vec<Node<H>>,
    param_child: Option<Box<Node<H>>>,
    wildcard_child: Option<Box<Node<H>>>,
}

impl<H> Node<H> {
    fn new(segment: String, kind: SegmentKind) -> Self {
        Self {
            segment,
            kind,
            methods: None,
            static_children: Vec::new(),
            param_child: None,
            wildcard_child: None,
        }
    }

    pub(crate) fn root() -> Self {
        Self::new(String::new(), SegmentKind::Static)
    }

    /// Inserts `methods` at `path`, merging with methods already there.
    pub(crate) fn insert(&mut self, path: &str, methods: MethodRouter<H>) {
        let segments = parse_path(path);
        self.insert_segments(&segments, methods);
    }

    fn insert_segments(&mut self, segments: &[(String, SegmentKind)], methods: MethodRouter<H>) {
        let Some(((segment, kind), remaining)) = segments.split_first() else {
            match &mut self.methods {
                Some(existing) => existing.merge(methods),
                None => self.methods = Some(methods),
            }
            return;
        };

        match kind {
            SegmentKind::Static => {
                let index = match self
                    .static_children
                    .binary_search_by(|c| c.segment.as_str().cmp(segment))
                {
                    Ok(index) => index,
                    Err(index) => {
                        self.static_children
                            .insert(index, Node::new(segment.clone(), SegmentKind::Static));
                        index
                    }
                };
                self.static_children[index].insert_segments(remaining, methods);
            }
            SegmentKind::Param(name) => {
                let child = self
                    .param_child
                    .get_or_insert_with(|| Box::new(Node::new(segment.clone(), kind.clone())));
                assert!(
                    child.kind == *kind,
                    "conflicting parameter names at {segment}: already {}",
                    child.segment
                );
                child.insert_segments(remaining, methods);
            }
            SegmentKind::Wildcard(_) => {
                assert!(
                    remaining.is_empty(),
                    "wildcard must be the last segment in path"
                );
                self.wildcard_child
                    .get_or_insert_with(|| Box::new(Node::new(segment.clone(), kind.clone())))
                    .insert_segments(remaining, methods);
            }
        }
    }

    /// Finds the node for `path`, collecting parameters along the way.
    pub(crate) fn match_path(&self, path: &str) -> Option<(&MethodRouter<H>, Params)> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = Params::new();
        let methods = self.match_segments(&segments, &mut params)?;
        Some((methods, params))
    }

    fn match_segments<'a>(
        &'a self,
        segments: &[&str],
        params: &mut Params,
    ) -> Option<&'a MethodRouter<H>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.methods.as_ref();
        };

        if let Some(child) = self.find_static_child(segment) {
            if let Some(found) = child.match_segments(remaining, params) {
                return Some(found);
            }
        }

        if let Some(child) = &self.param_child {
            if let SegmentKind::Param(name) = &child.kind {
                let mark = params.len();
                params.push(name.clone(), unescape(segment));
                if let Some(found) = child.match_segments(remaining, params) {
                    return Some(found);
                }
                params.truncate(mark);
            }
        }

        if let Some(child) = &self.wildcard_child {
            if let SegmentKind::Wildcard(name) = &child.kind {
                if let Some(methods) = &child.methods {
                    params.push(name.clone(), unescape(&segments.join("/")));
                    return Some(methods);
                }
            }
        }

        None
    }

    fn find_static_child(&self, segment: &str) -> Option<&Node<H>> {
        self.static_children
            .binary_search_by(|c| c.segment.as_str().cmp(segment))
            .ok()
            .map(|i| &self.static_children[i])
    }
}

/// Percent-decodes a captured segment; invalid UTF-8 keeps the raw text.
fn unescape(segment: &str) -> String {
    urlencoding::decode(segment).map_or_else(|_| segment.to_string(), |s| s.into_owned())
}

/// Splits a pattern into typed segments.
pub(crate) fn parse_path(path: &str) -> Vec<(String, SegmentKind)> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if let Some(name) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                (s.to_string(), SegmentKind::Param(name.to_string()))
            } else if let Some(name) = s.strip_prefix('*') {
                (s.to_string(), SegmentKind::Wildcard(name.to_string()))
            } else {
                (s.to_string(), SegmentKind::Static)
            }
        })
        .collect()
}
