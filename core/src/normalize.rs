//! Turns the API's flat error lists into something forms can display.
//!
//! # Design
//! `normalize` builds a tree keyed by field path so nested form state can look
//! up the message for `subnets[2].ipv4` directly. Object vs array nodes are
//! decided per segment from the parsed path; arrays stay sparse so index 4 can
//! carry errors without inventing entries for 0..3. For an identical path the
//! last error in the input wins, and that extends to shape: if a later error
//! needs an object where an earlier one left a leaf, the leaf is replaced.
//!
//! Errors without a field, or with a field that does not parse, are never
//! placed in the tree; they come back as general errors in input order.
//!
//! `apply_flat` and `group_indexed_errors` serve forms that do not keep
//! nested error state and push messages into setter callbacks instead.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::api_error::ApiFieldError;
use crate::field_path::{FieldPath, Segment};

/// Array indices above this are treated as malformed rather than allocated.
pub const MAX_ARRAY_INDEX: usize = 4096;

/// Paths with more segments than this are treated as malformed. The tree is
/// built, dropped and serialized recursively, so depth must stay bounded.
pub const MAX_PATH_DEPTH: usize = 32;

/// A node of the normalized error tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldErrorNode {
    Leaf(String),
    Object(BTreeMap<String, FieldErrorNode>),
    /// Sparse: `None` marks an index no error targeted.
    Array(Vec<Option<FieldErrorNode>>),
}

impl FieldErrorNode {
    pub fn as_leaf(&self) -> Option<&str> {
        match self {
            FieldErrorNode::Leaf(reason) => Some(reason),
            _ => None,
        }
    }

    fn child(&self, segment: &Segment) -> Option<&FieldErrorNode> {
        match (self, segment) {
            (FieldErrorNode::Object(map), Segment::Key(key)) => map.get(key),
            (FieldErrorNode::Array(items), Segment::Index(i)) => {
                items.get(*i).and_then(Option::as_ref)
            }
            _ => None,
        }
    }
}

/// Root of the normalized error tree. Serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrorMap {
    root: BTreeMap<String, FieldErrorNode>,
}

impl FieldErrorMap {
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Top-level entries, keyed by the first path segment.
    pub fn entries(&self) -> &BTreeMap<String, FieldErrorNode> {
        &self.root
    }

    /// Node at `path`, if any error created it. Unparseable paths yield `None`.
    pub fn get(&self, path: &str) -> Option<&FieldErrorNode> {
        let path = FieldPath::parse(path).ok()?;
        let (first, rest) = path.segments().split_first()?;
        let Segment::Key(key) = first else {
            return None;
        };
        rest.iter()
            .try_fold(self.root.get(key)?, |node, segment| node.child(segment))
    }

    /// Leaf message at `path`.
    pub fn reason(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(FieldErrorNode::as_leaf)
    }

    fn insert(&mut self, path: &FieldPath, reason: String) {
        let Some((Segment::Key(key), rest)) = path.segments().split_first() else {
            return;
        };
        let slot = self
            .root
            .entry(key.clone())
            .or_insert_with(|| empty_node(rest.first()));
        set_at(slot, rest, reason);
    }
}

fn empty_node(next: Option<&Segment>) -> FieldErrorNode {
    match next {
        None => FieldErrorNode::Leaf(String::new()),
        Some(Segment::Key(_)) => FieldErrorNode::Object(BTreeMap::new()),
        Some(Segment::Index(_)) => FieldErrorNode::Array(Vec::new()),
    }
}

fn set_at(node: &mut FieldErrorNode, rest: &[Segment], reason: String) {
    let Some((next, tail)) = rest.split_first() else {
        *node = FieldErrorNode::Leaf(reason);
        return;
    };
    match next {
        Segment::Key(key) => {
            if !matches!(node, FieldErrorNode::Object(_)) {
                *node = FieldErrorNode::Object(BTreeMap::new());
            }
            if let FieldErrorNode::Object(map) = node {
                let child = map
                    .entry(key.clone())
                    .or_insert_with(|| empty_node(tail.first()));
                set_at(child, tail, reason);
            }
        }
        Segment::Index(index) => {
            if !matches!(node, FieldErrorNode::Array(_)) {
                *node = FieldErrorNode::Array(Vec::new());
            }
            if let FieldErrorNode::Array(items) = node {
                if items.len() <= *index {
                    items.resize_with(index + 1, || None);
                }
                let child = items[*index].get_or_insert_with(|| empty_node(tail.first()));
                set_at(child, tail, reason);
            }
        }
    }
}

/// Result of [`normalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedErrors {
    pub fields: FieldErrorMap,
    /// Field-less and malformed-path errors, in input order.
    pub general: Vec<ApiFieldError>,
}

pub fn normalize(errors: &[ApiFieldError]) -> NormalizedErrors {
    let mut normalized = NormalizedErrors::default();
    for error in errors {
        let Some(field) = error.field.as_deref() else {
            normalized.general.push(error.clone());
            continue;
        };
        match FieldPath::parse(field) {
            Ok(path) if path.segments().len() > MAX_PATH_DEPTH => {
                debug!(
                    depth = path.segments().len(),
                    max = MAX_PATH_DEPTH,
                    "field path too deep; treating as general error"
                );
                normalized.general.push(error.clone());
            }
            Ok(path) if index_in_range(&path) => {
                normalized.fields.insert(&path, error.reason.clone());
            }
            Ok(_) => {
                debug!(field, max = MAX_ARRAY_INDEX, "field path index too large; treating as general error");
                normalized.general.push(error.clone());
            }
            Err(err) => {
                debug!(error = %err, "treating malformed field path as general error");
                normalized.general.push(error.clone());
            }
        }
    }
    debug!(
        total = errors.len(),
        general = normalized.general.len(),
        "normalized API errors"
    );
    normalized
}

fn index_in_range(path: &FieldPath) -> bool {
    path.segments()
        .iter()
        .all(|segment| !matches!(segment, Segment::Index(i) if *i > MAX_ARRAY_INDEX))
}

/// Push errors into flat form setters.
///
/// Every field error is reported in input order, so a later error for the same
/// field overwrites the earlier one in the form. Only the first general error
/// is reported; the rest are dropped.
pub fn apply_flat<F, G>(errors: &[ApiFieldError], mut set_field_error: F, mut set_general_error: G)
where
    F: FnMut(&str, &str),
    G: FnMut(&str),
{
    let mut general_reported = false;
    for error in errors {
        match error.field.as_deref() {
            Some(field) => set_field_error(form_field_name(field), &error.reason),
            None if !general_reported => {
                set_general_error(&error.reason);
                general_reported = true;
            }
            None => {}
        }
    }
}

/// Some endpoints report body fields as `data.<name>`; forms know them as `<name>`.
fn form_field_name(field: &str) -> &str {
    field.strip_prefix("data.").unwrap_or(field)
}

/// Collect `<collection>[i].<key>` errors into one message map per index.
///
/// Used by forms with a repeated sub-form (e.g. the subnets of a VPC). The
/// last error for a given index and key wins. Everything else is handed to
/// [`apply_flat`].
pub fn group_indexed_errors<F, G>(
    errors: &[ApiFieldError],
    collection: &str,
    set_field_error: F,
    set_general_error: G,
) -> BTreeMap<usize, BTreeMap<String, String>>
where
    F: FnMut(&str, &str),
    G: FnMut(&str),
{
    let mut grouped: BTreeMap<usize, BTreeMap<String, String>> = BTreeMap::new();
    let mut remaining = Vec::new();

    for error in errors {
        match indexed_key(error, collection) {
            Some((index, key)) => {
                grouped
                    .entry(index)
                    .or_default()
                    .insert(key, error.reason.clone());
            }
            None => remaining.push(error.clone()),
        }
    }

    apply_flat(&remaining, set_field_error, set_general_error);
    grouped
}

fn indexed_key(error: &ApiFieldError, collection: &str) -> Option<(usize, String)> {
    let path = FieldPath::parse(error.field.as_deref()?).ok()?;
    match path.segments() {
        [Segment::Key(name), Segment::Index(index), Segment::Key(key)] if name == collection => {
            Some((*index, key.clone()))
        }
        _ => None,
    }
}

/// Collapse permission failures into one caller-supplied message.
///
/// Errors whose reason mentions "unauthorized" (any case) are removed; if at
/// least one was removed, a general error carrying `message` is put first.
pub fn handle_unauthorized(errors: &[ApiFieldError], message: &str) -> Vec<ApiFieldError> {
    let (unauthorized, mut kept): (Vec<_>, Vec<_>) = errors
        .iter()
        .cloned()
        .partition(|e| e.reason.to_lowercase().contains("unauthorized"));
    if unauthorized.is_empty() {
        return kept;
    }
    kept.insert(0, ApiFieldError::general(message));
    kept
}
