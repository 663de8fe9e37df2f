//! The pattern-indexed routing tree.
//!
//! Nodes are built once at registration and never mutated while the
//! server runs, so lookups need no locking. Each leaf stores the chain
//! composed for it at registration time; lookup only clones an `Arc`.

use crate::router::path::{PatternPart, parse_embedded, pattern_segments, segment_bounds};
use crate::types::{Handler, HttpMethods, Middleware, compose};
use ahash::AHashMap;

/// A registered (method, pattern) leaf.
pub(crate) struct RouteEntry<V> {
    /// The handler as registered, before composition.
    pub handler: Handler<V>,
    /// The handler with the full middleware chain wrapped around it.
    pub composed: Handler<V>,
    /// Names of the parameters captured on the way to this leaf, in
    /// capture order. Lookup produces values positionally aligned with
    /// this list.
    pub param_names: Vec<String>,
    /// The canonical pattern, kept for diagnostics.
    pub pattern: String,
}

pub(crate) struct Node<V> {
    /// Literal children, keyed by full segments or by literal prefixes
    /// of embedded segments. Kept sorted longest key first so embedded
    /// prefix matching is deterministic.
    statics: Vec<(String, Box<Node<V>>)>,
    /// At most one parameter child.
    param: Option<Box<Node<V>>>,
    /// At most one wildcard child; always a leaf position.
    wildcard: Option<Box<Node<V>>>,
    /// The parameter name owned by this node, when it is a parameter or
    /// wildcard child.
    name: Option<String>,
    /// Middleware attached to this node; inherited by routes registered
    /// below it afterwards.
    middlewares: Vec<Middleware<V>>,
    entries: AHashMap<HttpMethods, RouteEntry<V>>,
}

impl<V> Node<V> {
    fn new() -> Self {
        Node {
            statics: Vec::new(),
            param: None,
            wildcard: None,
            name: None,
            middlewares: Vec::new(),
            entries: AHashMap::new(),
        }
    }

    fn has_entries(&self) -> bool {
        !self.entries.is_empty()
    }

    fn static_child_mut(&mut self, key: &str) -> &mut Node<V> {
        if self.statics.iter().all(|(k, _)| k.as_str() != key) {
            self.statics.push((key.to_string(), Box::new(Node::new())));
            // longest prefix first
            self.statics.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        }
        let pos = self
            .statics
            .iter()
            .position(|(k, _)| k.as_str() == key)
            .expect("static child just ensured");
        &mut self.statics[pos].1
    }

    fn param_child_mut(&mut self, name: &str, pattern: &str) -> &mut Node<V> {
        match &mut self.param {
            Some(child) => {
                if child.name.as_deref() != Some(name) {
                    panic!(
                        "conflicting parameter name ':{}' in '{}' (already registered as ':{}')",
                        name,
                        pattern,
                        child.name.as_deref().unwrap_or("")
                    );
                }
            }
            None => {
                let mut child = Node::new();
                child.name = Some(name.to_string());
                self.param = Some(Box::new(child));
            }
        }
        self.param.as_mut().expect("param child just ensured")
    }

    fn wildcard_child_mut(&mut self, name: &str, pattern: &str) -> &mut Node<V> {
        match &mut self.wildcard {
            Some(child) => {
                if child.name.as_deref() != Some(name) {
                    panic!(
                        "conflicting wildcard name '*{}' in '{}' (already registered as '*{}')",
                        name,
                        pattern,
                        child.name.as_deref().unwrap_or("")
                    );
                }
            }
            None => {
                let mut child = Node::new();
                child.name = Some(name.to_string());
                self.wildcard = Some(Box::new(child));
            }
        }
        self.wildcard.as_mut().expect("wildcard child just ensured")
    }
}

/// A successful lookup: the leaf entry plus the values captured along
/// the way, positionally aligned with the entry's `param_names`.
pub(crate) struct RouteMatch<'t, V> {
    pub entry: &'t RouteEntry<V>,
    pub values: Vec<String>,
}

pub(crate) enum Lookup<'t, V> {
    /// Path and method both matched.
    Found(RouteMatch<'t, V>),
    /// The path led to a leaf, but no handler exists for this method.
    MethodMiss,
    /// No leaf matched the path.
    NoRoute,
}

pub(crate) struct RouteTree<V> {
    root: Node<V>,
}

impl<V: Send + 'static> RouteTree<V> {
    pub(crate) fn new() -> Self {
        RouteTree { root: Node::new() }
    }

    /// Inserts a route and precomposes its middleware chain.
    ///
    /// `upstream` is the already-ordered pre-global + global middleware;
    /// node-inherited middleware is collected root→leaf during the walk
    /// and `route_local` (group middleware included, first) goes
    /// innermost.
    ///
    /// Panics on a duplicate (method, pattern), a non-terminal wildcard,
    /// an empty parameter name or a parameter-name conflict; these are
    /// registration-time programmer errors.
    pub(crate) fn insert(
        &mut self,
        method: HttpMethods,
        pattern: &str,
        handler: Handler<V>,
        upstream: &[Middleware<V>],
        route_local: &[Middleware<V>],
    ) {
        let segments = pattern_segments(pattern);
        let mut inherited: Vec<Middleware<V>> = self.root.middlewares.clone();
        let mut param_names: Vec<String> = Vec::new();
        let mut node = &mut self.root;

        let last = segments.len().saturating_sub(1);
        for (i, segment) in segments.iter().enumerate() {
            if segment.contains(':') {
                for part in parse_embedded(segment) {
                    node = match part {
                        PatternPart::Literal(lit) => node.static_child_mut(&lit),
                        PatternPart::Param(name) => {
                            param_names.push(name.clone());
                            node.param_child_mut(&name, pattern)
                        }
                    };
                    inherited.extend(node.middlewares.iter().cloned());
                }
            } else if let Some(name) = segment.strip_prefix('*') {
                if i != last {
                    panic!("wildcard segment must be terminal in '{}'", pattern);
                }
                if name.is_empty() {
                    panic!("empty wildcard name in '{}'", pattern);
                }
                param_names.push(name.to_string());
                node = node.wildcard_child_mut(name, pattern);
                inherited.extend(node.middlewares.iter().cloned());
            } else {
                node = node.static_child_mut(segment);
                inherited.extend(node.middlewares.iter().cloned());
            }
        }

        if node.entries.contains_key(&method) {
            panic!("duplicate route: {} {}", method, pattern);
        }

        let mut chain: Vec<Middleware<V>> = Vec::with_capacity(
            upstream.len() + inherited.len() + route_local.len(),
        );
        chain.extend(upstream.iter().cloned());
        chain.extend(inherited);
        chain.extend(route_local.iter().cloned());
        let composed = compose(&chain, handler.clone());

        node.entries.insert(
            method,
            RouteEntry {
                handler,
                composed,
                param_names,
                pattern: pattern.to_string(),
            },
        );
    }

    /// Attaches middleware to the node at `prefix`; routes registered
    /// under it afterwards inherit it.
    pub(crate) fn attach(&mut self, prefix: &str, middleware: Middleware<V>) {
        let mut node = &mut self.root;
        for segment in pattern_segments(prefix) {
            if segment.contains(':') {
                for part in parse_embedded(&segment) {
                    node = match part {
                        PatternPart::Literal(lit) => node.static_child_mut(&lit),
                        PatternPart::Param(name) => node.param_child_mut(&name, prefix),
                    };
                }
            } else if let Some(name) = segment.strip_prefix('*') {
                node = node.wildcard_child_mut(name, prefix);
            } else {
                node = node.static_child_mut(&segment);
            }
        }
        node.middlewares.push(middleware);
    }

    /// Looks up a (method, path), trying the static-only fast pass
    /// first. The fast pass is skipped for paths that could touch
    /// parameter machinery and falls back to the full walk on any miss;
    /// when it succeeds it is definitionally the same result the full
    /// walk would produce, since exact static children take precedence
    /// at every node.
    pub(crate) fn lookup<'t>(&'t self, method: HttpMethods, path: &str) -> Lookup<'t, V> {
        let Some(bounds) = segment_bounds(path) else {
            return Lookup::NoRoute;
        };

        if !path.contains(':') && !path.contains('*') {
            if let Some(node) = self.lookup_static(path, &bounds) {
                return Self::leaf(node, method, Vec::new());
            }
        }

        let mut values = Vec::new();
        match walk(&self.root, path, &bounds, 0, &mut values) {
            Some(node) => Self::leaf(node, method, values),
            None => Lookup::NoRoute,
        }
    }

    fn leaf<'t>(node: &'t Node<V>, method: HttpMethods, values: Vec<String>) -> Lookup<'t, V> {
        match node.entries.get(&method) {
            Some(entry) => Lookup::Found(RouteMatch { entry, values }),
            None => Lookup::MethodMiss,
        }
    }

    fn lookup_static(&self, path: &str, bounds: &[(usize, usize)]) -> Option<&Node<V>> {
        let mut node = &self.root;
        for (start, end) in bounds {
            let segment = &path[*start..*end];
            node = node
                .statics
                .iter()
                .find(|(key, _)| key.as_str() == segment)
                .map(|(_, child)| child.as_ref())?;
        }
        node.has_entries().then_some(node)
    }
}

/// Full matching walk. Precedence at each node: exact static child,
/// embedded longest-prefix static child, parameter child (whole-segment
/// capture first, then splits at a following literal), wildcard.
/// Returns the first node with entries; dead ends backtrack.
fn walk<'t, V>(
    node: &'t Node<V>,
    path: &str,
    bounds: &[(usize, usize)],
    idx: usize,
    values: &mut Vec<String>,
) -> Option<&'t Node<V>> {
    if idx == bounds.len() {
        return node.has_entries().then_some(node);
    }
    let segment = &path[bounds[idx].0..bounds[idx].1];

    if let Some((_, child)) = node.statics.iter().find(|(key, _)| key.as_str() == segment) {
        if let Some(hit) = walk(child, path, bounds, idx + 1, values) {
            return Some(hit);
        }
    }

    for (key, child) in &node.statics {
        if key.len() < segment.len() && segment.starts_with(key.as_str()) {
            if let Some(hit) = walk_tail(child, &segment[key.len()..], path, bounds, idx, values) {
                return Some(hit);
            }
        }
    }

    if let Some(param) = &node.param {
        values.push(segment.to_string());
        if let Some(hit) = walk(param, path, bounds, idx + 1, values) {
            return Some(hit);
        }
        values.pop();
        if let Some(hit) = split_param(param, segment, path, bounds, idx, values) {
            return Some(hit);
        }
    }

    if let Some(wild) = &node.wildcard {
        if wild.has_entries() {
            values.push(path[bounds[idx].0..].to_string());
            return Some(wild);
        }
    }

    None
}

/// Continues a match inside a segment after a literal prefix was
/// consumed. `tail` is never empty.
fn walk_tail<'t, V>(
    node: &'t Node<V>,
    tail: &str,
    path: &str,
    bounds: &[(usize, usize)],
    idx: usize,
    values: &mut Vec<String>,
) -> Option<&'t Node<V>> {
    if let Some((_, child)) = node.statics.iter().find(|(key, _)| key.as_str() == tail) {
        if let Some(hit) = walk(child, path, bounds, idx + 1, values) {
            return Some(hit);
        }
    }

    for (key, child) in &node.statics {
        if key.len() < tail.len() && tail.starts_with(key.as_str()) {
            if let Some(hit) = walk_tail(child, &tail[key.len()..], path, bounds, idx, values) {
                return Some(hit);
            }
        }
    }

    if let Some(param) = &node.param {
        values.push(tail.to_string());
        if let Some(hit) = walk(param, path, bounds, idx + 1, values) {
            return Some(hit);
        }
        values.pop();
        if let Some(hit) = split_param(param, tail, path, bounds, idx, values) {
            return Some(hit);
        }
    }

    None
}

/// Tries to end a parameter capture at a literal that follows it within
/// the same segment, leftmost occurrence first. The capture must be at
/// least one byte.
fn split_param<'t, V>(
    param: &'t Node<V>,
    text: &str,
    path: &str,
    bounds: &[(usize, usize)],
    idx: usize,
    values: &mut Vec<String>,
) -> Option<&'t Node<V>> {
    // captures must be non-empty, so the search starts after the first
    // character; stepping by chars keeps every slice on a boundary
    let Some(first) = text.chars().next() else {
        return None;
    };
    for (key, child) in &param.statics {
        let mut from = first.len_utf8();
        while from + key.len() <= text.len() {
            let Some(found) = text[from..].find(key.as_str()) else {
                break;
            };
            let at = from + found;
            let rest = &text[at + key.len()..];
            values.push(text[..at].to_string());
            let hit = if rest.is_empty() {
                walk(child, path, bounds, idx + 1, values)
            } else {
                walk_tail(child, rest, path, bounds, idx, values)
            };
            if hit.is_some() {
                return hit;
            }
            values.pop();
            from = at
                + text[at..]
                    .chars()
                    .next()
                    .map(char::len_utf8)
                    .unwrap_or(1);
        }
    }
    None
}
