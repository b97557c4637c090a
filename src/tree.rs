use crate::error::InsertError;
use crate::params::Params;

use std::collections::HashMap;
use std::sync::Arc;

/// One `/`-delimited token of a route pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Matches the exact text.
    Literal(&'a str),
    /// `{name}`: matches any single non-empty segment.
    Param(&'a str),
    /// `{name:*}`: matches the rest of the path, slashes included.
    Wildcard(&'a str),
}

impl<'a> Segment<'a> {
    /// Classifies a single segment of a route pattern.
    pub fn parse(text: &'a str) -> Result<Segment<'a>, InsertError> {
        let is_brace = |c: char| c == '{' || c == '}';

        if !text.starts_with('{') {
            if text.contains(is_brace) {
                return Err(InsertError::MalformedParam(text.to_owned()));
            }
            return Ok(Segment::Literal(text));
        }

        let inner = text
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .filter(|inner| !inner.contains(is_brace))
            .ok_or_else(|| InsertError::MalformedParam(text.to_owned()))?;

        let (name, kind) = match inner.split_once(':') {
            Some((name, kind)) => (name, Some(kind)),
            None => (inner, None),
        };

        if name.is_empty() {
            return Err(InsertError::UnnamedParam);
        }

        match kind {
            None => Ok(Segment::Param(name)),
            Some("*") => Ok(Segment::Wildcard(name)),
            Some(kind) => Err(InsertError::UnknownParamKind {
                segment: text.to_owned(),
                kind: kind.to_owned(),
            }),
        }
    }

    fn name(&self) -> Option<&'a str> {
        match *self {
            Segment::Literal(_) => None,
            Segment::Param(name) | Segment::Wildcard(name) => Some(name),
        }
    }
}

/// Index of a node in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

const ROOT: NodeId = NodeId(0);

#[derive(Debug, Clone)]
struct Node<T> {
    literals: HashMap<Box<str>, NodeId>,
    param: Option<(Arc<str>, NodeId)>,
    wildcard: Option<(Arc<str>, NodeId)>,
    value: Option<T>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Node {
            literals: HashMap::new(),
            param: None,
            wildcard: None,
            value: None,
        }
    }
}

/// A segment trie mapping route patterns to values.
///
/// Nodes live in a flat arena and refer to each other by index, so a
/// finished tree has no back-references and can be shared freely between
/// threads for lookups.
///
/// ```
/// # use arbor::{Params, Tree};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut tree = Tree::new();
/// let id = tree.insert("/users/{id}/posts/{postId}")?;
/// *tree.value_mut(id) = Some("posts");
///
/// let mut params = Params::new();
/// let found = tree.at("/users/42/posts/7", &mut params).unwrap();
/// assert_eq!(tree.value(found), Some(&"posts"));
/// assert_eq!(params.iter().collect::<Vec<_>>(), vec![("id", "42"), ("postId", "7")]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Tree<T> {
    nodes: Vec<Node<T>>,
    case_sensitive: bool,
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Tree<T> {
    /// Creates an empty, case-sensitive tree.
    pub fn new() -> Self {
        Tree {
            nodes: vec![Node::default()],
            case_sensitive: true,
        }
    }

    /// Creates an empty tree; when `case_sensitive` is false, literal
    /// segments are compared ignoring ASCII case.
    pub fn with_case_sensitivity(case_sensitive: bool) -> Self {
        Tree {
            case_sensitive,
            ..Self::new()
        }
    }

    /// Returns the number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Walks the tree along `route`, creating nodes as needed, and returns the
    /// node the route ends at.
    ///
    /// The route is validated completely before the tree is touched, and
    /// conflicts can only be detected on nodes that already exist, so a
    /// failed insertion leaves the tree unchanged.
    pub fn insert(&mut self, route: &str) -> Result<NodeId, InsertError> {
        let rest = route
            .strip_prefix('/')
            .ok_or_else(|| InsertError::InvalidPath(route.to_owned()))?;

        let segments = rest
            .split('/')
            .map(Segment::parse)
            .collect::<Result<Vec<_>, _>>()?;

        let mut names: Vec<&str> = Vec::new();
        for (i, segment) in segments.iter().enumerate() {
            if let Segment::Wildcard(_) = segment {
                if i + 1 != segments.len() {
                    return Err(InsertError::InvalidWildcard);
                }
            }

            if let Some(name) = segment.name() {
                if names.contains(&name) {
                    return Err(InsertError::DuplicateParam(name.to_owned()));
                }
                names.push(name);
            }
        }

        let mut current = ROOT;
        for segment in segments {
            current = match segment {
                Segment::Literal(text) => self.literal_child(current, text),
                Segment::Param(name) => self.param_child(current, name)?,
                Segment::Wildcard(name) => self.wildcard_child(current, name)?,
            };
        }

        Ok(current)
    }

    fn push_node(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::default());
        id
    }

    fn literal_child(&mut self, parent: NodeId, text: &str) -> NodeId {
        let key: Box<str> = if self.case_sensitive {
            text.into()
        } else {
            text.to_ascii_lowercase().into()
        };

        if let Some(&id) = self.nodes[parent.0].literals.get(&key) {
            return id;
        }

        let id = self.push_node();
        self.nodes[parent.0].literals.insert(key, id);
        id
    }

    fn param_child(&mut self, parent: NodeId, name: &str) -> Result<NodeId, InsertError> {
        let node = &self.nodes[parent.0];

        if let Some((existing, _)) = &node.wildcard {
            return Err(InsertError::ParamConflict {
                segment: format!("{{{}}}", name),
                with: format!("{{{}:*}}", existing),
            });
        }

        if let Some((existing, id)) = &node.param {
            if &**existing == name {
                return Ok(*id);
            }
            return Err(InsertError::ParamConflict {
                segment: format!("{{{}}}", name),
                with: format!("{{{}}}", existing),
            });
        }

        let id = self.push_node();
        self.nodes[parent.0].param = Some((name.into(), id));
        Ok(id)
    }

    fn wildcard_child(&mut self, parent: NodeId, name: &str) -> Result<NodeId, InsertError> {
        let node = &self.nodes[parent.0];

        if let Some((existing, _)) = &node.param {
            return Err(InsertError::ParamConflict {
                segment: format!("{{{}:*}}", name),
                with: format!("{{{}}}", existing),
            });
        }

        if let Some((existing, id)) = &node.wildcard {
            if &**existing == name {
                return Ok(*id);
            }
            return Err(InsertError::ParamConflict {
                segment: format!("{{{}:*}}", name),
                with: format!("{{{}:*}}", existing),
            });
        }

        let id = self.push_node();
        self.nodes[parent.0].wildcard = Some((name.into(), id));
        Ok(id)
    }

    /// Returns the value stored at a node.
    pub fn value(&self, id: NodeId) -> Option<&T> {
        self.nodes[id.0].value.as_ref()
    }

    /// Returns the value slot of a node.
    pub fn value_mut(&mut self, id: NodeId) -> &mut Option<T> {
        &mut self.nodes[id.0].value
    }

    /// Resolves a concrete path to the node holding a value, filling `params`
    /// with the captured segments.
    ///
    /// At every depth the literal child is tried first, then the param
    /// child, then the wildcard child. A branch that dead-ends is abandoned
    /// and its captures are rolled back before the next candidate is tried.
    pub fn at(&self, path: &str, params: &mut Params) -> Option<NodeId> {
        params.clear();
        let rest = path.strip_prefix('/')?;
        let found = self.find(ROOT, Some(rest), params);
        if found.is_none() {
            params.clear();
        }
        found
    }

    /// `rest` is the unconsumed remainder after a `/`, or `None` once the
    /// whole path has been consumed.
    fn find(&self, id: NodeId, rest: Option<&str>, params: &mut Params) -> Option<NodeId> {
        let node = &self.nodes[id.0];

        let rest = match rest {
            Some(rest) => rest,
            None => return node.value.as_ref().map(|_| id),
        };

        let (segment, next) = match rest.split_once('/') {
            Some((segment, next)) => (segment, Some(next)),
            None => (rest, None),
        };

        if let Some(child) = self.literal(node, segment) {
            if let Some(found) = self.find(child, next, params) {
                return Some(found);
            }
        }

        if let Some((name, child)) = &node.param {
            if !segment.is_empty() {
                let mark = params.len();
                params.push(name.clone(), segment);
                if let Some(found) = self.find(*child, next, params) {
                    return Some(found);
                }
                params.truncate(mark);
            }
        }

        if let Some((name, child)) = &node.wildcard {
            if !rest.is_empty() && self.nodes[child.0].value.is_some() {
                params.push(name.clone(), rest);
                return Some(*child);
            }
        }

        trace!("no route below depth at segment '{}'", segment);
        None
    }

    fn literal(&self, node: &Node<T>, segment: &str) -> Option<NodeId> {
        if self.case_sensitive || !segment.bytes().any(|b| b.is_ascii_uppercase()) {
            node.literals.get(segment).copied()
        } else {
            node.literals.get(segment.to_ascii_lowercase().as_str()).copied()
        }
    }
}
