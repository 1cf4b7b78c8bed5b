//! The tree of groups and datasets serialized at the end of every container file.

use serde::{Deserialize, Serialize};
use vtkhdf_dtype::NativeType;
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail, vtkhdf_err};

/// A value stored as an attribute of a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Str(String),
}

impl AttributeValue {
    /// The integers of an [`AttributeValue::Int`].
    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            AttributeValue::Int(v) => Some(v),
            _ => None,
        }
    }

    /// The doubles of an [`AttributeValue::Float`].
    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            AttributeValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Vec<i64>> for AttributeValue {
    fn from(value: Vec<i64>) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<&[i64]> for AttributeValue {
    fn from(value: &[i64]) -> Self {
        AttributeValue::Int(value.to_vec())
    }
}

impl From<Vec<f64>> for AttributeValue {
    fn from(value: Vec<f64>) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<&[f64]> for AttributeValue {
    fn from(value: &[f64]) -> Self {
        AttributeValue::Float(value.to_vec())
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Str(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Str(value)
    }
}

/// What a child of a group is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Group,
    Dataset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum Node {
    Group(GroupNode),
    Dataset(DatasetNode),
}

impl Node {
    pub(crate) fn kind(&self) -> NodeKind {
        match self {
            Node::Group(_) => NodeKind::Group,
            Node::Dataset(_) => NodeKind::Dataset,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct GroupNode {
    pub(crate) attributes: Vec<(String, AttributeValue)>,
    pub(crate) children: Vec<(String, Node)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DatasetNode {
    pub(crate) dtype: NativeType,
    pub(crate) dims: Vec<usize>,
    pub(crate) compression: Option<u32>,
    pub(crate) segments: Vec<Segment>,
}

/// A run of consecutive leading-axis rows of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Segment {
    pub(crate) rows: usize,
    pub(crate) data: SegmentData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum SegmentData {
    /// Bytes stored in this file's data region
    Local {
        offset: u64,
        length: u64,
        deflate: bool,
    },
    /// Rows `row_offset..row_offset + rows` of a dataset in another container file
    External {
        file: String,
        dataset: String,
        row_offset: usize,
    },
}

impl DatasetNode {
    pub(crate) fn row_width(&self) -> usize {
        self.dims.iter().skip(1).product()
    }

    pub(crate) fn row_bytes(&self) -> usize {
        self.row_width() * self.dtype.byte_width()
    }
}

/// Splits an absolute or relative path into its non-empty components.
pub(crate) fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

/// Joins a child name onto a group path.
pub(crate) fn join(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

pub(crate) fn check_name(name: &str) -> VtkHdfResult<()> {
    if name.is_empty() || name.contains('/') {
        vtkhdf_bail!("invalid child name '{name}'");
    }
    Ok(())
}

impl GroupNode {
    pub(crate) fn child(&self, name: &str) -> Option<&Node> {
        self.children
            .iter()
            .find_map(|(n, node)| (n == name).then_some(node))
    }

    pub(crate) fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children
            .iter_mut()
            .find_map(|(n, node)| (n == name).then_some(node))
    }

    pub(crate) fn find(&self, path: &str) -> Option<&Node> {
        let mut parts = components(path);
        let first = parts.next()?;
        parts.try_fold(self.child(first)?, |node, part| match node {
            Node::Group(group) => group.child(part),
            Node::Dataset(_) => None,
        })
    }

    pub(crate) fn group(&self, path: &str) -> VtkHdfResult<&GroupNode> {
        if components(path).next().is_none() {
            return Ok(self);
        }
        match self.find(path) {
            Some(Node::Group(group)) => Ok(group),
            Some(Node::Dataset(_)) => Err(vtkhdf_err!(NotFound: "{path} is a dataset, not a group")),
            None => Err(vtkhdf_err!(NotFound: "no group at {path}")),
        }
    }

    pub(crate) fn group_mut(&mut self, path: &str) -> VtkHdfResult<&mut GroupNode> {
        let mut current = self;
        for part in components(path) {
            current = match current.child_mut(part) {
                Some(Node::Group(group)) => group,
                _ => vtkhdf_bail!(NotFound: "no group at {path}"),
            };
        }
        Ok(current)
    }

    pub(crate) fn dataset(&self, path: &str) -> VtkHdfResult<&DatasetNode> {
        match self.find(path) {
            Some(Node::Dataset(dataset)) => Ok(dataset),
            Some(Node::Group(_)) => Err(vtkhdf_err!(NotFound: "{path} is a group, not a dataset")),
            None => Err(vtkhdf_err!(NotFound: "no dataset at {path}")),
        }
    }

    pub(crate) fn dataset_mut(&mut self, path: &str) -> VtkHdfResult<&mut DatasetNode> {
        let (parent, name) = match path.trim_end_matches('/').rsplit_once('/') {
            Some((parent, name)) => (parent, name),
            None => ("", path),
        };
        match self.group_mut(parent)?.child_mut(name) {
            Some(Node::Dataset(dataset)) => Ok(dataset),
            _ => Err(vtkhdf_err!(NotFound: "no dataset at {path}")),
        }
    }

    pub(crate) fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find_map(|(n, value)| (n == name).then_some(value))
    }

    /// Sets an attribute, keeping the position of an existing one.
    pub(crate) fn set_attribute(&mut self, name: &str, value: AttributeValue) {
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> GroupNode {
        let dataset = DatasetNode {
            dtype: NativeType::Double,
            dims: vec![0, 3],
            compression: None,
            segments: vec![],
        };
        let inner = GroupNode {
            attributes: vec![],
            children: vec![("Points".to_string(), Node::Dataset(dataset))],
        };
        GroupNode {
            attributes: vec![],
            children: vec![("VTKHDF".to_string(), Node::Group(inner))],
        }
    }

    #[test]
    fn paths_resolve() {
        let root = tree();
        assert!(root.group("/").is_ok());
        assert!(root.group("/VTKHDF").is_ok());
        assert_eq!(root.dataset("/VTKHDF/Points").unwrap().row_width(), 3);
        assert!(root.group("/VTKHDF/Points").is_err());
        assert!(root.dataset("/VTKHDF/Missing").is_err());
    }

    #[test]
    fn mutable_paths_resolve() {
        let mut root = tree();
        root.dataset_mut("/VTKHDF/Points").unwrap().dims[0] = 4;
        assert_eq!(root.dataset("VTKHDF/Points").unwrap().dims, vec![4, 3]);
    }

    #[test]
    fn footer_serializes() {
        let root = tree();
        let json = serde_json::to_vec(&root).unwrap();
        let back: GroupNode = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, root);
    }

    #[test]
    fn attributes_keep_their_position() {
        let mut group = GroupNode::default();
        group.set_attribute("a", AttributeValue::Int(vec![1]));
        group.set_attribute("b", "x".into());
        group.set_attribute("a", AttributeValue::Int(vec![2]));
        assert_eq!(group.attributes[0].0, "a");
        assert_eq!(group.attribute("a").unwrap().as_ints(), Some([2i64].as_slice()));
    }
}
