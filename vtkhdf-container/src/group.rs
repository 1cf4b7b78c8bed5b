use std::fmt::{Debug, Formatter};

use vtkhdf_dtype::NativeType;
use vtkhdf_error::{VtkHdfResult, vtkhdf_bail, vtkhdf_err};

use crate::filter::check_level;
use crate::footer::{DatasetNode, GroupNode, Node, check_name, components, join};
use crate::{AttributeValue, ContainerFile, Dataset, NodeKind};

/// A scoped handle on a group of a container file.
///
/// Dropping the handle releases it; handles opened from it stay valid on their own.
pub struct Group {
    file: ContainerFile,
    path: String,
}

impl Group {
    pub(crate) fn acquire(file: ContainerFile, path: String) -> Self {
        file.handle_acquired(&path);
        Self { file, path }
    }

    /// Absolute path of this group.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn file(&self) -> &ContainerFile {
        &self.file
    }

    fn child_path(&self, name: &str) -> String {
        components(name).fold(self.path.clone(), |path, part| join(&path, part))
    }

    fn with_group<R>(&self, f: impl FnOnce(&GroupNode) -> VtkHdfResult<R>) -> VtkHdfResult<R> {
        self.file.with_tree(|root| f(root.group(&self.path)?))
    }

    fn with_group_mut<R>(
        &self,
        f: impl FnOnce(&mut GroupNode) -> VtkHdfResult<R>,
    ) -> VtkHdfResult<R> {
        self.file.with_tree_mut(|root| f(root.group_mut(&self.path)?))
    }

    /// Creates a new child group. Fails if a child of that name exists.
    pub fn create_group(&self, name: &str) -> VtkHdfResult<Group> {
        check_name(name)?;
        self.with_group_mut(|group| {
            if group.child(name).is_some() {
                vtkhdf_bail!("{} already has a child named {name}", self.path);
            }
            group
                .children
                .push((name.to_string(), Node::Group(GroupNode::default())));
            Ok(())
        })?;
        Ok(Group::acquire(self.file.clone(), self.child_path(name)))
    }

    /// Opens a descendant group by relative path.
    pub fn open_group(&self, name: &str) -> VtkHdfResult<Group> {
        let path = self.child_path(name);
        self.file.with_tree(|root| root.group(&path).map(|_| ()))?;
        Ok(Group::acquire(self.file.clone(), path))
    }

    /// Opens the child group `name`, creating it when missing.
    pub fn require_group(&self, name: &str) -> VtkHdfResult<Group> {
        match self.child_kind(name)? {
            Some(NodeKind::Group) => self.open_group(name),
            Some(NodeKind::Dataset) => {
                Err(vtkhdf_err!("{name} in {} is a dataset, not a group", self.path))
            }
            None => self.create_group(name),
        }
    }

    pub fn has_child(&self, name: &str) -> VtkHdfResult<bool> {
        Ok(self.child_kind(name)?.is_some())
    }

    /// What the descendant at relative path `name` is, if it exists.
    pub fn child_kind(&self, name: &str) -> VtkHdfResult<Option<NodeKind>> {
        self.with_group(|group| Ok(group.find(name).map(Node::kind)))
    }

    /// Names of the children, in creation order.
    pub fn children(&self) -> VtkHdfResult<Vec<String>> {
        self.with_group(|group| Ok(group.children.iter().map(|(n, _)| n.clone()).collect()))
    }

    /// Removes a child and everything below it.
    pub fn remove_child(&self, name: &str) -> VtkHdfResult<()> {
        self.with_group_mut(|group| {
            let before = group.children.len();
            group.children.retain(|(n, _)| n != name);
            if group.children.len() == before {
                vtkhdf_bail!(NotFound: "no child {name} in {}", self.path);
            }
            Ok(())
        })
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<AttributeValue>) -> VtkHdfResult<()> {
        let value = value.into();
        self.with_group_mut(|group| {
            group.set_attribute(name, value);
            Ok(())
        })
    }

    /// Reads an attribute, failing with `NotFound` when it is missing.
    pub fn attribute(&self, name: &str) -> VtkHdfResult<AttributeValue> {
        self.with_group(|group| {
            group
                .attribute(name)
                .cloned()
                .ok_or_else(|| vtkhdf_err!(NotFound: "no attribute {name} on {}", self.path))
        })
    }

    pub fn has_attribute(&self, name: &str) -> VtkHdfResult<bool> {
        self.with_group(|group| Ok(group.attribute(name).is_some()))
    }

    pub fn attribute_names(&self) -> VtkHdfResult<Vec<String>> {
        self.with_group(|group| Ok(group.attributes.iter().map(|(n, _)| n.clone()).collect()))
    }

    /// Creates an empty dataset of shape `[0, inner_dims...]`, extendible along its first axis.
    ///
    /// `compression` is a deflate level; `None` or `Some(0)` stores rows uncompressed.
    pub fn new_dataset(
        &self,
        name: &str,
        dtype: NativeType,
        inner_dims: &[usize],
        compression: Option<u32>,
    ) -> VtkHdfResult<Dataset> {
        check_name(name)?;
        if !dtype.is_valid() {
            vtkhdf_bail!(TypeError: "dataset {name} cannot be created with the invalid native type");
        }
        if let Some(level) = compression {
            check_level(level)?;
        }
        let mut dims = Vec::with_capacity(inner_dims.len() + 1);
        dims.push(0);
        dims.extend_from_slice(inner_dims);
        let node = DatasetNode {
            dtype,
            dims,
            compression: compression.filter(|level| *level > 0),
            segments: Vec::new(),
        };
        self.with_group_mut(|group| {
            if group.child(name).is_some() {
                vtkhdf_bail!("{} already has a child named {name}", self.path);
            }
            group.children.push((name.to_string(), Node::Dataset(node)));
            Ok(())
        })?;
        Ok(Dataset::acquire(self.file.clone(), self.child_path(name)))
    }

    /// Opens a descendant dataset by relative path.
    pub fn open_dataset(&self, name: &str) -> VtkHdfResult<Dataset> {
        let path = self.child_path(name);
        self.file.with_tree(|root| root.dataset(&path).map(|_| ()))?;
        Ok(Dataset::acquire(self.file.clone(), path))
    }
}

impl Debug for Group {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Group").field(&self.path).finish()
    }
}

impl Drop for Group {
    fn drop(&mut self) {
        self.file.handle_released(&self.path);
    }
}
