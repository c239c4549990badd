//! Dataset model: groups, variables, dimensions and attributes
//!
//! Objects live in arenas owned by [`Dataset`] and refer to each other by
//! id, so a group tree can be rearranged without owning pointers.

use std::sync::{Arc, Mutex};

use hdf4_format::{DataType, TagKey, Values};
use serde::Serialize;

use crate::layout::LayoutInfo;

/// Index of a group in the dataset arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupId(pub usize);

/// Index of a variable in the dataset arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarId(pub usize);

/// Index of a dimension in the dataset arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DimId(pub usize);

/// Named, typed value attached to a group or variable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    /// Attribute name
    pub name: String,
    /// Attribute value
    pub value: Values,
}

impl Attribute {
    /// Create an attribute
    pub fn new(name: impl Into<String>, value: Values) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Text attribute
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, Values::Text(text.into()))
    }
}

/// Named axis length
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dimension {
    /// Dimension name
    pub name: String,
    /// Length; zero for an unlimited dimension without records
    pub length: usize,
    /// Whether variables refer to it by name
    pub shared: bool,
    /// Whether the dimension is unlimited
    pub unlimited: bool,
    /// Owning group; `None` once pruned
    pub group: Option<GroupId>,
}

/// One field of a compound variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    /// Field name
    pub name: String,
    /// Element type
    pub data_type: DataType,
    /// Values per record; empty for a scalar member
    pub shape: Vec<usize>,
    /// Byte offset within the record
    pub offset: usize,
}

impl Member {
    /// Bytes this member occupies in each record
    pub fn size(&self) -> usize {
        self.data_type.size() * self.shape.iter().product::<usize>()
    }
}

/// Where a variable's bytes come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Storage {
    /// Tag that produced the variable
    pub source: TagKey,
    /// Data tag, when the variable has stored data
    pub data: Option<TagKey>,
}

/// Memoized layout of one variable
#[derive(Debug, Default)]
pub struct LayoutSlot(pub(crate) Mutex<Option<Arc<LayoutInfo>>>);

/// N-dimensional typed array
#[derive(Debug, Serialize)]
pub struct Variable {
    /// Variable name
    pub name: String,
    /// Owning group
    pub group: GroupId,
    /// Element type
    pub data_type: DataType,
    /// Axis lengths; empty for a scalar
    pub shape: Vec<usize>,
    /// Shared dimension of each axis, when known
    pub dims: Vec<Option<DimId>>,
    /// Attributes in insertion order
    pub attributes: Vec<Attribute>,
    /// Fields of a compound variable
    pub members: Vec<Member>,
    /// Bytes per element; the record size for compound variables
    pub element_size: usize,
    /// Stored data
    pub storage: Storage,
    #[serde(skip)]
    pub(crate) layout: LayoutSlot,
}

impl Variable {
    /// Create a scalar variable of `data_type` stored under `source`.
    pub fn new(name: impl Into<String>, data_type: DataType, source: TagKey) -> Self {
        Self {
            name: name.into(),
            group: GroupId(0),
            data_type,
            shape: Vec::new(),
            dims: Vec::new(),
            attributes: Vec::new(),
            members: Vec::new(),
            element_size: data_type.size(),
            storage: Storage { source, data: None },
            layout: LayoutSlot::default(),
        }
    }

    /// Set the element type; the element size follows unless compound.
    pub fn set_data_type(&mut self, data_type: DataType) {
        self.data_type = data_type;
        if data_type != DataType::Compound {
            self.element_size = data_type.size();
        }
    }

    /// Set anonymous axis lengths.
    pub fn set_shape(&mut self, shape: Vec<usize>) {
        self.dims = vec![None; shape.len()];
        self.shape = shape;
    }

    /// Set axis lengths with their shared dimensions.
    pub fn set_dimensions(&mut self, shape: Vec<usize>, dims: Vec<Option<DimId>>) {
        debug_assert_eq!(shape.len(), dims.len());
        self.shape = shape;
        self.dims = dims;
    }

    /// Rank.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Whether this is a compound (record) variable.
    pub fn is_compound(&self) -> bool {
        self.data_type == DataType::Compound
    }

    /// Attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Member by name.
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Node of the group tree
#[derive(Debug, Clone, Serialize)]
pub struct Group {
    /// Group name; empty for the root
    pub name: String,
    /// Parent group; `None` for the root
    pub parent: Option<GroupId>,
    /// Child groups
    pub children: Vec<GroupId>,
    /// Variables in this group
    pub variables: Vec<VarId>,
    /// Dimensions defined in this group
    pub dimensions: Vec<DimId>,
    /// Attributes in insertion order
    pub attributes: Vec<Attribute>,
    /// V-group that produced the group
    pub source: Option<TagKey>,
}

impl Group {
    fn new(name: String, parent: Option<GroupId>, source: Option<TagKey>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            variables: Vec::new(),
            dimensions: Vec::new(),
            attributes: Vec::new(),
            source,
        }
    }

    /// Attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Object an attribute attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Target {
    /// A group
    Group(GroupId),
    /// A variable
    Variable(VarId),
}

/// The decoded object model of one file
#[derive(Debug, Serialize)]
pub struct Dataset {
    groups: Vec<Group>,
    variables: Vec<Variable>,
    dimensions: Vec<Dimension>,
}

impl Default for Dataset {
    fn default() -> Self {
        Self::new()
    }
}

impl Dataset {
    /// Create a dataset holding only the root group.
    pub fn new() -> Self {
        Self {
            groups: vec![Group::new(String::new(), None, None)],
            variables: Vec::new(),
            dimensions: Vec::new(),
        }
    }

    /// The root group.
    pub fn root(&self) -> GroupId {
        GroupId(0)
    }

    /// Group by id.
    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id.0]
    }

    /// Variable by id.
    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id.0]
    }

    /// Dimension by id.
    pub fn dimension(&self, id: DimId) -> &Dimension {
        &self.dimensions[id.0]
    }

    /// All variables with their ids.
    pub fn variables(&self) -> impl Iterator<Item = (VarId, &Variable)> {
        self.variables.iter().enumerate().map(|(i, v)| (VarId(i), v))
    }

    /// All groups with their ids, root first.
    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &Group)> {
        self.groups.iter().enumerate().map(|(i, g)| (GroupId(i), g))
    }

    /// Dimensions still attached to a group.
    pub fn dimensions(&self) -> impl Iterator<Item = (DimId, &Dimension)> {
        self.dimensions
            .iter()
            .enumerate()
            .filter(|(_, d)| d.group.is_some())
            .map(|(i, d)| (DimId(i), d))
    }

    /// Whether `parent` already has a variable or child group called `name`.
    pub fn name_in_use(&self, parent: GroupId, name: &str) -> bool {
        let group = self.group(parent);
        group
            .variables
            .iter()
            .any(|&v| self.variable(v).name == name)
            || group.children.iter().any(|&g| self.group(g).name == name)
    }

    /// Name for a new object under `parent`; a taken name gets `reference`
    /// appended.
    pub fn unique_name(&self, parent: GroupId, name: &str, reference: u16) -> String {
        if self.name_in_use(parent, name) {
            format!("{name}{reference}")
        } else {
            name.to_string()
        }
    }

    /// Add a child group.
    pub fn add_group(
        &mut self,
        parent: GroupId,
        name: impl Into<String>,
        source: Option<TagKey>,
    ) -> GroupId {
        let id = GroupId(self.groups.len());
        self.groups.push(Group::new(name.into(), Some(parent), source));
        self.groups[parent.0].children.push(id);
        id
    }

    /// Add a variable to `group`.
    pub fn add_variable(&mut self, group: GroupId, mut variable: Variable) -> VarId {
        let id = VarId(self.variables.len());
        variable.group = group;
        self.variables.push(variable);
        self.groups[group.0].variables.push(id);
        id
    }

    /// Add a dimension to `group`.
    pub fn add_dimension(&mut self, group: GroupId, mut dimension: Dimension) -> DimId {
        let id = DimId(self.dimensions.len());
        dimension.group = Some(group);
        self.dimensions.push(dimension);
        self.groups[group.0].dimensions.push(id);
        id
    }

    /// Attach an attribute, replacing one of the same name.
    pub fn add_attribute(&mut self, target: Target, attribute: Attribute) {
        let attributes = match target {
            Target::Group(g) => &mut self.groups[g.0].attributes,
            Target::Variable(v) => &mut self.variables[v.0].attributes,
        };
        match attributes.iter_mut().find(|a| a.name == attribute.name) {
            Some(existing) => *existing = attribute,
            None => attributes.push(attribute),
        }
    }

    /// Move a variable into another group, renaming it on collision.
    pub fn move_variable(&mut self, var: VarId, to: GroupId, reference: u16) {
        let from = self.variables[var.0].group;
        if from == to {
            return;
        }
        self.groups[from.0].variables.retain(|&v| v != var);
        let name = self.unique_name(to, &self.variables[var.0].name, reference);
        let variable = &mut self.variables[var.0];
        variable.name = name;
        variable.group = to;
        self.groups[to.0].variables.push(var);
    }

    /// Move a group under a new parent, renaming it on collision.
    ///
    /// Moving a group below itself is ignored.
    pub fn reparent_group(&mut self, group: GroupId, to: GroupId, reference: u16) {
        let Some(from) = self.groups[group.0].parent else {
            return;
        };
        if from == to || self.ancestors(to).contains(&group) {
            return;
        }
        self.groups[from.0].children.retain(|&g| g != group);
        let name = self.unique_name(to, &self.groups[group.0].name, reference);
        self.groups[group.0].name = name;
        self.groups[group.0].parent = Some(to);
        self.groups[to.0].children.push(group);
    }

    /// Move a dimension to another group, or detach it with `None`.
    pub(crate) fn move_dimension(&mut self, dim: DimId, to: Option<GroupId>) {
        if let Some(from) = self.dimensions[dim.0].group {
            self.groups[from.0].dimensions.retain(|&d| d != dim);
        }
        if let Some(to) = to {
            self.groups[to.0].dimensions.push(dim);
        }
        self.dimensions[dim.0].group = to;
    }

    /// Chain from `group` up to the root, `group` first.
    pub fn ancestors(&self, group: GroupId) -> Vec<GroupId> {
        let mut chain = vec![group];
        let mut current = group;
        while let Some(parent) = self.groups[current.0].parent {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Lowest group that is an ancestor of (or equal to) every given group.
    pub fn common_ancestor(&self, groups: &[GroupId]) -> GroupId {
        let Some((&first, rest)) = groups.split_first() else {
            return self.root();
        };
        let mut candidate = self.ancestors(first);
        for &g in rest {
            let chain = self.ancestors(g);
            candidate.retain(|c| chain.contains(c));
        }
        candidate.first().copied().unwrap_or_else(|| self.root())
    }

    /// Slash-separated path of a group; the root is `/`.
    pub fn group_path(&self, group: GroupId) -> String {
        let mut names: Vec<&str> = self
            .ancestors(group)
            .iter()
            .rev()
            .skip(1)
            .map(|g| self.groups[g.0].name.as_str())
            .collect();
        if names.is_empty() {
            return "/".to_string();
        }
        names.insert(0, "");
        names.join("/")
    }

    /// Slash-separated path of a variable.
    pub fn variable_path(&self, var: VarId) -> String {
        let v = self.variable(var);
        let parent = self.group_path(v.group);
        if parent == "/" {
            format!("/{}", v.name)
        } else {
            format!("{}/{}", parent, v.name)
        }
    }

    /// Find a child group by name.
    pub fn find_child(&self, parent: GroupId, name: &str) -> Option<GroupId> {
        self.group(parent)
            .children
            .iter()
            .copied()
            .find(|&g| self.group(g).name == name)
    }

    /// Find a group by slash-separated path.
    pub fn find_group(&self, path: &str) -> Option<GroupId> {
        let mut current = self.root();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current = self.find_child(current, part)?;
        }
        Some(current)
    }

    /// Find a variable by slash-separated path; a bare name is looked up in
    /// the root group.
    pub fn find_variable(&self, path: &str) -> Option<VarId> {
        let trimmed = path.trim_start_matches('/');
        let (group, name) = match trimmed.rfind('/') {
            Some(i) => (self.find_group(&trimmed[..i])?, &trimmed[i + 1..]),
            None => (self.root(), trimmed),
        };
        self.group(group)
            .variables
            .iter()
            .copied()
            .find(|&v| self.variable(v).name == name)
    }

    /// Find a dimension visible from `group` by name, innermost first.
    pub fn find_dimension(&self, group: GroupId, name: &str) -> Option<DimId> {
        self.ancestors(group).into_iter().find_map(|g| {
            self.group(g)
                .dimensions
                .iter()
                .copied()
                .find(|&d| self.dimension(d).name == name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Variable {
        let mut v = Variable::new(name, DataType::Float32, TagKey::new(720, 1));
        v.set_shape(vec![2, 3]);
        v
    }

    #[test]
    fn test_paths_and_lookup() {
        let mut ds = Dataset::new();
        let a = ds.add_group(ds.root(), "a", None);
        let b = ds.add_group(a, "b", None);
        let v = ds.add_variable(b, var("temp"));
        assert_eq!(ds.group_path(ds.root()), "/");
        assert_eq!(ds.group_path(b), "/a/b");
        assert_eq!(ds.variable_path(v), "/a/b/temp");
        assert_eq!(ds.find_variable("/a/b/temp"), Some(v));
        assert_eq!(ds.find_variable("a/b/temp"), Some(v));
        assert_eq!(ds.find_variable("temp"), None);
        assert_eq!(ds.find_group("/a"), Some(a));
    }

    #[test]
    fn test_unique_name_appends_reference() {
        let mut ds = Dataset::new();
        let root = ds.root();
        ds.add_variable(root, var("temp"));
        assert_eq!(ds.unique_name(root, "temp", 12), "temp12");
        assert_eq!(ds.unique_name(root, "pressure", 12), "pressure");
    }

    #[test]
    fn test_move_variable_renames_on_collision() {
        let mut ds = Dataset::new();
        let g = ds.add_group(ds.root(), "g", None);
        ds.add_variable(g, var("x"));
        let moved = ds.add_variable(ds.root(), var("x"));
        ds.move_variable(moved, g, 7);
        assert_eq!(ds.variable(moved).name, "x7");
        assert_eq!(ds.variable(moved).group, g);
        assert!(ds.group(ds.root()).variables.is_empty());
    }

    #[test]
    fn test_common_ancestor() {
        let mut ds = Dataset::new();
        let a = ds.add_group(ds.root(), "a", None);
        let b = ds.add_group(a, "b", None);
        let c = ds.add_group(a, "c", None);
        let d = ds.add_group(ds.root(), "d", None);
        assert_eq!(ds.common_ancestor(&[b, c]), a);
        assert_eq!(ds.common_ancestor(&[b, b]), b);
        assert_eq!(ds.common_ancestor(&[b, d]), ds.root());
    }

    #[test]
    fn test_reparent_group() {
        let mut ds = Dataset::new();
        let a = ds.add_group(ds.root(), "a", None);
        let b = ds.add_group(ds.root(), "b", None);
        ds.reparent_group(b, a, 3);
        assert_eq!(ds.group(b).parent, Some(a));
        assert_eq!(ds.group_path(b), "/a/b");
        assert_eq!(ds.group(ds.root()).children, vec![a]);
    }
}
