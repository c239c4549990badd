//! Object construction
//!
//! Builds the [`Dataset`] from a decoded tag directory in four ordered
//! passes. Each tag is owned by at most one model object; ownership is
//! tracked in a [`ClaimIndex`] so later passes skip what earlier passes
//! took.
//!
//! 1. Structural V-groups (`Dim`, `UDim`, `Var`, `CDF0.0`) and raster
//!    image groups
//! 2. `Data` Vdata and numeric data groups
//! 3. Any remaining Vdata that is not an attribute or chunk table
//! 4. Remaining V-groups become groups
//!
//! Annotations, file-level attributes and dimension pruning follow.

use ahash::AHashMap;
use hdf4_format::constants::*;
use hdf4_format::cursor::bytes_to_string;
use hdf4_format::payload::{MinMax, SdDimension, TextArray, VDataHeader, VGroupInfo};
use hdf4_format::{DataType, FormatError, Result, Special, TagKey, TagPayload, Values};
use serde::Serialize;
use tracing::{debug, warn};

use crate::access;
use crate::directory::TagDirectory;
use crate::layout::Resolver;
use crate::model::{Attribute, Dataset, DimId, Dimension, GroupId, Member, Target, VarId, Variable};
use crate::source::ByteSource;
use crate::{DecodeOptions, Diagnostic};

/// Model object that took ownership of a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Claimant {
    /// Part of a variable
    Variable(VarId),
    /// Part of a dimension
    Dimension(DimId),
    /// A group's V-group
    Group(GroupId),
    /// Became an attribute of a group or variable
    Attribute(Target),
    /// Consumed without producing an object
    Metadata,
}

impl Claimant {
    /// Short name for messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Claimant::Variable(_) => "variable",
            Claimant::Dimension(_) => "dimension",
            Claimant::Group(_) => "group",
            Claimant::Attribute(_) => "attribute",
            Claimant::Metadata => "metadata record",
        }
    }
}

/// Tag ownership; the first claim on a key wins
#[derive(Debug, Default, Clone)]
pub struct ClaimIndex {
    claims: AHashMap<TagKey, Claimant>,
}

impl ClaimIndex {
    /// Record `claimant` as owner of `key` unless already owned.
    ///
    /// Returns whether the claim was recorded.
    pub fn claim(&mut self, key: TagKey, claimant: Claimant) -> bool {
        match self.claims.entry(key) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(claimant);
                true
            }
        }
    }

    /// Owner of `key`.
    pub fn get(&self, key: TagKey) -> Option<Claimant> {
        self.claims.get(&key).copied()
    }

    /// Whether `key` has an owner.
    pub fn is_claimed(&self, key: TagKey) -> bool {
        self.claims.contains_key(&key)
    }

    /// Number of claimed tags.
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Whether nothing is claimed.
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

/// Result of construction
#[derive(Debug)]
pub struct Construction {
    /// The object model
    pub dataset: Dataset,
    /// Tag ownership
    pub claims: ClaimIndex,
    /// Conditions met along the way
    pub diagnostics: Vec<Diagnostic>,
}

/// Build the dataset of a decoded directory.
pub fn build(
    source: &dyn ByteSource,
    directory: &TagDirectory,
    opts: &DecodeOptions,
) -> Result<Construction> {
    let mut constructor = Constructor {
        source,
        directory,
        opts,
        dataset: Dataset::new(),
        claims: ClaimIndex::default(),
        diagnostics: Vec::new(),
        stack: Vec::new(),
    };
    constructor.structural_pass()?;
    constructor.data_pass()?;
    constructor.vdata_pass()?;
    constructor.group_pass()?;
    constructor.annotations()?;
    constructor.file_attributes();
    let moved = prune_dimensions(&mut constructor.dataset);
    debug!(
        variables = constructor.dataset.variables().count(),
        groups = constructor.dataset.groups().count(),
        pruned = moved,
        "constructed dataset"
    );
    Ok(Construction {
        dataset: constructor.dataset,
        claims: constructor.claims,
        diagnostics: constructor.diagnostics,
    })
}

/// Drop dimensions no variable uses and move each remaining one to the
/// lowest common ancestor of its users, until nothing changes.
///
/// Returns the number of dimensions moved or dropped.
pub fn prune_dimensions(dataset: &mut Dataset) -> usize {
    let mut total = 0;
    loop {
        let dims: Vec<(DimId, Option<GroupId>)> =
            dataset.dimensions().map(|(id, d)| (id, d.group)).collect();
        let mut changed = 0;
        for (dim, current) in dims {
            let users: Vec<GroupId> = dataset
                .variables()
                .filter(|(_, v)| v.dims.contains(&Some(dim)))
                .map(|(_, v)| v.group)
                .collect();
            let target = if users.is_empty() {
                None
            } else {
                Some(dataset.common_ancestor(&users))
            };
            if target != current {
                dataset.move_dimension(dim, target);
                changed += 1;
            }
        }
        if changed == 0 {
            return total;
        }
        total += changed;
    }
}

/// Scientific data parts gathered from a group's members
#[derive(Default)]
struct SdParts {
    number_type: Option<TagKey>,
    dimension: Option<SdDimension>,
    data: Option<TagKey>,
    labels: Option<TextArray>,
    units: Option<TextArray>,
    formats: Option<TextArray>,
    min_max: Option<MinMax>,
    coordsys: Option<String>,
    keys: Vec<TagKey>,
}

impl SdParts {
    fn collect(&mut self, directory: &TagDirectory, members: &[TagKey]) {
        for &key in members {
            let payload = directory.get(key).map(|r| &r.payload);
            let used = match (key.code, payload) {
                (TAG_NUMBER_TYPE, _) => {
                    self.number_type.get_or_insert(key);
                    true
                }
                (TAG_SD_DATA, _) => {
                    self.data.get_or_insert(key);
                    true
                }
                (TAG_SD_DIMENSION, Some(TagPayload::SdDimension(sdd))) => {
                    self.dimension.get_or_insert_with(|| sdd.clone());
                    true
                }
                (TAG_SD_LABELS, Some(TagPayload::TextArray(t))) => {
                    self.labels.get_or_insert_with(|| t.clone());
                    true
                }
                (TAG_SD_UNITS, Some(TagPayload::TextArray(t))) => {
                    self.units.get_or_insert_with(|| t.clone());
                    true
                }
                (TAG_SD_FORMATS, Some(TagPayload::TextArray(t))) => {
                    self.formats.get_or_insert_with(|| t.clone());
                    true
                }
                (TAG_SD_MAXMIN, Some(TagPayload::MinMax(m))) => {
                    self.min_max.get_or_insert_with(|| m.clone());
                    true
                }
                (TAG_SD_COORDSYS, Some(TagPayload::FreeText { text })) => {
                    self.coordsys.get_or_insert_with(|| text.clone());
                    true
                }
                _ => false,
            };
            if used {
                self.keys.push(key);
            }
        }
    }
}

fn is_structural(vg: &VGroupInfo) -> bool {
    [CLASS_DIM, CLASS_UDIM, CLASS_VAR, CLASS_CDF]
        .iter()
        .any(|class| vg.has_class(class))
}

/// Whether an attribute Vdata is large metadata text that reads better as a
/// variable.
fn is_metadata_variable(vh: &VDataHeader) -> bool {
    let [field] = vh.fields.as_slice() else {
        return false;
    };
    if !matches!(field.data_type(), Ok(DataType::Char)) {
        return false;
    }
    let name = vh.name.to_lowercase();
    field.size as usize > LARGE_METADATA_ATTRIBUTE_SIZE
        || METADATA_VARIABLE_PREFIXES
            .iter()
            .any(|prefix| name.starts_with(prefix))
}

fn storage_key(vh_key: TagKey) -> TagKey {
    TagKey::new(TAG_VDATA_STORAGE, vh_key.reference)
}

struct Constructor<'a> {
    source: &'a dyn ByteSource,
    directory: &'a TagDirectory,
    opts: &'a DecodeOptions,
    dataset: Dataset,
    claims: ClaimIndex,
    diagnostics: Vec<Diagnostic>,
    // V-groups currently being turned into groups
    stack: Vec<TagKey>,
}

impl Constructor<'_> {
    fn warning(&mut self, tag: Option<TagKey>, message: String) {
        match tag {
            Some(tag) => warn!(tag = %tag, "{message}"),
            None => warn!("{message}"),
        }
        self.diagnostics.push(Diagnostic::warning(tag, message));
    }

    /// Record a failed object; in strict mode the failure ends construction.
    fn skipped(&mut self, tag: TagKey, what: &str, err: FormatError) -> Result<()> {
        warn!(tag = %tag, error = %err, "{what} skipped");
        self.diagnostics
            .push(Diagnostic::error(Some(tag), format!("{what} skipped: {err}")));
        if self.opts.strict {
            return Err(err);
        }
        Ok(())
    }

    fn read_bytes(&self, key: TagKey) -> Result<Vec<u8>> {
        let element = Resolver::new(self.source, self.directory, self.opts).element(key)?;
        access::read_element(self.source, &element, self.opts)
    }

    /// Records of a Vdata; a header without storage has none.
    fn vdata_bytes(&self, vh_key: TagKey) -> Result<Vec<u8>> {
        let vs = storage_key(vh_key);
        if self.directory.get(vs).is_none() {
            return Ok(Vec::new());
        }
        self.read_bytes(vs)
    }

    fn number_type(&self, key: TagKey) -> Result<DataType> {
        match &self.directory.require(key, "number type")?.payload {
            TagPayload::NumberType(nt) => nt.data_type(),
            other => Err(FormatError::Corrupt(format!(
                "{key} holds {} where a number type was expected",
                other.kind()
            ))),
        }
    }

    fn add_variable(&mut self, group: GroupId, mut variable: Variable, key: TagKey) -> VarId {
        variable.name = self.dataset.unique_name(group, &variable.name, key.reference);
        let chunk_table = variable
            .storage
            .data
            .and_then(|data| self.directory.get(data))
            .and_then(|record| match &record.payload {
                TagPayload::DataBlock(block) => match &block.special {
                    Some(Special::Chunked(chunked)) => Some(chunked.chunk_table),
                    _ => None,
                },
                _ => None,
            });
        let id = self.dataset.add_variable(group, variable);
        // the chunk table is read by the layout resolver, not built as an object
        if let Some(table) = chunk_table {
            self.claims.claim(table, Claimant::Variable(id));
            self.claims.claim(storage_key(table), Claimant::Variable(id));
        }
        id
    }

    // ---- pass 1 ----

    fn structural_pass(&mut self) -> Result<()> {
        let directory = self.directory;
        for record in directory.tags() {
            let key = record.entry.key();
            if self.claims.is_claimed(key) {
                continue;
            }
            let outcome = match &record.payload {
                TagPayload::VGroup(vg) if vg.has_class(CLASS_DIM) || vg.has_class(CLASS_UDIM) => {
                    self.build_dimension(key, vg).map(|_| ()).map_err(|e| ("dimension", e))
                }
                TagPayload::VGroup(vg) if vg.has_class(CLASS_VAR) => {
                    self.build_var_group(key, vg).map_err(|e| ("variable", e))
                }
                TagPayload::VGroup(vg) if vg.has_class(CLASS_CDF) => {
                    self.build_cdf_attributes(key, vg).map_err(|e| ("attribute group", e))
                }
                TagPayload::Group(rig) if key.code == TAG_RASTER_GROUP => {
                    self.build_image(key, &rig.members).map_err(|e| ("image", e))
                }
                _ => Ok(()),
            };
            if let Err((what, err)) = outcome {
                self.skipped(key, what, err)?;
            }
        }
        Ok(())
    }

    fn build_dimension(&mut self, key: TagKey, vg: &VGroupInfo) -> Result<DimId> {
        if let Some(Claimant::Dimension(dim)) = self.claims.get(key) {
            return Ok(dim);
        }
        let root = self.dataset.root();
        let dim = match self.dataset.find_dimension(root, &vg.name) {
            Some(existing) => existing,
            None => {
                let length = self.dimension_length(vg)?;
                let unlimited = vg.has_class(CLASS_UDIM) || length.is_none();
                if length.is_none() {
                    self.warning(
                        Some(key),
                        format!("dimension '{}' has no length; treated as unlimited", vg.name),
                    );
                }
                self.dataset.add_dimension(
                    root,
                    Dimension {
                        name: vg.name.clone(),
                        length: length.unwrap_or(0),
                        shared: true,
                        unlimited,
                        group: None,
                    },
                )
            }
        };
        self.claims.claim(key, Claimant::Dimension(dim));
        for &member in &vg.members {
            self.claims.claim(member, Claimant::Dimension(dim));
            if member.code == TAG_VDATA_HEADER {
                self.claims.claim(storage_key(member), Claimant::Dimension(dim));
            }
        }
        Ok(dim)
    }

    /// Length from a direct `VS` member, else from the first member Vdata
    /// whose records start with a positive integer. Zero means unknown.
    fn dimension_length(&self, vg: &VGroupInfo) -> Result<Option<usize>> {
        let leading = |bytes: &[u8]| {
            (bytes.len() >= 4).then(|| i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        };
        if let Some(&vs) = vg.members.iter().find(|k| k.code == TAG_VDATA_STORAGE) {
            match leading(&self.read_bytes(vs)?) {
                Some(n) if n > 0 => return Ok(Some(n as usize)),
                _ => {}
            }
        }
        for &member in vg.members.iter().filter(|k| k.code == TAG_VDATA_HEADER) {
            match leading(&self.vdata_bytes(member)?) {
                Some(n) if n > 0 => return Ok(Some(n as usize)),
                _ => {}
            }
        }
        Ok(None)
    }

    fn build_var_group(&mut self, key: TagKey, vg: &VGroupInfo) -> Result<()> {
        let directory = self.directory;
        let mut parts = SdParts::default();
        parts.collect(directory, &vg.members);

        let mut nested = Vec::new();
        let mut dims = Vec::new();
        let mut attributes = Vec::new();
        let mut vdata = None;
        for &member in &vg.members {
            match directory.get(member).map(|r| &r.payload) {
                Some(TagPayload::Group(ndg)) if member.code == TAG_NUMERIC_GROUP => {
                    parts.collect(directory, &ndg.members);
                    nested.push(member);
                }
                Some(TagPayload::VGroup(child))
                    if child.has_class(CLASS_DIM) || child.has_class(CLASS_UDIM) =>
                {
                    match self.build_dimension(member, child) {
                        Ok(dim) => dims.push(dim),
                        Err(err) => self.skipped(member, "dimension", err)?,
                    }
                }
                Some(TagPayload::VDataHeader(vh)) if vh.has_class(CLASS_ATTRIBUTE) => {
                    attributes.push((member, vh));
                }
                Some(TagPayload::VDataHeader(vh)) if vdata.is_none() => vdata = Some((member, vh)),
                _ => {}
            }
        }

        let root = self.dataset.root();
        let id = if parts.dimension.is_some() {
            let mut variable = self.sd_variable(&vg.name, key, &parts)?;
            self.bind_dimensions(key, &mut variable, &dims);
            self.add_variable(root, variable, key)
        } else if let Some((vh_key, vh)) = vdata {
            let mut variable = self.vdata_variable(vh_key, vh)?;
            variable.name = vg.name.clone();
            let id = self.add_variable(root, variable, key);
            self.claims.claim(vh_key, Claimant::Variable(id));
            self.claims.claim(storage_key(vh_key), Claimant::Variable(id));
            id
        } else {
            return Err(FormatError::Corrupt(format!(
                "variable group '{}' has neither dimension record nor Vdata",
                vg.name
            )));
        };

        self.claims.claim(key, Claimant::Variable(id));
        for part in parts.keys.iter().chain(&nested) {
            self.claims.claim(*part, Claimant::Variable(id));
        }
        for (vh_key, vh) in attributes {
            self.vdata_attribute_to(Target::Variable(id), vh_key, vh)?;
        }
        Ok(())
    }

    /// Attach shared dimensions axis by axis; axes whose dimension does not
    /// fit stay anonymous.
    fn bind_dimensions(&mut self, key: TagKey, variable: &mut Variable, dims: &[DimId]) {
        if dims.is_empty() {
            return;
        }
        if dims.len() != variable.rank() {
            let err = FormatError::InconsistentShape(format!(
                "'{}' lists {} dimensions for rank {}",
                variable.name,
                dims.len(),
                variable.rank()
            ));
            self.warning(Some(key), err.to_string());
            return;
        }
        let mut bound = Vec::with_capacity(dims.len());
        for (axis, &dim) in dims.iter().enumerate() {
            let dimension = self.dataset.dimension(dim);
            if dimension.unlimited || dimension.length == variable.shape[axis] {
                bound.push(Some(dim));
            } else {
                let message = format!(
                    "dimension '{}' has length {} but axis {} of '{}' has {}",
                    dimension.name, dimension.length, axis, variable.name, variable.shape[axis]
                );
                self.warning(Some(key), message);
                bound.push(None);
            }
        }
        let shape = variable.shape.clone();
        variable.set_dimensions(shape, bound);
    }

    fn build_cdf_attributes(&mut self, key: TagKey, vg: &VGroupInfo) -> Result<()> {
        self.claims.claim(key, Claimant::Metadata);
        let root = self.dataset.root();
        let directory = self.directory;
        for &member in &vg.members {
            if let Some(TagPayload::VDataHeader(vh)) = directory.get(member).map(|r| &r.payload) {
                if vh.has_class(CLASS_ATTRIBUTE) && !self.claims.is_claimed(member) {
                    self.attribute_or_metadata(root, member, vh)?;
                }
            }
        }
        Ok(())
    }

    /// Attach an `Att` Vdata to `group`, or build a char variable from it
    /// when it holds large metadata text.
    fn attribute_or_metadata(&mut self, group: GroupId, key: TagKey, vh: &VDataHeader) -> Result<()> {
        if !is_metadata_variable(vh) {
            return self.vdata_attribute_to(Target::Group(group), key, vh);
        }
        let length = vh.records() * vh.fields[0].size as usize;
        let mut variable = Variable::new(vh.name.clone(), DataType::Char, key);
        variable.set_shape(vec![length]);
        if self.directory.get(storage_key(key)).is_some() {
            variable.storage.data = Some(storage_key(key));
        }
        let id = self.add_variable(group, variable, key);
        debug!(tag = %key, name = %vh.name, "metadata attribute promoted to variable");
        self.claims.claim(key, Claimant::Variable(id));
        self.claims.claim(storage_key(key), Claimant::Variable(id));
        Ok(())
    }

    fn vdata_attribute_to(&mut self, target: Target, key: TagKey, vh: &VDataHeader) -> Result<()> {
        match self.vdata_attribute(key, vh) {
            Ok(attribute) => {
                self.dataset.add_attribute(target, attribute);
                self.claims.claim(key, Claimant::Attribute(target));
                self.claims.claim(storage_key(key), Claimant::Attribute(target));
                Ok(())
            }
            Err(err) => self.skipped(key, "attribute", err),
        }
    }

    fn vdata_attribute(&self, key: TagKey, vh: &VDataHeader) -> Result<Attribute> {
        let field = vh
            .fields
            .first()
            .ok_or_else(|| FormatError::Corrupt(format!("attribute {key} has no fields")))?;
        let data_type = field.data_type()?;
        let bytes = self.vdata_bytes(key)?;
        let records = vh.records();

        let value = if data_type.is_char() {
            let width = field.size as usize;
            let text = &bytes[..bytes.len().min(records * width)];
            if records == 1 {
                Values::Text(bytes_to_string(text))
            } else {
                Values::strings_from_bytes(text, width)
            }
        } else {
            let size = data_type.size();
            let count = records * field.order as usize;
            let whole = (count * size).min(bytes.len() / size * size);
            Values::from_be_bytes(data_type, &bytes[..whole])?
        };
        Ok(Attribute::new(vh.name.clone(), value))
    }

    fn build_image(&mut self, key: TagKey, members: &[TagKey]) -> Result<()> {
        let dim_key = members
            .iter()
            .copied()
            .find(|k| k.code == TAG_IMAGE_DIM)
            .ok_or_else(|| FormatError::Corrupt(format!("{key} has no image dimension")))?;
        let directory = self.directory;
        let TagPayload::RasterDimension(dim) = &directory.require(dim_key, "image dimension")?.payload
        else {
            return Err(FormatError::Corrupt(format!("{dim_key} is not an image dimension")));
        };
        if dim.compression.code != 0 {
            self.warning(
                Some(key),
                format!("compressed raster image ({}) not supported", dim.compression),
            );
            return Ok(());
        }
        let data_type = self.number_type(dim.number_type)?;
        let (y, x) = (dim.y.max(0) as usize, dim.x.max(0) as usize);
        let shape = if dim.components > 1 {
            vec![y, x, dim.components as usize]
        } else {
            vec![y, x]
        };

        let mut variable = Variable::new(format!("Image-{}", key.reference), data_type, key);
        variable.set_shape(shape);
        variable.storage.data = members.iter().copied().find(|k| k.code == TAG_RASTER_IMAGE);
        if dim.interlace != 0 {
            self.warning(
                Some(key),
                format!("raster interlace {} read as pixel interlace", dim.interlace),
            );
        }
        let root = self.dataset.root();
        let id = self.add_variable(root, variable, key);
        self.claims.claim(key, Claimant::Variable(id));
        self.claims.claim(dim_key, Claimant::Variable(id));
        self.claims.claim(dim.number_type, Claimant::Metadata);
        if let Some(data) = self.dataset.variable(id).storage.data {
            self.claims.claim(data, Claimant::Variable(id));
        }

        if let Some(palette) = members.iter().copied().find(|k| k.code == TAG_PALETTE) {
            if directory.get(palette).is_some() {
                let bytes = self.read_bytes(palette)?;
                self.dataset
                    .add_attribute(Target::Variable(id), Attribute::new("palette", Values::UInt8(bytes)));
                self.claims.claim(palette, Claimant::Attribute(Target::Variable(id)));
            } else {
                self.warning(Some(palette), format!("palette of {key} not found"));
            }
        }
        Ok(())
    }

    // ---- pass 2 ----

    fn data_pass(&mut self) -> Result<()> {
        let directory = self.directory;
        let root = self.dataset.root();
        for record in directory.tags() {
            let key = record.entry.key();
            if self.claims.is_claimed(key) {
                continue;
            }
            match &record.payload {
                TagPayload::VDataHeader(vh) if vh.has_class(CLASS_DATA) => {
                    if let Err(err) = self.add_vdata_variable(root, key, vh) {
                        self.skipped(key, "vdata variable", err)?;
                    }
                }
                TagPayload::Group(ndg) if key.code == TAG_NUMERIC_GROUP => {
                    if let Err(err) = self.build_sds(key, &ndg.members) {
                        self.skipped(key, "scientific dataset", err)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn build_sds(&mut self, key: TagKey, members: &[TagKey]) -> Result<()> {
        let mut parts = SdParts::default();
        parts.collect(self.directory, members);
        let variable = self.sd_variable(&format!("SDS-{}", key.reference), key, &parts)?;
        let root = self.dataset.root();
        let id = self.add_variable(root, variable, key);
        self.claims.claim(key, Claimant::Variable(id));
        for &part in &parts.keys {
            self.claims.claim(part, Claimant::Variable(id));
        }
        Ok(())
    }

    /// Variable from a dimension record, number type and data tag, with the
    /// auxiliary text and range tags as attributes.
    fn sd_variable(&self, name: &str, key: TagKey, parts: &SdParts) -> Result<Variable> {
        let sdd = parts
            .dimension
            .as_ref()
            .ok_or_else(|| FormatError::Corrupt(format!("{key} has no dimension record")))?;
        self.opts.limits.check_rank(sdd.rank as usize)?;
        let data_type = self.number_type(parts.number_type.unwrap_or(sdd.number_type))?;

        let mut variable = Variable::new(name, data_type, key);
        variable.set_shape(sdd.lengths());
        variable.storage.data = parts.data;

        let text = |t: &Option<TextArray>| t.as_ref().map(TextArray::first).filter(|s| !s.is_empty());
        for (attr, value) in [
            ("long_name", text(&parts.labels)),
            ("units", text(&parts.units)),
            ("format", text(&parts.formats)),
            ("coordsys", parts.coordsys.clone().filter(|s| !s.is_empty())),
        ] {
            if let Some(value) = value {
                variable.attributes.push(Attribute::text(attr, value));
            }
        }
        if let Some((max, min)) = parts.min_max.as_ref().and_then(|m| m.interpret(data_type)) {
            variable.attributes.push(Attribute::new("valid_max", max));
            variable.attributes.push(Attribute::new("valid_min", min));
        }
        Ok(variable)
    }

    // ---- pass 3 ----

    fn vdata_pass(&mut self) -> Result<()> {
        let directory = self.directory;
        let root = self.dataset.root();
        for record in directory.tags() {
            let key = record.entry.key();
            if self.claims.is_claimed(key) {
                continue;
            }
            if let TagPayload::VDataHeader(vh) = &record.payload {
                if vh.has_class(CLASS_ATTRIBUTE) || vh.has_class(CLASS_CHUNK_TABLE) {
                    continue;
                }
                if let Err(err) = self.add_vdata_variable(root, key, vh) {
                    self.skipped(key, "vdata variable", err)?;
                }
            }
        }
        Ok(())
    }

    fn add_vdata_variable(&mut self, group: GroupId, key: TagKey, vh: &VDataHeader) -> Result<VarId> {
        let variable = self.vdata_variable(key, vh)?;
        let id = self.add_variable(group, variable, key);
        self.claims.claim(key, Claimant::Variable(id));
        self.claims.claim(storage_key(key), Claimant::Variable(id));
        Ok(id)
    }

    fn vdata_variable(&mut self, key: TagKey, vh: &VDataHeader) -> Result<Variable> {
        if vh.fields.is_empty() {
            return Err(FormatError::Corrupt(format!("Vdata {key} has no fields")));
        }
        if vh.interlace != 0 {
            self.warning(
                Some(key),
                format!("Vdata interlace {} read as full interlace", vh.interlace),
            );
        }
        let records = vh.records();
        let record_shape = if records > 1 { vec![records] } else { Vec::new() };

        let mut variable = if let [field] = vh.fields.as_slice() {
            let data_type = field.data_type()?;
            let order = field.order as usize;
            let mut shape = record_shape;
            if order > 1 {
                shape.push(order);
            }
            let mut variable = Variable::new(vh.name.clone(), data_type, key);
            variable.set_shape(shape);
            variable
        } else {
            let mut variable = Variable::new(vh.name.clone(), DataType::Compound, key);
            for field in &vh.fields {
                let order = field.order as usize;
                variable.members.push(Member {
                    name: field.name.clone(),
                    data_type: field.data_type()?,
                    shape: if order > 1 { vec![order] } else { Vec::new() },
                    offset: field.offset as usize,
                });
            }
            variable.element_size = vh.record_size as usize;
            variable.set_shape(record_shape);
            variable
        };
        if self.directory.get(storage_key(key)).is_some() {
            variable.storage.data = Some(storage_key(key));
        }
        Ok(variable)
    }

    // ---- pass 4 ----

    fn group_pass(&mut self) -> Result<()> {
        let directory = self.directory;
        let root = self.dataset.root();
        for record in directory.tags() {
            let key = record.entry.key();
            if self.claims.is_claimed(key) {
                continue;
            }
            if let TagPayload::VGroup(vg) = &record.payload {
                if !is_structural(vg) {
                    self.make_group(key, vg, root)?;
                }
            }
        }
        Ok(())
    }

    fn make_group(&mut self, key: TagKey, vg: &VGroupInfo, parent: GroupId) -> Result<Option<GroupId>> {
        if vg.members.is_empty() {
            return Ok(None);
        }
        let name = self.dataset.unique_name(parent, &vg.name, key.reference);
        let group = self.dataset.add_group(parent, name, Some(key));
        self.claims.claim(key, Claimant::Group(group));
        self.stack.push(key);
        let outcome = self.group_members(key, vg, group);
        self.stack.pop();
        outcome.map(|()| Some(group))
    }

    fn group_members(&mut self, key: TagKey, vg: &VGroupInfo, group: GroupId) -> Result<()> {
        let root = self.dataset.root();
        let directory = self.directory;

        for &member in &vg.members {
            if self.stack.contains(&member) {
                let err = FormatError::CycleDetected(member);
                self.warning(Some(key), format!("{err}; member skipped"));
                continue;
            }
            match self.claims.get(member) {
                Some(Claimant::Variable(var)) => {
                    self.dataset.move_variable(var, group, member.reference);
                }
                Some(Claimant::Group(child)) => {
                    if self.dataset.group(child).parent == Some(root) {
                        self.dataset.reparent_group(child, group, member.reference);
                    }
                }
                Some(_) => {}
                None => match directory.get(member).map(|r| &r.payload) {
                    Some(TagPayload::VDataHeader(vh)) if vh.has_class(CLASS_ATTRIBUTE) => {
                        self.attribute_or_metadata(group, member, vh)?;
                    }
                    Some(TagPayload::VGroup(child)) if !is_structural(child) => {
                        let max_depth = self.opts.limits.max_group_depth;
                        if self.stack.len() >= max_depth {
                            // left unclaimed; pass 4 builds it at the root later
                            self.warning(
                                Some(key),
                                format!("groups nested deeper than {max_depth}; {member} not nested"),
                            );
                            continue;
                        }
                        self.make_group(member, child, group)?;
                    }
                    _ => {}
                },
            }
        }
        Ok(())
    }

    // ---- annotations and file attributes ----

    fn annotations(&mut self) -> Result<()> {
        let directory = self.directory;
        for record in directory.tags() {
            let TagPayload::Annotation(annotation) = &record.payload else {
                continue;
            };
            let key = record.entry.key();
            let name = if key.code == TAG_DATA_LABEL {
                "long_name"
            } else {
                "description"
            };
            let target = match self.claims.get(annotation.target) {
                Some(Claimant::Variable(var)) => Target::Variable(var),
                Some(Claimant::Group(group)) => Target::Group(group),
                Some(other) => {
                    let message = format!(
                        "annotation target {} is a {} and cannot be annotated",
                        annotation.target,
                        other.kind()
                    );
                    self.warning(Some(key), message);
                    continue;
                }
                None if directory.get(annotation.target).is_some() => {
                    let message = format!(
                        "annotation target {} did not become a variable or group",
                        annotation.target
                    );
                    self.warning(Some(key), message);
                    continue;
                }
                None => {
                    let err = FormatError::dangling(annotation.target, "annotation target");
                    self.warning(Some(key), err.to_string());
                    continue;
                }
            };
            self.dataset
                .add_attribute(target, Attribute::text(name, annotation.text.clone()));
            self.claims.claim(key, Claimant::Attribute(target));
        }
        Ok(())
    }

    fn file_attributes(&mut self) {
        let directory = self.directory;
        let root = Target::Group(self.dataset.root());
        for record in directory.tags() {
            let key = record.entry.key();
            let attribute = match (&record.payload, key.code) {
                (TagPayload::Version(version), _) => Attribute::text("HDF4_Version", version.display()),
                (TagPayload::FreeText { text }, TAG_FILE_ID) => {
                    Attribute::text(format!("Title-{}", key.reference), text.clone())
                }
                (TagPayload::FreeText { text }, TAG_FILE_DESC) => {
                    Attribute::text(format!("Description-{}", key.reference), text.clone())
                }
                _ => continue,
            };
            self.dataset.add_attribute(root, attribute);
            self.claims.claim(key, Claimant::Attribute(root));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_claim_wins() {
        let mut claims = ClaimIndex::default();
        let key = TagKey::new(TAG_VDATA_HEADER, 3);
        assert!(claims.claim(key, Claimant::Variable(VarId(0))));
        assert!(!claims.claim(key, Claimant::Metadata));
        assert_eq!(claims.get(key), Some(Claimant::Variable(VarId(0))));
        assert_eq!(claims.len(), 1);
    }

    #[test]
    fn test_prune_reaches_fixed_point() {
        let mut ds = Dataset::new();
        let root = ds.root();
        let a = ds.add_group(root, "a", None);
        let b = ds.add_group(a, "b", None);
        let c = ds.add_group(a, "c", None);
        let dim = |name: &str| Dimension {
            name: name.to_string(),
            length: 4,
            shared: true,
            unlimited: false,
            group: None,
        };
        let used = ds.add_dimension(root, dim("x"));
        let unused = ds.add_dimension(root, dim("y"));

        for group in [b, c] {
            let mut v = Variable::new("v", DataType::Int16, TagKey::new(TAG_NUMERIC_GROUP, 1));
            v.set_dimensions(vec![4], vec![Some(used)]);
            ds.add_variable(group, v);
        }

        assert_eq!(prune_dimensions(&mut ds), 2);
        assert_eq!(ds.dimension(used).group, Some(a));
        assert_eq!(ds.dimension(unused).group, None);
        assert_eq!(ds.group(a).dimensions, vec![used]);
        assert!(ds.group(root).dimensions.is_empty());
        assert_eq!(prune_dimensions(&mut ds), 0);
    }

    #[test]
    fn test_metadata_promotion_rules() {
        use hdf4_format::payload::VDataField;
        let header = |name: &str, size: u16, nt: u8| VDataHeader {
            interlace: 0,
            record_count: 1,
            record_size: size,
            fields: vec![VDataField {
                number_type: nt as u16,
                size,
                offset: 0,
                order: size,
                name: "VALUES".to_string(),
            }],
            name: name.to_string(),
            class_name: CLASS_ATTRIBUTE.to_string(),
            extag: 0,
            exref: 0,
            version: 3,
        };
        assert!(is_metadata_variable(&header("CoreMetadata.0", 10, DFNT_CHAR8)));
        assert!(is_metadata_variable(&header("notes", 5000, DFNT_CHAR8)));
        assert!(!is_metadata_variable(&header("notes", 10, DFNT_CHAR8)));
        assert!(is_metadata_variable(&header("coremetadata", 10, DFNT_UCHAR8)));
        assert!(!is_metadata_variable(&header("coremetadata", 10, DFNT_UINT8)));
    }
}
