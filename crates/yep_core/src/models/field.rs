//! Field descriptors.

use crate::env::Environment;
use crate::models::FieldType;
use crate::security::{AccessControlList, Permission};
use heck::ToSnakeCase;
use std::fmt;
use std::sync::Arc;
use yep_value::{FieldMap, Value};

/// Default value provider of a field.
///
/// Receives the creating environment and the values supplied so far.
pub type DefaultFn = Arc<dyn Fn(&Environment, &FieldMap) -> Value + Send + Sync>;

/// What happens to a foreign key when the referenced record is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnDelete {
    /// The foreign key is cleared.
    #[default]
    SetNull,
    /// Deletion fails while the record is referenced.
    Restrict,
    /// The referencing records are deleted too.
    Cascade,
}

/// How a dependent field gets its value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComputeSource {
    /// By calling a compute method.
    Method(String),
    /// By following a related path.
    Related(String),
}

/// A dependency edge of the field graph.
///
/// Stored on the field being depended upon. When that field changes on
/// some records, the dependent `field` of `model` must be recomputed on
/// the records reaching them through `path` (empty for the same record).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComputeData {
    /// Model of the dependent field.
    pub model: String,
    /// The dependent field.
    pub field: String,
    /// How the dependent field is computed.
    pub source: ComputeSource,
    /// Dotted path from `model` to the model of the changed field.
    pub path: String,
}

/// The link model behind a many-to-many field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct M2MLink {
    /// Link model name.
    pub model: String,
    /// Link field pointing to the field's own model.
    pub ours: String,
    /// Link field pointing to the related model.
    pub theirs: String,
}

/// A field of a model.
///
/// Fields are built with the typed constructors and chained options, then
/// added to a model:
///
/// ```rust
/// use yep_core::models::{Field, OnDelete};
///
/// let name = Field::char("Name").required().index();
/// let partner = Field::many2one("Partner", "Partner").on_delete(OnDelete::Cascade);
/// let total = Field::float("Total").compute("ComputeTotal").depends(["Lines.Amount"]).stored();
/// assert_eq!(partner.json_name(), "partner_id");
/// # let _ = (name, total);
/// ```
#[derive(Clone)]
pub struct Field {
    pub(crate) model: String,
    pub(crate) name: String,
    pub(crate) json: String,
    pub(crate) label: String,
    pub(crate) help: String,
    pub(crate) field_type: FieldType,
    pub(crate) stored: bool,
    pub(crate) required: bool,
    pub(crate) unique: bool,
    pub(crate) index: bool,
    pub(crate) compute: Option<String>,
    pub(crate) depends: Vec<String>,
    pub(crate) related: Option<String>,
    pub(crate) relation: Option<String>,
    pub(crate) reverse_fk: Option<String>,
    pub(crate) m2m: Option<M2MLink>,
    pub(crate) selection: Vec<(String, String)>,
    pub(crate) group_operator: Option<String>,
    pub(crate) size: Option<usize>,
    pub(crate) digits: Option<(u8, u8)>,
    pub(crate) translate: bool,
    pub(crate) no_copy: bool,
    pub(crate) embed: bool,
    pub(crate) default: Option<DefaultFn>,
    pub(crate) on_delete: OnDelete,
    pub(crate) dependencies: Vec<ComputeData>,
    pub(crate) acl: Arc<AccessControlList>,
}

impl Field {
    /// Creates a field of the given type.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            model: String::new(),
            json: json_name(&name, field_type),
            label: name.clone(),
            name,
            help: String::new(),
            field_type,
            stored: false,
            required: false,
            unique: false,
            index: false,
            compute: None,
            depends: Vec::new(),
            related: None,
            relation: None,
            reverse_fk: None,
            m2m: None,
            selection: Vec::new(),
            group_operator: None,
            size: None,
            digits: None,
            translate: false,
            no_copy: false,
            embed: false,
            default: None,
            on_delete: OnDelete::default(),
            dependencies: Vec::new(),
            acl: Arc::new(AccessControlList::new()),
        }
    }

    /// A binary field.
    pub fn binary(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Binary)
    }

    /// A boolean field.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    /// A short text field.
    pub fn char(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Char)
    }

    /// A date field.
    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Date)
    }

    /// A date and time field.
    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::DateTime)
    }

    /// A float field.
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float)
    }

    /// An HTML field.
    pub fn html(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Html)
    }

    /// An integer field.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    /// A long text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    /// A selection field with `(key, label)` options.
    pub fn selection<K, L>(name: impl Into<String>, options: impl IntoIterator<Item = (K, L)>) -> Self
    where
        K: Into<String>,
        L: Into<String>,
    {
        let mut field = Self::new(name, FieldType::Selection);
        field.selection = options
            .into_iter()
            .map(|(k, l)| (k.into(), l.into()))
            .collect();
        field
    }

    /// A foreign key to `target`.
    pub fn many2one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, FieldType::Many2One).relation(target)
    }

    /// A unique foreign key to `target`.
    pub fn one2one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, FieldType::One2One).relation(target)
    }

    /// The records of `target` whose `reverse_fk` points to this record.
    pub fn one2many(
        name: impl Into<String>,
        target: impl Into<String>,
        reverse_fk: impl Into<String>,
    ) -> Self {
        Self::new(name, FieldType::One2Many)
            .relation(target)
            .reverse_fk(reverse_fk)
    }

    /// The record of `target` whose one-to-one `reverse_fk` points to this record.
    pub fn rev2one(
        name: impl Into<String>,
        target: impl Into<String>,
        reverse_fk: impl Into<String>,
    ) -> Self {
        Self::new(name, FieldType::Rev2One)
            .relation(target)
            .reverse_fk(reverse_fk)
    }

    /// A many-to-many relation to `target`.
    pub fn many2many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, FieldType::Many2Many).relation(target)
    }

    /// Sets the related model.
    #[must_use]
    pub fn relation(mut self, target: impl Into<String>) -> Self {
        self.relation = Some(target.into());
        self
    }

    /// Sets the foreign key of a reverse relation.
    #[must_use]
    pub fn reverse_fk(mut self, field: impl Into<String>) -> Self {
        self.reverse_fk = Some(field.into());
        self
    }

    /// Uses an explicit link model for a many-to-many field.
    #[must_use]
    pub fn m2m_link(
        mut self,
        model: impl Into<String>,
        ours: impl Into<String>,
        theirs: impl Into<String>,
    ) -> Self {
        self.m2m = Some(M2MLink {
            model: model.into(),
            ours: ours.into(),
            theirs: theirs.into(),
        });
        self
    }

    /// Overrides the JSON name.
    #[must_use]
    pub fn json(mut self, json: impl Into<String>) -> Self {
        self.json = json.into();
        self
    }

    /// Sets the human readable label.
    #[must_use]
    pub fn string(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Marks the field required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the field unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Marks the field indexed.
    #[must_use]
    pub fn index(mut self) -> Self {
        self.index = true;
        self
    }

    /// Persists a computed or related field.
    #[must_use]
    pub fn stored(mut self) -> Self {
        self.stored = true;
        self
    }

    /// Computes the field with the given method.
    #[must_use]
    pub fn compute(mut self, method: impl Into<String>) -> Self {
        self.compute = Some(method.into());
        self
    }

    /// Declares the paths the computed value depends on.
    #[must_use]
    pub fn depends<S: Into<String>>(mut self, paths: impl IntoIterator<Item = S>) -> Self {
        self.depends.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Mirrors the field at the end of a dotted path.
    #[must_use]
    pub fn related(mut self, path: impl Into<String>) -> Self {
        self.related = Some(path.into());
        self
    }

    /// Sets the default value provider.
    #[must_use]
    pub fn default<F>(mut self, f: F) -> Self
    where
        F: Fn(&Environment, &FieldMap) -> Value + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(f));
        self
    }

    /// Sets a constant default value.
    #[must_use]
    pub fn default_value(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.default(move |_, _| value.clone())
    }

    /// Sets the on-delete policy of a foreign key.
    #[must_use]
    pub fn on_delete(mut self, policy: OnDelete) -> Self {
        self.on_delete = policy;
        self
    }

    /// Sets the aggregation used when grouping.
    #[must_use]
    pub fn group_operator(mut self, op: impl Into<String>) -> Self {
        self.group_operator = Some(op.into());
        self
    }

    /// Sets the maximum text length.
    #[must_use]
    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the float precision as `(total, decimals)`.
    #[must_use]
    pub fn digits(mut self, total: u8, decimals: u8) -> Self {
        self.digits = Some((total, decimals));
        self
    }

    /// Marks the field translatable.
    #[must_use]
    pub fn translate(mut self) -> Self {
        self.translate = true;
        self
    }

    /// Excludes the field from copies.
    #[must_use]
    pub fn no_copy(mut self) -> Self {
        self.no_copy = true;
        self
    }

    /// Embeds the related model's fields.
    #[must_use]
    pub fn embed(mut self) -> Self {
        self.embed = true;
        self
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snake case name, with `_id` on to-one and `_ids` on to-many relations.
    #[must_use]
    pub fn json_name(&self) -> &str {
        &self.json
    }

    /// Name of the owning model, empty before registration.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Human readable label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Help text.
    #[must_use]
    pub fn help_text(&self) -> &str {
        &self.help
    }

    /// Field type.
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Whether the field is required.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Whether the field is unique.
    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    /// Whether the field is indexed.
    #[must_use]
    pub const fn is_indexed(&self) -> bool {
        self.index
    }

    /// Whether a computed or related field is persisted.
    #[must_use]
    pub const fn is_stored(&self) -> bool {
        self.stored
    }

    /// Whether the field has a compute method.
    #[must_use]
    pub const fn is_computed(&self) -> bool {
        self.compute.is_some()
    }

    /// Whether the field mirrors a related path.
    #[must_use]
    pub const fn is_related(&self) -> bool {
        self.related.is_some()
    }

    /// Whether the value lives in a column of the model's table.
    #[must_use]
    pub const fn is_column(&self) -> bool {
        if self.field_type.is_non_stored_relation() {
            return false;
        }
        self.stored || !(self.is_computed() || self.is_related())
    }

    /// Name of the compute method.
    #[must_use]
    pub fn compute_method(&self) -> Option<&str> {
        self.compute.as_deref()
    }

    /// Declared dependency paths.
    #[must_use]
    pub fn depends_paths(&self) -> &[String] {
        &self.depends
    }

    /// Related path.
    #[must_use]
    pub fn related_path(&self) -> Option<&str> {
        self.related.as_deref()
    }

    /// Related model name.
    #[must_use]
    pub fn relation_model(&self) -> Option<&str> {
        self.relation.as_deref()
    }

    /// Foreign key of a reverse relation.
    #[must_use]
    pub fn reverse_fk_name(&self) -> Option<&str> {
        self.reverse_fk.as_deref()
    }

    /// Link model of a many-to-many field, known after bootstrap.
    #[must_use]
    pub fn m2m(&self) -> Option<&M2MLink> {
        self.m2m.as_ref()
    }

    /// Selection options.
    #[must_use]
    pub fn selection_options(&self) -> &[(String, String)] {
        &self.selection
    }

    /// Aggregation used when grouping.
    #[must_use]
    pub fn group_operator_name(&self) -> Option<&str> {
        self.group_operator.as_deref()
    }

    /// Maximum text length.
    #[must_use]
    pub const fn max_size(&self) -> Option<usize> {
        self.size
    }

    /// Float precision.
    #[must_use]
    pub const fn precision(&self) -> Option<(u8, u8)> {
        self.digits
    }

    /// Whether the field is translatable.
    #[must_use]
    pub const fn is_translatable(&self) -> bool {
        self.translate
    }

    /// Whether copies skip the field.
    #[must_use]
    pub const fn is_no_copy(&self) -> bool {
        self.no_copy
    }

    /// Whether the related model is embedded.
    #[must_use]
    pub const fn is_embedded(&self) -> bool {
        self.embed
    }

    /// On-delete policy.
    #[must_use]
    pub const fn on_delete_policy(&self) -> OnDelete {
        self.on_delete
    }

    /// Default value provider.
    #[must_use]
    pub fn default_fn(&self) -> Option<&DefaultFn> {
        self.default.as_ref()
    }

    /// Fields to recompute when this one changes.
    #[must_use]
    pub fn dependencies(&self) -> &[ComputeData] {
        &self.dependencies
    }

    /// The field's access control list.
    #[must_use]
    pub fn acl(&self) -> &AccessControlList {
        &self.acl
    }

    /// Grants `perm` on this field to `group`.
    pub fn grant_access(&self, group: &str, perm: Permission) -> &Self {
        self.acl.grant(group, perm);
        self
    }

    /// Revokes `perm` on this field from `group`.
    pub fn revoke_access(&self, group: &str, perm: Permission) -> &Self {
        self.acl.revoke(group, perm);
        self
    }

    /// The value of the field when unset.
    #[must_use]
    pub fn zero_value(&self) -> Value {
        self.field_type.zero_value()
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("model", &self.model)
            .field("name", &self.name)
            .field("type", &self.field_type)
            .field("stored", &self.stored)
            .field("compute", &self.compute)
            .field("related", &self.related)
            .field("relation", &self.relation)
            .finish_non_exhaustive()
    }
}

/// Snake case JSON name of a field.
pub(crate) fn json_name(name: &str, field_type: FieldType) -> String {
    let mut json = name.to_snake_case();
    if field_type.is_2one() {
        json.push_str("_id");
    } else if field_type.is_2many() {
        json.push_str("_ids");
    }
    json
}
