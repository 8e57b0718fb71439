//! The fields of a model.

use crate::error::{CoreError, CoreResult};
use crate::models::{ComputeData, Field};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// The fields of one model, indexed by name and by JSON name.
///
/// Fields keep their declaration order. The collection also tracks the
/// computed, computed-stored and related fields, which drive the
/// dependency graph.
#[derive(Debug, Default)]
pub struct FieldsCollection {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    by_name: HashMap<String, Arc<Field>>,
    by_json: HashMap<String, String>,
    order: Vec<String>,
    computed: Vec<String>,
    computed_stored: Vec<String>,
    related: Vec<String>,
}

impl FieldsCollection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the field with the given name or JSON name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Field>> {
        let inner = self.inner.read();
        inner.by_name.get(name).cloned().or_else(|| {
            inner
                .by_json
                .get(name)
                .and_then(|n| inner.by_name.get(n))
                .cloned()
        })
    }

    /// Returns the field with the given name or JSON name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField` if the model has no such field.
    pub fn must_get(&self, model: &str, name: &str) -> CoreResult<Arc<Field>> {
        self.get(name)
            .ok_or_else(|| CoreError::unknown_field(model, name))
    }

    /// Returns true if the model has the field.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    /// Returns true if the model has no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All fields, in declaration order.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<Field>> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|n| inner.by_name.get(n).cloned())
            .collect()
    }

    /// Names of the fields persisted in the model's table, restricted to
    /// `only` when it is not empty.
    #[must_use]
    pub fn stored_field_names(&self, only: &[&str]) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|f| f.is_column())
            .filter(|f| only.is_empty() || only.iter().any(|o| *o == f.name || *o == f.json))
            .map(|f| f.name.clone())
            .collect()
    }

    /// Names of the related fields that are not persisted.
    #[must_use]
    pub fn related_non_stored_field_names(&self) -> Vec<String> {
        let inner = self.inner.read();
        inner
            .related
            .iter()
            .filter(|n| inner.by_name.get(*n).is_some_and(|f| !f.stored))
            .cloned()
            .collect()
    }

    /// JSON names of every field that is not a relation.
    #[must_use]
    pub fn non_relation_json_names(&self) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|f| !f.field_type.is_relation())
            .map(|f| f.json.clone())
            .collect()
    }

    /// Computed fields, restricted to `only` when it is not empty.
    #[must_use]
    pub fn computed_fields(&self, only: &[&str]) -> Vec<Arc<Field>> {
        let inner = self.inner.read();
        inner
            .computed
            .iter()
            .filter_map(|n| inner.by_name.get(n))
            .filter(|f| only.is_empty() || only.iter().any(|o| *o == f.name || *o == f.json))
            .cloned()
            .collect()
    }

    /// Computed fields that are persisted.
    #[must_use]
    pub fn computed_stored_fields(&self) -> Vec<Arc<Field>> {
        let inner = self.inner.read();
        inner
            .computed_stored
            .iter()
            .filter_map(|n| inner.by_name.get(n).cloned())
            .collect()
    }

    /// Related fields, persisted or not.
    #[must_use]
    pub fn related_fields(&self) -> Vec<Arc<Field>> {
        let inner = self.inner.read();
        inner
            .related
            .iter()
            .filter_map(|n| inner.by_name.get(n).cloned())
            .collect()
    }

    /// Validates a field and adds it to the collection.
    pub(crate) fn add(&self, model: &str, mut field: Field) -> CoreResult<()> {
        field.model = model.to_string();
        check_field(&mut field)?;

        let mut inner = self.inner.write();
        if inner.by_name.contains_key(&field.name) || inner.by_json.contains_key(&field.json) {
            return Err(CoreError::DuplicateField {
                model: model.to_string(),
                field: field.name,
            });
        }
        let name = field.name.clone();
        if field.is_computed() {
            inner.computed.push(name.clone());
            if field.stored {
                inner.computed_stored.push(name.clone());
            }
        }
        if field.is_related() {
            inner.related.push(name.clone());
        }
        inner.by_json.insert(field.json.clone(), name.clone());
        inner.order.push(name.clone());
        inner.by_name.insert(name, Arc::new(field));
        Ok(())
    }

    /// Applies `f` to a field during bootstrap.
    pub(crate) fn update(&self, model: &str, name: &str, f: impl FnOnce(&mut Field)) -> CoreResult<()> {
        let mut inner = self.inner.write();
        let field = inner
            .by_name
            .get_mut(name)
            .ok_or_else(|| CoreError::unknown_field(model, name))?;
        f(Arc::make_mut(field));
        Ok(())
    }

    /// Records that `dep` must be recomputed when `name` changes.
    pub(crate) fn add_dependency(&self, model: &str, name: &str, dep: ComputeData) -> CoreResult<()> {
        self.update(model, name, |field| {
            if !field.dependencies.contains(&dep) {
                field.dependencies.push(dep);
            }
        })
    }
}

/// Registration checks of a field.
fn check_field(field: &mut Field) -> CoreResult<()> {
    let ty = field.field_type;
    if ty.is_reverse_relation() && field.reverse_fk.is_none() {
        return Err(CoreError::invalid_field(
            &field.model,
            &field.name,
            format!("{ty} fields must define a reverse foreign key"),
        ));
    }
    if ty.is_relation() && field.relation.is_none() {
        return Err(CoreError::invalid_field(
            &field.model,
            &field.name,
            "relation fields must define a related model",
        ));
    }
    if field.is_related() && field.is_computed() {
        return Err(CoreError::invalid_field(
            &field.model,
            &field.name,
            "a field cannot be both related and computed",
        ));
    }
    if field.embed && !ty.is_fk_relation() {
        warn!(model = %field.model, field = %field.name, %ty, "embed is only valid on many2one and one2one fields, ignoring");
        field.embed = false;
    }
    if field.stored && !(field.is_computed() || field.is_related()) {
        warn!(model = %field.model, field = %field.name, "stored is only valid on computed and related fields, ignoring");
        field.stored = false;
    }
    if field.stored && ty.is_non_stored_relation() {
        warn!(model = %field.model, field = %field.name, %ty, "relation cannot be stored, ignoring");
        field.stored = false;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection() -> FieldsCollection {
        let fields = FieldsCollection::new();
        fields.add("Partner", Field::char("Name")).unwrap();
        fields
            .add("Partner", Field::char("Upper").compute("ComputeUpper").depends(["Name"]))
            .unwrap();
        fields
            .add("Partner", Field::integer("Score").compute("ComputeScore").stored())
            .unwrap();
        fields.add("Partner", Field::many2one("Parent", "Partner")).unwrap();
        fields
            .add("Partner", Field::char("ParentName").related("Parent.Name"))
            .unwrap();
        fields
    }

    #[test]
    fn lookup_by_name_and_json() {
        let fields = collection();
        assert_eq!(fields.get("Parent").unwrap().name(), "Parent");
        assert_eq!(fields.get("parent_id").unwrap().name(), "Parent");
        assert_eq!(fields.get("Parent").unwrap().model_name(), "Partner");
        assert!(fields.get("Missing").is_none());
        assert!(matches!(
            fields.must_get("Partner", "Missing"),
            Err(CoreError::UnknownField { .. })
        ));
    }

    #[test]
    fn queries() {
        let fields = collection();
        assert_eq!(fields.stored_field_names(&[]), vec!["Name", "Score", "Parent"]);
        assert_eq!(fields.stored_field_names(&["name", "Upper"]), vec!["Name"]);
        assert_eq!(fields.related_non_stored_field_names(), vec!["ParentName"]);
        assert_eq!(
            fields.non_relation_json_names(),
            vec!["name", "upper", "score", "parent_name"]
        );
        assert_eq!(fields.computed_fields(&[]).len(), 2);
        assert_eq!(fields.computed_fields(&["Upper"]).len(), 1);
        assert_eq!(fields.computed_stored_fields()[0].name(), "Score");
    }

    #[test]
    fn duplicates_are_rejected() {
        let fields = collection();
        assert!(matches!(
            fields.add("Partner", Field::char("Name")),
            Err(CoreError::DuplicateField { .. })
        ));
    }

    #[test]
    fn reverse_relation_needs_fk() {
        let fields = FieldsCollection::new();
        let err = fields
            .add("Partner", Field::new("Children", crate::models::FieldType::One2Many).relation("Partner"))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidField { .. }));
    }

    #[test]
    fn relation_needs_target() {
        let fields = FieldsCollection::new();
        let err = fields
            .add("Partner", Field::new("Parent", crate::models::FieldType::Many2One))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidField { .. }));
    }

    #[test]
    fn misplaced_options_are_reset() {
        let fields = FieldsCollection::new();
        fields.add("Partner", Field::char("Name").stored().embed()).unwrap();
        let name = fields.get("Name").unwrap();
        assert!(!name.is_stored());
        assert!(!name.is_embedded());
    }

    #[test]
    fn related_and_computed_conflict() {
        let fields = FieldsCollection::new();
        let err = fields
            .add("Partner", Field::char("X").related("Parent.Name").compute("C"))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidField { .. }));
    }
}
