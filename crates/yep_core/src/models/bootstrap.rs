//! Bootstrap phases of a registry.
//!
//! Run in order by [`Registry::bootstrap`]: link models for many-to-many
//! fields, relation checks, related field resolution, compute method
//! signatures, dependency graph and cycle detection.

use crate::error::{CoreError, CoreResult};
use crate::models::{ComputeData, ComputeSource, Field, M2MLink, ModelOptions, OnDelete, Registry};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;
use yep_value::FieldMap;

/// Creates, or reuses, the link model of every many-to-many field.
pub(crate) fn create_m2m_links(registry: &mut Registry) -> CoreResult<()> {
    let mut pending = Vec::new();
    for model in registry.models() {
        for field in model.fields().all() {
            if field.field_type().is_2many() && !field.field_type().is_reverse_relation() {
                let target = field.relation_model().unwrap_or_default().to_string();
                pending.push((model.name().to_string(), field.name().to_string(), target, field.m2m().cloned()));
            }
        }
    }

    for (model, field, target, explicit) in pending {
        let link = explicit.unwrap_or_else(|| default_link(&model, &target));
        match registry.get(&link.model) {
            Some(existing) => {
                for side in [&link.ours, &link.theirs] {
                    if !existing.fields().contains(side) {
                        return Err(CoreError::invalid_field(
                            &model,
                            &field,
                            format!("link model {} has no field {side}", link.model),
                        ));
                    }
                }
            }
            None => {
                let rel = registry.add_model(&link.model, ModelOptions::MANY2MANY_LINK)?;
                for (side, related) in [(&link.ours, &model), (&link.theirs, &target)] {
                    rel.add_field(
                        Field::many2one(side.clone(), related.clone())
                            .required()
                            .index()
                            .no_copy()
                            .on_delete(OnDelete::Cascade),
                    )?;
                }
                debug!(model = %link.model, "many2many link model created");
            }
        }
        registry
            .must_get(&model)?
            .fields()
            .update(&model, &field, |f| f.m2m = Some(link))?;
    }
    Ok(())
}

fn default_link(model: &str, target: &str) -> M2MLink {
    let (first, second) = if model <= target { (model, target) } else { (target, model) };
    let (ours, theirs) = if model == target {
        (format!("{model}1"), format!("{model}2"))
    } else {
        (model.to_string(), target.to_string())
    };
    M2MLink {
        model: format!("{first}{second}Rel"),
        ours,
        theirs,
    }
}

/// Checks relation targets and reverse foreign keys.
pub(crate) fn check_relations(registry: &Registry) -> CoreResult<()> {
    for model in registry.models() {
        for field in model.fields().all() {
            let Some(target) = field.relation_model() else {
                continue;
            };
            let target = registry.get(target).ok_or_else(|| {
                CoreError::invalid_field(model.name(), field.name(), format!("unknown related model {target}"))
            })?;
            if let Some(fk) = field.reverse_fk_name() {
                let points_back = target.fields().get(fk).is_some_and(|f| {
                    f.field_type().is_fk_relation() && f.relation_model() == Some(model.name())
                });
                if !points_back {
                    return Err(CoreError::invalid_field(
                        model.name(),
                        field.name(),
                        format!("{}.{fk} is not a foreign key to {}", target.name(), model.name()),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Resolves the path of every related field and checks its type.
pub(crate) fn check_related_fields(registry: &Registry) -> CoreResult<()> {
    for model in registry.models() {
        for field in model.fields().related_fields() {
            let path = field.related_path().unwrap_or_default();
            let (_, target) = registry.resolve_path(model.name(), path)?;
            if target.field_type() != field.field_type() {
                return Err(CoreError::invalid_field(
                    model.name(),
                    field.name(),
                    format!("related to a {} field but declared {}", target.field_type(), field.field_type()),
                ));
            }
        }
    }
    Ok(())
}

/// Checks that compute methods exist and have a usable signature.
///
/// Compute methods take no argument and return the computed values, plus
/// the fields to clear for stored fields.
pub(crate) fn check_compute_methods(registry: &Registry) -> CoreResult<()> {
    for model in registry.models() {
        for field in model.fields().computed_fields(&[]) {
            let name = field.compute_method().unwrap_or_default();
            let method = model.methods().get(name).ok_or_else(|| {
                CoreError::invalid_compute_method(model.name(), name, "method does not exist")
            })?;
            let sig = method.signature();
            let reason = if !sig.takes_unit() {
                Some("compute methods take no argument")
            } else if sig.is::<(), FieldMap>() {
                field
                    .is_stored()
                    .then_some("compute methods of stored fields must also return the fields to unset")
            } else if sig.is::<(), (FieldMap, Vec<String>)>() {
                None
            } else {
                Some("compute methods must return a field map")
            };
            if let Some(reason) = reason {
                return Err(CoreError::invalid_compute_method(model.name(), name, reason));
            }
        }
    }
    Ok(())
}

/// Registers, on every field a stored computed or related field depends
/// on, the data needed to recompute it.
///
/// A dependency on `A.B.C` is attached to `A`, `A.B` and `A.B.C` so that
/// changing any link of the chain triggers the recomputation.
pub(crate) fn process_depends(registry: &Registry) -> CoreResult<()> {
    for model in registry.models() {
        for field in model.fields().all() {
            let (source, paths): (ComputeSource, Vec<String>) = match (field.compute_method(), field.related_path()) {
                (Some(method), _) => (ComputeSource::Method(method.to_string()), field.depends_paths().to_vec()),
                (None, Some(path)) => (ComputeSource::Related(path.to_string()), vec![path.to_string()]),
                (None, None) => continue,
            };
            for path in paths.iter().filter(|p| !p.is_empty()) {
                let tokens: Vec<&str> = path.split('.').collect();
                let mut prefix: Vec<String> = Vec::new();
                for (i, token) in tokens.iter().enumerate() {
                    let prefix_refs: Vec<&str> = prefix.iter().map(String::as_str).collect();
                    let owner = registry.follow(model.name(), &prefix_refs, path)?;
                    let target = owner.fields().get(token).ok_or_else(|| {
                        CoreError::unresolved_path(model.name(), path, format!("no field {token} on {}", owner.name()))
                    })?;
                    if field.is_stored() {
                        owner.fields().add_dependency(
                            owner.name(),
                            target.name(),
                            ComputeData {
                                model: model.name().to_string(),
                                field: field.name().to_string(),
                                source: source.clone(),
                                path: prefix.join("."),
                            },
                        )?;
                    }
                    if i + 1 < tokens.len() {
                        prefix.push(target.name().to_string());
                    }
                }
            }
        }
    }
    Ok(())
}

type Node = (String, String);

/// Rejects dependency cycles between stored computed fields.
pub(crate) fn check_cycles(registry: &Registry) -> CoreResult<()> {
    let mut edges: HashMap<Node, BTreeSet<Node>> = HashMap::new();
    for model in registry.models() {
        for field in model.fields().all() {
            let from = (model.name().to_string(), field.name().to_string());
            for dep in field.dependencies() {
                // A field depending on itself through a relation (a parent's
                // value) recurses over records, not fields.
                if !dep.path.is_empty() && dep.model == from.0 && dep.field == from.1 {
                    continue;
                }
                edges
                    .entry(from.clone())
                    .or_default()
                    .insert((dep.model.clone(), dep.field.clone()));
            }
        }
    }

    let mut done: BTreeSet<Node> = BTreeSet::new();
    let mut roots: Vec<&Node> = edges.keys().collect();
    roots.sort();
    for root in roots {
        let mut stack = Vec::new();
        visit(root, &edges, &mut stack, &mut done)?;
    }
    Ok(())
}

fn visit(
    node: &Node,
    edges: &HashMap<Node, BTreeSet<Node>>,
    stack: &mut Vec<Node>,
    done: &mut BTreeSet<Node>,
) -> CoreResult<()> {
    if done.contains(node) {
        return Ok(());
    }
    if let Some(pos) = stack.iter().position(|n| n == node) {
        let mut cycle: Vec<String> = stack[pos..].iter().map(|(m, f)| format!("{m}.{f}")).collect();
        cycle.push(format!("{}.{}", node.0, node.1));
        return Err(CoreError::DependencyCycle {
            cycle: cycle.join(" -> "),
        });
    }
    stack.push(node.clone());
    if let Some(next) = edges.get(node) {
        for n in next {
            visit(n, edges, stack, done)?;
        }
    }
    stack.pop();
    done.insert(node.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::Super;
    use crate::recordset::RecordSet;

    fn unset_compute(_rs: &RecordSet, _sup: &Super<(), (FieldMap, Vec<String>)>, _: ()) -> CoreResult<(FieldMap, Vec<String>)> {
        Ok((FieldMap::new(), Vec::new()))
    }

    #[test]
    fn m2m_link_model_is_generated() {
        let mut registry = Registry::new();
        registry
            .new_model("Post")
            .unwrap()
            .add_field(Field::many2many("Tags", "Tag"))
            .unwrap();
        registry.new_model("Tag").unwrap();
        registry.bootstrap().unwrap();

        let link = registry.must_get("PostTagRel").unwrap();
        assert!(link.is_link_model());
        let post = link.field("Post").unwrap();
        assert!(post.is_required());
        assert!(post.is_indexed());
        assert_eq!(post.on_delete_policy(), OnDelete::Cascade);
        let tags = registry.must_get("Post").unwrap().field("Tags").unwrap();
        assert_eq!(tags.m2m().unwrap().theirs, "Tag");
    }

    #[test]
    fn self_referential_links_use_numbered_fields() {
        let link = default_link("Partner", "Partner");
        assert_eq!(link.model, "PartnerPartnerRel");
        assert_eq!((link.ours.as_str(), link.theirs.as_str()), ("Partner1", "Partner2"));
        assert_eq!(default_link("Tag", "Post").model, "PostTagRel");
    }

    #[test]
    fn reverse_fk_must_point_back() {
        let mut registry = Registry::new();
        registry
            .new_model("Partner")
            .unwrap()
            .add_field(Field::one2many("Children", "Partner", "Name"))
            .unwrap();
        registry.must_get("Partner").unwrap().add_field(Field::char("Name")).unwrap();
        assert!(matches!(registry.bootstrap(), Err(CoreError::InvalidField { .. })));
    }

    #[test]
    fn stored_compute_needs_unset_list() {
        let mut registry = Registry::new();
        let partner = registry.new_model("Partner").unwrap();
        partner
            .add_field(Field::char("Upper").compute("ComputeUpper").stored())
            .unwrap();
        partner
            .create_method("ComputeUpper", |_rs, _sup: &Super<(), FieldMap>, ()| Ok(FieldMap::new()))
            .unwrap();
        assert!(matches!(
            registry.bootstrap(),
            Err(CoreError::InvalidComputeMethod { .. })
        ));
    }

    #[test]
    fn dependencies_attach_to_every_link() {
        let mut registry = Registry::new();
        let partner = registry.new_model("Partner").unwrap();
        partner
            .add_fields([
                Field::char("Name"),
                Field::many2one("Parent", "Partner"),
                Field::char("ParentName").compute("ComputeParentName").depends(["Parent.Name"]).stored(),
            ])
            .unwrap();
        partner.create_method("ComputeParentName", unset_compute).unwrap();
        registry.bootstrap().unwrap();

        let partner = registry.must_get("Partner").unwrap();
        let parent_deps = partner.field("Parent").unwrap().dependencies().to_vec();
        assert_eq!(parent_deps.len(), 1);
        assert_eq!(parent_deps[0].path, "");
        let name_deps = partner.field("Name").unwrap().dependencies().to_vec();
        assert_eq!(name_deps[0].path, "Parent");
        assert_eq!(name_deps[0].source, ComputeSource::Method("ComputeParentName".into()));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut registry = Registry::new();
        let partner = registry.new_model("Partner").unwrap();
        partner
            .add_fields([
                Field::integer("A").compute("ComputeA").depends(["B"]).stored(),
                Field::integer("B").compute("ComputeB").depends(["A"]).stored(),
            ])
            .unwrap();
        partner.create_method("ComputeA", unset_compute).unwrap();
        partner.create_method("ComputeB", unset_compute).unwrap();
        let err = registry.bootstrap().unwrap_err();
        match err {
            CoreError::DependencyCycle { cycle } => assert!(cycle.contains("Partner.A")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn related_type_must_match() {
        let mut registry = Registry::new();
        let partner = registry.new_model("Partner").unwrap();
        partner
            .add_fields([
                Field::char("Name"),
                Field::many2one("Parent", "Partner"),
                Field::integer("ParentName").related("Parent.Name"),
            ])
            .unwrap();
        assert!(matches!(registry.bootstrap(), Err(CoreError::InvalidField { .. })));
    }
}
