//! Applying rendered updates and projections to in-memory documents.

use bson::{Bson, Document};

use docshape_core::{
    error::{StoreError, StoreResult},
    projection::Projection,
    query::{Expr, FieldOp, ID_FIELD},
    update::RenderedUpdate,
};

use crate::evaluator::lookup;

/// Applies an update to a copy of `document`.
///
/// Returns the updated copy when it differs from `document`. On error `document` is untouched.
pub(crate) fn apply_update(
    document: &Document,
    update: &RenderedUpdate,
) -> StoreResult<Option<Document>> {
    let mut updated = document.clone();

    match update {
        RenderedUpdate::Replacement(replacement) => replace(&mut updated, replacement)?,
        RenderedUpdate::Modifiers(modifiers) => {
            for (operator, fields) in modifiers {
                let Bson::Document(fields) = fields else {
                    return Err(invalid(format!("operator {operator} requires a document")));
                };
                for (path, value) in fields {
                    if path == ID_FIELD || path.starts_with("_id.") {
                        return Err(invalid(format!("{operator} cannot modify {ID_FIELD}")));
                    }
                    apply_modifier(&mut updated, operator, path, value)?;
                }
            }
        }
    }

    Ok((updated != *document).then_some(updated))
}

/// Replaces the content of `document`, keeping its identity.
fn replace(document: &mut Document, replacement: &Document) -> StoreResult<()> {
    let id = document.get(ID_FIELD).cloned();

    if let (Some(id), Some(new_id)) = (&id, replacement.get(ID_FIELD)) {
        if id != new_id {
            return Err(invalid(format!("a replacement cannot change {ID_FIELD}")));
        }
    }

    let mut next = Document::new();
    if let Some(id) = id {
        next.insert(ID_FIELD, id);
    }
    for (key, value) in replacement {
        if key != ID_FIELD || !next.contains_key(ID_FIELD) {
            next.insert(key.clone(), value.clone());
        }
    }

    *document = next;
    Ok(())
}

fn apply_modifier(document: &mut Document, operator: &str, path: &str, value: &Bson) -> StoreResult<()> {
    if operator == "$unset" {
        remove_path(document, path);
        return Ok(());
    }

    let (parent, key) = parent_of(document, path)?;
    match operator {
        "$set" => {
            parent.insert(key, value.clone());
        }
        "$inc" => {
            if !is_number(value) {
                return Err(invalid(format!("$inc requires a numeric amount for {path}")));
            }
            let sum = match parent.get(key) {
                None => value.clone(),
                Some(current) => add(current, value)
                    .ok_or_else(|| invalid(format!("cannot increment non-numeric field {path}")))?,
            };
            parent.insert(key, sum);
        }
        "$push" => match parent.get_mut(key) {
            Some(Bson::Array(items)) => items.push(value.clone()),
            Some(_) => return Err(invalid(format!("cannot push to non-array field {path}"))),
            None => {
                parent.insert(key, Bson::Array(vec![value.clone()]));
            }
        },
        other => return Err(invalid(format!("unsupported update operator {other}"))),
    }
    Ok(())
}

/// Returns the document holding the last segment of a dotted path, creating missing
/// intermediate documents.
fn parent_of<'a, 'p>(document: &'a mut Document, path: &'p str) -> StoreResult<(&'a mut Document, &'p str)> {
    let Some((parents, key)) = path.rsplit_once('.') else {
        return Ok((document, path));
    };

    let mut parent = document;
    for segment in parents.split('.') {
        let child = parent
            .entry(segment.to_string())
            .or_insert_with(|| Bson::Document(Document::new()));
        parent = match child {
            Bson::Document(inner) => inner,
            _ => return Err(invalid(format!("cannot descend into non-document field {segment}"))),
        };
    }
    Ok((parent, key))
}

fn remove_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

fn is_number(value: &Bson) -> bool {
    matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

fn add(current: &Bson, amount: &Bson) -> Option<Bson> {
    match (current, amount) {
        (Bson::Int32(a), Bson::Int32(b)) => Some(
            a.checked_add(*b)
                .map(Bson::Int32)
                .unwrap_or_else(|| Bson::Int64(i64::from(*a) + i64::from(*b))),
        ),
        (Bson::Int32(a), Bson::Int64(b)) => Some(Bson::Int64(i64::from(*a).wrapping_add(*b))),
        (Bson::Int64(a), Bson::Int32(b)) => Some(Bson::Int64(a.wrapping_add(i64::from(*b)))),
        (Bson::Int64(a), Bson::Int64(b)) => Some(Bson::Int64(a.wrapping_add(*b))),
        (Bson::Double(a), b) => as_f64(b).map(|b| Bson::Double(a + b)),
        (a, Bson::Double(b)) => as_f64(a).map(|a| Bson::Double(a + b)),
        _ => None,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(value) => Some(f64::from(*value)),
        Bson::Int64(value) => Some(*value as f64),
        Bson::Double(value) => Some(*value),
        _ => None,
    }
}

/// Seeds an upserted document from the top-level equality clauses of `filter`.
pub(crate) fn upsert_seed(filter: &Expr) -> Document {
    let mut seed = Document::new();
    collect_equalities(filter, &mut seed);
    seed
}

fn collect_equalities(expr: &Expr, seed: &mut Document) {
    match expr {
        Expr::Field {
            field,
            op: FieldOp::Eq,
            value,
        } if !field.contains('.') => {
            seed.insert(field.clone(), value.clone());
        }
        Expr::And(exprs) => {
            for expr in exprs {
                collect_equalities(expr, seed);
            }
        }
        _ => {}
    }
}

/// Applies a projection to a returned document.
///
/// A projection that includes any field keeps only the included fields and the identity,
/// unless the identity is excluded. A projection of exclusions only removes those fields.
pub(crate) fn project(document: &Document, projection: &Projection) -> StoreResult<Document> {
    let includes = projection
        .entries()
        .any(|(field, included)| included && field != ID_FIELD);
    let excludes = projection
        .entries()
        .any(|(field, included)| !included && field != ID_FIELD);

    if includes && excludes {
        return Err(invalid(
            "a projection cannot mix included and excluded fields".to_string(),
        ));
    }

    if !includes {
        let mut projected = document.clone();
        for (field, _) in projection.entries().filter(|(_, included)| !included) {
            remove_path(&mut projected, field);
        }
        return Ok(projected);
    }

    let keep_id = projection
        .entries()
        .all(|(field, included)| field != ID_FIELD || included);

    let mut projected = Document::new();
    if keep_id {
        if let Some(id) = document.get(ID_FIELD) {
            projected.insert(ID_FIELD, id.clone());
        }
    }
    for (field, _) in projection
        .entries()
        .filter(|(field, included)| *included && *field != ID_FIELD)
    {
        if let Some(value) = lookup(document, field) {
            let (parent, key) = parent_of(&mut projected, field)?;
            parent.insert(key, value.clone());
        }
    }
    Ok(projected)
}

fn invalid(message: String) -> StoreError {
    StoreError::InvalidDocument(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docshape_core::{query::Filter, update::Update};

    fn resolve(update: Update) -> RenderedUpdate {
        update.resolve().unwrap()
    }

    #[test]
    fn test_modifiers() {
        let document = doc! { "_id": 1, "n": 1, "tags": ["a"], "gone": true };
        let update = Update::set("address.city", "Oslo")
            .then(Update::inc("n", 2))
            .then(Update::push("tags", "b"))
            .then(Update::unset("gone"));

        assert_eq!(
            apply_update(&document, &resolve(update)).unwrap(),
            Some(doc! { "_id": 1, "n": 3, "tags": ["a", "b"], "address": { "city": "Oslo" } })
        );
    }

    #[test]
    fn test_replacement_keeps_identity() {
        let document = doc! { "_id": 1, "a": 1 };
        let updated = apply_update(&document, &resolve(Update::Replace(doc! { "b": 2 }))).unwrap();

        assert_eq!(updated, Some(doc! { "_id": 1, "b": 2 }));
    }

    #[test]
    fn test_replacement_cannot_change_identity() {
        let document = doc! { "_id": 1 };
        let result = apply_update(&document, &resolve(Update::Replace(doc! { "_id": 2 })));
        assert!(matches!(result, Err(StoreError::InvalidDocument(_))));
    }

    #[test]
    fn test_unchanged_document_is_not_modified() {
        let document = doc! { "_id": 1, "a": 1 };
        assert_eq!(apply_update(&document, &resolve(Update::set("a", 1))).unwrap(), None);
    }

    #[test]
    fn test_invalid_increments() {
        let document = doc! { "_id": 1, "name": "x" };
        assert!(apply_update(&document, &resolve(Update::inc("name", 1))).is_err());
        assert!(apply_update(&document, &resolve(Update::inc("n", "one"))).is_err());
        assert!(apply_update(&document, &resolve(Update::set("_id", 2))).is_err());
    }

    #[test]
    fn test_failed_modifier_leaves_document_untouched() {
        let document = doc! { "_id": 1, "name": "x" };
        let update = Update::set("flag", true).then(Update::inc("name", 1));

        assert!(apply_update(&document, &resolve(update)).is_err());
        assert_eq!(document, doc! { "_id": 1, "name": "x" });
    }

    #[test]
    fn test_upsert_seed_from_equalities() {
        let filter = Filter::eq("_id", 5)
            .and(Filter::eq("kind", "a"))
            .and(Filter::gt("n", 1))
            .and(Filter::eq("deep.path", 1));
        assert_eq!(upsert_seed(&filter), doc! { "_id": 5, "kind": "a" });
    }

    #[test]
    fn test_inclusion_projection() {
        let document = doc! { "_id": 1, "a": 1, "b": { "c": 2, "d": 3 }, "e": 4 };

        let projected = project(&document, &Projection::fields(["a", "b.c"])).unwrap();
        assert_eq!(projected, doc! { "_id": 1, "a": 1, "b": { "c": 2 } });

        let without_id = project(&document, &Projection::fields(["a"]).exclude("_id")).unwrap();
        assert_eq!(without_id, doc! { "a": 1 });
    }

    #[test]
    fn test_exclusion_projection() {
        let document = doc! { "_id": 1, "a": 1, "b": { "c": 2, "d": 3 } };
        let projected = project(&document, &Projection::new().exclude("b.d")).unwrap();
        assert_eq!(projected, doc! { "_id": 1, "a": 1, "b": { "c": 2 } });
    }

    #[test]
    fn test_mixed_projection_is_rejected() {
        let document = doc! { "_id": 1 };
        let projection = Projection::new().include("a").exclude("b");
        assert!(project(&document, &projection).is_err());
    }
}
