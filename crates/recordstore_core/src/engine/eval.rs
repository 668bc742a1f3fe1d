//! In-memory execution of fetch requests over materialized rows.
//!
//! # Responsibility
//! - Compile predicates (bind literals, build regexes) once per request.
//! - Filter, order, shape, group, deduplicate and page candidate rows.
//!
//! # Invariants
//! - Count requests yield exactly one row.
//! - Without explicit order, rows keep identifier order.
//! - Offset and limit apply after shaping, grouping and deduplication.

use regex::Regex;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::engine::{EngineError, EngineResult};
use crate::model::record::RecordId;
use crate::model::value::{FieldMap, Value};
use crate::query::predicate::{Comparison, Operand, Predicate, SortKey};
use crate::query::request::{FetchRequest, ResultShape};
use crate::query::result::ResultRow;

static NULL: Value = Value::Null;

enum Compiled {
    True,
    Compare {
        field: String,
        cmp: Comparison,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
    },
    Contains {
        field: String,
        value: Value,
    },
    Matches {
        field: String,
        regex: Regex,
    },
    IsNull {
        field: String,
    },
    Id(RecordId),
    And(Vec<Compiled>),
    Or(Vec<Compiled>),
    Not(Box<Compiled>),
}

fn literal(operand: &Operand) -> EngineResult<Value> {
    match operand {
        Operand::Literal(value) => Ok(value.clone()),
        Operand::Variable { var } => Err(EngineError::UnboundVariable(var.clone())),
    }
}

fn compile(predicate: &Predicate) -> EngineResult<Compiled> {
    let compiled = match predicate {
        Predicate::True => Compiled::True,
        Predicate::Compare { field, cmp, value } => Compiled::Compare {
            field: field.clone(),
            cmp: *cmp,
            value: literal(value)?,
        },
        Predicate::In { field, values } => Compiled::In {
            field: field.clone(),
            values: values.iter().map(literal).collect::<EngineResult<_>>()?,
        },
        Predicate::Contains { field, value } => Compiled::Contains {
            field: field.clone(),
            value: literal(value)?,
        },
        Predicate::Matches { field, pattern } => Compiled::Matches {
            field: field.clone(),
            regex: Regex::new(pattern).map_err(|err| EngineError::InvalidPattern {
                pattern: pattern.clone(),
                message: err.to_string(),
            })?,
        },
        Predicate::IsNull { field } => Compiled::IsNull {
            field: field.clone(),
        },
        Predicate::Id { id } => Compiled::Id(*id),
        Predicate::And { all } => Compiled::And(all.iter().map(compile).collect::<EngineResult<_>>()?),
        Predicate::Or { any } => Compiled::Or(any.iter().map(compile).collect::<EngineResult<_>>()?),
        Predicate::Not { predicate } => Compiled::Not(Box::new(compile(predicate)?)),
    };
    Ok(compiled)
}

fn field<'a>(fields: &'a FieldMap, name: &str) -> &'a Value {
    fields.get(name).unwrap_or(&NULL)
}

fn compare(left: &Value, cmp: Comparison, right: &Value) -> bool {
    let ordering = left.total_cmp(right);
    match cmp {
        Comparison::Eq => ordering == Ordering::Equal,
        Comparison::Ne => ordering != Ordering::Equal,
        // Ordered comparisons never match across kinds or against null.
        _ if left.is_null() || !left.is_comparable_with(right) => false,
        Comparison::Lt => ordering == Ordering::Less,
        Comparison::Le => ordering != Ordering::Greater,
        Comparison::Gt => ordering == Ordering::Greater,
        Comparison::Ge => ordering != Ordering::Less,
    }
}

impl Compiled {
    fn matches(&self, id: Option<RecordId>, fields: &FieldMap) -> bool {
        match self {
            Self::True => true,
            Self::Compare {
                field: name,
                cmp,
                value,
            } => compare(field(fields, name), *cmp, value),
            Self::In {
                field: name,
                values,
            } => {
                let current = field(fields, name);
                values
                    .iter()
                    .any(|candidate| current.total_cmp(candidate) == Ordering::Equal)
            }
            Self::Contains {
                field: name,
                value,
            } => match (field(fields, name).as_str(), value.as_str()) {
                (Some(text), Some(needle)) => text.contains(needle),
                _ => false,
            },
            Self::Matches { field: name, regex } => field(fields, name)
                .as_str()
                .is_some_and(|text| regex.is_match(text)),
            Self::IsNull { field: name } => field(fields, name).is_null(),
            Self::Id(expected) => id == Some(*expected),
            Self::And(all) => all.iter().all(|predicate| predicate.matches(id, fields)),
            Self::Or(any) => any.iter().any(|predicate| predicate.matches(id, fields)),
            Self::Not(predicate) => !predicate.matches(id, fields),
        }
    }
}

fn compare_by_keys(order: &[SortKey], left: &FieldMap, right: &FieldMap) -> Ordering {
    for key in order {
        let ordering = field(left, &key.field).total_cmp(field(right, &key.field));
        let ordering = if key.ascending {
            ordering
        } else {
            ordering.reverse()
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn project(fields: &FieldMap, names: Option<&[String]>) -> FieldMap {
    match names {
        Some(names) => names
            .iter()
            .map(|name| (name.clone(), field(fields, name).clone()))
            .collect(),
        None => fields.clone(),
    }
}

/// Exact identity of a value sequence for set lookups.
///
/// Unlike `Value::total_cmp`, integers and reals never compare equal.
#[derive(Debug)]
struct ExactKey(Vec<Value>);

impl ExactKey {
    fn of_fields(fields: &FieldMap) -> Self {
        Self(
            fields
                .iter()
                .flat_map(|(name, value)| [Value::Text(name.clone()), value.clone()])
                .collect(),
        )
    }
}

fn exact_cmp(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Bool(left), Value::Bool(right)) => left.cmp(right),
        (Value::Integer(left), Value::Integer(right)) => left.cmp(right),
        (Value::Real(left), Value::Real(right)) => left.total_cmp(right),
        (Value::Text(left), Value::Text(right)) => left.cmp(right),
        (left, right) => variant_index(left).cmp(&variant_index(right)),
    }
}

fn variant_index(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Integer(_) => 2,
        Value::Real(_) => 3,
        Value::Text(_) => 4,
    }
}

impl Ord for ExactKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(left, right)| exact_cmp(left, right))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| self.0.len().cmp(&other.0.len()))
    }
}

impl PartialOrd for ExactKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ExactKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for ExactKey {}

/// Keeps the first occurrence of each field map, preserving order.
fn dedup(items: Vec<FieldMap>) -> Vec<FieldMap> {
    let mut seen = BTreeSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(ExactKey::of_fields(item)))
        .collect()
}

fn group_projections(
    rows: &[(RecordId, FieldMap)],
    group_by: &[String],
    names: Option<&[String]>,
) -> Vec<FieldMap> {
    let mut seen = BTreeSet::new();
    let mut groups = Vec::new();
    for (_, fields) in rows {
        let key: Vec<Value> = group_by
            .iter()
            .map(|name| field(fields, name).clone())
            .collect();
        if !seen.insert(ExactKey(key.clone())) {
            continue;
        }
        let mut projected = project(fields, names.or(Some(group_by)));
        for (name, value) in group_by.iter().zip(key) {
            projected.entry(name.clone()).or_insert(value);
        }
        groups.push(projected);
    }
    groups
}

fn page<T>(items: Vec<T>, offset: u32, limit: Option<u32>) -> Vec<T> {
    let skipped = items.into_iter().skip(offset as usize);
    match limit {
        Some(limit) => skipped.take(limit as usize).collect(),
        None => skipped.collect(),
    }
}

/// Executes `request` over `rows`, which must all belong to its entity.
pub fn evaluate(
    request: &FetchRequest,
    rows: BTreeMap<RecordId, FieldMap>,
) -> EngineResult<Vec<ResultRow>> {
    let filter = request.filter.as_ref().map(compile).transpose()?;
    let mut matched: Vec<(RecordId, FieldMap)> = rows
        .into_iter()
        .filter(|(id, fields)| {
            filter
                .as_ref()
                .map_or(true, |filter| filter.matches(Some(*id), fields))
        })
        .collect();

    if request.shape == ResultShape::Count {
        let count = if request.distinct {
            dedup(matched.into_iter().map(|(_, fields)| fields).collect()).len()
        } else {
            matched.len()
        };
        return Ok(vec![ResultRow::Count(count as u64)]);
    }

    if let Some(order) = request.order.as_deref() {
        matched.sort_by(|(_, left), (_, right)| compare_by_keys(order, left, right));
    }

    let shaped = match request.shape {
        ResultShape::Object => matched
            .into_iter()
            .map(|(id, fields)| ResultRow::Object { id, fields })
            .collect(),
        ResultShape::Identifier => matched
            .into_iter()
            .map(|(id, _)| ResultRow::Identifier(id))
            .collect(),
        ResultShape::Projection => shape_projections(request, &matched)?,
        ResultShape::Count => unreachable!("count requests return early"),
    };

    Ok(page(shaped, request.offset, request.limit))
}

fn shape_projections(
    request: &FetchRequest,
    matched: &[(RecordId, FieldMap)],
) -> EngineResult<Vec<ResultRow>> {
    let names = request.projection_fields.as_deref();
    let mut projections = match request.group_by.as_deref() {
        Some(group_by) if !group_by.is_empty() => group_projections(matched, group_by, names),
        _ => matched
            .iter()
            .map(|(_, fields)| project(fields, names))
            .collect(),
    };

    if let Some(having) = request.having.as_ref().map(compile).transpose()? {
        projections.retain(|projection| having.matches(None, projection));
    }
    if request.distinct {
        projections = dedup(projections);
    }

    Ok(projections.into_iter().map(ResultRow::Projection).collect())
}

#[cfg(test)]
mod tests {
    use super::evaluate;
    use crate::engine::EngineError;
    use crate::model::record::RecordId;
    use crate::model::value::{FieldMap, Value};
    use crate::query::predicate::{Comparison, Operand, Predicate, SortKey};
    use crate::query::request::{FetchRequest, ResultShape};
    use crate::query::result::ResultRow;
    use std::collections::BTreeMap;

    fn rows() -> BTreeMap<RecordId, FieldMap> {
        [
            ("milk", "shop", 2),
            ("bread", "shop", 1),
            ("taxes", "home", 3),
            ("dishes", "home", 1),
        ]
        .into_iter()
        .map(|(title, place, priority)| {
            (
                RecordId::new(),
                FieldMap::from([
                    ("title".to_string(), Value::from(title)),
                    ("place".to_string(), Value::from(place)),
                    ("priority".to_string(), Value::from(priority)),
                ]),
            )
        })
        .collect()
    }

    fn titles(result: Vec<ResultRow>) -> Vec<String> {
        result
            .into_iter()
            .map(|row| match row {
                ResultRow::Object { fields, .. } | ResultRow::Projection(fields) => fields
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                other => panic!("unexpected row {other:?}"),
            })
            .collect()
    }

    #[test]
    fn filters_and_orders_objects() {
        let mut request = FetchRequest::new("Task", ResultShape::Object);
        request.filter = Some(Predicate::and(vec![
            Predicate::ge("priority", 1),
            Predicate::not(Predicate::eq("title", "taxes")),
        ]));
        request.order = Some(vec![
            SortKey::descending("priority"),
            SortKey::ascending("title"),
        ]);

        let result = evaluate(&request, rows()).unwrap();
        assert_eq!(titles(result), vec!["milk", "bread", "dishes"]);
    }

    #[test]
    fn count_ignores_paging_and_reports_zero() {
        let mut request = FetchRequest::new("Task", ResultShape::Count);
        request.filter = Some(Predicate::eq("place", "office"));
        request.limit = Some(1);
        assert_eq!(evaluate(&request, rows()).unwrap(), vec![ResultRow::Count(0)]);

        request.filter = Some(Predicate::eq("place", "home"));
        assert_eq!(evaluate(&request, rows()).unwrap(), vec![ResultRow::Count(2)]);
    }

    #[test]
    fn distinct_count_collapses_equal_records() {
        let mut data = rows();
        let duplicate = data.values().next().cloned().unwrap();
        data.insert(RecordId::new(), duplicate);

        let mut request = FetchRequest::new("Task", ResultShape::Count);
        assert_eq!(evaluate(&request, data.clone()).unwrap(), vec![ResultRow::Count(5)]);
        request.distinct = true;
        assert_eq!(evaluate(&request, data).unwrap(), vec![ResultRow::Count(4)]);
    }

    #[test]
    fn projection_groups_filters_groups_and_deduplicates() {
        let mut request = FetchRequest::new("Task", ResultShape::Projection);
        request.projection_fields = Some(vec!["place".into()]);
        request.distinct = true;
        request.order = Some(vec![SortKey::ascending("place")]);
        let distinct = evaluate(&request, rows()).unwrap();
        assert_eq!(distinct.len(), 2);

        request.distinct = false;
        request.group_by = Some(vec!["place".into()]);
        request.having = Some(Predicate::eq("place", "shop"));
        let grouped = evaluate(&request, rows()).unwrap();
        assert_eq!(
            grouped,
            vec![ResultRow::Projection(FieldMap::from([(
                "place".to_string(),
                Value::from("shop")
            )]))]
        );
    }

    #[test]
    fn distinct_keeps_integers_and_reals_apart_in_first_seen_order() {
        let data: BTreeMap<RecordId, FieldMap> = [Value::Real(2.0), Value::Integer(2), Value::Real(2.0)]
            .into_iter()
            .map(|weight| (RecordId::new(), FieldMap::from([("weight".to_string(), weight)])))
            .collect();

        let mut request = FetchRequest::new("Task", ResultShape::Projection);
        request.order = Some(vec![SortKey::descending("weight")]);
        request.distinct = true;
        let weights: Vec<Value> = evaluate(&request, data.clone())
            .unwrap()
            .into_iter()
            .map(|row| match row {
                ResultRow::Projection(mut fields) => fields.remove("weight").unwrap(),
                other => panic!("unexpected row {other:?}"),
            })
            .collect();
        assert_eq!(weights.len(), 2);
        assert!(weights.contains(&Value::Integer(2)));
        assert!(weights.contains(&Value::Real(2.0)));

        request.distinct = false;
        request.group_by = Some(vec!["weight".into()]);
        assert_eq!(evaluate(&request, data).unwrap().len(), 2);
    }

    #[test]
    fn offset_and_limit_page_ordered_rows() {
        let mut request = FetchRequest::new("Task", ResultShape::Projection);
        request.order = Some(vec![SortKey::ascending("title")]);
        request.offset = 1;
        request.limit = Some(2);

        let result = evaluate(&request, rows()).unwrap();
        assert_eq!(titles(result), vec!["dishes", "milk"]);
    }

    #[test]
    fn text_predicates_and_identifier_match() {
        let data = rows();
        let first = *data.keys().next().unwrap();

        let mut request = FetchRequest::new("Task", ResultShape::Identifier);
        request.filter = Some(Predicate::id(first));
        assert_eq!(
            evaluate(&request, data.clone()).unwrap(),
            vec![ResultRow::Identifier(first)]
        );

        let mut request = FetchRequest::new("Task", ResultShape::Object);
        request.filter = Some(Predicate::or(vec![
            Predicate::matches("title", "^b.*d$"),
            Predicate::contains("title", "ish"),
        ]));
        request.order = Some(vec![SortKey::ascending("title")]);
        assert_eq!(titles(evaluate(&request, data).unwrap()), vec!["bread", "dishes"]);
    }

    #[test]
    fn ordered_comparison_skips_nulls_and_other_kinds() {
        let mut request = FetchRequest::new("Task", ResultShape::Count);
        request.filter = Some(Predicate::lt("missing", 10));
        assert_eq!(evaluate(&request, rows()).unwrap(), vec![ResultRow::Count(0)]);

        request.filter = Some(Predicate::gt("title", 10));
        assert_eq!(evaluate(&request, rows()).unwrap(), vec![ResultRow::Count(0)]);
    }

    #[test]
    fn unbound_variables_and_bad_patterns_fail() {
        let mut request = FetchRequest::new("Task", ResultShape::Object);
        request.filter = Some(Predicate::compare("title", Comparison::Eq, Operand::var("t")));
        assert!(matches!(
            evaluate(&request, rows()),
            Err(EngineError::UnboundVariable(name)) if name == "t"
        ));

        request.filter = Some(Predicate::matches("title", "("));
        assert!(matches!(
            evaluate(&request, rows()),
            Err(EngineError::InvalidPattern { .. })
        ));
    }
}
