//! In-process filter and sort evaluation over records.

use kindred_proto::{FilterPredicate, Record, SortDirection, SortPredicate, Value, KEY_PROPERTY};
use std::borrow::Cow;
use std::cmp::Ordering;

/// Evaluates native filter and sort predicates against records.
///
/// Used by the reference engine to answer queries, and by the query executor
/// to apply filters to records fetched by key.
pub struct FilterEvaluator;

impl FilterEvaluator {
    /// Value of a property, with `__key__` resolving to the record key.
    pub fn property_value<'r>(record: &'r Record, property: &str) -> Option<Cow<'r, Value>> {
        if property == KEY_PROPERTY {
            return Some(Cow::Owned(Value::Key(record.key.clone())));
        }
        record.property(property).map(Cow::Borrowed)
    }

    /// Check whether a record satisfies a filter.
    ///
    /// A missing property never matches. A multi-valued property matches when
    /// any element does. Values of incompatible types never match.
    pub fn matches(record: &Record, filter: &FilterPredicate) -> bool {
        let Some(value) = Self::property_value(record, &filter.property) else {
            return false;
        };
        value.elements().iter().any(|element| {
            element
                .compare(&filter.value)
                .is_some_and(|ordering| filter.operator.accepts(ordering))
        })
    }

    /// Check whether a record satisfies every filter.
    pub fn matches_all(record: &Record, filters: &[FilterPredicate]) -> bool {
        filters.iter().all(|filter| Self::matches(record, filter))
    }

    /// Total order over values: by type rank, then by value.
    pub fn compare_values(a: &Value, b: &Value) -> Ordering {
        a.type_rank()
            .cmp(&b.type_rank())
            .then_with(|| a.compare(b).unwrap_or(Ordering::Equal))
    }

    /// Check whether a record has every property the sorts need.
    pub fn has_sort_properties(record: &Record, sorts: &[SortPredicate]) -> bool {
        sorts
            .iter()
            .all(|sort| Self::sort_value(record, sort).is_some())
    }

    /// Sort records by the predicates, then by key.
    pub fn sort_records(records: &mut [Record], sorts: &[SortPredicate]) {
        records.sort_by(|a, b| {
            for sort in sorts {
                let ordering = match (Self::sort_value(a, sort), Self::sort_value(b, sort)) {
                    (Some(x), Some(y)) => Self::compare_values(&x, &y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                let ordering = match sort.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.key.cmp(&b.key)
        });
    }

    /// The value a record sorts by: the smallest element ascending, the
    /// largest descending.
    fn sort_value(record: &Record, sort: &SortPredicate) -> Option<Value> {
        let value = Self::property_value(record, &sort.property)?;
        let elements = value.elements();
        match sort.direction {
            SortDirection::Ascending => elements.into_iter().min_by(Self::compare_values),
            SortDirection::Descending => elements.into_iter().max_by(Self::compare_values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindred_proto::Key;

    fn book(id: i64, title: &str, pages: i64) -> Record {
        Record::new(Key::from_id("Book", id))
            .with_property("title", title)
            .with_property("pages", pages)
    }

    #[test]
    fn test_matches_scalar() {
        let record = book(1, "Foo", 120);
        assert!(FilterEvaluator::matches(&record, &FilterPredicate::eq("title", "Foo")));
        assert!(FilterEvaluator::matches(&record, &FilterPredicate::gt("pages", 100)));
        assert!(!FilterEvaluator::matches(&record, &FilterPredicate::lt("pages", 100)));
        assert!(!FilterEvaluator::matches(&record, &FilterPredicate::eq("missing", 1)));
        // incompatible types
        assert!(!FilterEvaluator::matches(&record, &FilterPredicate::eq("pages", "120")));
    }

    #[test]
    fn test_matches_key_and_multi_valued() {
        let record = Record::new(Key::from_id("Book", 3))
            .with_property("tags", vec!["a".to_string(), "b".to_string()]);
        assert!(FilterEvaluator::matches(&record, &FilterPredicate::eq("tags", "b")));
        assert!(!FilterEvaluator::matches(&record, &FilterPredicate::eq("tags", "c")));
        assert!(FilterEvaluator::matches(
            &record,
            &FilterPredicate::eq(KEY_PROPERTY, Key::from_id("Book", 3))
        ));
    }

    #[test]
    fn test_sort_with_key_tiebreak() {
        let mut records = vec![book(3, "B", 1), book(1, "B", 1), book(2, "A", 1)];
        FilterEvaluator::sort_records(&mut records, &[SortPredicate::asc("title")]);
        let ids: Vec<_> = records.iter().map(|r| r.key.id().unwrap()).collect();
        assert_eq!(ids, vec![2, 1, 3]);

        FilterEvaluator::sort_records(&mut records, &[SortPredicate::desc("title")]);
        let ids: Vec<_> = records.iter().map(|r| r.key.id().unwrap()).collect();
        assert_eq!(ids, vec![1, 3, 2]);
    }

    #[test]
    fn test_multi_valued_sort_uses_extreme_element() {
        let a = Record::new(Key::from_id("T", 1)).with_property("n", vec![1i64, 9]);
        let b = Record::new(Key::from_id("T", 2)).with_property("n", vec![5i64]);

        let mut records = vec![a.clone(), b.clone()];
        FilterEvaluator::sort_records(&mut records, &[SortPredicate::asc("n")]);
        assert_eq!(records[0].key, a.key);

        FilterEvaluator::sort_records(&mut records, &[SortPredicate::desc("n")]);
        assert_eq!(records[0].key, a.key);
    }

    #[test]
    fn test_mixed_types_order_by_rank() {
        assert_eq!(
            FilterEvaluator::compare_values(&Value::Int64(100), &Value::String("a".into())),
            Ordering::Less
        );
        assert_eq!(
            FilterEvaluator::compare_values(&Value::Null, &Value::Int64(1)),
            Ordering::Less
        );
    }
}
