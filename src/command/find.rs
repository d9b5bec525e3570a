use crate::{
    index::IndexDescriptor,
    protocol::{OPERATOR_FILTER, OPERATOR_IN, OPERATOR_WHILE, RequestBuffer, TOKEN_DELIMITER},
};

use super::{CommandError, CompareOperator, Modification, Modify, values};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Skip rows not matching the predicate (`F`).
    Filter,
    /// Stop the scan at the first row not matching the predicate (`W`).
    While,
}

impl FilterKind {
    pub fn operator(self) -> u8 {
        match self {
            FilterKind::Filter => OPERATOR_FILTER,
            FilterKind::While => OPERATOR_WHILE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub kind: FilterKind,
    pub op: CompareOperator,
    pub column: String,
    pub value: Vec<u8>,
}

/// `IN` clause: match any of `values` on key part `position`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InClause {
    pub position: usize,
    pub values: Vec<Vec<u8>>,
}

/// Index lookup.
///
/// Built by value: every builder method consumes and returns the find, so a
/// request is assembled once per call and never reset in place.
///
/// ```rust
/// use hsclient::command::{CompareOperator, Find};
///
/// let find = Find::new(CompareOperator::Ge, &["a1"])
///     .limit(10)
///     .filter("age", CompareOperator::Gt, "18");
/// assert_eq!(find.get_limit(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Find {
    op: CompareOperator,
    conditions: Vec<Vec<u8>>,
    limit: u32,
    offset: u32,
    in_clause: Option<InClause>,
    filters: Vec<Filter>,
}

impl Find {
    pub fn new<V: AsRef<[u8]>>(op: CompareOperator, conditions: &[V]) -> Self {
        Self {
            op,
            conditions: values(conditions),
            limit: 1,
            offset: 0,
            in_clause: None,
            filters: Vec::new(),
        }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn in_values<V: AsRef<[u8]>>(mut self, position: usize, conditions: &[V]) -> Self {
        self.in_clause = Some(InClause {
            position,
            values: values(conditions),
        });
        self
    }

    pub fn filter(self, column: &str, op: CompareOperator, value: impl AsRef<[u8]>) -> Self {
        self.push_filter(FilterKind::Filter, column, op, value)
    }

    pub fn till(self, column: &str, op: CompareOperator, value: impl AsRef<[u8]>) -> Self {
        self.push_filter(FilterKind::While, column, op, value)
    }

    fn push_filter(
        mut self,
        kind: FilterKind,
        column: &str,
        op: CompareOperator,
        value: impl AsRef<[u8]>,
    ) -> Self {
        self.filters.push(Filter {
            kind,
            op,
            column: column.to_string(),
            value: value.as_ref().to_vec(),
        });
        self
    }

    pub fn update<V: AsRef<[u8]>>(self, new_values: &[V]) -> Modify {
        Modify::new(self, Modification::Update(values(new_values)))
    }

    pub fn delete(self) -> Modify {
        Modify::new(self, Modification::Delete)
    }

    pub fn increment<V: AsRef<[u8]>>(self, deltas: &[V]) -> Modify {
        Modify::new(self, Modification::Increment(values(deltas)))
    }

    pub fn decrement<V: AsRef<[u8]>>(self, deltas: &[V]) -> Modify {
        Modify::new(self, Modification::Decrement(values(deltas)))
    }

    pub fn operator(&self) -> CompareOperator {
        self.op
    }

    pub fn conditions(&self) -> &[Vec<u8>] {
        &self.conditions
    }

    pub fn get_limit(&self) -> u32 {
        self.limit
    }

    pub fn get_offset(&self) -> u32 {
        self.offset
    }

    pub fn in_clause(&self) -> Option<&InClause> {
        self.in_clause.as_ref()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub(crate) fn validate(&self, index: &IndexDescriptor) -> Result<(), CommandError> {
        if self.conditions.is_empty() {
            return Err(CommandError::EmptyConditions);
        }
        if self.limit == 0 {
            return Err(CommandError::ZeroLimit);
        }
        if let Some(clause) = &self.in_clause {
            let key_parts = index.index_columns().len();
            if key_parts > 0 && clause.position >= key_parts {
                return Err(CommandError::InPosition {
                    position: clause.position,
                    key_parts,
                });
            }
        }
        for filter in &self.filters {
            if index.filter_column_position(&filter.column).is_none() {
                return Err(CommandError::UnknownFilterColumn {
                    column: filter.column.clone(),
                    index: index.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Write everything up to, but excluding, the modification clause and the
    /// packet delimiter. Must be called after [`validate`](Self::validate).
    pub(crate) fn encode_predicate(&self, index: &IndexDescriptor, out: &mut RequestBuffer) {
        out.put_number(index.id())
            .token()
            .put_raw(self.op.as_bytes())
            .token()
            .put_number(self.conditions.len())
            .token()
            .put_list(&self.conditions, TOKEN_DELIMITER)
            .token()
            .put_number(self.limit)
            .token()
            .put_number(self.offset);

        if let Some(clause) = self.in_clause.as_ref().filter(|c| !c.values.is_empty()) {
            out.token()
                .put_byte(OPERATOR_IN)
                .token()
                .put_number(clause.position)
                .token()
                .put_number(clause.values.len())
                .token()
                .put_list(&clause.values, TOKEN_DELIMITER);
        }

        for filter in &self.filters {
            // validated: every filter column is declared on the index
            let position = index.filter_column_position(&filter.column).unwrap_or_default();
            out.token()
                .put_byte(filter.kind.operator())
                .token()
                .put_raw(filter.op.as_bytes())
                .token()
                .put_number(position)
                .token()
                .put_escaped(&filter.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(find: &Find, index: &IndexDescriptor) -> Vec<u8> {
        let mut out = RequestBuffer::new();
        find.validate(index).unwrap();
        find.encode_predicate(index, &mut out);
        out.into_inner()
    }

    #[test]
    fn predicate_with_defaults() {
        let index = IndexDescriptor::with_id(1, "db", "t", "PRIMARY", &["a"]);
        let find = Find::new(CompareOperator::Eq, &["a1"]);
        assert_eq!(encode(&find, &index), b"1\t=\t1\ta1\t1\t0".to_vec());
    }

    #[test]
    fn predicate_with_in_clause_and_filters() {
        let index = IndexDescriptor::with_id(4, "db", "t", "PRIMARY", &["a"])
            .with_filter_columns(&["age", "score"]);
        let find = Find::new(CompareOperator::Ge, &["k1", "k2"])
            .limit(5)
            .offset(2)
            .in_values(0, &["x", "y\n"])
            .filter("score", CompareOperator::Gt, "10")
            .till("age", CompareOperator::Le, "30");

        assert_eq!(
            encode(&find, &index),
            b"4\t>=\t2\tk1\tk2\t5\t2\t@\t0\t2\tx\ty\x01\x4a\tF\t>\t1\t10\tW\t<=\t0\t30".to_vec()
        );
    }

    #[test]
    fn empty_in_clause_is_omitted() {
        let index = IndexDescriptor::with_id(2, "db", "t", "PRIMARY", &["a"]);
        let find = Find::new(CompareOperator::Eq, &["a"]).in_values::<&str>(0, &[]);
        assert_eq!(encode(&find, &index), b"2\t=\t1\ta\t1\t0".to_vec());
    }

    #[test]
    fn rejects_unknown_filter_column() {
        let index = IndexDescriptor::with_id(2, "db", "t", "PRIMARY", &["a"]);
        let find = Find::new(CompareOperator::Eq, &["a"]).filter("age", CompareOperator::Eq, "1");
        assert!(matches!(
            find.validate(&index),
            Err(CommandError::UnknownFilterColumn { column, .. }) if column == "age"
        ));
    }

    #[test]
    fn rejects_zero_limit_and_empty_conditions() {
        let index = IndexDescriptor::with_id(2, "db", "t", "PRIMARY", &["a"]);
        assert_eq!(
            Find::new(CompareOperator::Eq, &["a"]).limit(0).validate(&index),
            Err(CommandError::ZeroLimit)
        );
        assert_eq!(
            Find::new::<&str>(CompareOperator::Eq, &[]).validate(&index),
            Err(CommandError::EmptyConditions)
        );
    }

    #[test]
    fn rejects_in_position_outside_key() {
        let index =
            IndexDescriptor::with_id(2, "db", "t", "idx", &["a"]).with_index_columns(&["k"]);
        let find = Find::new(CompareOperator::Eq, &["a"]).in_values(1, &["b"]);
        assert_eq!(
            find.validate(&index),
            Err(CommandError::InPosition {
                position: 1,
                key_parts: 1
            })
        );
    }
}
