use crate::{
    index::IndexDescriptor,
    protocol::{
        OPERATOR_DECREMENT, OPERATOR_DELETE, OPERATOR_INCREMENT, OPERATOR_UPDATE, RequestBuffer,
        TOKEN_DELIMITER,
    },
};

use super::{CommandError, Find, values};

/// Write applied to every row a [`Find`] matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modification {
    Update(Vec<Vec<u8>>),
    Delete,
    Increment(Vec<Vec<u8>>),
    Decrement(Vec<Vec<u8>>),
}

impl Modification {
    pub fn operator(&self) -> u8 {
        match self {
            Modification::Update(_) => OPERATOR_UPDATE,
            Modification::Delete => OPERATOR_DELETE,
            Modification::Increment(_) => OPERATOR_INCREMENT,
            Modification::Decrement(_) => OPERATOR_DECREMENT,
        }
    }

    pub fn values(&self) -> &[Vec<u8>] {
        match self {
            Modification::Update(v) | Modification::Increment(v) | Modification::Decrement(v) => {
                v.as_slice()
            }
            Modification::Delete => &[],
        }
    }
}

/// Find followed by a modification clause. The response carries the number of
/// affected rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modify {
    find: Find,
    modification: Modification,
}

impl Modify {
    pub fn new(find: Find, modification: Modification) -> Self {
        Self { find, modification }
    }

    /// Replace the new values (or deltas) of this modification.
    ///
    /// A delete has nothing to write, so attaching values to it is rejected.
    pub fn with_values<V: AsRef<[u8]>>(mut self, new_values: &[V]) -> Result<Self, CommandError> {
        let new_values = values(new_values);
        self.modification = match self.modification {
            Modification::Update(_) => Modification::Update(new_values),
            Modification::Increment(_) => Modification::Increment(new_values),
            Modification::Decrement(_) => Modification::Decrement(new_values),
            Modification::Delete => return Err(CommandError::ValuesNotSupported("delete")),
        };
        Ok(self)
    }

    pub fn find(&self) -> &Find {
        &self.find
    }

    pub fn modification(&self) -> &Modification {
        &self.modification
    }

    pub(crate) fn validate(&self, index: &IndexDescriptor) -> Result<(), CommandError> {
        self.find.validate(index)
    }

    pub(crate) fn encode(&self, index: &IndexDescriptor, out: &mut RequestBuffer) {
        self.find.encode_predicate(index, out);
        out.token().put_byte(self.modification.operator());
        if matches!(self.modification, Modification::Delete) {
            return;
        }
        out.token().put_list(self.modification.values(), TOKEN_DELIMITER);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CompareOperator;

    fn encode(modify: &Modify) -> Vec<u8> {
        let index = IndexDescriptor::with_id(9, "db", "t", "PRIMARY", &["email", "password"]);
        let mut out = RequestBuffer::new();
        modify.validate(&index).unwrap();
        modify.encode(&index, &mut out);
        out.into_inner()
    }

    #[test]
    fn update_appends_new_values() {
        let modify = Find::new(CompareOperator::Eq, &["a1"]).update(&["n@x.com", "pw"]);
        assert_eq!(encode(&modify), b"9\t=\t1\ta1\t1\t0\tU\tn@x.com\tpw".to_vec());
    }

    #[test]
    fn delete_has_no_values() {
        let modify = Find::new(CompareOperator::Eq, &["a1"]).delete();
        assert_eq!(encode(&modify), b"9\t=\t1\ta1\t1\t0\tD".to_vec());
    }

    #[test]
    fn increment_and_decrement() {
        let inc = Find::new(CompareOperator::Eq, &["a1"]).increment(&["1", "0"]);
        assert_eq!(encode(&inc), b"9\t=\t1\ta1\t1\t0\t+\t1\t0".to_vec());

        let dec = Find::new(CompareOperator::Eq, &["a1"]).limit(3).decrement(&["2"]);
        assert_eq!(encode(&dec), b"9\t=\t1\ta1\t3\t0\t-\t2".to_vec());
    }

    #[test]
    fn values_on_delete_are_rejected() {
        let delete = Find::new(CompareOperator::Eq, &["a1"]).delete();
        assert_eq!(
            delete.with_values(&["x"]),
            Err(CommandError::ValuesNotSupported("delete"))
        );

        let update = Find::new(CompareOperator::Eq, &["a1"])
            .update(&["x"])
            .with_values(&["y"])
            .unwrap();
        assert_eq!(update.modification(), &Modification::Update(vec![b"y".to_vec()]));
    }
}
