//! Index specifications.

use crate::query::SortDirection;

/// An index over one or more fields of a collection.
///
/// Keys are ordered; the first key is the index's leading field.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub keys: Vec<(String, SortDirection)>,
    pub unique: bool,
}

impl IndexSpec {
    /// An ascending index on a single field.
    pub fn single(field: impl Into<String>) -> Self {
        Self { keys: vec![(field.into(), SortDirection::Asc)], unique: false }
    }

    /// An ascending compound index over the given fields, in order.
    pub fn compound<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: fields
                .into_iter()
                .map(|field| (field.into(), SortDirection::Asc))
                .collect(),
            unique: false,
        }
    }

    /// The index name MongoDB assigns by default, e.g. `author_1_published_year_1`.
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, direction)| format!("{}_{}", field, direction.as_i32()))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// The leading field of the index.
    pub fn leading_field(&self) -> Option<&str> {
        self.keys.first().map(|(field, _)| field.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_mongo_convention() {
        assert_eq!(IndexSpec::single("title").name(), "title_1");
        assert_eq!(
            IndexSpec::compound(["author", "published_year"]).name(),
            "author_1_published_year_1"
        );
    }

    #[test]
    fn descending_keys_use_minus_one() {
        let spec = IndexSpec {
            keys: vec![("price".into(), SortDirection::Desc)],
            unique: false,
        };

        assert_eq!(spec.name(), "price_-1");
    }

    #[test]
    fn leading_field_is_first_key() {
        assert_eq!(
            IndexSpec::compound(["author", "published_year"]).leading_field(),
            Some("author")
        );
    }
}
