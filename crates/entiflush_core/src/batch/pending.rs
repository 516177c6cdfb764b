//! Pending update entries.

/// The fields an update writes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChangedFields {
    /// Every non-key field.
    #[default]
    All,
    /// Only the named fields. Key fields in the list are ignored.
    Only(Vec<String>),
}

impl ChangedFields {
    /// Builds a field set from names. An empty list means [`ChangedFields::All`].
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            Self::All
        } else {
            Self::Only(names)
        }
    }

    /// Returns true for a whole-row update.
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl<S: Into<String>> FromIterator<S> for ChangedFields {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_names(iter)
    }
}

/// An entity staged for update with the fields to write.
#[derive(Debug, Clone)]
pub struct PendingUpdate<T> {
    /// The entity, carrying its current key and new field values.
    pub entity: T,
    /// Fields to write.
    pub fields: ChangedFields,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_names_mean_all() {
        assert!(ChangedFields::from_names(Vec::<String>::new()).is_all());
        let only: ChangedFields = ["name"].into_iter().collect();
        assert_eq!(only, ChangedFields::Only(vec!["name".to_string()]));
    }
}
