use std::fmt;

use facet::Facet;
use thiserror::Error;
use uuid::Uuid;

/// The distinguished nil id shared by every id kind.
pub const NIL_ID: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("{field} is not a UUID: {got:?}")]
    Malformed { field: &'static str, got: String },
}

macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $name:ident,
        field = $field:literal
    ) => {
        $(#[$meta])*
        #[derive(Facet, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[facet(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generates a fresh random id.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().as_hyphenated().to_string())
            }

            /// The distinguished nil id.
            pub fn nil() -> Self {
                Self(NIL_ID.to_string())
            }

            /// Parses a UUID-shaped string, normalising to lowercase
            /// hyphenated form.
            pub fn parse(value: &str) -> Result<Self, IdError> {
                match Uuid::parse_str(value) {
                    Ok(uuid) => Ok(Self(uuid.as_hyphenated().to_string())),
                    Err(_) => Err(IdError::Malformed {
                        field: $field,
                        got: value.to_string(),
                    }),
                }
            }

            pub fn is_nil(&self) -> bool {
                self.0 == NIL_ID
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        #[cfg(feature = "rusqlite")]
        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::Borrowed(
                    rusqlite::types::ValueRef::Text(self.0.as_bytes()),
                ))
            }
        }

        #[cfg(feature = "rusqlite")]
        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                let text = <String as rusqlite::types::FromSql>::column_result(value)?;
                $name::parse(&text).map_err(|error| {
                    rusqlite::types::FromSqlError::Other(Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        error.to_string(),
                    )))
                })
            }
        }
    };
}

define_uuid_id!(
    /// Identity of one image graph aggregate.
    ImageGraphId,
    field = "image_graph_id"
);
define_uuid_id!(
    /// Identity of one node within a graph.
    NodeId,
    field = "node_id"
);
define_uuid_id!(
    /// Opaque reference to a stored image blob. Ownership of the bytes is
    /// external to the graph domain.
    ImageId,
    field = "image_id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_uuid_shaped_and_unique() {
        let a = NodeId::generate();
        let b = NodeId::generate();
        assert_ne!(a, b);
        assert!(!a.is_nil());
        assert_eq!(NodeId::parse(a.as_str()), Ok(a.clone()));
    }

    #[test]
    fn nil_id_round_trips() {
        let nil = ImageGraphId::nil();
        assert!(nil.is_nil());
        assert_eq!(nil.as_str(), NIL_ID);
        assert_eq!(ImageGraphId::parse(NIL_ID), Ok(nil));
    }

    #[test]
    fn parse_normalises_case() {
        let id = ImageId::parse("6F1F9AA0-65DE-4E8C-94B3-0C6E41F21F6A").expect("valid uuid");
        assert_eq!(id.as_str(), "6f1f9aa0-65de-4e8c-94b3-0c6e41f21f6a");
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = NodeId::parse("not-a-uuid").expect_err("must fail");
        assert!(matches!(err, IdError::Malformed { field: "node_id", .. }));
    }
}
