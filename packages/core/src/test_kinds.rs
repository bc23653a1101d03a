//! Bare entity kinds shared by the unit tests.

use std::sync::Arc;

use serde_json::json;

use crate::entity::{Entity, EntityBase, EntityKind, PlainObject};
use crate::error::Result;

macro_rules! test_kind {
    ($kind:ident, $name:literal) => {
        pub(crate) struct $kind {
            base: EntityBase,
        }

        impl $kind {
            /// A fresh instance with a generated id and no root.
            pub(crate) fn detached() -> Arc<Self> {
                Arc::new(Self {
                    base: EntityBase::new(),
                })
            }

            pub(crate) fn with_id(id: &str) -> Arc<Self> {
                Arc::new(Self {
                    base: EntityBase::with_id(id),
                })
            }
        }

        impl Entity for $kind {
            fn base(&self) -> &EntityBase {
                &self.base
            }
        }

        impl EntityKind for $kind {
            const NAME: &'static str = $name;

            fn from_plain(mut data: PlainObject) -> Result<Self> {
                Ok(Self {
                    base: EntityBase::from_plain(Self::NAME, &mut data)?,
                })
            }
        }
    };
}

test_kind!(A, "A");
test_kind!(B, "B");

/// Seed data carrying only an id.
pub(crate) fn seed(id: &str) -> PlainObject {
    let mut data = PlainObject::new();
    data.insert("id".to_string(), json!(id));
    data
}
