//! Relationships - directed join edges between models.

use serde::{Deserialize, Serialize};

/// Cardinality of a relationship as declared on the owning model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    ManyToOne,
    OneToMany,
    OneToOne,
    ManyToMany,
}

impl Cardinality {
    /// Cardinality of the same edge traversed in the opposite direction.
    pub fn inverse(self) -> Cardinality {
        match self {
            Cardinality::ManyToOne => Cardinality::OneToMany,
            Cardinality::OneToMany => Cardinality::ManyToOne,
            Cardinality::OneToOne => Cardinality::OneToOne,
            Cardinality::ManyToMany => Cardinality::ManyToMany,
        }
    }

    /// Whether following this edge can multiply rows on the source side.
    pub fn fans_out(self) -> bool {
        matches!(self, Cardinality::OneToMany | Cardinality::ManyToMany)
    }
}

/// A join edge declared on a model. `name` is the target model.
///
/// Key columns are optional; they default to the `{model}_id` foreign key
/// convention and the target's primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub name: String,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub foreign_key: Option<String>,
    #[serde(default)]
    pub primary_key: Option<String>,
}

impl Relationship {
    pub fn new(target: &str, cardinality: Cardinality) -> Self {
        Self {
            name: target.into(),
            cardinality,
            foreign_key: None,
            primary_key: None,
        }
    }

    pub fn with_foreign_key(mut self, key: &str) -> Self {
        self.foreign_key = Some(key.into());
        self
    }

    pub fn with_primary_key(mut self, key: &str) -> Self {
        self.primary_key = Some(key.into());
        self
    }
}
