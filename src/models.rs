use crate::datatype::Datatype;
use crate::error::SnakError;
use serde::Serialize;
use std::fmt;

/// A single typed fact: property, datatype tag and a normalized scalar value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Snak {
    property_id: u32,
    datatype: Datatype,
    value: String,
}

impl Snak {
    pub fn new(
        property_id: u32,
        datatype: Datatype,
        value: impl Into<String>,
    ) -> Result<Self, SnakError> {
        if property_id == 0 {
            return Err(SnakError::InvalidProperty(property_id.to_string()));
        }
        Ok(Self {
            property_id,
            datatype,
            value: value.into(),
        })
    }

    pub fn property_id(&self) -> u32 {
        self.property_id
    }

    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// One statement: a main snak plus the qualifier and reference snaks attached to it.
///
/// References from all reference groups are flattened into one list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    main_snak: Snak,
    qualifiers: Vec<Snak>,
    references: Vec<Snak>,
}

impl Claim {
    pub fn new(main_snak: Snak, qualifiers: Vec<Snak>, references: Vec<Snak>) -> Self {
        Self {
            main_snak,
            qualifiers,
            references,
        }
    }

    /// A claim with no qualifiers or references.
    pub fn bare(main_snak: Snak) -> Self {
        Self::new(main_snak, Vec::new(), Vec::new())
    }

    pub fn main_snak(&self) -> &Snak {
        &self.main_snak
    }

    pub fn property_id(&self) -> u32 {
        self.main_snak.property_id
    }

    pub fn qualifiers(&self) -> &[Snak] {
        &self.qualifiers
    }

    pub fn references(&self) -> &[Snak] {
        &self.references
    }
}

/// One knowledge-base record. Claims keep the order the reader produced them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    id: String,
    claims: Vec<Claim>,
}

impl Entity {
    pub fn new(id: impl Into<String>, claims: Vec<Claim>) -> Self {
        Self {
            id: id.into(),
            claims,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }
}

/// Which count table a rule was emitted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    Item,
    Qualifier,
    Reference,
}

impl ContextType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::Item => "item",
            ContextType::Qualifier => "qualifier",
            ContextType::Reference => "reference",
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A suggestion rule: entities matching the context also tend to carry `target_property`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    pub context_property: u32,
    /// Numeric id of the item value, only for value-specific item contexts.
    pub context_value: Option<u64>,
    pub target_property: u32,
    pub count: u64,
    pub confidence: f64,
    pub context_type: ContextType,
}

impl Rule {
    pub fn new(
        context_property: u32,
        context_value: Option<u64>,
        target_property: u32,
        count: u64,
        confidence: f64,
        context_type: ContextType,
    ) -> Self {
        Self {
            context_property,
            context_value,
            target_property,
            count,
            confidence,
            context_type,
        }
    }
}
