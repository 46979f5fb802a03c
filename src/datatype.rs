use std::fmt;

/// Datatype tag carried by every snak.
///
/// `Unknown` marks no-value and some-value snaks, which have a property but no datavalue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datatype {
    String,
    ExternalId,
    WikibaseItem,
    WikibaseProperty,
    WikibaseLexeme,
    WikibaseSense,
    WikibaseForm,
    Time,
    Quantity,
    GlobeCoordinate,
    MonolingualText,
    Url,
    Media,
    GeoShape,
    Math,
    TabularData,
    MusicalNotation,
    Unknown,
}

impl Datatype {
    /// Parses a dump or tabular tag, accepting the legacy spellings older dumps use.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let datatype = match tag {
            "string" => Datatype::String,
            "external-id" => Datatype::ExternalId,
            "wikibase-item" | "wikibase-entityid" => Datatype::WikibaseItem,
            "wikibase-property" => Datatype::WikibaseProperty,
            "wikibase-lexeme" => Datatype::WikibaseLexeme,
            "wikibase-sense" => Datatype::WikibaseSense,
            "wikibase-form" => Datatype::WikibaseForm,
            "time" => Datatype::Time,
            "quantity" => Datatype::Quantity,
            "globe-coordinate" | "globecoordinate" => Datatype::GlobeCoordinate,
            "monolingualtext" | "monolingual-text" => Datatype::MonolingualText,
            "url" => Datatype::Url,
            "commonsMedia" | "media" => Datatype::Media,
            "geo-shape" => Datatype::GeoShape,
            "math" => Datatype::Math,
            "tabular-data" => Datatype::TabularData,
            "musical-notation" => Datatype::MusicalNotation,
            "unknown" => Datatype::Unknown,
            _ => return None,
        };
        Some(datatype)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Datatype::String => "string",
            Datatype::ExternalId => "external-id",
            Datatype::WikibaseItem => "wikibase-item",
            Datatype::WikibaseProperty => "wikibase-property",
            Datatype::WikibaseLexeme => "wikibase-lexeme",
            Datatype::WikibaseSense => "wikibase-sense",
            Datatype::WikibaseForm => "wikibase-form",
            Datatype::Time => "time",
            Datatype::Quantity => "quantity",
            Datatype::GlobeCoordinate => "globe-coordinate",
            Datatype::MonolingualText => "monolingualtext",
            Datatype::Url => "url",
            Datatype::Media => "commonsMedia",
            Datatype::GeoShape => "geo-shape",
            Datatype::Math => "math",
            Datatype::TabularData => "tabular-data",
            Datatype::MusicalNotation => "musical-notation",
            Datatype::Unknown => "unknown",
        }
    }

    /// True when the value names another item, making it usable as a value-specific context.
    pub fn is_item_reference(&self) -> bool {
        matches!(self, Datatype::WikibaseItem)
    }

    /// Entity type expected inside the datavalue of an entity-reference datatype.
    pub fn entity_type(&self) -> Option<&'static str> {
        match self {
            Datatype::WikibaseItem => Some("item"),
            Datatype::WikibaseProperty => Some("property"),
            Datatype::WikibaseLexeme => Some("lexeme"),
            Datatype::WikibaseSense => Some("sense"),
            Datatype::WikibaseForm => Some("form"),
            _ => None,
        }
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
