//! Query results.

use std::collections::BTreeMap;

use scm_search_document::FieldValue;
use scm_search_query::QuerySyntax;
use serde::{Serialize, Serializer, ser::SerializeStruct};

/// How the query string was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryType {
    /// Ranked prefix matching of plain words.
    BestGuess,
    /// Query language.
    Exact,
}

impl From<QuerySyntax> for QueryType {
    fn from(syntax: QuerySyntax) -> Self {
        match syntax {
            QuerySyntax::BestGuess => Self::BestGuess,
            QuerySyntax::Exact => Self::Exact,
        }
    }
}

/// How thoroughly matches are counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CountMode {
    /// Count every permitted match.
    #[default]
    Exact,
    /// Stop checking permissions for matches that cannot reach the result window; the total
    /// is then a lower bound.
    LowerBound,
}

/// A field of a hit.
#[derive(Debug, Clone, PartialEq)]
pub enum HitField {
    /// The stored value.
    Value(FieldValue),
    /// Fragments with matches wrapped in highlight markers.
    Highlighted(Vec<String>),
}

impl Serialize for HitField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("HitField", 2)?;
        match self {
            Self::Value(value) => {
                state.serialize_field("highlighted", &false)?;
                state.serialize_field("value", value)?;
            }
            Self::Highlighted(fragments) => {
                state.serialize_field("highlighted", &true)?;
                state.serialize_field("fragments", fragments)?;
            }
        }
        state.end()
    }
}

/// A single matching document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    /// Primary id.
    pub id: String,
    /// Relevance score.
    pub score: f32,
    /// Stored fields by name.
    pub fields: BTreeMap<String, HitField>,
    /// Scope ids by scope type.
    pub scopes: BTreeMap<String, String>,
}

impl Hit {
    /// Returns the plain value of a field, if it was not highlighted.
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        match self.fields.get(name)? {
            HitField::Value(value) => Some(value),
            HitField::Highlighted(_) => None,
        }
    }

    /// Returns the highlighted fragments of a field.
    pub fn fragments(&self, name: &str) -> Option<&[String]> {
        match self.fields.get(name)? {
            HitField::Highlighted(fragments) => Some(fragments),
            HitField::Value(_) => None,
        }
    }
}

/// Result of a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Number of permitted matches.
    pub total_hits: u64,
    /// Whether `total_hits` is exact or a lower bound.
    pub total_hits_exact: bool,
    /// Searched type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// How the query was interpreted.
    pub query_type: QueryType,
    /// Hits of the requested window.
    pub hits: Vec<Hit>,
}

/// Result of a count query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountResult {
    /// Searched type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Number of permitted matches.
    pub total_hits: u64,
    /// How the query was interpreted.
    pub query_type: QueryType,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn value_field_json() {
        let field = HitField::Value(FieldValue::Text("Arthur".into()));
        assert_eq!(
            serde_json::to_value(&field).unwrap(),
            json!({"highlighted": false, "value": "Arthur"})
        );
    }

    #[test]
    fn highlighted_field_json() {
        let field = HitField::Highlighted(vec!["<|[[--Arthur--]]|> Dent".into()]);
        assert_eq!(
            serde_json::to_value(&field).unwrap(),
            json!({"highlighted": true, "fragments": ["<|[[--Arthur--]]|> Dent"]})
        );
    }

    #[test]
    fn result_json() {
        let result = QueryResult {
            total_hits: 1,
            total_hits_exact: true,
            type_name: "user".into(),
            query_type: QueryType::BestGuess,
            hits: vec![Hit {
                id: "trillian".into(),
                score: 1.5,
                fields: BTreeMap::from([(
                    "age".to_string(),
                    HitField::Value(FieldValue::Integer(30)),
                )]),
                scopes: BTreeMap::from([("repository".to_string(), "hog".to_string())]),
            }],
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "totalHits": 1,
                "totalHitsExact": true,
                "type": "user",
                "queryType": "bestGuess",
                "hits": [{
                    "id": "trillian",
                    "score": 1.5,
                    "fields": {"age": {"highlighted": false, "value": 30}},
                    "scopes": {"repository": "hog"}
                }]
            })
        );
    }

    #[test]
    fn hit_accessors() {
        let hit = Hit {
            id: "1".into(),
            score: 0.0,
            fields: BTreeMap::from([
                ("name".to_string(), HitField::Value(FieldValue::Text("x".into()))),
                ("bio".to_string(), HitField::Highlighted(vec!["y".into()])),
            ]),
            scopes: BTreeMap::new(),
        };
        assert!(hit.value("name").is_some());
        assert!(hit.value("bio").is_none());
        assert_eq!(hit.fragments("bio").map(<[String]>::len), Some(1));
    }
}
