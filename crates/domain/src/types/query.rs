//! Statement queries and paged results

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::statement::Statement;
use crate::errors::{LrsError, Result};

/// Filter for `GET statements`. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementQuery {
    pub statement_id: Option<String>,
    pub verb: Option<String>,
    /// Activity or agent the statements are about.
    pub object: Option<Value>,
    pub registration: Option<String>,
    pub context: Option<bool>,
    pub actor: Option<Value>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub authoritative: Option<bool>,
    pub sparse: Option<bool>,
    pub instructor: Option<Value>,
}

type Render = fn(&StatementQuery) -> Option<String>;

/// Wire name and renderer for every query field.
const QUERY_FIELDS: &[(&str, Render)] = &[
    ("statementId", |q| q.statement_id.clone()),
    ("verb", |q| q.verb.clone()),
    ("object", |q| q.object.as_ref().map(Value::to_string)),
    ("registration", |q| q.registration.clone()),
    ("context", |q| q.context.map(|v| v.to_string())),
    ("actor", |q| q.actor.as_ref().map(Value::to_string)),
    ("since", |q| q.since.map(rfc3339)),
    ("until", |q| q.until.map(rfc3339)),
    ("limit", |q| q.limit.map(|v| v.to_string())),
    ("authoritative", |q| q.authoritative.map(|v| v.to_string())),
    ("sparse", |q| q.sparse.map(|v| v.to_string())),
    ("instructor", |q| q.instructor.as_ref().map(Value::to_string)),
];

fn rfc3339(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl StatementQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self { statement_id: Some(id.into()), ..Self::default() }
    }

    pub fn with_verb(mut self, verb: impl Into<String>) -> Self {
        self.verb = Some(verb.into());
        self
    }

    pub fn with_actor(mut self, actor: Value) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    /// Query-string pairs for the set fields, in declaration order.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        QUERY_FIELDS
            .iter()
            .filter_map(|(name, render)| render(self).map(|value| ((*name).to_string(), value)))
            .collect()
    }
}

/// One page of statements returned by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementsResult {
    pub statements: Vec<Statement>,
    /// Relative URL of the next page, when the store has more.
    pub more: Option<String>,
}

impl StatementsResult {
    /// Parse either a `{"statements": [...], "more": "..."}` page or a
    /// single statement object (the answer to a GET by id).
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(LrsError::Serialization("statement result must be an object".into()));
        };

        let Some(list) = map.remove("statements") else {
            return Ok(Self { statements: vec![Statement::from_value(Value::Object(map))?], more: None });
        };

        let statements = match list {
            Value::Array(items) => {
                items.into_iter().map(Statement::from_value).collect::<Result<Vec<_>>>()?
            }
            Value::Null => Vec::new(),
            _ => return Err(LrsError::Serialization("'statements' must be an array".into())),
        };
        let more = map
            .remove("more")
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|more| !more.is_empty());

        Ok(Self { statements, more })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    pub fn contains_more(&self) -> bool {
        self.more.is_some()
    }

    /// Put `previous` statements in front of this page's statements.
    pub fn prepend(&mut self, previous: &StatementsResult) {
        let mut merged = previous.statements.clone();
        merged.append(&mut self.statements);
        self.statements = merged;
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn only_set_fields_are_rendered() {
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let query = StatementQuery::new()
            .with_verb("http://adlnet.gov/expapi/verbs/completed")
            .with_actor(json!({ "mbox": "mailto:a@example.com" }))
            .with_since(since)
            .with_limit(25);

        let pairs = query.to_query_pairs();
        let names: Vec<_> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["verb", "actor", "since", "limit"]);
        assert_eq!(pairs[1].1, r#"{"mbox":"mailto:a@example.com"}"#);
        assert_eq!(pairs[2].1, "2024-03-01T12:00:00.000Z");
        assert_eq!(pairs[3].1, "25");
    }

    #[test]
    fn empty_query_renders_nothing() {
        assert!(StatementQuery::new().to_query_pairs().is_empty());
    }

    #[test]
    fn parses_paged_result() {
        let result = StatementsResult::from_value(json!({
            "statements": [{ "id": "a" }, { "id": "b" }],
            "more": "/xapi/statements?more=123"
        }))
        .unwrap();

        assert_eq!(result.statements.len(), 2);
        assert!(result.contains_more());
    }

    #[test]
    fn parses_single_statement() {
        let result = StatementsResult::from_value(json!({ "id": "only", "verb": {} })).unwrap();
        assert_eq!(result.statements.len(), 1);
        assert_eq!(result.statements[0].id(), Some("only"));
        assert!(!result.contains_more());
    }

    #[test]
    fn prepend_keeps_previous_first() {
        let previous = StatementsResult::from_value(json!({ "statements": [{ "id": "a" }] })).unwrap();
        let mut next =
            StatementsResult::from_value(json!({ "statements": [{ "id": "b" }], "more": "" })).unwrap();
        next.prepend(&previous);

        let ids: Vec<_> = next.statements.iter().filter_map(Statement::id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(!next.contains_more());
    }
}
