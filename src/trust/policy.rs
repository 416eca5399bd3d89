//! Assume-role policy document model.
//!
//! Only the keys the editor reasons about are typed; everything else on a
//! statement or the document (`Sid`, `Condition`, `NotPrincipal`, ...) is kept
//! verbatim so a grant never drops existing trust conditions.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const POLICY_VERSION: &str = "2012-10-17";
pub const ASSUME_ROLE_ACTION: &str = "sts:AssumeRole";
const AWS_PRINCIPAL_KEY: &str = "AWS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: PartialEq> OneOrMany<T> {
    pub fn contains(&self, item: &T) -> bool {
        match self {
            OneOrMany::One(value) => value == item,
            OneOrMany::Many(values) => values.contains(item),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Principal {
    /// `"Principal": "*"`
    Any(String),
    /// `"Principal": {"AWS": ..., "Service": ...}`
    Typed(BTreeMap<String, OneOrMany<String>>),
}

impl Principal {
    pub fn aws(arn: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(AWS_PRINCIPAL_KEY.to_string(), OneOrMany::One(arn.into()));
        Principal::Typed(map)
    }

    /// Exact match against the `AWS` entry, whether a string or a list.
    pub fn names_aws(&self, arn: &str) -> bool {
        match self {
            Principal::Typed(map) => map
                .get(AWS_PRINCIPAL_KEY)
                .is_some_and(|value| value.contains(&arn.to_string())),
            Principal::Any(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    #[serde(rename = "Effect")]
    pub effect: Effect,
    #[serde(rename = "Principal", default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    #[serde(rename = "Action", default, skip_serializing_if = "Option::is_none")]
    pub action: Option<OneOrMany<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Statement {
    pub fn allow_assume_role(principal_arn: impl Into<String>) -> Self {
        Self {
            effect: Effect::Allow,
            principal: Some(Principal::aws(principal_arn)),
            action: Some(OneOrMany::One(ASSUME_ROLE_ACTION.to_string())),
            extra: Map::new(),
        }
    }

    pub fn allows_aws_principal(&self, arn: &str) -> bool {
        self.effect == Effect::Allow
            && self
                .principal
                .as_ref()
                .is_some_and(|principal| principal.names_aws(arn))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustPolicyDocument {
    #[serde(rename = "Version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "Statement", deserialize_with = "statements_from_one_or_many")]
    pub statements: Vec<Statement>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn statements_from_one_or_many<'de, D>(deserializer: D) -> Result<Vec<Statement>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::<Statement>::deserialize(deserializer)? {
        OneOrMany::One(statement) => vec![statement],
        OneOrMany::Many(statements) => statements,
    })
}

impl TrustPolicyDocument {
    /// Parse a document as returned by IAM, which URL-encodes it.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let trimmed = raw.trim_start();
        if trimmed.starts_with('{') {
            return serde_json::from_str(trimmed);
        }
        let decoded = percent_decode_str(trimmed).decode_utf8_lossy();
        serde_json::from_str(&decoded)
    }

    /// A document whose only statement lets `principal_arn` assume the role.
    pub fn sole_trust(principal_arn: impl Into<String>) -> Self {
        Self {
            version: Some(POLICY_VERSION.to_string()),
            statements: vec![Statement::allow_assume_role(principal_arn)],
            extra: Map::new(),
        }
    }

    pub fn trusts(&self, principal_arn: &str) -> bool {
        self.statements
            .iter()
            .any(|statement| statement.allows_aws_principal(principal_arn))
    }

    /// Append an allow statement for `principal_arn` unless one already
    /// exists. Returns whether the document changed.
    pub fn grant_assume_role(&mut self, principal_arn: &str) -> bool {
        if self.trusts(principal_arn) {
            return false;
        }
        self.statements
            .push(Statement::allow_assume_role(principal_arn));
        true
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TARGET: &str = "arn:aws:iam::999988887777:root";

    fn source_only() -> TrustPolicyDocument {
        serde_json::from_value(json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Principal": {"AWS": "arn:aws:iam::111122223333:root"},
                "Action": "sts:AssumeRole"
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_grant_appends_single_statement() {
        let mut doc = source_only();
        assert!(doc.grant_assume_role(TARGET));
        assert_eq!(doc.statements.len(), 2);

        let added = &doc.statements[1];
        assert_eq!(added.effect, Effect::Allow);
        assert!(added.allows_aws_principal(TARGET));
        assert_eq!(
            added.action,
            Some(OneOrMany::One(ASSUME_ROLE_ACTION.to_string()))
        );
    }

    #[test]
    fn test_grant_is_idempotent() {
        let mut doc = source_only();
        doc.grant_assume_role(TARGET);
        assert!(!doc.grant_assume_role(TARGET));
        assert_eq!(doc.statements.len(), 2);
    }

    #[test]
    fn test_principal_in_list_counts_as_present() {
        let mut doc: TrustPolicyDocument = serde_json::from_value(json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Principal": {"AWS": ["arn:aws:iam::111122223333:root", TARGET]},
                "Action": "sts:AssumeRole"
            }]
        }))
        .unwrap();

        assert!(!doc.grant_assume_role(TARGET));
        assert_eq!(doc.statements.len(), 1);
    }

    #[test]
    fn test_deny_statement_does_not_count_as_trust() {
        let mut doc: TrustPolicyDocument = serde_json::from_value(json!({
            "Statement": [{
                "Effect": "Deny",
                "Principal": {"AWS": TARGET},
                "Action": "sts:AssumeRole"
            }]
        }))
        .unwrap();

        assert!(doc.grant_assume_role(TARGET));
        assert_eq!(doc.statements.len(), 2);
    }

    #[test]
    fn test_single_statement_object_is_accepted() {
        let doc = TrustPolicyDocument::parse(
            r#"{"Version":"2012-10-17","Statement":{"Effect":"Allow","Principal":{"Service":"ec2.amazonaws.com"},"Action":"sts:AssumeRole"}}"#,
        )
        .unwrap();
        assert_eq!(doc.statements.len(), 1);
        assert!(!doc.trusts(TARGET));
    }

    #[test]
    fn test_parse_url_encoded_document() {
        let encoded = "%7B%22Version%22%3A%222012-10-17%22%2C%22Statement%22%3A%5B%7B%22Effect%22%3A%22Allow%22%2C%22Principal%22%3A%7B%22AWS%22%3A%22arn%3Aaws%3Aiam%3A%3A999988887777%3Aroot%22%7D%2C%22Action%22%3A%22sts%3AAssumeRole%22%7D%5D%7D";
        let doc = TrustPolicyDocument::parse(encoded).unwrap();
        assert!(doc.trusts(TARGET));
    }

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let mut doc: TrustPolicyDocument = serde_json::from_value(json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Sid": "SourceOrg",
                "Effect": "Allow",
                "Principal": {"AWS": "arn:aws:iam::111122223333:root"},
                "Action": "sts:AssumeRole",
                "Condition": {"Bool": {"aws:MultiFactorAuthPresent": "true"}}
            }]
        }))
        .unwrap();
        doc.grant_assume_role(TARGET);

        let value: Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(value["Statement"][0]["Sid"], "SourceOrg");
        assert_eq!(
            value["Statement"][0]["Condition"]["Bool"]["aws:MultiFactorAuthPresent"],
            "true"
        );
        assert_eq!(value["Statement"][1]["Principal"]["AWS"], TARGET);
    }

    #[test]
    fn test_sole_trust_has_exactly_one_statement() {
        let doc = TrustPolicyDocument::sole_trust(TARGET);
        assert_eq!(doc.version.as_deref(), Some(POLICY_VERSION));
        assert_eq!(doc.statements.len(), 1);
        assert!(doc.trusts(TARGET));
    }
}
