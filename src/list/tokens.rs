//! Flat token form of the ordering list.
//!
//! The list serializes as schema indexes, each optionally followed by a flag
//! object: `[-1, {"head": true}, 4, {"hide": [5, 6]}, 7, {"rest": true}]`.

use serde::{Deserialize, Serialize};

use super::{NodeKind, OrderingList};

/// One element of the flattened list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListToken {
    Index(i64),
    Flags(NodeFlags),
}

/// Flags attached to the schema index right before them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFlags {
    #[serde(default, skip_serializing_if = "is_false")]
    pub head: bool,
    /// Open tail: this index and every integer after it.
    #[serde(default, skip_serializing_if = "is_false")]
    pub rest: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide: Option<Vec<ListToken>>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

/// Pair every index with the flags that follow it.
fn group(tokens: &[ListToken]) -> Option<Vec<(i64, NodeFlags)>> {
    let mut entries: Vec<(i64, NodeFlags, bool)> = Vec::with_capacity(tokens.len());
    for token in tokens {
        match token {
            ListToken::Index(schema) => entries.push((*schema, NodeFlags::default(), false)),
            ListToken::Flags(flags) => {
                let last = entries.last_mut()?;
                if last.2 {
                    return None;
                }
                last.1 = flags.clone();
                last.2 = true;
            }
        }
    }
    Some(entries.into_iter().map(|(s, f, _)| (s, f)).collect())
}

/// Hidden indexes in order; nested hide lists are flattened behind their
/// parent.
fn flatten_hidden(tokens: &[ListToken], out: &mut Vec<i64>) -> Option<()> {
    for (schema, flags) in group(tokens)? {
        if flags.head || flags.rest {
            return None;
        }
        out.push(schema);
        if let Some(nested) = &flags.hide {
            flatten_hidden(nested, out)?;
        }
    }
    Some(())
}

impl OrderingList {
    /// Flatten the list into tokens.
    pub fn to_tokens(&self) -> Vec<ListToken> {
        let mut tokens = Vec::new();
        for id in self.visible() {
            tokens.push(ListToken::Index(self.schema(id)));
            let hidden = self.chain_schemas(id);
            let flags = NodeFlags {
                head: self.kind(id) == NodeKind::Head,
                rest: self.kind(id) == NodeKind::OpenTail,
                hide: (!hidden.is_empty())
                    .then(|| hidden.into_iter().map(ListToken::Index).collect()),
            };
            if flags != NodeFlags::default() {
                tokens.push(ListToken::Flags(flags));
            }
        }
        tokens
    }

    /// Rebuild a list from tokens. `None` when the tokens do not describe
    /// a well-formed list (missing head or tail, duplicates, indexes inside
    /// the tail run).
    pub fn from_tokens(tokens: &[ListToken]) -> Option<Self> {
        let entries = group(tokens)?;
        let (first, rest) = entries.split_first()?;
        let (last, middle) = rest.split_last()?;

        if first.0 != -1 || !first.1.head || first.1.rest {
            return None;
        }
        if !last.1.rest || last.1.head || last.1.hide.is_some() || last.0 < 0 {
            return None;
        }

        let base = last.0;
        let mut list = Self::new(base);
        let valid = |schema: i64, list: &Self| {
            (0..base).contains(&schema) && list.locate(schema).is_none()
        };

        let mut anchor = list.head();
        let mut hidden = Vec::new();
        for (i, (schema, flags)) in std::iter::once(first).chain(middle).enumerate() {
            if i > 0 {
                if flags.head || flags.rest || !valid(*schema, &list) {
                    return None;
                }
                anchor = list.create(*schema);
                list.append(anchor);
            }
            if let Some(tokens) = &flags.hide {
                hidden.clear();
                flatten_hidden(tokens, &mut hidden)?;
                for &schema in &hidden {
                    if !valid(schema, &list) {
                        return None;
                    }
                    let id = list.create(schema);
                    list.push_hidden(anchor, id);
                }
            }
        }
        Some(list)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pristine_tokens() {
        let list = OrderingList::new(100);
        let value = serde_json::to_value(list.to_tokens()).unwrap();
        assert_eq!(value, json!([-1, {"head": true}, 100, {"rest": true}]));
    }

    #[test]
    fn test_round_trip_keeps_hidden_chains() {
        let mut list = OrderingList::new(0);
        list.expand(5);
        let second = list.next(list.next(list.head()).unwrap()).unwrap();
        list.hide_next(second, 2);
        list.hide_next(list.head(), 1);
        let before = list.describe();
        assert_eq!(before, "[-1 hide[0], 1 hide[2, 3], 4, 5+]");

        let tokens = list.to_tokens();
        let text = serde_json::to_string(&tokens).unwrap();
        let parsed: Vec<ListToken> = serde_json::from_str(&text).unwrap();
        let restored = OrderingList::from_tokens(&parsed).unwrap();
        assert_eq!(restored.describe(), before);
        assert_eq!(restored.to_tokens(), tokens);
    }

    #[test]
    fn test_nested_hide_is_flattened() {
        let tokens: Vec<ListToken> = serde_json::from_value(json!([
            -1, {"head": true},
            0, {"hide": [1, {"hide": [2]}, 3]},
            4, {"rest": true}
        ]))
        .unwrap();
        let list = OrderingList::from_tokens(&tokens).unwrap();
        assert_eq!(list.describe(), "[-1, 0 hide[1, 2, 3], 4+]");
    }

    #[test]
    fn test_malformed_tokens_are_rejected() {
        let cases = [
            json!([]),
            json!([-1, {"head": true}]),
            json!([0, {"head": true}, 4, {"rest": true}]),
            json!([-1, {"head": true}, 4]),
            json!([-1, {"head": true}, 2, 2, 4, {"rest": true}]),
            json!([-1, {"head": true}, 7, 4, {"rest": true}]),
            json!([-1, {"head": true}, {"hide": [1]}, 4, {"rest": true}]),
            json!([-1, {"head": true}, 1, {"hide": [1]}, 4, {"rest": true}]),
        ];
        for case in cases {
            let tokens: Vec<ListToken> = serde_json::from_value(case.clone()).unwrap();
            assert!(OrderingList::from_tokens(&tokens).is_none(), "{case}");
        }
    }
}
