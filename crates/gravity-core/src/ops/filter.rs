// ── Operation list filter ──
//
// Operations arrive newest first. `first` selects the last element (the
// oldest match) and `last` the first element (the newest match). The
// naming follows the wire contract and stays as is.

use url::form_urlencoded;

use crate::error::{CoreError, Result};
use crate::model::{OperationType, SiteOperation};

const KEY_TYPE: &str = "type";
const KEY_ACTIVE: &str = "active";
const KEY_COMPLETE: &str = "complete";
const KEY_FINISHED: &str = "finished";
const KEY_FIRST: &str = "first";
const KEY_LAST: &str = "last";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationsFilter {
    /// Match any of these types. Empty matches all.
    pub types: Vec<OperationType>,
    /// Not finished.
    pub active: bool,
    /// Completed successfully.
    pub complete: bool,
    /// Completed or failed.
    pub finished: bool,
    /// Oldest match only.
    pub first: bool,
    /// Newest match only.
    pub last: bool,
}

impl OperationsFilter {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, op: &SiteOperation) -> bool {
        if !self.types.is_empty() && !self.types.contains(&op.operation_type()) {
            return false;
        }
        if self.active && op.is_finished() {
            return false;
        }
        if self.complete && !op.state.is_completed() {
            return false;
        }
        if self.finished && !op.is_finished() {
            return false;
        }
        true
    }

    /// Narrow a newest-first list. Never re-sorts.
    pub fn filter(&self, ops: Vec<SiteOperation>) -> Vec<SiteOperation> {
        let mut matched: Vec<SiteOperation> =
            ops.into_iter().filter(|op| self.matches(op)).collect();
        if self.first {
            return matched.pop().into_iter().collect();
        }
        if self.last {
            matched.truncate(1);
        }
        matched
    }

    /// Query string with presence-encoded flags, e.g.
    /// `last&complete&type=operation_install&type=operation_expand`.
    pub fn url_values(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        for (flag, key) in [
            (self.active, KEY_ACTIVE),
            (self.complete, KEY_COMPLETE),
            (self.finished, KEY_FINISHED),
            (self.first, KEY_FIRST),
            (self.last, KEY_LAST),
        ] {
            if flag {
                query.append_key_only(key);
            }
        }
        for op_type in &self.types {
            query.append_pair(KEY_TYPE, &op_type.to_string());
        }
        query.finish()
    }

    /// Inverse of [`OperationsFilter::url_values`]. A flag is set when its
    /// key is present, whatever the value.
    pub fn from_url_values(query: &str) -> Result<Self> {
        let mut filter = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                KEY_ACTIVE => filter.active = true,
                KEY_COMPLETE => filter.complete = true,
                KEY_FINISHED => filter.finished = true,
                KEY_FIRST => filter.first = true,
                KEY_LAST => filter.last = true,
                KEY_TYPE => {
                    let op_type = value.parse::<OperationType>().map_err(|_| {
                        CoreError::bad_parameter(format!("unknown operation type {value:?}"))
                    })?;
                    filter.types.push(op_type);
                }
                _ => {}
            }
        }
        Ok(filter)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{
        ExpandDetails, InstallDetails, OperationDetails, OperationState,
    };
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn op(id: &str, details: OperationDetails, state: OperationState) -> SiteOperation {
        SiteOperation {
            id: id.into(),
            account_id: "a1".into(),
            site_domain: "example.com".into(),
            state,
            details,
            provisioner: "onprem".into(),
            created: Utc::now(),
            created_by: String::new(),
            updated: Utc::now(),
            servers: Vec::new(),
        }
    }

    /// Newest first: expand (running), expand (failed), install (completed).
    fn ops() -> Vec<SiteOperation> {
        vec![
            op(
                "op3",
                OperationDetails::Expand(ExpandDetails::default()),
                OperationState::ExpandDeploying,
            ),
            op(
                "op2",
                OperationDetails::Expand(ExpandDetails::default()),
                OperationState::Failed,
            ),
            op(
                "op1",
                OperationDetails::Install(InstallDetails::default()),
                OperationState::Completed,
            ),
        ]
    }

    fn ids(ops: &[SiteOperation]) -> Vec<&str> {
        ops.iter().map(|o| o.id.as_str()).collect()
    }

    #[test]
    fn last_is_newest() {
        let filter = OperationsFilter {
            last: true,
            ..Default::default()
        };
        assert_eq!(ids(&filter.filter(ops())), vec!["op3"]);
    }

    #[test]
    fn first_is_oldest() {
        let filter = OperationsFilter {
            first: true,
            ..Default::default()
        };
        assert_eq!(ids(&filter.filter(ops())), vec!["op1"]);
    }

    #[test]
    fn state_flags() {
        let active = OperationsFilter {
            active: true,
            ..Default::default()
        };
        assert_eq!(ids(&active.filter(ops())), vec!["op3"]);

        let finished = OperationsFilter {
            finished: true,
            ..Default::default()
        };
        assert_eq!(ids(&finished.filter(ops())), vec!["op2", "op1"]);

        let complete = OperationsFilter {
            complete: true,
            ..Default::default()
        };
        assert_eq!(ids(&complete.filter(ops())), vec!["op1"]);
    }

    #[test]
    fn types_are_ored() {
        let filter = OperationsFilter {
            types: vec![OperationType::Install, OperationType::Shrink],
            ..Default::default()
        };
        assert_eq!(ids(&filter.filter(ops())), vec!["op1"]);

        let filter = OperationsFilter {
            types: vec![OperationType::Expand],
            finished: true,
            last: true,
            ..Default::default()
        };
        assert_eq!(ids(&filter.filter(ops())), vec!["op2"]);
    }

    #[test]
    fn empty_list_stays_empty() {
        let filter = OperationsFilter {
            first: true,
            ..Default::default()
        };
        assert!(filter.filter(Vec::new()).is_empty());
    }

    #[test]
    fn url_values_use_presence_encoding() {
        let filter = OperationsFilter {
            types: vec![OperationType::Install, OperationType::Expand],
            complete: true,
            last: true,
            ..Default::default()
        };
        assert_eq!(
            filter.url_values(),
            "complete&last&type=operation_install&type=operation_expand"
        );
    }

    #[test]
    fn url_values_round_trip() {
        let flags = [
            (false, false, false, false, false),
            (true, false, false, false, true),
            (false, true, true, true, false),
            (true, true, true, true, true),
        ];
        for (active, complete, finished, first, last) in flags {
            let filter = OperationsFilter {
                types: vec![OperationType::Update, OperationType::GarbageCollect],
                active,
                complete,
                finished,
                first,
                last,
            };
            let back = OperationsFilter::from_url_values(&filter.url_values()).unwrap();
            assert_eq!(back, filter);
        }
    }

    #[test]
    fn presence_ignores_value() {
        let filter = OperationsFilter::from_url_values("last=false&type=operation_gc").unwrap();
        assert!(filter.last);
        assert_eq!(filter.types, vec![OperationType::GarbageCollect]);
    }

    #[test]
    fn unknown_type_rejected() {
        let err = OperationsFilter::from_url_values("type=operation_bogus").unwrap_err();
        assert!(err.is_bad_parameter());
    }
}
