//! Group membership records.
//!
//! Groups live under one top-level dict, keyed by the group's session
//! id. Each record stores its settings through the shared field
//! policies, so defaults are suppressed and two devices writing the
//! same group produce identical bytes. Members and admins are kept as
//! separate sets of raw ids, which merge by plain set union.

use std::collections::BTreeSet;

use crate::fields::FieldProxy;
use crate::identity::SessionId;
use crate::value::{Dict, DictExt, Scalar, Set, Value};

/// Maximum byte length of a group name; longer names are truncated.
pub const MAX_GROUP_NAME: usize = 100;

const GROUPS_KEY: &str = "groups";

/// Notification behavior for a group conversation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum NotifyMode {
    /// Follow the account-wide setting.
    #[default]
    Defaulted = 0,
    All = 1,
    Disabled = 2,
    MentionsOnly = 3,
}

impl NotifyMode {
    fn from_int(value: i64) -> Self {
        match value {
            1 => Self::All,
            2 => Self::Disabled,
            3 => Self::MentionsOnly,
            _ => Self::Defaulted,
        }
    }
}

/// One group conversation's synced settings and membership.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Group {
    pub name: String,
    /// Pinned ordering; 0 means unpinned.
    pub priority: i64,
    /// Unix seconds the account joined; 0 when unknown.
    pub joined_at: i64,
    pub notifications: NotifyMode,
    /// Unix seconds until which the group is muted; 0 means unmuted.
    pub mute_until: i64,
    pub members: BTreeSet<SessionId>,
    pub admins: BTreeSet<SessionId>,
}

impl<'a> FieldProxy<'a> {
    /// Store a group record under its session id. Every setting goes
    /// through the matching field policy, so a record that only holds
    /// defaults is erased rather than stored. Over-long names are
    /// truncated to [`MAX_GROUP_NAME`] bytes on a char boundary.
    pub fn set_group(&mut self, id: &SessionId, group: &Group) {
        let mut record = Dict::new();
        {
            let mut rec = FieldProxy::new(&mut record);
            rec.set_nonempty_text("n", truncated_name(&group.name));
            rec.set_nonzero_int("+", group.priority);
            rec.set_positive_int("j", group.joined_at);
            rec.set_positive_int("@", group.notifications as i64);
            rec.set_positive_int("!", group.mute_until);
        }
        if !group.members.is_empty() {
            record.insert("m".into(), Value::Set(id_set(&group.members)));
        }
        if !group.admins.is_empty() {
            record.insert("a".into(), Value::Set(id_set(&group.admins)));
        }

        if record.is_empty() {
            self.erase_group(id);
        } else {
            self.dict_mut(GROUPS_KEY).set(&id.to_hex(), Value::Dict(record));
        }
    }

    /// Read a group record. Absent or malformed records read as
    /// `None`; malformed members within a record are dropped.
    pub fn group(&self, id: &SessionId) -> Option<Group> {
        group_at(self.dict, id)
    }

    /// Remove a group record. Returns whether it was present.
    pub fn erase_group(&mut self, id: &SessionId) -> bool {
        let Some(Value::Dict(groups)) = self.dict.get_mut(GROUPS_KEY) else {
            return false;
        };
        let removed = groups.remove(&id.to_hex()).is_some();
        if groups.is_empty() {
            self.dict.remove(GROUPS_KEY);
        }
        removed
    }

    /// All stored groups, ordered by session id.
    pub fn groups(&self) -> Vec<(SessionId, Group)> {
        groups_in(self.dict)
    }
}

/// Read one group record straight from a configuration tree.
pub fn group_at(dict: &Dict, id: &SessionId) -> Option<Group> {
    let record = dict.dict_at(GROUPS_KEY)?.dict_at(&id.to_hex())?;
    Some(read_group(record))
}

/// All groups in a configuration tree, ordered by session id. Entries
/// that are not well-formed group records are skipped.
pub fn groups_in(dict: &Dict) -> Vec<(SessionId, Group)> {
    let Some(groups) = dict.dict_at(GROUPS_KEY) else {
        return Vec::new();
    };
    groups
        .iter()
        .filter_map(|(key, value)| {
            let id = SessionId::parse(key).ok()?;
            Some((id, read_group(value.as_dict()?)))
        })
        .collect()
}

fn truncated_name(name: &str) -> &str {
    if name.len() <= MAX_GROUP_NAME {
        return name;
    }
    let mut end = MAX_GROUP_NAME;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

fn id_set(ids: &BTreeSet<SessionId>) -> Set {
    ids.iter()
        .map(|id| Scalar::Bytes(id.as_bytes().to_vec()))
        .collect()
}

fn read_group(record: &Dict) -> Group {
    Group {
        name: record.text_at("n").unwrap_or_default().to_owned(),
        priority: record.int_at("+").unwrap_or(0),
        joined_at: record.int_at("j").unwrap_or(0).max(0),
        notifications: NotifyMode::from_int(record.int_at("@").unwrap_or(0)),
        mute_until: record.int_at("!").unwrap_or(0),
        members: read_ids(record, "m"),
        admins: read_ids(record, "a"),
    }
}

fn read_ids(record: &Dict, key: &str) -> BTreeSet<SessionId> {
    let Some(set) = record.set_at(key) else {
        return BTreeSet::new();
    };
    set.iter()
        .filter_map(|member| match member {
            Scalar::Bytes(b) => {
                let raw: [u8; 33] = b.as_slice().try_into().ok()?;
                SessionId::from_bytes(raw).ok()
            }
            _ => None,
        })
        .collect()
}
