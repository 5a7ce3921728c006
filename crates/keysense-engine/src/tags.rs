//! Tags: named aliases for groups of keys
//!
//! A tag such as `#shift` resolves to whichever of its members has been held
//! the longest. Tags cannot contain other tags, so resolution never recurses.

use indexmap::IndexMap;

use crate::keys::{is_tag, KeyName, TAG_PREFIX};
use crate::tracker::PressTracker;

/// Full tag name (`"digits"` -> `"#digits"`)
pub fn tag_name(id: &str) -> String {
    format!("{}{}", TAG_PREFIX, id)
}

/// Tag name -> ordered member key names
#[derive(Debug, Clone)]
pub struct TagTable {
    tags: IndexMap<String, Vec<KeyName>>,
}

impl Default for TagTable {
    fn default() -> Self {
        Self::with_builtin_tags()
    }
}

impl TagTable {
    /// A table with no tags at all.
    pub fn empty() -> Self {
        Self {
            tags: IndexMap::new(),
        }
    }

    /// The tags available at startup.
    pub fn with_builtin_tags() -> Self {
        let mut table = Self::empty();

        let digits: Vec<String> = (0..10).map(|d| d.to_string()).collect();
        table.insert("digits", digits);
        table.insert("shift", ["left shift", "right shift"]);
        table.insert("alt", ["left alt", "right alt"]);
        table.insert("control", ["left control", "right control"]);
        table.insert("windowsKey", ["left meta", "right meta"]);

        let function_keys: Vec<String> = (1..=12).map(|n| format!("F{}", n)).collect();
        table.insert("functionKeys", function_keys);

        table.insert(
            "navigationKeys",
            [
                "up arrow",
                "down arrow",
                "left arrow",
                "right arrow",
                "home",
                "end",
                "page up",
                "page down",
                "insert",
                "delete",
            ],
        );

        let mut numpad: Vec<String> = ["divide", "multiply", "subtract", "add"]
            .iter()
            .map(|op| format!("numpad: {}", op))
            .collect();
        numpad.extend((0..10).map(|d| format!("numpad: {}", d)));
        numpad.push("numpad: decimal".to_string());
        numpad.push("numpad: enter".to_string());
        table.insert("numpad", numpad);

        table
    }

    fn insert<I, S>(&mut self, id: &str, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags
            .insert(tag_name(id), members.into_iter().map(Into::into).collect());
    }

    /// Define or replace the tag `#id`.
    ///
    /// Members that are themselves tags are dropped. Returns false (and
    /// changes nothing) for an empty id.
    pub fn set<I, S>(&mut self, id: &str, members: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = id.strip_prefix(TAG_PREFIX).unwrap_or(id);
        if id.is_empty() {
            tracing::warn!("Ignoring tag with an empty name");
            return false;
        }

        let members: Vec<KeyName> = members
            .into_iter()
            .map(Into::into)
            .filter(|member: &String| {
                if is_tag(member) {
                    tracing::warn!("Tag #{} cannot contain tag {}, dropping it", id, member);
                    false
                } else {
                    true
                }
            })
            .collect();

        tracing::debug!("Tag #{} set to {:?}", id, members);
        self.insert(id, members);
        true
    }

    /// Members of `#id` (empty if the tag does not exist).
    pub fn members(&self, id: &str) -> &[KeyName] {
        let id = id.strip_prefix(TAG_PREFIX).unwrap_or(id);
        self.tags
            .get(&tag_name(id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All tag names, `#` included, in definition order.
    pub fn names(&self) -> Vec<&str> {
        self.tags.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    /// Resolve `tag` to its longest-held pressed member.
    ///
    /// Among the members currently down, the one with the earliest
    /// `started_at` wins; equal start times go to the one pressed first.
    pub fn resolve(&self, tag: &str, tracker: &PressTracker) -> Option<KeyName> {
        let members = self.tags.get(tag)?;

        tracker
            .records()
            .enumerate()
            .filter(|(_, (key, _))| members.contains(key))
            .min_by_key(|(order, (_, record))| (record.started_at, *order))
            .map(|(_, (key, _))| key.clone())
    }
}
