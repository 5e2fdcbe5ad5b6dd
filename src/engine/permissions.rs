//! Health Connect permission model
//!
//! The four read grants the dashboard needs, and the set of grants the platform
//! reports at a given moment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Categories of health records read by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordType {
    Steps,
    HeartRate,
    ActiveCaloriesBurned,
    SleepSession,
}

impl RecordType {
    pub const ALL: [RecordType; 4] = [
        RecordType::Steps,
        RecordType::HeartRate,
        RecordType::ActiveCaloriesBurned,
        RecordType::SleepSession,
    ];

    /// Name used by the platform query API
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Steps => "Steps",
            RecordType::HeartRate => "HeartRate",
            RecordType::ActiveCaloriesBurned => "ActiveCaloriesBurned",
            RecordType::SleepSession => "SleepSession",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Read,
    Write,
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessType::Read => f.write_str("read"),
            AccessType::Write => f.write_str("write"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequirement {
    pub access_type: AccessType,
    pub record_type: RecordType,
}

impl PermissionRequirement {
    pub const fn new(record_type: RecordType, access_type: AccessType) -> Self {
        Self {
            access_type,
            record_type,
        }
    }

    pub const fn read(record_type: RecordType) -> Self {
        Self::new(record_type, AccessType::Read)
    }
}

impl fmt::Display for PermissionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.access_type, self.record_type)
    }
}

pub const REQUIRED_PERMISSIONS: [PermissionRequirement; 4] = [
    PermissionRequirement::read(RecordType::Steps),
    PermissionRequirement::read(RecordType::HeartRate),
    PermissionRequirement::read(RecordType::ActiveCaloriesBurned),
    PermissionRequirement::read(RecordType::SleepSession),
];

/// Grants reported by the platform; replaced wholesale, never merged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantedPermissionSet {
    grants: BTreeSet<PermissionRequirement>,
}

impl GrantedPermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, requirement: &PermissionRequirement) -> bool {
        self.grants.contains(requirement)
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionRequirement> {
        self.grants.iter()
    }

    /// Swap in a fresh platform answer
    pub fn replace(&mut self, other: GrantedPermissionSet) {
        *self = other;
    }

    pub fn clear(&mut self) {
        self.grants.clear();
    }

    /// Required grants not present, in `REQUIRED_PERMISSIONS` order
    pub fn missing(&self) -> Vec<PermissionRequirement> {
        REQUIRED_PERMISSIONS
            .iter()
            .filter(|req| !self.contains(req))
            .copied()
            .collect()
    }

    pub fn to_vec(&self) -> Vec<PermissionRequirement> {
        self.grants.iter().copied().collect()
    }
}

impl FromIterator<PermissionRequirement> for GrantedPermissionSet {
    fn from_iter<I: IntoIterator<Item = PermissionRequirement>>(iter: I) -> Self {
        Self {
            grants: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<PermissionRequirement>> for GrantedPermissionSet {
    fn from(list: Vec<PermissionRequirement>) -> Self {
        list.into_iter().collect()
    }
}

/// True iff every required read grant is held, matched on the exact pair
pub fn has_all_required(granted: &GrantedPermissionSet) -> bool {
    REQUIRED_PERMISSIONS.iter().all(|req| granted.contains(req))
}
