// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Metasync: the locally declared records that are
// mirrored on the validation server.

use serde::{Deserialize, Serialize};

use crate::id::EntityId;

pub use crate::error::ErrorClass;

/// Kind of execution environment (also used for the module type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvKind {
    #[default]
    Software,
    Hardware,
    Firmware,
}

impl EnvKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Software => "Software",
            Self::Hardware => "Hardware",
            Self::Firmware => "Firmware",
        }
    }
}

/// CPU features a module relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessorFeatures(pub u64);

impl ProcessorFeatures {
    pub const X86_RDRAND: u64 = 1 << 0;
    pub const X86_AESNI: u64 = 1 << 1;
    pub const X86_CLMULNI: u64 = 1 << 2;
    pub const S390_CPACF: u64 = 1 << 3;
    pub const ARM_AES: u64 = 1 << 4;

    const NAMES: [(u64, &'static str); 5] = [
        (Self::X86_RDRAND, "rdrand"),
        (Self::X86_AESNI, "aes-ni"),
        (Self::X86_CLMULNI, "clmulni"),
        (Self::S390_CPACF, "cpacf"),
        (Self::ARM_AES, "aes"),
    ];

    pub fn contains(&self, feature: u64) -> bool {
        self.0 & feature != 0
    }

    /// Names of the features that are set, in declaration order.
    pub fn names(&self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect()
    }

    /// Parse a list of feature names. Unknown names are ignored.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let bits = names.into_iter().fold(0, |acc, name| {
            Self::NAMES
                .iter()
                .find(|(_, n)| n.eq_ignore_ascii_case(name))
                .map_or(acc, |(bit, _)| acc | bit)
        });
        Self(bits)
    }
}

/// Which cached identifier of a record is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdField {
    Oe,
    SoftwareDependency,
    ProcessorDependency,
    Vendor,
    Person,
    Address,
    Module,
}

impl IdField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oe => "oe",
            Self::SoftwareDependency => "sw_dependency",
            Self::ProcessorDependency => "proc_dependency",
            Self::Vendor => "vendor",
            Self::Person => "person",
            Self::Address => "address",
            Self::Module => "module",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            Self::Oe,
            Self::SoftwareDependency,
            Self::ProcessorDependency,
            Self::Vendor,
            Self::Person,
            Self::Address,
            Self::Module,
        ]
        .into_iter()
        .find(|f| f.as_str() == s)
    }
}

impl std::fmt::Display for IdField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable key under which a record's identifiers are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey(pub String);

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A record carrying server identifiers that must be persisted across runs.
pub trait IdRecord {
    fn record_key(&self) -> RecordKey;

    /// All identifier slots of this record with their current values.
    fn id_fields(&self) -> Vec<(IdField, EntityId)>;

    /// Overwrite one slot. Slots the record does not have are ignored.
    fn set_id(&mut self, field: IdField, id: EntityId);

    fn id(&self, field: IdField) -> EntityId {
        self.id_fields()
            .into_iter()
            .find(|(f, _)| *f == field)
            .map_or(EntityId::Unset, |(_, id)| id)
    }
}

/// Operational environment: execution environment plus processor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OeRecord {
    pub env_kind: EnvKind,
    /// Operating system or SoC name. Absent for bare-metal environments.
    pub env_name: Option<String>,
    pub cpe: Option<String>,
    pub swid: Option<String>,
    pub description: Option<String>,

    pub manufacturer: Option<String>,
    pub proc_family: Option<String>,
    /// Family used for internal definition lookups, never sent.
    pub proc_family_internal: Option<String>,
    pub proc_name: Option<String>,
    pub proc_series: Option<String>,
    pub features: ProcessorFeatures,

    /// File the record was loaded from; also the persistence key.
    pub source: String,

    pub oe_id: EntityId,
    pub sw_id: EntityId,
    pub proc_id: EntityId,
}

impl OeRecord {
    /// Any processor field is declared.
    pub fn has_processor(&self) -> bool {
        self.manufacturer.is_some()
            || self.proc_family.is_some()
            || self.proc_name.is_some()
            || self.proc_series.is_some()
    }
}

impl IdRecord for OeRecord {
    fn record_key(&self) -> RecordKey {
        RecordKey(format!("oe:{}", self.source))
    }

    fn id_fields(&self) -> Vec<(IdField, EntityId)> {
        vec![
            (IdField::ProcessorDependency, self.proc_id),
            (IdField::SoftwareDependency, self.sw_id),
            (IdField::Oe, self.oe_id),
        ]
    }

    fn set_id(&mut self, field: IdField, id: EntityId) {
        match field {
            IdField::Oe => self.oe_id = id,
            IdField::SoftwareDependency => self.sw_id = id,
            IdField::ProcessorDependency => self.proc_id = id,
            _ => {}
        }
    }
}

/// Vendor with its contact person and postal address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorRecord {
    pub name: String,
    pub url: Option<String>,

    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,

    pub street: Option<String>,
    pub locality: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub zipcode: Option<String>,

    pub source: String,

    pub vendor_id: EntityId,
    pub person_id: EntityId,
    pub address_id: EntityId,
}

impl IdRecord for VendorRecord {
    fn record_key(&self) -> RecordKey {
        RecordKey(format!("vendor:{}", self.source))
    }

    fn id_fields(&self) -> Vec<(IdField, EntityId)> {
        vec![
            (IdField::Vendor, self.vendor_id),
            (IdField::Person, self.person_id),
            (IdField::Address, self.address_id),
        ]
    }

    fn set_id(&mut self, field: IdField, id: EntityId) {
        match field {
            IdField::Vendor => self.vendor_id = id,
            IdField::Person => self.person_id = id,
            IdField::Address => self.address_id = id,
            _ => {}
        }
    }
}

/// The cryptographic module under test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleRecord {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub module_type: EnvKind,

    pub source: String,

    pub module_id: EntityId,
}

impl IdRecord for ModuleRecord {
    fn record_key(&self) -> RecordKey {
        RecordKey(format!("module:{}", self.source))
    }

    fn id_fields(&self) -> Vec<(IdField, EntityId)> {
        vec![(IdField::Module, self.module_id)]
    }

    fn set_id(&mut self, field: IdField, id: EntityId) {
        if field == IdField::Module {
            self.module_id = id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_names_follow_bits() {
        let f = ProcessorFeatures(ProcessorFeatures::X86_AESNI | ProcessorFeatures::X86_RDRAND);
        assert_eq!(f.names(), vec!["rdrand", "aes-ni"]);
        assert_eq!(ProcessorFeatures::from_names(["aes-ni", "rdrand", "avx"]), f);
    }

    #[test]
    fn oe_ids_are_addressable_by_field() {
        let mut oe = OeRecord {
            source: "linux.json".into(),
            ..Default::default()
        };
        oe.set_id(IdField::ProcessorDependency, EntityId::Final(3));
        oe.set_id(IdField::Vendor, EntityId::Final(9));
        assert_eq!(oe.id(IdField::ProcessorDependency), EntityId::Final(3));
        assert_eq!(oe.id(IdField::Oe), EntityId::Unset);
        assert_eq!(oe.record_key(), RecordKey("oe:linux.json".into()));
    }

    #[test]
    fn oe_deserializes_with_defaults() {
        let oe: OeRecord = serde_json::from_str(
            r#"{"env_kind":"software","env_name":"Linux 5.4","manufacturer":"Intel","proc_id":42}"#,
        )
        .expect("parse oe");
        assert_eq!(oe.env_name.as_deref(), Some("Linux 5.4"));
        assert_eq!(oe.proc_id, EntityId::Final(42));
        assert!(oe.has_processor());
        assert!(oe.sw_id.is_unset());
    }

    #[test]
    fn id_field_names_parse_back() {
        for field in [IdField::Oe, IdField::SoftwareDependency, IdField::Address] {
            assert_eq!(IdField::parse(field.as_str()), Some(field));
        }
        assert_eq!(IdField::parse("nope"), None);
    }
}
