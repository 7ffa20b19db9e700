//! Registry value types shared by the binary policy and INF decoders

use serde::{Deserialize, Serialize};
use std::fmt;

/// The 12 registry value types, indexed by their on-disk code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistryType {
    #[serde(rename = "REG_NONE")]
    None,
    #[serde(rename = "REG_SZ")]
    Sz,
    #[serde(rename = "REG_EXPAND_SZ")]
    ExpandSz,
    #[serde(rename = "REG_BINARY")]
    Binary,
    #[serde(rename = "REG_DWORD")]
    Dword,
    #[serde(rename = "REG_DWORD_BIG_ENDIAN")]
    DwordBigEndian,
    #[serde(rename = "REG_LINK")]
    Link,
    #[serde(rename = "REG_MULTI_SZ")]
    MultiSz,
    #[serde(rename = "REG_RESOURCE_LIST")]
    ResourceList,
    #[serde(rename = "REG_FULL_RESOURCE_DESCRIPTOR")]
    FullResourceDescriptor,
    #[serde(rename = "REG_RESOURCE_REQUIREMENTS_LIST")]
    ResourceRequirementsList,
    #[serde(rename = "REG_QWORD")]
    Qword,
}

const TABLE: [RegistryType; 12] = [
    RegistryType::None,
    RegistryType::Sz,
    RegistryType::ExpandSz,
    RegistryType::Binary,
    RegistryType::Dword,
    RegistryType::DwordBigEndian,
    RegistryType::Link,
    RegistryType::MultiSz,
    RegistryType::ResourceList,
    RegistryType::FullResourceDescriptor,
    RegistryType::ResourceRequirementsList,
    RegistryType::Qword,
];

impl RegistryType {
    pub fn from_code(code: u32) -> Option<Self> {
        TABLE.get(code as usize).copied()
    }

    /// Parse the decimal code used by INF `Registry Values` rows
    pub fn from_code_str(code: &str) -> Option<Self> {
        code.trim().parse::<u32>().ok().and_then(Self::from_code)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        TABLE
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(name.trim()))
    }

    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryType::None => "REG_NONE",
            RegistryType::Sz => "REG_SZ",
            RegistryType::ExpandSz => "REG_EXPAND_SZ",
            RegistryType::Binary => "REG_BINARY",
            RegistryType::Dword => "REG_DWORD",
            RegistryType::DwordBigEndian => "REG_DWORD_BIG_ENDIAN",
            RegistryType::Link => "REG_LINK",
            RegistryType::MultiSz => "REG_MULTI_SZ",
            RegistryType::ResourceList => "REG_RESOURCE_LIST",
            RegistryType::FullResourceDescriptor => "REG_FULL_RESOURCE_DESCRIPTOR",
            RegistryType::ResourceRequirementsList => "REG_RESOURCE_REQUIREMENTS_LIST",
            RegistryType::Qword => "REG_QWORD",
        }
    }

    /// Value is rendered as a decimal number
    pub fn is_numeric(&self) -> bool {
        matches!(self, RegistryType::Dword | RegistryType::Qword)
    }

    pub fn is_string(&self) -> bool {
        matches!(
            self,
            RegistryType::Sz | RegistryType::ExpandSz | RegistryType::MultiSz
        )
    }
}

impl fmt::Display for RegistryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
