use std::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde::de::{self, Visitor, MapAccess};

// ---------- peripherals.yaml ----------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Peripherals {
    pub peripherals: Vec<Peripheral>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Peripheral {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Base address, written as a hex string (`"0x40011000"`).
    pub address: String,
    #[serde(default = "default_kind", skip_serializing_if = "is_other")]
    pub kind: PeripheralKind,
    /// Register block describing the peripheral's layout, e.g. `USART`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
    /// Clock domain feeding the peripheral, one of the `rcc::BusClock` variants in snake case.
    /// Absent for `system` peripherals, which have no clock gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<String>,
    /// Prefix of the `xxxEN` field, defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rcc_field: Option<String>,
    /// Prefix of the `xxxRST` field, defaults to `rcc_field`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rcc_reset_field: Option<String>,
    /// Alternate function number of the peripheral's pins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub af: Option<u8>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, PartialOrd, Ord, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PeripheralKind {
    Gpio,
    Usart,
    /// Always clocked, not in the `Peripheral` enum (RCC, FLASH, SysTick).
    System,
    Other,
}

fn default_kind() -> PeripheralKind {
    PeripheralKind::Other
}

fn is_other(kind: &PeripheralKind) -> bool {
    *kind == PeripheralKind::Other
}

impl Peripheral {
    pub fn address(&self) -> u32 {
        let digits = self.address.trim_start_matches("0x").replace('_', "");
        u32::from_str_radix(&digits, 16)
            .unwrap_or_else(|_| panic!("Invalid address {:?} for peripheral {}", self.address, self.name))
    }
}

// ---------- RCC.yaml ----------

// Some code in this file is copied from [chiptool](https://github.com/embassy-rs/chiptool/blob/main/src/ir.rs)
// and is used under the MIT License with some simplifications and modifications.
// Since [chiptool](https://github.com/embassy-rs/chiptool/) is not published on
// [crates.io](https://crates.io), we cannot directly depend on it.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct IR {
    pub blocks: BTreeMap<String, Block>,
    pub fieldsets: BTreeMap<String, FieldSet>,
}

impl IR {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub items: Vec<BlockItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array: Option<Array>,
    pub byte_offset: u32,
    #[serde(flatten)]
    pub inner: Register,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Array {
    pub len: u32,
    pub stride: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Register {
    #[serde(default = "default_readwrite", skip_serializing_if = "is_readwrite")]
    pub access: Access,
    #[serde(default = "default_32", skip_serializing_if = "is_32")]
    pub bit_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fieldset: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Access {
    ReadWrite,
    Read,
    Write,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_32", skip_serializing_if = "is_32")]
    pub bit_size: u32,
    pub fields: Vec<Field>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub bit_offset: u8,
    pub bit_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array: Option<Array>,
}

fn default_32() -> u32 {
    32
}

fn is_32(size: &u32) -> bool {
    *size == 32
}

fn default_readwrite() -> Access {
    Access::ReadWrite
}

fn is_readwrite(access: &Access) -> bool {
    *access == Access::ReadWrite
}

struct IRVisitor;

impl<'de> Visitor<'de> for IRVisitor {
    type Value = IR;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an IR")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let mut ir = IR::new();

        while let Some(key) = access.next_key()? {
            let key: String = key;
            let (kind, name) = key.split_once('/').ok_or(de::Error::custom("item names must be in form `kind/name`, where kind is `block` or `fieldset`"))?;
            match kind {
                "block" => {
                    let val: Block = access.next_value()?;
                    if ir.blocks.insert(name.to_string(), val).is_some() {
                        return Err(de::Error::custom(format!("Duplicate item {:?}", key)));
                    }
                }
                "fieldset" => {
                    let val: FieldSet = access.next_value()?;
                    if ir.fieldsets.insert(name.to_string(), val).is_some() {
                        return Err(de::Error::custom(format!("Duplicate item {:?}", key)));
                    }
                }
                _ => return Err(de::Error::custom(format!("Unknown kind {:?}", kind))),
            }
        }

        Ok(ir)
    }
}

impl<'de> Deserialize<'de> for IR {
    fn deserialize<D>(deserializer: D) -> Result<IR, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(IRVisitor)
    }
}
