use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Class of device a run is pointed at; stamped on every metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    EmulatedAdapter,
    EmulatedPlc,
    Physical,
    Replay,
}

impl TargetType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TargetType::EmulatedAdapter => "emulated_adapter",
            TargetType::EmulatedPlc => "emulated_plc",
            TargetType::Physical => "physical",
            TargetType::Replay => "replay",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "emulated_adapter" | "adapter" | "emulator" => Ok(TargetType::EmulatedAdapter),
            "emulated_plc" | "plc" => Ok(TargetType::EmulatedPlc),
            "physical" | "device" => Ok(TargetType::Physical),
            "replay" | "pcap" => Ok(TargetType::Replay),
            other => Err(ValidationError::InvalidTargetType {
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// Vendor protocol profile. Carried explicitly in the scenario parameters so
/// concurrent runs against different vendors never share encoding state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolProfile {
    #[default]
    Standard,
    BigEndianVendor,
}

impl ProtocolProfile {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ProtocolProfile::Standard => "standard",
            ProtocolProfile::BigEndianVendor => "big_endian_vendor",
        }
    }

    #[must_use]
    pub const fn byte_order(self) -> ByteOrder {
        match self {
            ProtocolProfile::Standard => ByteOrder::Little,
            ProtocolProfile::BigEndianVendor => ByteOrder::Big,
        }
    }

    /// Encodes `value` into exactly `width` bytes using the profile's byte
    /// order. Bits beyond `width` are truncated; widths above eight bytes are
    /// zero-padded on the most significant side.
    #[must_use]
    pub fn encode_value(self, value: u64, width: usize) -> Vec<u8> {
        let little = value.to_le_bytes();
        let mut bytes: Vec<u8> = (0..width)
            .map(|idx| little.get(idx).copied().unwrap_or(0))
            .collect();
        if self.byte_order() == ByteOrder::Big {
            bytes.reverse();
        }
        bytes
    }
}

impl FromStr for ProtocolProfile {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" | "little" | "le" => Ok(ProtocolProfile::Standard),
            "big_endian_vendor" | "big" | "be" => Ok(ProtocolProfile::BigEndianVendor),
            other => Err(ValidationError::InvalidProfile {
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};

    #[test]
    fn profile_encodes_in_its_byte_order() -> AppResult<()> {
        let little = ProtocolProfile::Standard.encode_value(0x0102, 4);
        let big = ProtocolProfile::BigEndianVendor.encode_value(0x0102, 4);
        if little != vec![0x02, 0x01, 0x00, 0x00] {
            return Err(AppError::validation(format!("little: {:?}", little)));
        }
        if big != vec![0x00, 0x00, 0x01, 0x02] {
            return Err(AppError::validation(format!("big: {:?}", big)));
        }
        Ok(())
    }

    #[test]
    fn target_type_accepts_aliases() -> AppResult<()> {
        let parsed: TargetType = "PLC".parse()?;
        if parsed != TargetType::EmulatedPlc {
            return Err(AppError::validation("Expected emulated_plc"));
        }
        if "toaster".parse::<TargetType>().is_ok() {
            return Err(AppError::validation("Expected unknown target type to fail"));
        }
        Ok(())
    }
}
