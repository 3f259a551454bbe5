use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::metrics::ExpectedOutcome;

/// CIP service code, rendered as `0x0E` in metrics and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceCode(pub u8);

impl ServiceCode {
    pub const GET_ATTRIBUTES_ALL: Self = Self(0x01);
    pub const GET_ATTRIBUTE_LIST: Self = Self(0x03);
    pub const MULTIPLE_SERVICE_PACKET: Self = Self(0x0A);
    pub const GET_ATTRIBUTE_SINGLE: Self = Self(0x0E);
    pub const SET_ATTRIBUTE_SINGLE: Self = Self(0x10);
    pub const FORWARD_CLOSE: Self = Self(0x4E);
    pub const UNCONNECTED_SEND: Self = Self(0x52);
    pub const FORWARD_OPEN: Self = Self(0x54);
    pub const LARGE_FORWARD_OPEN: Self = Self(0x5B);

    #[must_use]
    pub fn label(self) -> String {
        format!("0x{:02X}", self.0)
    }
}

impl fmt::Display for ServiceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Logical object address: class / instance / optional attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CipPath {
    pub class: u16,
    pub instance: u16,
    pub attribute: Option<u16>,
}

impl CipPath {
    #[must_use]
    pub const fn new(class: u16, instance: u16, attribute: Option<u16>) -> Self {
        Self {
            class,
            instance,
            attribute,
        }
    }

    #[must_use]
    pub const fn attribute(class: u16, instance: u16, attribute: u16) -> Self {
        Self::new(class, instance, Some(attribute))
    }

    #[must_use]
    pub const fn object(class: u16, instance: u16) -> Self {
        Self::new(class, instance, None)
    }

    pub const IDENTITY: Self = Self::object(0x01, 1);
    pub const MESSAGE_ROUTER: Self = Self::object(0x02, 1);
    pub const CONNECTION_MANAGER: Self = Self::object(0x06, 1);

    #[must_use]
    pub const fn with_attribute(self, attribute: u16) -> Self {
        Self::new(self.class, self.instance, Some(attribute))
    }

    #[must_use]
    pub const fn with_instance(self, instance: u16) -> Self {
        Self::new(self.class, instance, self.attribute)
    }
}

impl fmt::Display for CipPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.attribute {
            Some(attribute) => write!(
                f,
                "0x{:02X}/{}/{}",
                self.class, self.instance, attribute
            ),
            None => write!(f, "0x{:02X}/{}", self.class, self.instance),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WritePattern {
    /// Counter advanced by one on every write, wrapping at the target width.
    Increment,
    /// Alternates between zero and one.
    Toggle,
    /// Always writes the configured bytes.
    Constant(Vec<u8>),
}

impl WritePattern {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            WritePattern::Increment => "increment",
            WritePattern::Toggle => "toggle",
            WritePattern::Constant(_) => "constant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadTarget {
    pub name: String,
    pub service: ServiceCode,
    pub path: CipPath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteTarget {
    pub name: String,
    pub service: ServiceCode,
    pub path: CipPath,
    pub pattern: WritePattern,
    /// Encoded value width in bytes.
    pub width: usize,
    pub initial: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomTarget {
    pub name: String,
    pub service: ServiceCode,
    pub path: CipPath,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeTarget {
    pub name: String,
    pub service: ServiceCode,
    pub path: CipPath,
    pub payload: Vec<u8>,
    pub expected_outcome: ExpectedOutcome,
    pub tags: Vec<String>,
    pub note: Option<String>,
}

impl EdgeTarget {
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|value| value.eq_ignore_ascii_case(tag))
    }
}

/// Closed family of target descriptors. Every variant is fully validated
/// when the configuration is loaded, so scenarios never re-check fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetDescriptor {
    Read(ReadTarget),
    Write(WriteTarget),
    Custom(CustomTarget),
    Edge(EdgeTarget),
}

impl TargetDescriptor {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            TargetDescriptor::Read(target) => &target.name,
            TargetDescriptor::Write(target) => &target.name,
            TargetDescriptor::Custom(target) => &target.name,
            TargetDescriptor::Edge(target) => &target.name,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoTransport {
    /// Cyclic class-1 implicit messaging.
    #[default]
    Class1,
    /// Class-3 connected explicit messaging.
    Class3,
}

impl IoTransport {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            IoTransport::Class1 => "class1",
            IoTransport::Class3 => "class3",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoConnectionConfig {
    pub name: String,
    pub rpi: Duration,
    pub o_to_t_size: usize,
    pub t_to_o_size: usize,
    pub transport: IoTransport,
    pub connection_point: CipPath,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoConfig {
    pub connections: Vec<IoConnectionConfig>,
}

/// Everything the catalog supplies to a scenario run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetConfig {
    pub targets: Vec<TargetDescriptor>,
    pub io: Option<IoConfig>,
}

impl TargetConfig {
    pub fn reads(&self) -> impl Iterator<Item = &ReadTarget> {
        self.targets.iter().filter_map(|target| match target {
            TargetDescriptor::Read(read) => Some(read),
            TargetDescriptor::Write(_) | TargetDescriptor::Custom(_) | TargetDescriptor::Edge(_) => {
                None
            }
        })
    }

    pub fn writes(&self) -> impl Iterator<Item = &WriteTarget> {
        self.targets.iter().filter_map(|target| match target {
            TargetDescriptor::Write(write) => Some(write),
            TargetDescriptor::Read(_) | TargetDescriptor::Custom(_) | TargetDescriptor::Edge(_) => {
                None
            }
        })
    }

    pub fn customs(&self) -> impl Iterator<Item = &CustomTarget> {
        self.targets.iter().filter_map(|target| match target {
            TargetDescriptor::Custom(custom) => Some(custom),
            TargetDescriptor::Read(_) | TargetDescriptor::Write(_) | TargetDescriptor::Edge(_) => {
                None
            }
        })
    }

    pub fn edges(&self) -> impl Iterator<Item = &EdgeTarget> {
        self.targets.iter().filter_map(|target| match target {
            TargetDescriptor::Edge(edge) => Some(edge),
            TargetDescriptor::Read(_) | TargetDescriptor::Write(_) | TargetDescriptor::Custom(_) => {
                None
            }
        })
    }

    #[must_use]
    pub fn edges_tagged(&self, tag: &str) -> Vec<&EdgeTarget> {
        self.edges().filter(|edge| edge.has_tag(tag)).collect()
    }

    /// Read targets, falling back to the identity object's vendor attribute
    /// when the catalog lists none.
    #[must_use]
    pub fn reads_or_identity(&self) -> Vec<ReadTarget> {
        let reads: Vec<ReadTarget> = self.reads().cloned().collect();
        if reads.is_empty() {
            vec![ReadTarget {
                name: "identity_vendor_id".to_owned(),
                service: ServiceCode::GET_ATTRIBUTE_SINGLE,
                path: CipPath::IDENTITY.with_attribute(1),
            }]
        } else {
            reads
        }
    }
}
