//! Run-level vocabulary shared by the client, the scenarios and the config
//! layer: target classes, byte-order profiles, object paths and the closed
//! target descriptor family.
mod catalog;
mod run;

pub use catalog::{
    CipPath, CustomTarget, EdgeTarget, IoConfig, IoConnectionConfig, IoTransport, ReadTarget,
    ServiceCode, TargetConfig, TargetDescriptor, WritePattern, WriteTarget,
};
pub use run::{ByteOrder, ProtocolProfile, TargetType};
