//! Data carried between pipeline stages and handed to report writers.

pub mod analysis;
pub mod banner;
pub mod fact;
pub mod vendor;

pub use analysis::{
    Classification, ClassificationResult, DeviceAnalysisResult, DeviceKind, ScoredKind,
    ServiceEntry,
};
pub use banner::{HttpInfo, ServiceBanner, TlsInfo};
pub use fact::{AliveSource, DeviceFact, HostAddress, IcmpObservation, PortProbeResult};
pub use vendor::{MacPrefix, VendorRecord, VendorSource};
