pub mod conversion_coordinator;
pub mod conversion_workflow;

pub use conversion_coordinator::{ConversionCoordinator, ConversionEvent, DownloadEvent};
pub use conversion_workflow::{ConversionWorkflow, DownloadTicket, StatusTone};
