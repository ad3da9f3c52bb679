pub mod alert_dispatcher;
pub mod monitor;
pub mod sampler;
pub mod snapshot_store;
pub mod threshold;

pub use alert_dispatcher::{AlertDispatcher, DispatchReport, LogTransport, NotificationTransport};
pub use monitor::{MonitorHandle, MonitorScheduler, SchedulerState, TickReport};
pub use sampler::{build_sampler, HttpSampler, Sampler, SimulatedSampler};
pub use snapshot_store::{SnapshotStore, SNAPSHOT_VERSION};
pub use threshold::Evaluation;
