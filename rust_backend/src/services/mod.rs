//! Service layer: visibility filtering, exposure selection, group packing and
//! the run pipeline that ties them to the ephemeris provider and the program
//! repository.

pub mod ephemeris_track;
pub mod exposure;
pub mod planner;
pub mod scheduler;
pub mod visibility;


pub use ephemeris_track::{build_track, TrackError, TrackPoint};
pub use exposure::{ExposureSelection, InstrumentConfigurations};
pub use planner::{PersistenceFailure, ReconPlanner, RecordKind, RunReport};
pub use scheduler::{GroupFillPolicy, ObservingGroupScheduler, ScheduleOutcome, SchedulerConfig};
pub use visibility::{compute_visibility, darkness_interval, Rejection, Visibility, VisibilityError};
