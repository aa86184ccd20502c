pub mod anatomy;
pub mod geometry;
pub mod identity;
pub mod kinematics;
pub mod one_euro;
pub mod quality;

pub use anatomy::{AnatomyValidator, Rejection};
pub use geometry::{GeometryFilter, IdentityFilters};
pub use identity::{IdentityTracker, Track, TrackHandle, TrackId};
pub use kinematics::{reference_height, KinematicSolver};
pub use one_euro::{AdaptiveFilter, AdaptiveFilter2D, FilterParams};
pub use quality::{QualityGrade, QualityReport, QualityScorer};
