pub mod cache;
pub mod pipeline;
pub mod state;
pub mod steps;

pub use cache::{CachedVenue, VenueCache};
pub use pipeline::{transition, Phase, PhaseOutcome, TripPipeline, MAX_RETRIES};
pub use state::RunState;
pub use steps::PipelineStep;
