pub mod itinerary;
pub mod result;
pub mod theme;
pub mod validation;

pub use itinerary::{price_level_label, DayPlan, GeoPoint, Itinerary, MealCategory, Venue};
pub use result::PipelineRun;
pub use theme::{ThemeDescriptor, MAX_TRIP_DAYS};
pub use validation::ValidationResult;
