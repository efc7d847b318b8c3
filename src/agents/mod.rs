pub mod analyzer;
pub mod assembler;
pub mod search;
pub mod validator;

pub use analyzer::{fallback_descriptor, ThemeAnalyzer};
pub use assembler::{assemble, day_title};
pub use search::{cuisine_for_theme, SearchLayer, SearchResults, DEFAULT_MIN_PLACES_PER_DAY};
pub use validator::{structural_checks, ItineraryValidator, StructuralReport};
