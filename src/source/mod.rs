// Data acquisition: the capabilities each engine consumes and their implementations.

pub mod fetcher;
pub mod simulated;
pub mod site;
pub mod traits;

pub use fetcher::{FetchedPage, HttpFetcher};
pub use simulated::SimulatedSource;
pub use site::WebSiteSource;
pub use traits::{CohortSource, CompetitorSource, FunnelSource, MonthlySpend, SiteSource, StepCounts};
