// Analyzer module: one engine per growth metric, plus the shared scoring and
// recommendation helpers they build on.

pub mod cohort;
pub mod competitive;
pub mod funnel;
pub mod recommendation;
pub mod scoring;
pub mod seo;

// Re-export the engines for ease of use.
pub use cohort::CohortEngine;
pub use competitive::CompetitiveEngine;
pub use funnel::FunnelEngine;
pub use seo::SeoAuditEngine;
