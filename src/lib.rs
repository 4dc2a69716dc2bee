pub mod alignment;
pub mod anonymize;
pub mod cluster;
pub mod config;
pub mod detect;
pub mod errors;
pub mod offsets;
pub mod pipeline;
pub mod progress;
pub mod project;
pub mod render;
pub mod sentinels;

pub use alignment::{reverse_alignment, Alignment, BiAlignment};
pub use anonymize::{anonymize, Anonymized, MappingRecord};
pub use cluster::{condense, Cluster};
pub use detect::{tag_entities, EntityDetector, EntitySpan, GlossaryDetector, RegexDetector};
pub use offsets::{locate_spans, token_offsets};
pub use project::{project_clusters, NonalignedPolicy};
pub use render::{merge_continuous, projection_points, render_tags, ProjectionPoint};
pub use sentinels::TagPair;
