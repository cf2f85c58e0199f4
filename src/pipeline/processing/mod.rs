// Pipeline stages: validation, normalization, feature derivation, aggregation

pub mod aggregate;
pub mod cells;
pub mod enrich;
pub mod normalize;
pub mod validate;

pub use aggregate::{aggregate, AggregationOutcome, GroupKey};
pub use enrich::{EnrichOutcome, FeatureEngine};
pub use normalize::{NormalizeOutcome, Normalizer};
pub use validate::{ValidationOutcome, Validator};
