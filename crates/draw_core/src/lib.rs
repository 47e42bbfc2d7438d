//! Lotto ingest: draw model + normalizer
//!
//! Everything downstream of the adapters works on `DrawRecord`. Adapters hand
//! over loosely typed `CandidateRow`s, the normalizer turns them into canonical
//! records or a `RowRejection`.

pub mod model;
pub mod normalize;
pub mod profile;

pub use model::{CandidateRow, DrawRecord, Modifier, NaturalKey};
pub use normalize::{canonical_date, normalize, Normalizer, RowRejection};
pub use profile::{BonusSpec, GameProfile, HeaderAliases};
