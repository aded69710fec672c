//! Physical model implementations.
//!
//! Models are implemented as small, pure functions so that fitting/search code can
//! stay generic:
//!
//! - `distance`: distance modulus and iterative extinction correction
//! - `velocity`: classical / relativistic redshift conversion
//! - `model`: apparent-magnitude predictions per extinction model

pub mod distance;
pub mod model;
pub mod velocity;

pub use distance::*;
pub use model::*;
pub use velocity::*;
