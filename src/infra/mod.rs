//! Adapter backends. Currently only the in-process stub used for
//! development and testing; real device adapters are supplied by the
//! embedder through [`crate::core::AdapterFactory`].

pub mod stub;

pub use stub::{StubBehavior, StubCamera, StubCameraFactory};
