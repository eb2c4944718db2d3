// Application layer - Use case interactors

pub mod container;
pub mod estimate_interactor;
pub mod generation_interactor;

// Re-export interactors
pub use estimate_interactor::EstimateInteractor;
pub use generation_interactor::{
    GenerationInteractor, GenerationOptions, GenerationOutcome, VariantPreview,
};
