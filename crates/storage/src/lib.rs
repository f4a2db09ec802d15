pub mod cache;
pub mod context;
pub mod experience;

pub use cache::{prompt_hash, CachedResponse, ResponseCache};
pub use context::{ContextGuard, ContextStore};
pub use experience::{ExperienceRecorder, RlExperience};
