mod envelope;
mod events;
mod identity;

// Re-export all types
pub use envelope::*;
pub use events::*;
pub use identity::*;
