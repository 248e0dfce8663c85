/// Activity definitions and their kinds
pub mod activity;

/// Process definition graph
pub mod process_graph;

/// Process instance domain models
pub mod process_instance;

/// Path resolution
pub mod path;

/// Transition rules between activities
pub mod transition;

/// Instance snapshot encoding
pub mod snapshot;

/// Repository interfaces
pub mod repository;

/// Interfaces to surrounding components
pub mod collaborators;
