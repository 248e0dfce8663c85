/// Process definition registry
pub mod registry;

/// Process execution service
pub mod process_execution_service;
