pub mod admin_operations;
pub mod operation;

pub use admin_operations::AdminOperationsService;
pub use operation::AdminOperations;
