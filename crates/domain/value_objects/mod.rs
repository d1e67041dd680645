pub mod callback_outcomes;
pub mod enums;
pub mod payment_metadata;
pub mod payment_references;
