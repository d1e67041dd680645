pub mod enrollments;
pub mod invoices;
pub mod users;
pub mod verifications;
