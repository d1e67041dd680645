pub mod cart;
pub mod enrollments;
pub mod invoices;
pub mod payment_gateway;
pub mod sessions;
