pub mod payment_callback;
