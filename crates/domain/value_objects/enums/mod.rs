pub mod gateway_statuses;
pub mod notification_kinds;
