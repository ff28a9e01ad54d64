pub mod auth_service;
pub mod otp_service;
pub mod phone;
