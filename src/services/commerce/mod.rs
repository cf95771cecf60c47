/// Commerce services module - catalog and checkout
pub mod catalog;
pub mod checkout_service;

// Re-export services for convenience
pub use catalog::CatalogService;
pub use checkout_service::{CheckoutService, CheckoutSettings};
