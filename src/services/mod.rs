// Accounts and credentials
pub mod accounts;

// Orders and their payment lifecycle
pub mod orders;
pub mod payments;

// External payment provider
pub mod payment_provider;

// Catalog and checkout
pub mod commerce;
