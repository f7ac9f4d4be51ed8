// Pure pricing, shared by cart previews and checkout
pub mod pricing;

// Storefront
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod orders;

// Accounts and back office
pub mod users;
