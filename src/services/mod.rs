pub mod cart;
pub mod checkout;
pub mod orders;
pub mod otp;
pub mod payments;
pub mod pricing;
pub mod promos;

pub use cart::{AddCartItemsInput, CartItemInput, CartService, CartWithItems};
pub use checkout::CheckoutService;
pub use orders::{OrderAction, OrderLifecycleService, OrderWithItems};
pub use otp::OtpService;
pub use payments::{PaymentOptionInput, PaymentService, PaymentWithTransactions};
pub use pricing::{compute_totals, CartTotals, OfferRule, PricedLine};
pub use promos::PromoService;
