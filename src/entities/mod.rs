pub mod branch;
pub mod branch_price;
pub mod cart;
pub mod cart_item;
pub mod cart_offer;
pub mod catalog_item;
pub mod customer_balance;
pub mod offer;
pub mod offer_item;
pub mod order;
pub mod order_history;
pub mod order_item;
pub mod otp_code;
pub mod payment;
pub mod payment_transaction;
pub mod promo_code;

pub use branch::Entity as Branch;
pub use branch_price::Entity as BranchPrice;
pub use cart::Entity as Cart;
pub use cart_item::Entity as CartItem;
pub use cart_offer::Entity as CartOffer;
pub use catalog_item::Entity as CatalogItem;
pub use customer_balance::Entity as CustomerBalance;
pub use offer::Entity as Offer;
pub use offer_item::Entity as OfferItem;
pub use order::Entity as Order;
pub use order_history::Entity as OrderHistory;
pub use order_item::Entity as OrderItem;
pub use otp_code::Entity as OtpCode;
pub use payment::Entity as Payment;
pub use payment_transaction::Entity as PaymentTransaction;
pub use promo_code::Entity as PromoCode;

pub use cart::Model as CartModel;
pub use order::Model as OrderModel;
pub use payment::Model as PaymentModel;
