pub mod coupon;
pub mod coupon_product;
pub mod discount_item;
pub mod discount_program;
pub mod order;
pub mod order_item;
pub mod product;

pub use coupon::Entity as Coupon;
pub use coupon_product::Entity as CouponProduct;
pub use discount_item::Entity as DiscountItem;
pub use discount_program::Entity as DiscountProgram;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use product::Entity as Product;
