pub mod cart;
pub mod cart_item;
pub mod coupon;
pub mod movie;
pub mod order;
pub mod user;

pub use cart::{Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use coupon::{Entity as Coupon, Model as CouponModel};
pub use movie::{Entity as Movie, Model as MovieModel};
pub use order::{
    CouponSnapshot, Entity as Order, LineSnapshot, Model as OrderModel, MovieSnapshot, OrderStatus,
};
pub use user::{Entity as User, Model as UserModel, UserRole};
