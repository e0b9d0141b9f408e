pub mod basket;
pub mod depot;
pub mod oven;
