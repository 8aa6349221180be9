//! Wire types shared by the size admin client and the dashboard bindings.

pub mod size;
pub mod size_quantity;
