pub mod map;
pub mod pool;
pub mod vec;
