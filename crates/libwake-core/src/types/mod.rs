pub mod change;
pub mod ids;
