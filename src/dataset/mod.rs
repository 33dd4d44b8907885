pub mod layout;
pub mod transforms;
