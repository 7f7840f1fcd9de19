pub mod health;
pub mod identify;
