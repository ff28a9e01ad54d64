//! SeaORM entities for the voting tables.

pub mod influenceur;
pub mod vote;

pub mod prelude {
    pub use super::influenceur::Entity as Influenceur;
    pub use super::vote::Entity as Vote;
}
