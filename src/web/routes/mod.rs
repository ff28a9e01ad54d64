pub mod influenceur_routes;
pub mod vote_routes;
