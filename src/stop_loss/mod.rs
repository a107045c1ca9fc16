// Directional trailing stop-loss engine
pub mod evaluator;
pub mod trailing;

pub use evaluator::{candidate_stop_loss, compute_next_stop_loss};
pub use trailing::TrailingStop;
