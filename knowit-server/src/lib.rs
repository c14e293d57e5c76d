pub mod http;
pub mod router;
pub mod state;
pub mod subsystems;

pub use state::AppState;
