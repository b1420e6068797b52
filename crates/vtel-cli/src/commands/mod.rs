//! Command implementations for vtel

pub mod chargers;
pub mod mobile;
pub mod state;
pub mod stream;
pub mod token;
pub mod vehicles;

pub use chargers::chargers;
pub use mobile::mobile;
pub use state::state;
pub use stream::stream;
pub use token::token;
pub use vehicles::vehicles;
