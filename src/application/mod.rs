pub mod market_session;
pub mod use_cases;

pub use market_session::*;
pub use use_cases::*;
