pub mod date_range;
pub mod logging;
pub mod response;
