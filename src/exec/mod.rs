pub mod dispatcher;
pub mod judge;
pub mod languages;
