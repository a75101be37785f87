pub mod clients;
pub mod serve;
pub mod sign;
