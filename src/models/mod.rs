pub mod enums;
pub mod operator;
pub mod patient;
pub mod prediction;
pub mod diagnostic_test;

pub use operator::*;
pub use patient::*;
pub use prediction::*;
pub use diagnostic_test::*;
