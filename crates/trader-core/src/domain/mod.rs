//! 시세 수집을 위한 도메인 모델.

mod instrument;
mod price;
mod store;

pub use instrument::*;
pub use price::*;
pub use store::*;
