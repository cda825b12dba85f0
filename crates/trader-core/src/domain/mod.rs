//! 실행 엔진 도메인 모델.

mod account;
mod alert;
mod calculations;
mod leg;
mod order;
mod port;
mod scrip;

pub use account::*;
pub use alert::*;
pub use calculations::*;
pub use leg::*;
pub use order::*;
pub use port::*;
pub use scrip::*;
