pub mod candle;

pub use candle::{Candle, CandleBuffer, CandleKey};
