pub mod client;
pub mod decoder;
pub mod feed;

pub use client::BinanceClient;
pub use decoder::MarkPriceEvent;
