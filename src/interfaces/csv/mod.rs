pub mod event_reader;
pub mod wallet_writer;
