//! Driving adapters: the CSV replay tool and the HTTP surface.

pub mod csv;
pub mod http;
pub mod replay;
