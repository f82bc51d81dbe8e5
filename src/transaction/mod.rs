//! Wire format, batching and delivery of command transactions.

mod client;
mod connection;
mod data;
mod marshal;
mod parcel;
mod proxy;

pub use client::{RenderClient, RenderServiceClient, RenderThreadClient, TransactionSink};
pub use connection::RenderServiceConnection;
pub use data::{FollowType, Origin, PayloadEntry, TransactionData};
pub use marshal::Marshal;
pub use parcel::{MarshalError, Parcel};
pub use proxy::TransactionProxy;
