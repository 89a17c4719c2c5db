pub mod cache;
pub mod http;
pub mod inbox;
pub mod live;

pub use cache::{Identified, OptimisticList};
pub use http::{ApiClient, ClientError};
pub use inbox::Inbox;
pub use live::LiveCache;
