pub mod client;
pub mod error;
pub mod result;
pub mod retry;

pub use client::{CatalogClient, TunebookSource};
pub use error::{FailureKind, FetchError};
pub use result::{Member, TuneEntry, Tunebook, TunebookPage};
pub use retry::RetryPolicy;
