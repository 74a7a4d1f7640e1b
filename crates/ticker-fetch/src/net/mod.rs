pub mod concurrency;
pub mod retry;
pub mod sleeper;
pub mod transport;

pub use concurrency::{ConcurrencyGate, GatePermit};
pub use retry::{RetryClass, RetryPolicy, RetryRunner};
pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};
pub use transport::{ReqwestTransport, Transport, TransportConfig};
