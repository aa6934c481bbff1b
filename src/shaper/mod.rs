//! Credit-based pacing of the bulk test flow, and its receiving side.
mod constants;
pub mod bulk_receiver;
pub mod bulk_shaper;
pub mod credit_bucket;
pub mod session_gate;

pub use bulk_receiver::BulkReceiver;
pub use bulk_shaper::{BulkTrafficShaper, ShaperWorker, TickReport, TickStop};
pub use credit_bucket::CreditBucket;
pub use session_gate::SessionGate;
