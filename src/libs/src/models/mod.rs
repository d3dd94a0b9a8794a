pub use batch::{default_batches, Batch, BatchRecord, HISTORY_LEN};
pub use position::{Envelope, Position, LOCATION_UPDATE_EVENT};
pub use ring::Ring;

pub mod batch;
pub mod position;
pub mod ring;
