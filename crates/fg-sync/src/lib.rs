pub mod feed;
pub mod poller;
pub mod supervisor;
pub mod worker;

pub use feed::{FeedError, FeedSource, RedisQClient};
pub use poller::{PollSummary, run_poller};
pub use supervisor::{LoopError, supervise};
pub use worker::{WorkerSummary, drain, process_one, run_worker};
