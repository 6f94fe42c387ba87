pub mod state;

pub use state::{
    ClaimedKillmail, CorruptPayload, HashState, ProcessingState, Stage, Transition,
    plan_extraction, plan_transition, plan_valuation,
};
