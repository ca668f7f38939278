//! 编排流水线：意图识别、规划、过程事件、判定与回复组装

pub mod composer;
pub mod events;
pub mod intent;
pub mod planner;
pub mod verifier;

pub use composer::{compose_reply, to_plain_text, Reply};
pub use events::{EventSender, OrchestratorEvent};
pub use intent::{analyze, Intent, RequestAnalysis, TriggerSets};
pub use planner::{
    describe_action, GenerativePlanner, KeywordPlanner, PlanOutcome, PlanRequest, PlanStrategy,
    Planner,
};
pub use verifier::{GenerativeVerifier, HeuristicVerifier, Verifier, VerifyRequest, VerifyStrategy};
