//! Routing engine of the innkeep booking assistant.
//!
//! A chat turn flows through a fixed, first-match-wins ladder:
//! 1. **Active flow** (`flow`) — a session with a reservation draft in
//!    progress keeps advancing it deterministically.
//! 2. **Static FAQ** (`faq`) — facts that must never be paraphrased.
//! 3. **Rules** (`intent`, `parsing`) — reservation intents the pattern
//!    extractors can resolve without a model call.
//! 4. **LLM tool cycle** (`llm`, `policy`) — the oracle reads what the
//!    rules could not, under the mandatory-tool-use policy: it may
//!    never assert availability without `check_availability`.
//! 5. **Knowledge fallback** (`router` + core's retriever) — grounded
//!    snippet answers, or an honest refusal.
//!
//! The model is strictly a translator. Availability verdicts, schedule
//! rules and reservation writes are deterministic core/store decisions.

pub mod faq;
pub mod flow;
pub mod intent;
pub mod llm;
pub mod parsing;
pub mod policy;
pub mod router;
pub mod session;

pub use llm::{HttpLlmOracle, LlmOracle, OracleError, OracleOutcome, ScriptedOracle};
pub use policy::{PolicyDecision, ToolUsePolicy};
pub use router::{ChatRouter, ReplyKind, RoutedReply};
pub use session::SessionRegistry;
