//! Stepwise: an agent loop that alternates model inference with tool calls.
//!
//! A [`Session`](session::Session) holds the conversation. An
//! [`Orchestrator`](orchestrator::Orchestrator) drives it: ask the model,
//! run whatever tools it requested, feed the results back, and stop once the
//! model answers without tool calls or the step budget runs out.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use stepwise::prelude::*;
//! use stepwise::provider::openai::OpenAiProvider;
//!
//! # async fn example() -> stepwise::error::Result<()> {
//! let config = StepwiseConfig::load()?;
//! let provider = Arc::new(OpenAiProvider::from_config(&config)?);
//! let mut orchestrator = Orchestrator::with_config(provider, config.orchestrator_config());
//! orchestrator.register_tool(Arc::new(AgentTool::new(
//!     "echo",
//!     "Echo the input back",
//!     ToolParameters::object().string("text", "What to echo", true).build(),
//!     |args, _ctx| async move { Ok(ToolOutput::text(args.get_str("text")?)) },
//! )));
//!
//! let mut session = Session::new(config.model_config());
//! let outcome = orchestrator.send(&mut session, "Say hi via echo", None).await?;
//! println!("{}", outcome.final_text);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod mcp;
pub mod orchestrator;
pub mod prelude;
pub mod provider;
pub mod session;
pub mod tools;
pub mod types;
pub mod util;
