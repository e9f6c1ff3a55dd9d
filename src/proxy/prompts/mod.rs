pub mod agent_chat;
pub mod menu_analysis;
pub mod pre_chat;

pub use agent_chat::{build_agent_chat_system, AgentChatInput};
pub use menu_analysis::{build_menu_analysis_instruction, MENU_ANALYSIS_SYSTEM};
pub use pre_chat::pre_chat_system;
