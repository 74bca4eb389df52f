//! # 单挑德州扑克核心逻辑库
//!
//! 这个 `core` crate 负责一局两人对决的全部状态：牌堆、下注状态机、
//! 奖池结算以及摊牌时的牌力评估，同时定义了客户端与服务器之间的消息。
//! 它不关心网络连接、账户或界面，任何上层应用都可以直接复用。
//!
//! 状态转移是纯函数式的：[`GameSession::apply_action`] 接收旧状态，
//! 返回新状态或 [`GameError`]，旧状态本身永远不会被修改。

mod card;
mod error;
mod evaluator;
mod logic;
mod message;
mod state;

pub use card::*;

pub use error::*;

pub use evaluator::*;

pub use logic::*;

pub use message::*;

pub use state::*;
