use crate::card::Card;
use crate::state::{ActionOption, PlayerAction, PlayerId, Round, SessionId, SessionStatus, ShowdownResult};
use serde::{Deserialize, Serialize};

// --- 客户端 -> 服务器 的消息 ---
// 这些是客户端可以发送给服务器的指令或动作。

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// 用昵称登录并进入大厅，有人在等时立即开局
    JoinLobby { nickname: String },
    /// 玩家在轮到自己时执行的游戏动作。
    /// 动作名保持字符串，由服务端用 `PlayerAction::parse` 校验。
    PerformAction { action: String, amount: Option<u32> },
    /// 上一局结束后和同一位对手再来一局
    Rematch,
    /// 离开大厅或当前牌局
    Leave,
}

// --- 服务器 -> 客户端 的消息 ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// 登录成功后，服务器私密地发给该玩家
    Joined { your_id: PlayerId, nickname: String, chips: u32 },

    /// 已经开好牌局，正在等待对手
    Waiting { session_id: SessionId, status: SessionStatus },

    /// 完整牌局状态的快照。
    /// 每次状态变化后为每位玩家单独生成，隐藏了他不该看到的牌。
    GameStateSnapshot(GameView),

    /// 服务器向特定客户端发送的提示或错误信息
    Info { message: String },
    Error { message: String },
}

/// 某一位观看者眼中的牌局
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GameView {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub round: Round,
    pub pot: u32,
    /// 固定 5 个位置，未翻开的为 None
    pub community_cards: Vec<Option<Card>>,
    pub players: Vec<PlayerView>,
    pub dealer_id: PlayerId,
    pub current_player_id: Option<PlayerId>,
    pub winner_id: Option<PlayerId>,
    pub winning_hand: Option<String>,
    pub results: Vec<ShowdownResult>,
    /// 只有轮到观看者行动时才非空
    pub legal_actions: Vec<ActionOption>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PlayerView {
    pub id: PlayerId,
    pub nickname: String,
    pub chips: u32,
    pub current_bet: u32,
    pub folded: bool,
    pub connected: bool,
    pub last_action: Option<PlayerAction>,
    /// 对手未亮出的底牌为 None
    pub hand: Vec<Option<Card>>,
}

impl GameView {
    pub fn player(&self, player_id: PlayerId) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.id == player_id)
    }
}

impl From<PlayerAction> for ClientMessage {
    fn from(action: PlayerAction) -> Self {
        let (action, amount) = match action {
            PlayerAction::Fold => ("fold", None),
            PlayerAction::Check => ("check", None),
            PlayerAction::Call => ("call", None),
            PlayerAction::Raise(amount) => ("raise", Some(amount)),
        };
        ClientMessage::PerformAction { action: action.to_string(), amount }
    }
}
